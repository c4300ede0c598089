//! In-memory [`VectorStore`] implementation for tests and embedding.
//!
//! Uses `HashMap`/`BTreeMap` behind `std::sync::RwLock`. Queries are a
//! brute-force cosine scan over the collection. Nothing is persisted.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;

use super::{
    check_dims, cosine_distance, nearest, Collection, VectorHit, VectorRecord, VectorStore,
};

type Entries = Arc<RwLock<BTreeMap<String, VectorRecord>>>;

/// In-memory vector store.
pub struct InMemoryVectorStore {
    collections: RwLock<HashMap<String, Entries>>,
    upsert: bool,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
            upsert: true,
        }
    }

    /// A store whose collections only support [`Collection::add`].
    pub fn without_upsert() -> Self {
        Self {
            upsert: false,
            ..Self::new()
        }
    }

    fn handle(&self, name: &str, entries: Entries) -> Box<dyn Collection> {
        Box::new(InMemoryCollection {
            name: name.to_string(),
            entries,
            upsert: self.upsert,
        })
    }
}

impl Default for InMemoryVectorStore {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned<T>(_: T) -> anyhow::Error {
    anyhow!("in-memory vector store lock poisoned")
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn get_or_create_collection(&self, name: &str) -> Result<Box<dyn Collection>> {
        let mut collections = self.collections.write().map_err(poisoned)?;
        let entries = collections.entry(name.to_string()).or_default().clone();
        Ok(self.handle(name, entries))
    }

    async fn create_collection(&self, name: &str) -> Result<Box<dyn Collection>> {
        let mut collections = self.collections.write().map_err(poisoned)?;
        if collections.contains_key(name) {
            bail!("collection '{}' already exists", name);
        }
        let entries = Entries::default();
        collections.insert(name.to_string(), entries.clone());
        Ok(self.handle(name, entries))
    }

    async fn delete_collection(&self, name: &str) -> Result<()> {
        self.collections.write().map_err(poisoned)?.remove(name);
        Ok(())
    }

    async fn list_collections(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = self
            .collections
            .read()
            .map_err(poisoned)?
            .keys()
            .cloned()
            .collect();
        names.sort();
        Ok(names)
    }
}

struct InMemoryCollection {
    name: String,
    entries: Entries,
    upsert: bool,
}

fn stored_dims(entries: &BTreeMap<String, VectorRecord>) -> Option<usize> {
    entries.values().next().map(|r| r.embedding.len())
}

#[async_trait]
impl Collection for InMemoryCollection {
    fn name(&self) -> &str {
        &self.name
    }

    fn supports_upsert(&self) -> bool {
        self.upsert
    }

    async fn upsert(&self, records: &[VectorRecord]) -> Result<()> {
        if !self.upsert {
            bail!("collection '{}' does not support upsert", self.name);
        }
        let mut entries = self.entries.write().map_err(poisoned)?;
        check_dims(
            &self.name,
            stored_dims(&entries),
            records.iter().map(|r| r.embedding.as_slice()),
        )?;
        for record in records {
            entries.insert(record.id.clone(), record.clone());
        }
        Ok(())
    }

    async fn add(&self, records: &[VectorRecord]) -> Result<()> {
        let mut entries = self.entries.write().map_err(poisoned)?;
        if let Some(dup) = records.iter().find(|r| entries.contains_key(&r.id)) {
            bail!("id '{}' already exists in collection '{}'", dup.id, self.name);
        }
        check_dims(
            &self.name,
            stored_dims(&entries),
            records.iter().map(|r| r.embedding.as_slice()),
        )?;
        for record in records {
            entries.insert(record.id.clone(), record.clone());
        }
        Ok(())
    }

    async fn query(&self, embedding: &[f32], k: usize) -> Result<Vec<VectorHit>> {
        let entries = self.entries.read().map_err(poisoned)?;
        check_dims(&self.name, stored_dims(&entries), [embedding])?;
        let hits = entries
            .values()
            .map(|record| VectorHit {
                id: record.id.clone(),
                metadata: Some(record.metadata.clone()),
                distance: cosine_distance(embedding, &record.embedding),
            })
            .collect();
        Ok(nearest(hits, k))
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.entries.read().map_err(poisoned)?.len())
    }
}
