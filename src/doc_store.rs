//! JSON-backed document store.
//!
//! Maps each document id to its source path and full text. The store is
//! what query results are hydrated from, and its size is the document
//! count reported by status.
//!
//! The whole map lives in memory and is written back as one file,
//! `<data_dir>/doc_store.json`. Saves go through a temporary sibling file
//! and a rename, so readers see either the old or the new map.
//!
//! Incremental builds only ever add or overwrite records. Records for
//! documents that have since disappeared are dropped only by a rebuild,
//! which calls [`DocStore::clear`].

use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::models::{Document, StoredDocument};

/// File name of the store inside the data directory.
pub const DOC_STORE_FILE: &str = "doc_store.json";

#[derive(Debug)]
pub struct DocStore {
    path: PathBuf,
    docs: BTreeMap<String, StoredDocument>,
}

impl DocStore {
    /// A store bound to `<data_dir>/doc_store.json`, empty until [`load`](Self::load).
    pub fn open(data_dir: &Path) -> Self {
        Self::at(data_dir.join(DOC_STORE_FILE))
    }

    pub fn at(path: PathBuf) -> Self {
        Self {
            path,
            docs: BTreeMap::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replace in-memory contents with the persisted map.
    ///
    /// A missing file, or a file whose top level is not a JSON object,
    /// loads as empty.
    pub fn load(&mut self) -> Result<()> {
        if !self.path.exists() {
            self.docs.clear();
            return Ok(());
        }

        let raw = std::fs::read_to_string(&self.path)
            .with_context(|| format!("reading {}", self.path.display()))?;
        let value: serde_json::Value = serde_json::from_str(&raw)
            .with_context(|| format!("parsing {}", self.path.display()))?;

        self.docs = match value {
            serde_json::Value::Object(_) => serde_json::from_value(value)
                .with_context(|| format!("decoding {}", self.path.display()))?,
            _ => BTreeMap::new(),
        };
        Ok(())
    }

    /// Empty the store and remove its file.
    pub fn clear(&mut self) -> Result<()> {
        self.docs.clear();
        if self.path.exists() {
            std::fs::remove_file(&self.path)
                .with_context(|| format!("removing {}", self.path.display()))?;
        }
        Ok(())
    }

    /// Insert or fully replace the record for `document.doc_id`.
    pub fn add(&mut self, document: &Document) {
        self.docs.insert(
            document.doc_id.clone(),
            StoredDocument {
                path: document.path_string(),
                content: document.content.clone(),
            },
        );
    }

    pub fn get(&self, doc_id: &str) -> Option<&StoredDocument> {
        self.docs.get(doc_id)
    }

    pub fn count(&self) -> usize {
        self.docs.len()
    }

    pub fn doc_ids(&self) -> impl Iterator<Item = &str> {
        self.docs.keys().map(String::as_str)
    }

    /// Persist the full map, creating the data directory if needed.
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }

        let json = serde_json::to_string_pretty(&self.docs)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json).with_context(|| format!("writing {}", tmp.display()))?;
        std::fs::rename(&tmp, &self.path)
            .with_context(|| format!("replacing {}", self.path.display()))?;
        Ok(())
    }
}
