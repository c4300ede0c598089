//! Vector storage abstraction.
//!
//! The [`VectorStore`] trait hands out named [`Collection`]s; a collection
//! holds one [`VectorRecord`] per chunk id and answers nearest-neighbor
//! queries by cosine distance. The pipelines only ever talk to these two
//! traits, so they run unchanged against the persistent
//! [`SqliteVectorStore`](sqlite::SqliteVectorStore) or the
//! [`InMemoryVectorStore`](memory::InMemoryVectorStore).
//!
//! # Operations
//!
//! | Method | Purpose |
//! |--------|---------|
//! | [`get_or_create_collection`](VectorStore::get_or_create_collection) | Open a collection, creating it empty if absent |
//! | [`create_collection`](VectorStore::create_collection) | Create a fresh collection; fails if it exists |
//! | [`delete_collection`](VectorStore::delete_collection) | Drop a collection; absent is not an error |
//! | [`upsert`](Collection::upsert) | Insert or replace records by id |
//! | [`add`](Collection::add) | Insert records; duplicate ids are an error |
//! | [`query`](Collection::query) | k nearest records by cosine distance |
//! | [`count`](Collection::count) | Number of records |
//!
//! A collection takes its dimensionality from the first vector written to
//! it. Writes and queries with a vector of any other length fail with
//! [`RagError::InvalidConfiguration`], which is what switching embedding
//! backends on an existing index looks like.

pub mod memory;
pub mod sqlite;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::embedding::cosine_similarity;
use crate::error::RagError;

/// Source metadata stored next to each chunk vector.
///
/// Every field is optional on the way in so partially populated metadata
/// still decodes; an empty `doc_id` marks a hit that cannot be attributed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    #[serde(default)]
    pub doc_id: String,
    #[serde(default)]
    pub source_path: String,
    #[serde(default)]
    pub chunk_index: usize,
}

/// A chunk vector as written to a collection.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorRecord {
    /// Chunk id, `"<doc_id>:<index>"`.
    pub id: String,
    /// Chunk text.
    pub document: String,
    pub metadata: ChunkMetadata,
    pub embedding: Vec<f32>,
}

/// One nearest-neighbor result.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorHit {
    pub id: String,
    /// `None` when the stored metadata could not be decoded.
    pub metadata: Option<ChunkMetadata>,
    /// Cosine distance, `1 - cosine similarity`, in `[0, 2]`.
    pub distance: f64,
}

/// A store of named vector collections.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Open `name`, creating an empty collection if it does not exist.
    async fn get_or_create_collection(&self, name: &str) -> Result<Box<dyn Collection>>;

    /// Create `name` empty. Fails if a collection of that name exists.
    async fn create_collection(&self, name: &str) -> Result<Box<dyn Collection>>;

    /// Drop `name` and all of its records. Absent collections are ignored.
    async fn delete_collection(&self, name: &str) -> Result<()>;

    /// Names of all collections, sorted.
    async fn list_collections(&self) -> Result<Vec<String>>;
}

/// A named set of chunk vectors.
#[async_trait]
pub trait Collection: Send + Sync {
    fn name(&self) -> &str;

    /// Whether [`upsert`](Self::upsert) is available. Writers fall back to
    /// [`add`](Self::add) when it is not.
    fn supports_upsert(&self) -> bool {
        true
    }

    /// Insert records, replacing any existing record with the same id.
    ///
    /// Every embedding must match the collection's dimensionality.
    async fn upsert(&self, records: &[VectorRecord]) -> Result<()>;

    /// Insert records. An id that already exists is an error.
    async fn add(&self, records: &[VectorRecord]) -> Result<()>;

    /// The `k` records nearest to `embedding`, closest first.
    ///
    /// Fails when `embedding` does not match the collection's
    /// dimensionality. An empty collection accepts any length.
    async fn query(&self, embedding: &[f32], k: usize) -> Result<Vec<VectorHit>>;

    async fn count(&self) -> Result<usize>;
}

/// Cosine distance between two vectors.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f64 {
    1.0 - cosine_similarity(a, b) as f64
}

/// Check that every vector has the collection's dimensionality.
///
/// `expected` is the length of an already stored vector, or `None` for an
/// empty collection, in which case the first vector sets it.
pub(crate) fn check_dims<'a>(
    collection: &str,
    expected: Option<usize>,
    vectors: impl IntoIterator<Item = &'a [f32]>,
) -> Result<()> {
    let mut expected = expected;
    for vector in vectors {
        match expected {
            Some(dims) if dims != vector.len() => {
                return Err(RagError::invalid(format!(
                    "collection '{}' holds {}-dimensional embeddings, got {}",
                    collection,
                    dims,
                    vector.len()
                ))
                .into());
            }
            Some(_) => {}
            None => expected = Some(vector.len()),
        }
    }
    Ok(())
}

/// Sort hits closest first (ties by id) and keep the first `k`.
pub(crate) fn nearest(mut hits: Vec<VectorHit>, k: usize) -> Vec<VectorHit> {
    hits.sort_by(|a, b| {
        a.distance
            .partial_cmp(&b.distance)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.id.cmp(&b.id))
    });
    hits.truncate(k);
    hits
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(id: &str, distance: f64) -> VectorHit {
        VectorHit {
            id: id.to_string(),
            metadata: None,
            distance,
        }
    }

    #[test]
    fn test_nearest_orders_and_truncates() {
        let hits = vec![hit("c", 0.5), hit("a", 0.1), hit("b", 0.3)];
        let ids: Vec<String> = nearest(hits, 2).into_iter().map(|h| h.id).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn test_nearest_ties_by_id() {
        let hits = vec![hit("z", 0.2), hit("m", 0.2)];
        let ids: Vec<String> = nearest(hits, 5).into_iter().map(|h| h.id).collect();
        assert_eq!(ids, vec!["m", "z"]);
    }

    #[test]
    fn test_cosine_distance_range() {
        assert!(cosine_distance(&[1.0, 0.0], &[1.0, 0.0]).abs() < 1e-6);
        assert!((cosine_distance(&[1.0, 0.0], &[0.0, 1.0]) - 1.0).abs() < 1e-6);
        assert!((cosine_distance(&[1.0, 0.0], &[-1.0, 0.0]) - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_check_dims() {
        let a = [1.0f32, 0.0];
        let b = [0.0f32, 1.0, 0.0];
        assert!(check_dims("docs", Some(2), [&a[..]]).is_ok());
        assert!(check_dims("docs", None, [&a[..], &a[..]]).is_ok());

        let err = check_dims("docs", None, [&a[..], &b[..]]).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<RagError>(),
            Some(RagError::InvalidConfiguration(_))
        ));
        assert!(err.to_string().contains("2-dimensional"));
        assert!(check_dims("docs", Some(3), [&a[..]]).is_err());
    }

    #[test]
    fn test_metadata_decodes_partial() {
        let meta: ChunkMetadata = serde_json::from_str(r#"{"source_path": "a.txt"}"#).unwrap();
        assert_eq!(meta.doc_id, "");
        assert_eq!(meta.chunk_index, 0);
    }
}
