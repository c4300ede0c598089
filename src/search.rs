//! Query pipeline.
//!
//! Embeds the query, fetches the `top_k` nearest chunks, collapses them to
//! one entry per document (keeping the closest chunk), and hydrates each
//! document from the document store.
//!
//! Only `top_k` chunk hits are requested. When several of them belong to
//! the same document, fewer than `top_k` documents come back.

use anyhow::Result;
use std::collections::HashMap;
use std::path::Path;

use crate::doc_store::DocStore;
use crate::embedding::{embed_query, Embedder};
use crate::models::{QueryResponse, QueryResult};
use crate::vector_store::sqlite::SqliteVectorStore;
use crate::vector_store::{VectorHit, VectorStore};

/// Answer `query` with up to `top_k` documents, best first.
///
/// Opens the SQLite vector store at `<data_dir>/vectors.sqlite`.
pub async fn query_index(
    query: &str,
    data_dir: &Path,
    collection_name: &str,
    top_k: usize,
    embedder: &dyn Embedder,
) -> Result<QueryResponse> {
    let store = SqliteVectorStore::open(data_dir).await?;
    let result =
        query_index_with_store(&store, query, data_dir, collection_name, top_k, embedder).await;
    store.close().await;
    result
}

/// [`query_index`] against any [`VectorStore`].
pub async fn query_index_with_store(
    store: &dyn VectorStore,
    query: &str,
    data_dir: &Path,
    collection_name: &str,
    top_k: usize,
    embedder: &dyn Embedder,
) -> Result<QueryResponse> {
    let collection = store.get_or_create_collection(collection_name).await?;

    let mut doc_store = DocStore::open(data_dir);
    doc_store.load()?;
    if doc_store.count() == 0 {
        tracing::debug!("document store is empty, skipping vector query");
        return Ok(QueryResponse {
            query: query.to_string(),
            results: Vec::new(),
        });
    }

    let embedding = embed_query(embedder, query).await?;
    let hits = collection.query(&embedding, top_k).await?;
    tracing::debug!("{} chunk hits for query", hits.len());

    let mut results = Vec::new();
    for (doc_id, distance) in rank_documents(hits, top_k) {
        let Some(stored) = doc_store.get(&doc_id) else {
            tracing::debug!("hit for {} has no document store record", doc_id);
            continue;
        };
        results.push(QueryResult {
            source_path: stored.path.clone(),
            content: stored.content.clone(),
            score: 1.0 - distance,
            doc_id,
        });
    }

    Ok(QueryResponse {
        query: query.to_string(),
        results,
    })
}

/// Collapse chunk hits to `(doc_id, distance)` pairs.
///
/// Keeps the minimum distance per document, drops hits without a
/// `doc_id`, sorts ascending by distance (ties by doc_id), and keeps at
/// most `top_k`.
pub fn rank_documents(hits: Vec<VectorHit>, top_k: usize) -> Vec<(String, f64)> {
    let mut best: HashMap<String, f64> = HashMap::new();
    for hit in hits {
        let Some(doc_id) = hit.metadata.map(|m| m.doc_id) else {
            continue;
        };
        if doc_id.is_empty() {
            continue;
        }
        best.entry(doc_id)
            .and_modify(|d| *d = d.min(hit.distance))
            .or_insert(hit.distance);
    }

    let mut ranked: Vec<(String, f64)> = best.into_iter().collect();
    ranked.sort_by(|a, b| {
        a.1.partial_cmp(&b.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.0.cmp(&b.0))
    });
    ranked.truncate(top_k);
    ranked
}
