//! Index status.
//!
//! Reports how many documents the document store holds and how many chunk
//! vectors the collection holds. Opening the collection may create it
//! empty; no documents are ever written.

use anyhow::Result;
use std::path::Path;

use crate::doc_store::DocStore;
use crate::models::{posix_path, StatusReport};
use crate::vector_store::sqlite::SqliteVectorStore;
use crate::vector_store::VectorStore;

pub async fn get_status(data_dir: &Path, collection_name: &str) -> Result<StatusReport> {
    let store = SqliteVectorStore::open(data_dir).await?;
    let result = get_status_with_store(&store, data_dir, collection_name).await;
    store.close().await;
    result
}

/// [`get_status`] against any [`VectorStore`].
pub async fn get_status_with_store(
    store: &dyn VectorStore,
    data_dir: &Path,
    collection_name: &str,
) -> Result<StatusReport> {
    let mut doc_store = DocStore::open(data_dir);
    doc_store.load()?;

    let collection = store.get_or_create_collection(collection_name).await?;
    let chunk_count = collection.count().await?;

    Ok(StatusReport {
        data_dir: posix_path(data_dir),
        collection: collection_name.to_string(),
        doc_count: doc_store.count(),
        chunk_count,
    })
}
