//! Indexing pipeline orchestration.
//!
//! Coordinates one build: documents → document store → chunking →
//! embedding → vector store. Each step is awaited in order.
//!
//! A rebuild starts from an empty collection and an empty document store.
//! An incremental build reuses both and overwrites by id, so records for
//! documents that were removed from disk stay until the next rebuild.
//!
//! Nothing is rolled back on failure. The document store is saved before
//! chunking, so a failed embedding leaves it ahead of the vector store.

use anyhow::{bail, Result};
use std::path::Path;

use crate::chunk::build_chunks;
use crate::config::Config;
use crate::doc_store::DocStore;
use crate::documents::load_documents;
use crate::embedding::{ensure_dims, Embedder};
use crate::models::{posix_path, BuildSummary, Chunk};
use crate::vector_store::sqlite::SqliteVectorStore;
use crate::vector_store::{ChunkMetadata, Collection, VectorRecord, VectorStore};

/// Inputs of one build.
#[derive(Debug, Clone)]
pub struct BuildRequest<'a> {
    pub docs_dir: &'a Path,
    pub data_dir: &'a Path,
    pub collection_name: &'a str,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    /// Start from an empty collection and document store.
    pub rebuild: bool,
}

impl<'a> BuildRequest<'a> {
    pub fn from_config(config: &'a Config, rebuild: bool) -> Self {
        Self {
            docs_dir: &config.index.docs_dir,
            data_dir: &config.index.data_dir,
            collection_name: &config.index.collection_name,
            chunk_size: config.index.chunk_size,
            chunk_overlap: config.index.chunk_overlap,
            rebuild,
        }
    }
}

/// Build or update the index under `data_dir` from the files in `docs_dir`.
///
/// Opens the SQLite vector store at `<data_dir>/vectors.sqlite`.
pub async fn build_index(
    docs_dir: &Path,
    data_dir: &Path,
    collection_name: &str,
    chunk_size: usize,
    chunk_overlap: usize,
    embedder: &dyn Embedder,
    rebuild: bool,
) -> Result<BuildSummary> {
    let request = BuildRequest {
        docs_dir,
        data_dir,
        collection_name,
        chunk_size,
        chunk_overlap,
        rebuild,
    };
    let store = SqliteVectorStore::open(data_dir).await?;
    let result = build_index_with_store(&store, &request, embedder).await;
    store.close().await;
    result
}

/// [`build_index`] against any [`VectorStore`].
pub async fn build_index_with_store(
    store: &dyn VectorStore,
    request: &BuildRequest<'_>,
    embedder: &dyn Embedder,
) -> Result<BuildSummary> {
    tracing::info!(
        "building index '{}' from {} (rebuild: {})",
        request.collection_name,
        request.docs_dir.display(),
        request.rebuild
    );

    let documents = load_documents(request.docs_dir)?;
    tracing::debug!("loaded {} documents", documents.len());

    let collection = acquire_collection(store, request.collection_name, request.rebuild).await?;

    let mut doc_store = DocStore::open(request.data_dir);
    if request.rebuild {
        doc_store.clear()?;
    } else {
        doc_store.load()?;
    }
    for document in &documents {
        doc_store.add(document);
    }
    doc_store.save()?;
    tracing::debug!(
        "document store saved with {} records at {}",
        doc_store.count(),
        doc_store.path().display()
    );

    let chunks = build_chunks(&documents, request.chunk_size, request.chunk_overlap)?;
    let summary = BuildSummary {
        docs_dir: posix_path(request.docs_dir),
        data_dir: posix_path(request.data_dir),
        collection: request.collection_name.to_string(),
        doc_count: documents.len(),
        chunk_count: chunks.len(),
    };

    if chunks.is_empty() {
        tracing::info!("no chunks to index");
        return Ok(summary);
    }

    let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
    let embeddings = embedder.embed_texts(&texts).await?;
    if embeddings.len() != chunks.len() {
        bail!(
            "embedder returned {} vectors for {} chunks",
            embeddings.len(),
            chunks.len()
        );
    }
    for vector in &embeddings {
        ensure_dims(embedder, vector)?;
    }
    tracing::debug!(
        "embedded {} chunks with {}",
        chunks.len(),
        embedder.model_name()
    );

    let records = to_records(chunks, embeddings);
    write_records(collection.as_ref(), &records).await?;

    tracing::info!(
        "indexed {} documents as {} chunks into '{}'",
        summary.doc_count,
        summary.chunk_count,
        summary.collection
    );
    Ok(summary)
}

async fn acquire_collection(
    store: &dyn VectorStore,
    name: &str,
    rebuild: bool,
) -> Result<Box<dyn Collection>> {
    if rebuild {
        store.delete_collection(name).await?;
        store.create_collection(name).await
    } else {
        store.get_or_create_collection(name).await
    }
}

fn to_records(chunks: Vec<Chunk>, embeddings: Vec<Vec<f32>>) -> Vec<VectorRecord> {
    chunks
        .into_iter()
        .zip(embeddings)
        .map(|(chunk, embedding)| VectorRecord {
            id: chunk.chunk_id,
            metadata: ChunkMetadata {
                doc_id: chunk.doc_id,
                source_path: chunk.source_path,
                chunk_index: chunk.index,
            },
            document: chunk.content,
            embedding,
        })
        .collect()
}

async fn write_records(collection: &dyn Collection, records: &[VectorRecord]) -> Result<()> {
    if collection.supports_upsert() {
        collection.upsert(records).await
    } else {
        collection.add(records).await
    }
}
