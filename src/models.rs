//! Core data models used throughout rag-docs.
//!
//! These types represent the documents, chunks, and operation results that
//! flow through the indexing and query pipelines.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A document loaded from the documents directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// SHA-256 hex digest of the path relative to the documents root.
    pub doc_id: String,
    pub path: PathBuf,
    pub content: String,
}

impl Document {
    /// The document path with `/` separators, as persisted and reported.
    pub fn path_string(&self) -> String {
        posix_path(&self.path)
    }
}

/// A window of a document's text, the unit that gets embedded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// `"<doc_id>:<index>"`.
    pub chunk_id: String,
    pub doc_id: String,
    pub content: String,
    pub source_path: String,
    pub index: usize,
}

/// A record in the document store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredDocument {
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub content: String,
}

/// Summary returned by a build or refresh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildSummary {
    pub docs_dir: String,
    pub data_dir: String,
    pub collection: String,
    pub doc_count: usize,
    pub chunk_count: usize,
}

/// One ranked document in a query response.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryResult {
    pub doc_id: String,
    pub source_path: String,
    /// `1.0 - cosine distance`; negative when the distance exceeds 1.
    pub score: f64,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryResponse {
    pub query: String,
    pub results: Vec<QueryResult>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusReport {
    pub data_dir: String,
    pub collection: String,
    pub doc_count: usize,
    pub chunk_count: usize,
}

/// Render a path with `/` separators regardless of platform.
pub fn posix_path(path: &std::path::Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}
