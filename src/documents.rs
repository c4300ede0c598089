//! Document loading from the documents directory.
//!
//! Walks the directory recursively and reads every `.txt`, `.md`, and
//! `.docx` file. Each document's id is the SHA-256 of its path relative to
//! the root, so ids survive content edits but not renames.

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::path::Path;
use walkdir::WalkDir;

use crate::error::RagError;
use crate::extract;
use crate::models::{posix_path, Document};

/// File suffixes picked up by [`load_documents`] (compared lower-cased).
pub const SUPPORTED_SUFFIXES: &[&str] = &["txt", "md", "docx"];

/// Load every eligible document under `docs_dir`, sorted by path.
///
/// A missing directory yields no documents. Unsupported, unreadable, and
/// blank files are skipped.
pub fn load_documents(docs_dir: &Path) -> Result<Vec<Document>> {
    if !docs_dir.exists() {
        tracing::debug!("documents directory {} does not exist", docs_dir.display());
        return Ok(Vec::new());
    }

    let mut documents = Vec::new();
    let walker = WalkDir::new(docs_dir).sort_by_file_name();
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!("skipping unreadable entry: {}", e);
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        if !is_supported(path) {
            continue;
        }

        let content = match read_document(path) {
            Ok(content) => content,
            Err(e) => {
                tracing::warn!("skipping {}: {:#}", path.display(), e);
                continue;
            }
        };
        if content.trim().is_empty() {
            continue;
        }

        documents.push(Document {
            doc_id: doc_id_for(path, docs_dir),
            path: path.to_path_buf(),
            content,
        });
    }

    documents.sort_by(|a, b| a.path.cmp(&b.path));
    tracing::debug!(
        "loaded {} documents from {}",
        documents.len(),
        docs_dir.display()
    );
    Ok(documents)
}

/// Read a single document's text according to its suffix.
pub fn read_document(path: &Path) -> Result<String> {
    match suffix_of(path).as_deref() {
        Some("txt") | Some("md") => {
            let bytes =
                std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
            Ok(String::from_utf8_lossy(&bytes).into_owned())
        }
        Some("docx") => {
            let bytes =
                std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
            Ok(extract::extract_docx(&bytes)?)
        }
        other => Err(RagError::invalid(format!(
            "unsupported file type: {}",
            other.map(|s| format!(".{}", s)).unwrap_or_default()
        ))
        .into()),
    }
}

/// Stable document id: SHA-256 hex of the `/`-separated path relative to `root`.
pub fn doc_id_for(path: &Path, root: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    let mut hasher = Sha256::new();
    hasher.update(posix_path(relative).as_bytes());
    format!("{:x}", hasher.finalize())
}

fn suffix_of(path: &Path) -> Option<String> {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
}

fn is_supported(path: &Path) -> bool {
    suffix_of(path)
        .map(|s| SUPPORTED_SUFFIXES.contains(&s.as_str()))
        .unwrap_or(false)
}
