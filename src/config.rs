//! Configuration resolution.
//!
//! A [`Config`] is an immutable snapshot built once per operation from four
//! layers, later layers winning:
//!
//! 1. built-in defaults
//! 2. an optional TOML file
//! 3. `RAGDOCS_*` environment variables
//! 4. caller overrides ([`ConfigOverrides`]), i.e. CLI flags or tool
//!    parameters
//!
//! ```toml
//! [index]
//! docs_dir = "docs"
//! data_dir = "data"
//! collection_name = "rag_docs"
//! chunk_size = 1200
//! chunk_overlap = 200
//!
//! [retrieval]
//! top_k = 3
//!
//! [embedding]
//! backend = "sentence-transformer"   # or "simple"
//! model = "all-minilm-l6-v2"
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::embedding::{create_embedder, Embedder, EmbeddingBackend};
use crate::error::RagError;

pub const DEFAULT_DOCS_DIR: &str = "docs";
pub const DEFAULT_DATA_DIR: &str = "data";
pub const DEFAULT_COLLECTION: &str = "rag_docs";
pub const DEFAULT_CHUNK_SIZE: usize = 1200;
pub const DEFAULT_CHUNK_OVERLAP: usize = 200;
pub const DEFAULT_TOP_K: usize = 3;
pub const DEFAULT_EMBEDDING_BACKEND: &str = "sentence-transformer";
pub const DEFAULT_EMBEDDING_MODEL: &str = "all-minilm-l6-v2";

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub index: IndexConfig,
    pub retrieval: RetrievalConfig,
    pub embedding: EmbeddingConfig,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndexConfig {
    pub docs_dir: PathBuf,
    pub data_dir: PathBuf,
    pub collection_name: String,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalConfig {
    pub top_k: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingConfig {
    pub backend: EmbeddingBackend,
    pub model: String,
}

impl EmbeddingConfig {
    /// Construct the configured embedder.
    pub fn create_embedder(&self) -> Result<Box<dyn Embedder>> {
        create_embedder(self.backend, &self.model)
    }
}

/// Per-call overrides, the last configuration layer.
///
/// Deserializes from a tool's JSON parameters; unknown keys are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigOverrides {
    #[serde(default)]
    pub docs_dir: Option<PathBuf>,
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
    #[serde(default)]
    pub collection_name: Option<String>,
    #[serde(default)]
    pub chunk_size: Option<i64>,
    #[serde(default)]
    pub chunk_overlap: Option<i64>,
    #[serde(default)]
    pub top_k: Option<i64>,
    #[serde(default)]
    pub embedding_backend: Option<String>,
    #[serde(default)]
    pub embedding_model: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    #[serde(default)]
    index: FileIndex,
    #[serde(default)]
    retrieval: FileRetrieval,
    #[serde(default)]
    embedding: FileEmbedding,
}

#[derive(Debug, Default, Deserialize)]
struct FileIndex {
    docs_dir: Option<PathBuf>,
    data_dir: Option<PathBuf>,
    collection_name: Option<String>,
    chunk_size: Option<i64>,
    chunk_overlap: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
struct FileRetrieval {
    top_k: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
struct FileEmbedding {
    backend: Option<String>,
    model: Option<String>,
}

/// Values accumulated across layers before validation.
#[derive(Debug)]
struct Layered {
    docs_dir: PathBuf,
    data_dir: PathBuf,
    collection_name: String,
    chunk_size: i64,
    chunk_overlap: i64,
    top_k: i64,
    backend: String,
    model: String,
}

impl Default for Layered {
    fn default() -> Self {
        Self {
            docs_dir: PathBuf::from(DEFAULT_DOCS_DIR),
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            collection_name: DEFAULT_COLLECTION.to_string(),
            chunk_size: DEFAULT_CHUNK_SIZE as i64,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP as i64,
            top_k: DEFAULT_TOP_K as i64,
            backend: DEFAULT_EMBEDDING_BACKEND.to_string(),
            model: DEFAULT_EMBEDDING_MODEL.to_string(),
        }
    }
}

impl Layered {
    fn apply_file(&mut self, file: FileConfig) {
        let FileConfig {
            index,
            retrieval,
            embedding,
        } = file;
        set(&mut self.docs_dir, index.docs_dir);
        set(&mut self.data_dir, index.data_dir);
        set(&mut self.collection_name, index.collection_name);
        set(&mut self.chunk_size, index.chunk_size);
        set(&mut self.chunk_overlap, index.chunk_overlap);
        set(&mut self.top_k, retrieval.top_k);
        set(&mut self.backend, embedding.backend);
        set(&mut self.model, embedding.model);
    }

    fn apply_env(&mut self, env: &dyn Fn(&str) -> Option<String>) {
        let var = |key: &str| env(key).filter(|v| !v.trim().is_empty());

        set(&mut self.docs_dir, var("RAGDOCS_DOCS_DIR").map(PathBuf::from));
        set(&mut self.data_dir, var("RAGDOCS_DATA_DIR").map(PathBuf::from));
        set(&mut self.collection_name, var("RAGDOCS_COLLECTION_NAME"));
        set(&mut self.chunk_size, int_var("RAGDOCS_CHUNK_SIZE", var("RAGDOCS_CHUNK_SIZE")));
        set(
            &mut self.chunk_overlap,
            int_var("RAGDOCS_CHUNK_OVERLAP", var("RAGDOCS_CHUNK_OVERLAP")),
        );
        set(&mut self.top_k, int_var("RAGDOCS_TOP_K", var("RAGDOCS_TOP_K")));
        set(&mut self.backend, var("RAGDOCS_EMBEDDING_BACKEND"));
        set(&mut self.model, var("RAGDOCS_EMBEDDING_MODEL"));
    }

    fn apply_overrides(&mut self, overrides: &ConfigOverrides) {
        set(&mut self.docs_dir, overrides.docs_dir.clone());
        set(&mut self.data_dir, overrides.data_dir.clone());
        set(&mut self.collection_name, overrides.collection_name.clone());
        set(&mut self.chunk_size, overrides.chunk_size);
        set(&mut self.chunk_overlap, overrides.chunk_overlap);
        set(&mut self.top_k, overrides.top_k);
        set(&mut self.backend, overrides.embedding_backend.clone());
        set(&mut self.model, overrides.embedding_model.clone());
    }

    fn validate(self) -> Result<Config> {
        if self.chunk_size <= 0 {
            return Err(RagError::invalid(format!(
                "chunk_size must be > 0 (got {})",
                self.chunk_size
            ))
            .into());
        }
        if self.top_k < 1 {
            return Err(RagError::invalid(format!(
                "top_k must be >= 1 (got {})",
                self.top_k
            ))
            .into());
        }
        let backend = EmbeddingBackend::parse(&self.backend)?;

        Ok(Config {
            index: IndexConfig {
                docs_dir: self.docs_dir,
                data_dir: self.data_dir,
                collection_name: self.collection_name,
                chunk_size: self.chunk_size as usize,
                chunk_overlap: self.chunk_overlap.max(0) as usize,
            },
            retrieval: RetrievalConfig {
                top_k: self.top_k as usize,
            },
            embedding: EmbeddingConfig {
                backend,
                model: self.model,
            },
        })
    }
}

fn set<T>(slot: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *slot = value;
    }
}

fn int_var(key: &str, raw: Option<String>) -> Option<i64> {
    let raw = raw?;
    match raw.trim().parse::<i64>() {
        Ok(n) => Some(n),
        Err(_) => {
            tracing::warn!("ignoring {}={:?}: not an integer", key, raw);
            None
        }
    }
}

impl Config {
    /// Resolve a snapshot from defaults, `file`, the process environment,
    /// and `overrides`.
    pub fn resolve(file: Option<&Path>, overrides: &ConfigOverrides) -> Result<Config> {
        Self::resolve_with_env(file, overrides, |key| std::env::var(key).ok())
    }

    /// [`resolve`](Self::resolve) with an explicit environment lookup.
    pub fn resolve_with_env(
        file: Option<&Path>,
        overrides: &ConfigOverrides,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Config> {
        let mut layered = Layered::default();
        if let Some(path) = file {
            layered.apply_file(load_file(path)?);
        }
        layered.apply_env(&env);
        layered.apply_overrides(overrides);
        layered.validate()
    }
}

fn load_file(path: &Path) -> Result<FileConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    fn is_invalid(err: &anyhow::Error) -> bool {
        matches!(
            err.downcast_ref::<RagError>(),
            Some(RagError::InvalidConfiguration(_))
        )
    }

    #[test]
    fn test_defaults() {
        let config = Config::resolve_with_env(None, &ConfigOverrides::default(), no_env).unwrap();
        assert_eq!(config.index.docs_dir, PathBuf::from("docs"));
        assert_eq!(config.index.data_dir, PathBuf::from("data"));
        assert_eq!(config.index.collection_name, "rag_docs");
        assert_eq!(config.index.chunk_size, 1200);
        assert_eq!(config.index.chunk_overlap, 200);
        assert_eq!(config.retrieval.top_k, 3);
        assert_eq!(config.embedding.backend, EmbeddingBackend::Model);
        assert_eq!(config.embedding.model, "all-minilm-l6-v2");
    }

    #[test]
    fn test_layers_in_order() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("ragdocs.toml");
        std::fs::write(
            &path,
            r#"
            [index]
            docs_dir = "from-file"
            chunk_size = 500
            collection_name = "file_coll"

            [retrieval]
            top_k = 7

            [embedding]
            backend = "simple"
            "#,
        )
        .unwrap();

        let env = env_of(&[("RAGDOCS_CHUNK_SIZE", "300"), ("RAGDOCS_TOP_K", "4")]);
        let overrides = ConfigOverrides {
            top_k: Some(9),
            ..Default::default()
        };
        let config = Config::resolve_with_env(Some(&path), &overrides, env).unwrap();

        assert_eq!(config.index.docs_dir, PathBuf::from("from-file"));
        assert_eq!(config.index.collection_name, "file_coll");
        assert_eq!(config.index.chunk_size, 300);
        assert_eq!(config.index.chunk_overlap, 200);
        assert_eq!(config.retrieval.top_k, 9);
        assert_eq!(config.embedding.backend, EmbeddingBackend::Hash);
    }

    #[test]
    fn test_unparseable_env_int_keeps_previous_layer() {
        let env = env_of(&[("RAGDOCS_CHUNK_SIZE", "lots"), ("RAGDOCS_TOP_K", " 5 ")]);
        let config = Config::resolve_with_env(None, &ConfigOverrides::default(), env).unwrap();
        assert_eq!(config.index.chunk_size, 1200);
        assert_eq!(config.retrieval.top_k, 5);
    }

    #[test]
    fn test_env_strings() {
        let env = env_of(&[
            ("RAGDOCS_DATA_DIR", "/tmp/idx"),
            ("RAGDOCS_EMBEDDING_BACKEND", "hash"),
            ("RAGDOCS_EMBEDDING_MODEL", "bge-small-en-v1.5"),
            ("RAGDOCS_COLLECTION_NAME", ""),
        ]);
        let config = Config::resolve_with_env(None, &ConfigOverrides::default(), env).unwrap();
        assert_eq!(config.index.data_dir, PathBuf::from("/tmp/idx"));
        assert_eq!(config.index.collection_name, "rag_docs");
        assert_eq!(config.embedding.backend, EmbeddingBackend::Hash);
        assert_eq!(config.embedding.model, "bge-small-en-v1.5");
    }

    #[test]
    fn test_negative_overlap_clamps_to_zero() {
        let overrides = ConfigOverrides {
            chunk_overlap: Some(-5),
            ..Default::default()
        };
        let config = Config::resolve_with_env(None, &overrides, no_env).unwrap();
        assert_eq!(config.index.chunk_overlap, 0);
    }

    #[test]
    fn test_zero_chunk_size_rejected() {
        let overrides = ConfigOverrides {
            chunk_size: Some(0),
            ..Default::default()
        };
        let err = Config::resolve_with_env(None, &overrides, no_env).unwrap_err();
        assert!(is_invalid(&err));
    }

    #[test]
    fn test_zero_top_k_rejected() {
        let env = env_of(&[("RAGDOCS_TOP_K", "0")]);
        let err = Config::resolve_with_env(None, &ConfigOverrides::default(), env).unwrap_err();
        assert!(is_invalid(&err));
    }

    #[test]
    fn test_unknown_backend_rejected() {
        let overrides = ConfigOverrides {
            embedding_backend: Some("openai".to_string()),
            ..Default::default()
        };
        let err = Config::resolve_with_env(None, &overrides, no_env).unwrap_err();
        assert!(is_invalid(&err));
    }

    #[test]
    fn test_missing_file_is_error() {
        let tmp = TempDir::new().unwrap();
        let missing = tmp.path().join("nope.toml");
        let err =
            Config::resolve_with_env(Some(&missing), &ConfigOverrides::default(), no_env)
                .unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }

    #[test]
    fn test_overrides_from_tool_params() {
        let params = serde_json::json!({
            "query": "ignored here",
            "top_k": 2,
            "data_dir": "/srv/index"
        });
        let overrides: ConfigOverrides = serde_json::from_value(params).unwrap();
        assert_eq!(overrides.top_k, Some(2));
        assert_eq!(overrides.data_dir, Some(PathBuf::from("/srv/index")));
        assert!(overrides.docs_dir.is_none());
    }
}
