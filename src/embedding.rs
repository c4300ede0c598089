//! Embedding capability and vector utilities.
//!
//! Defines the [`Embedder`] trait the pipelines embed through, and two
//! implementations:
//! - **[`LocalEmbedder`]**: runs a sentence-embedding model locally via
//!   fastembed; no network calls after the model download.
//! - **[`HashEmbedder`]**: deterministic token hashing; needs no model
//!   and is what the tests run on.
//!
//! Also provides the vector helpers the vector store is built on:
//! - [`cosine_similarity`]: similarity between two embedding vectors
//! - [`l2_normalize`]: scale a vector to unit length
//! - [`vec_to_blob`] / [`blob_to_vec`]: little-endian `f32` BLOB encoding
//!
//! # Backend Selection
//!
//! Use [`EmbeddingBackend::parse`] on a selector string and
//! [`create_embedder`] to construct the backend:
//!
//! ```rust
//! use rag_docs::embedding::{create_embedder, EmbeddingBackend};
//!
//! let backend = EmbeddingBackend::parse("simple").unwrap();
//! let embedder = create_embedder(backend, "unused").unwrap();
//! assert_eq!(embedder.model_name(), "hash");
//! ```
//!
//! Construction never falls back from one backend to another: if the model
//! cannot be loaded the caller gets a
//! [`MissingCapability`](crate::error::RagError::MissingCapability) error.

use anyhow::Result;
use async_trait::async_trait;
use sha2::{Digest, Sha256};

use crate::error::RagError;

/// A batched text-embedding backend.
///
/// Implementations return exactly one vector per input text, in input
/// order, all of the same length. Identical input must give identical
/// output.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Returns the model identifier (e.g. `"all-minilm-l6-v2"`).
    fn model_name(&self) -> &str;
    /// Returns the embedding vector dimensionality.
    fn dims(&self) -> usize;
    /// Embed a batch of texts.
    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Embed a single query text.
///
/// Convenience wrapper around [`Embedder::embed_texts`] with a one-element
/// batch.
pub async fn embed_query(embedder: &dyn Embedder, text: &str) -> Result<Vec<f32>> {
    let results = embedder.embed_texts(&[text.to_string()]).await?;
    let vector = results
        .into_iter()
        .next()
        .ok_or_else(|| anyhow::anyhow!("Empty embedding response"))?;
    ensure_dims(embedder, &vector)?;
    Ok(vector)
}

/// Fail unless `vector` has the embedder's declared dimensionality.
pub fn ensure_dims(embedder: &dyn Embedder, vector: &[f32]) -> Result<()> {
    if vector.len() != embedder.dims() {
        anyhow::bail!(
            "embedder '{}' returned a {}-dimensional vector, expected {}",
            embedder.model_name(),
            vector.len(),
            embedder.dims()
        );
    }
    Ok(())
}

/// Which embedding implementation to construct.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbeddingBackend {
    /// Model-backed ([`LocalEmbedder`]).
    Model,
    /// Deterministic hashing fallback ([`HashEmbedder`]).
    Hash,
}

impl EmbeddingBackend {
    /// Parse a backend selector (case-insensitive).
    ///
    /// | Selector | Backend |
    /// |----------|---------|
    /// | `sentence-transformer`, `sentence`, `st`, `model`, `local` | [`Model`](Self::Model) |
    /// | `simple`, `test`, `hash` | [`Hash`](Self::Hash) |
    pub fn parse(selector: &str) -> Result<Self> {
        match selector.trim().to_lowercase().as_str() {
            "sentence-transformer" | "sentence" | "st" | "model" | "local" => Ok(Self::Model),
            "simple" | "test" | "hash" => Ok(Self::Hash),
            other => Err(RagError::invalid(format!(
                "unknown embedding backend: '{}'. Use sentence-transformer or simple.",
                other
            ))
            .into()),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Model => "sentence-transformer",
            Self::Hash => "simple",
        }
    }
}

/// Construct the embedder for `backend`.
///
/// `model` names the local model and is ignored by the hash backend.
///
/// # Errors
///
/// [`RagError::MissingCapability`] if the model cannot be loaded or the
/// crate was built without `local-embeddings-fastembed`.
pub fn create_embedder(backend: EmbeddingBackend, model: &str) -> Result<Box<dyn Embedder>> {
    match backend {
        EmbeddingBackend::Hash => Ok(Box::new(HashEmbedder::default())),
        #[cfg(feature = "local-embeddings-fastembed")]
        EmbeddingBackend::Model => Ok(Box::new(LocalEmbedder::new(model)?)),
        #[cfg(not(feature = "local-embeddings-fastembed"))]
        EmbeddingBackend::Model => Err(RagError::missing(format!(
            "model-backed embeddings for '{}' require --features local-embeddings-fastembed",
            model
        ))
        .into()),
    }
}

// ============ Hash Embedder ============

/// Bag-of-tokens embedder using hashed buckets.
///
/// Lower-cases the text, splits it into runs of ASCII alphanumerics and
/// `_`, hashes every token into one of `dims` buckets and L2-normalizes the
/// counts. Texts sharing words land close together, which is enough for
/// tests and small offline setups.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dims: usize,
}

impl HashEmbedder {
    pub const DEFAULT_DIMS: usize = 64;

    pub fn new(dims: usize) -> Self {
        Self { dims: dims.max(1) }
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut buckets = vec![0.0f32; self.dims];
        let lowered = text.to_lowercase();
        for token in lowered
            .split(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .filter(|t| !t.is_empty())
        {
            buckets[self.bucket_for(token)] += 1.0;
        }
        l2_normalize(&mut buckets);
        buckets
    }

    fn bucket_for(&self, token: &str) -> usize {
        let digest = Sha256::digest(token.as_bytes());
        let mut prefix = [0u8; 8];
        prefix.copy_from_slice(&digest[..8]);
        (u64::from_le_bytes(prefix) % self.dims as u64) as usize
    }
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new(Self::DEFAULT_DIMS)
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    fn model_name(&self) -> &str {
        "hash"
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }
}

// ============ Local Embedder (fastembed) ============

/// Embedder running a fastembed model in-process.
///
/// The model is downloaded from Hugging Face on first use and cached.
/// Inference runs on the blocking thread pool; outputs are L2-normalized so
/// cosine distance behaves as expected.
#[cfg(feature = "local-embeddings-fastembed")]
pub struct LocalEmbedder {
    model_name: String,
    dims: usize,
    batch_size: usize,
    model: std::sync::Arc<std::sync::Mutex<fastembed::TextEmbedding>>,
}

#[cfg(feature = "local-embeddings-fastembed")]
impl LocalEmbedder {
    pub fn new(model_name: &str) -> Result<Self> {
        let fastembed_model = config_to_fastembed_model(model_name)?;
        let model = fastembed::TextEmbedding::try_new(
            fastembed::InitOptions::new(fastembed_model).with_show_download_progress(false),
        )
        .map_err(|e| {
            RagError::missing(format!(
                "failed to initialize local embedding model '{}': {}",
                model_name, e
            ))
        })?;

        Ok(Self {
            model_name: model_name.to_string(),
            dims: local_model_dims(model_name),
            batch_size: 64,
            model: std::sync::Arc::new(std::sync::Mutex::new(model)),
        })
    }
}

#[cfg(feature = "local-embeddings-fastembed")]
#[async_trait]
impl Embedder for LocalEmbedder {
    fn model_name(&self) -> &str {
        &self.model_name
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let model = self.model.clone();
        let batch_size = self.batch_size;
        let texts = texts.to_vec();

        let mut embeddings = tokio::task::spawn_blocking(move || {
            let mut model = model
                .lock()
                .map_err(|_| anyhow::anyhow!("local embedding model lock poisoned"))?;
            model
                .embed(texts, Some(batch_size))
                .map_err(|e| anyhow::anyhow!("Local embedding failed: {}", e))
        })
        .await??;

        for vector in &mut embeddings {
            l2_normalize(vector);
        }
        Ok(embeddings)
    }
}

#[cfg(feature = "local-embeddings-fastembed")]
fn config_to_fastembed_model(name: &str) -> Result<fastembed::EmbeddingModel> {
    match name {
        "all-minilm-l6-v2" => Ok(fastembed::EmbeddingModel::AllMiniLML6V2),
        "bge-small-en-v1.5" => Ok(fastembed::EmbeddingModel::BGESmallENV15),
        "bge-base-en-v1.5" => Ok(fastembed::EmbeddingModel::BGEBaseENV15),
        "bge-large-en-v1.5" => Ok(fastembed::EmbeddingModel::BGELargeENV15),
        "nomic-embed-text-v1" => Ok(fastembed::EmbeddingModel::NomicEmbedTextV1),
        "nomic-embed-text-v1.5" => Ok(fastembed::EmbeddingModel::NomicEmbedTextV15),
        "multilingual-e5-small" => Ok(fastembed::EmbeddingModel::MultilingualE5Small),
        "multilingual-e5-base" => Ok(fastembed::EmbeddingModel::MultilingualE5Base),
        "multilingual-e5-large" => Ok(fastembed::EmbeddingModel::MultilingualE5Large),
        other => Err(RagError::invalid(format!(
            "unknown local embedding model: '{}'. Supported models: \
             all-minilm-l6-v2, bge-small-en-v1.5, bge-base-en-v1.5, bge-large-en-v1.5, \
             nomic-embed-text-v1, nomic-embed-text-v1.5, \
             multilingual-e5-small, multilingual-e5-base, multilingual-e5-large",
            other
        ))
        .into()),
    }
}

#[cfg(feature = "local-embeddings-fastembed")]
fn local_model_dims(name: &str) -> usize {
    match name {
        "bge-base-en-v1.5" | "nomic-embed-text-v1" | "nomic-embed-text-v1.5" => 768,
        "multilingual-e5-base" => 768,
        "bge-large-en-v1.5" | "multilingual-e5-large" => 1024,
        _ => 384,
    }
}

// ============ Vector utilities ============

/// Scale `vec` to unit L2 norm in place. Zero vectors are left untouched.
pub fn l2_normalize(vec: &mut [f32]) {
    let norm = vec.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for v in vec.iter_mut() {
            *v /= norm;
        }
    }
}

/// Encode a float vector as a BLOB (little-endian f32 bytes).
///
/// ```rust
/// use rag_docs::embedding::{vec_to_blob, blob_to_vec};
///
/// let v = vec![1.0f32, -2.5, 3.125];
/// let blob = vec_to_blob(&v);
/// assert_eq!(blob.len(), 12); // 3 × 4 bytes
/// assert_eq!(blob_to_vec(&blob), v);
/// ```
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode a BLOB back into a float vector.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Compute cosine similarity between two embedding vectors.
///
/// Returns a value in `[-1.0, 1.0]`, or `0.0` for empty vectors, vectors of
/// different lengths, and zero vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}
