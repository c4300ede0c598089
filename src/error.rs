//! Typed failures raised by the indexing and retrieval pipeline.
//!
//! Every fallible function in this crate returns [`anyhow::Result`]. The two
//! failure classes that callers need to tell apart are raised as
//! [`RagError`] and can be recovered with `err.downcast_ref::<RagError>()`.
//! Everything else (I/O, SQLite, JSON) propagates unchanged.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RagError {
    /// A configuration value or input cannot be used: zero chunk size,
    /// unknown embedding backend, unsupported document type.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// A required backend (embedding model, vector store) could not be
    /// constructed.
    #[error("missing capability: {0}")]
    MissingCapability(String),
}

impl RagError {
    pub fn invalid(message: impl Into<String>) -> Self {
        RagError::InvalidConfiguration(message.into())
    }

    pub fn missing(message: impl Into<String>) -> Self {
        RagError::MissingCapability(message.into())
    }
}

/// Look through an `anyhow` chain for a [`RagError`].
pub fn classify(err: &anyhow::Error) -> Option<&RagError> {
    err.chain().find_map(|cause| cause.downcast_ref::<RagError>())
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn test_classify_direct() {
        let err: anyhow::Error = RagError::invalid("chunk_size must be > 0").into();
        assert!(matches!(
            classify(&err),
            Some(RagError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_classify_through_context() {
        let err = Err::<(), _>(RagError::missing("no model"))
            .context("building index")
            .unwrap_err();
        assert!(matches!(classify(&err), Some(RagError::MissingCapability(_))));
    }

    #[test]
    fn test_classify_other() {
        let err = anyhow::anyhow!("disk full");
        assert!(classify(&err).is_none());
    }

    #[test]
    fn test_display() {
        let err = RagError::invalid("unknown embedding backend: foo");
        assert_eq!(
            err.to_string(),
            "invalid configuration: unknown embedding backend: foo"
        );
    }
}
