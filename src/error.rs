//! Unified error taxonomy for the ingestion, chunking and retrieval engine.
//!
//! Every module-local error converts into [`RagError`] at its seam so request
//! handlers (see [`crate::api`]) have a single type to turn into the
//! `{ok:false,error,detail?}` envelope.

use thiserror::Error;

/// Top-level error type returned by every public operation in this crate.
#[derive(Debug, Error)]
pub enum RagError {
    /// Bad input: unsupported file type, missing field, malformed request.
    #[error("validation error: {0}")]
    Validation(String),

    /// The requested document/chunk/task id does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The embedding/chat/rerank provider failed (network error, non-2xx, bad shape).
    #[error("provider error: {0}")]
    Provider(String),

    /// Filesystem or on-disk JSON failure.
    #[error("storage error: {0}")]
    Storage(String),

    /// Anything else unexpected; never propagated as a process-killing panic.
    #[error("internal error: {0}")]
    Internal(String),
}

impl RagError {
    /// Short machine-readable tag used in the HTTP error envelope.
    pub fn tag(&self) -> &'static str {
        match self {
            RagError::Validation(_) => "validation",
            RagError::NotFound(_) => "not_found",
            RagError::Provider(_) => "provider",
            RagError::Storage(_) => "storage",
            RagError::Internal(_) => "internal",
        }
    }

    /// HTTP status code this error maps to.
    pub fn status_code(&self) -> u16 {
        match self {
            RagError::Validation(_) => 400,
            RagError::NotFound(_) => 404,
            RagError::Provider(_) => 502,
            RagError::Storage(_) => 500,
            RagError::Internal(_) => 500,
        }
    }
}

impl From<std::io::Error> for RagError {
    fn from(err: std::io::Error) -> Self {
        RagError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for RagError {
    fn from(err: serde_json::Error) -> Self {
        RagError::Storage(err.to_string())
    }
}

impl From<reqwest::Error> for RagError {
    fn from(err: reqwest::Error) -> Self {
        RagError::Provider(err.to_string())
    }
}
