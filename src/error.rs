//! Error taxonomy for the ingestion and retrieval engine.
//!
//! Validation and quota errors are rejected before any storage mutation.
//! Per-document processing errors are recorded on the document row and never
//! abort a batch. Index build failures leave the previous index intact.

use thiserror::Error;

/// Resource dimension a quota denial refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaResource {
    Documents,
    Storage,
    Queries,
}

impl std::fmt::Display for QuotaResource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QuotaResource::Documents => write!(f, "documents"),
            QuotaResource::Storage => write!(f, "storage"),
            QuotaResource::Queries => write!(f, "queries"),
        }
    }
}

#[derive(Debug, Error)]
pub enum EngineError {
    /// Malformed, oversized, or malicious input. Rejected before storage.
    #[error("validation failed: {0}")]
    Validation(String),

    /// A tenant resource limit was hit. Rejected before storage mutation.
    #[error("{resource} quota exceeded on {tier} tier ({used}/{limit}): {remediation}")]
    QuotaExceeded {
        resource: QuotaResource,
        tier: String,
        used: i64,
        limit: i64,
        remediation: String,
    },

    /// A single document failed extraction or embedding during ingestion.
    #[error("document processing failed: {0}")]
    DocumentProcessing(String),

    /// An index rebuild failed partway; the previous index is untouched.
    #[error("index integrity: {0}")]
    IndexIntegrity(String),

    /// Tenant has no such document or index yet.
    #[error("not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Db(#[from] sqlx::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

pub type Result<T, E = EngineError> = std::result::Result<T, E>;

impl From<anyhow::Error> for EngineError {
    fn from(e: anyhow::Error) -> Self {
        EngineError::Other(format!("{:#}", e))
    }
}
