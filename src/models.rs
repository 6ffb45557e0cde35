//! Core data models used throughout docvault.
//!
//! These types represent the documents, quotas, and chunks that flow through
//! the upload, ingestion, and retrieval pipeline.

use serde::{Deserialize, Serialize};

/// Lifecycle status of an uploaded document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    /// Uploaded and validated, not yet ingested.
    Pending,
    /// Chunked, embedded, and present in the tenant's index.
    Ingested,
    /// Extraction or embedding failed; `error_message` records why.
    Error,
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentStatus::Pending => "pending",
            DocumentStatus::Ingested => "ingested",
            DocumentStatus::Error => "error",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(DocumentStatus::Pending),
            "ingested" => Some(DocumentStatus::Ingested),
            "error" => Some(DocumentStatus::Error),
            _ => None,
        }
    }
}

/// One uploaded file, stored in SQLite.
///
/// Invariants: `status == Ingested` implies `chunk_count` is set;
/// `status == Error` implies `error_message` is set.
#[derive(Debug, Clone, Serialize)]
pub struct Document {
    pub id: String,
    pub tenant_id: String,
    /// Sanitized name the file is stored under (unique per tenant).
    pub filename: String,
    /// Sanitized name as originally submitted, before collision suffixing.
    pub original_filename: String,
    pub size_bytes: i64,
    pub extension: String,
    pub uploaded_at: i64,
    pub status: DocumentStatus,
    pub chunk_count: Option<i64>,
    pub error_message: Option<String>,
    pub updated_at: i64,
}

/// Named resource-limit profile for a tenant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Free,
    Pro,
    Enterprise,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Free => "free",
            Tier::Pro => "pro",
            Tier::Enterprise => "enterprise",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "free" => Some(Tier::Free),
            "pro" => Some(Tier::Pro),
            "enterprise" => Some(Tier::Enterprise),
            _ => None,
        }
    }
}

/// Per-tenant usage counters, created lazily on first upload or query.
#[derive(Debug, Clone)]
pub struct TenantQuota {
    pub tenant_id: String,
    pub tier: Tier,
    pub document_count: i64,
    pub total_storage_bytes: i64,
    pub queries_today: i64,
    /// UTC calendar date (`YYYY-MM-DD`) of the last daily-counter reset.
    pub last_query_reset: String,
}

/// A bounded span of document text, the unit of embedding and retrieval.
///
/// Chunks exist only inside a tenant's vector index; they are never
/// persisted independently of it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub document_id: String,
    /// Position within the source document, starting at 0.
    pub ordinal: i64,
    pub text: String,
    pub embedding: Vec<f32>,
}

/// A chunk returned from retrieval, with its similarity score.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredChunk {
    pub document_id: String,
    pub ordinal: i64,
    pub text: String,
    pub score: f32,
}

/// Aggregate result of one ingestion run.
#[derive(Debug, Clone, Serialize)]
pub struct IngestResult {
    pub status: String,
    pub documents_processed: u64,
    pub documents_failed: u64,
    pub chunks_created: u64,
}
