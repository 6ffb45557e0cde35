//! Ingestion pipeline: extract, chunk, embed, and rebuild a tenant's index.
//!
//! A run rebuilds the whole index from every stored document, under the
//! tenant's ingest lock. Extraction and chunking failures are per-document:
//! the document is marked `error` and the run continues. Embedding failures
//! abort the run before the index is touched, so the previous snapshot
//! keeps serving reads.

use sqlx::SqlitePool;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::Result;
use crate::index::{IndexManager, TenantIndex};
use crate::models::{Chunk, DocumentStatus, IngestResult};
use crate::{chunk, embedding, extract, quota, repo};

/// Rebuild the tenant's index from all stored documents.
pub async fn ingest_tenant(
    pool: &SqlitePool,
    config: &Config,
    indexes: &IndexManager,
    tenant_id: &str,
) -> Result<IngestResult> {
    let lock = indexes.ingest_lock(tenant_id);
    let _guard = lock.lock().await;

    // Rows whose stored file has vanished are stale references: skipped,
    // statuses untouched.
    let docs: Vec<_> = repo::list(pool, tenant_id, None)
        .await?
        .into_iter()
        .filter(|d| {
            repo::stored_path(&config.storage.upload_root, tenant_id, &d.filename).exists()
        })
        .collect();
    if docs.is_empty() {
        return Ok(IngestResult {
            status: "no_documents".to_string(),
            documents_processed: 0,
            documents_failed: 0,
            chunks_created: 0,
        });
    }

    let provider = embedding::create_provider(&config.embedding)?;

    // Phase one: extract and chunk every document, isolating failures
    let mut chunk_texts: Vec<String> = Vec::new();
    let mut chunk_owners: Vec<(String, i64)> = Vec::new();
    let mut succeeded: Vec<(String, i64)> = Vec::new();
    let mut failed = 0u64;

    for doc in &docs {
        let path = repo::stored_path(&config.storage.upload_root, tenant_id, &doc.filename);

        let outcome = std::fs::read(&path)
            .map_err(|e| {
                crate::error::EngineError::DocumentProcessing(format!(
                    "stored file unreadable: {}",
                    e
                ))
            })
            .and_then(|bytes| extract::extract_text(&bytes, &doc.extension));

        match outcome {
            Ok(text) => {
                let pieces = chunk::split_text(
                    &text,
                    config.chunking.chunk_chars,
                    config.chunking.overlap_chars,
                );
                let count = pieces.len() as i64;
                for (ordinal, piece) in pieces.into_iter().enumerate() {
                    chunk_texts.push(piece);
                    chunk_owners.push((doc.id.clone(), ordinal as i64));
                }
                succeeded.push((doc.id.clone(), count));
            }
            Err(e) => {
                warn!(tenant = tenant_id, document = %doc.id, error = %e, "document failed");
                repo::update_status(
                    pool,
                    &doc.id,
                    DocumentStatus::Error,
                    None,
                    Some(e.to_string()),
                )
                .await?;
                failed += 1;
            }
        }
    }

    // Phase two: embed in batches. Any failure here aborts the run with the
    // previous index intact.
    let mut vectors: Vec<Vec<f32>> = Vec::with_capacity(chunk_texts.len());
    for batch in chunk_texts.chunks(config.embedding.batch_size.max(1)) {
        let embedded = embedding::embed_texts(provider.as_ref(), &config.embedding, batch).await?;
        vectors.extend(embedded);
    }

    // Phase three: swap in the new index, then record per-document outcomes
    let chunks: Vec<Chunk> = chunk_owners
        .into_iter()
        .zip(chunk_texts)
        .zip(vectors)
        .map(|(((document_id, ordinal), text), embedding)| Chunk {
            document_id,
            ordinal,
            text,
            embedding,
        })
        .collect();
    let chunks_created = chunks.len() as u64;

    indexes.replace(
        tenant_id,
        TenantIndex::new(provider.model_name().to_string(), provider.dims(), chunks),
    )?;

    for (doc_id, count) in &succeeded {
        repo::update_status(pool, doc_id, DocumentStatus::Ingested, Some(*count), None).await?;
    }

    info!(
        tenant = tenant_id,
        processed = succeeded.len(),
        failed,
        chunks = chunks_created,
        "ingestion complete"
    );

    Ok(IngestResult {
        status: "completed".to_string(),
        documents_processed: succeeded.len() as u64,
        documents_failed: failed,
        chunks_created,
    })
}

/// Remove every document row, stored file, the quota usage, and the
/// tenant's index itself.
///
/// Takes the tenant's ingest lock so a purge cannot interleave with an
/// in-flight rebuild. Returns the number of document rows removed.
pub async fn purge_tenant(
    pool: &SqlitePool,
    config: &Config,
    indexes: &IndexManager,
    tenant_id: &str,
) -> Result<u64> {
    let lock = indexes.ingest_lock(tenant_id);
    let _guard = lock.lock().await;

    let deleted = repo::delete_all(pool, &config.storage.upload_root, tenant_id).await?;
    quota::recalculate(pool, tenant_id).await?;
    indexes.delete(tenant_id)?;

    info!(tenant = tenant_id, deleted, "tenant purged");
    Ok(deleted)
}

/// Per-status document counts plus whether a searchable index exists.
#[derive(Debug, serde::Serialize)]
pub struct IngestStatus {
    pub pending: u64,
    pub ingested: u64,
    pub error: u64,
    pub index_exists: bool,
}

pub async fn ingest_status(
    pool: &SqlitePool,
    indexes: &IndexManager,
    tenant_id: &str,
) -> Result<IngestStatus> {
    let docs = repo::list(pool, tenant_id, None).await?;
    let mut status = IngestStatus {
        pending: 0,
        ingested: 0,
        error: 0,
        index_exists: indexes.exists(tenant_id),
    };
    for doc in &docs {
        match doc.status {
            DocumentStatus::Pending => status.pending += 1,
            DocumentStatus::Ingested => status.ingested += 1,
            DocumentStatus::Error => status.error += 1,
        }
    }
    Ok(status)
}
