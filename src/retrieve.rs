//! Retrieval: embed a query and rank a tenant's chunks by cosine similarity.
//!
//! Every query counts against the tenant's daily quota, including queries
//! against tenants that have never been ingested (those return an empty
//! result). The query must be embedded with the same model the index was
//! built with; a mismatch is an integrity error, not a silent degradation.

use sqlx::SqlitePool;
use tracing::debug;

use crate::config::Config;
use crate::error::{EngineError, Result};
use crate::index::IndexManager;
use crate::models::ScoredChunk;
use crate::{embedding, quota};

pub async fn retrieve(
    pool: &SqlitePool,
    config: &Config,
    indexes: &IndexManager,
    tenant_id: &str,
    query: &str,
    top_k: Option<usize>,
) -> Result<Vec<ScoredChunk>> {
    quota::record_query(pool, tenant_id).await?;

    let index = match indexes.get_or_load(tenant_id)? {
        Some(index) => index,
        None => return Ok(Vec::new()),
    };

    let provider = embedding::create_provider(&config.embedding)?;
    if index.model != provider.model_name() {
        return Err(EngineError::IndexIntegrity(format!(
            "index built with model '{}' but queries use '{}'; re-run ingestion",
            index.model,
            provider.model_name()
        )));
    }
    if index.dims != provider.dims() {
        return Err(EngineError::IndexIntegrity(format!(
            "index stores {}-dimensional vectors but provider '{}' produces {}; re-run ingestion",
            index.dims,
            provider.model_name(),
            provider.dims()
        )));
    }

    let query_vec = embedding::embed_query(provider.as_ref(), &config.embedding, query).await?;

    let mut scored: Vec<ScoredChunk> = index
        .chunks
        .iter()
        .map(|c| ScoredChunk {
            document_id: c.document_id.clone(),
            ordinal: c.ordinal,
            text: c.text.clone(),
            score: embedding::cosine_similarity(&query_vec, &c.embedding),
        })
        .collect();

    // Deterministic order: score, then earlier chunk wins, then document id
    scored.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.ordinal.cmp(&b.ordinal))
            .then_with(|| a.document_id.cmp(&b.document_id))
    });

    let k = top_k.unwrap_or(config.retrieval.top_k);
    scored.truncate(k);

    debug!(tenant = tenant_id, results = scored.len(), "retrieval served");
    Ok(scored)
}
