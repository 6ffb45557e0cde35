//! Embedding provider abstraction and implementations.
//!
//! Defines the [`EmbeddingProvider`] trait and concrete implementations:
//! - **[`LocalProvider`]** — deterministic feature-hashed bag-of-words
//!   vectors; fully offline, used by default and in tests.
//! - **[`OpenAIProvider`]** — calls the OpenAI embeddings API with batching,
//!   retry, and backoff.
//!
//! Queries must be embedded with the same provider/model used at ingestion
//! time — the index persists its model name and retrieval checks it, so a
//! mismatch fails loudly instead of silently degrading relevance.

use anyhow::{bail, Result};
use sha2::{Digest, Sha256};
use std::time::Duration;

use crate::config::EmbeddingConfig;

/// Default dimensionality for the local hashed provider.
const LOCAL_DEFAULT_DIMS: usize = 256;

/// Trait for embedding providers.
pub trait EmbeddingProvider: Send + Sync {
    /// Returns the model identifier (e.g. `"hashed-bow-256"`).
    fn model_name(&self) -> &str;
    /// Returns the embedding vector dimensionality.
    fn dims(&self) -> usize;
}

/// Embed a batch of texts using the configured provider.
///
/// Dispatches on the config's `provider` field; results are one vector per
/// input text, in input order.
pub async fn embed_texts(
    provider: &dyn EmbeddingProvider,
    config: &EmbeddingConfig,
    texts: &[String],
) -> Result<Vec<Vec<f32>>> {
    match config.provider.as_str() {
        "local" => Ok(texts
            .iter()
            .map(|t| hashed_embedding(t, provider.dims()))
            .collect()),
        "openai" => embed_openai(config, texts).await,
        other => bail!("Unknown embedding provider: {}", other),
    }
}

/// Embed a single query text.
pub async fn embed_query(
    provider: &dyn EmbeddingProvider,
    config: &EmbeddingConfig,
    text: &str,
) -> Result<Vec<f32>> {
    let results = embed_texts(provider, config, &[text.to_string()]).await?;
    results
        .into_iter()
        .next()
        .ok_or_else(|| anyhow::anyhow!("Empty embedding response"))
}

/// Create the appropriate [`EmbeddingProvider`] based on configuration.
pub fn create_provider(config: &EmbeddingConfig) -> Result<Box<dyn EmbeddingProvider>> {
    match config.provider.as_str() {
        "local" => Ok(Box::new(LocalProvider::new(config))),
        "openai" => Ok(Box::new(OpenAIProvider::new(config)?)),
        other => bail!("Unknown embedding provider: {}", other),
    }
}

// ============ Local Provider ============

/// Deterministic offline embedding provider.
///
/// Tokenizes on non-alphanumeric boundaries, hashes each lowercased token
/// into a fixed number of buckets, and L2-normalizes the counts. Not a
/// semantic model, but stable across processes and adequate for lexical
/// similarity, tests, and air-gapped deployments.
pub struct LocalProvider {
    model: String,
    dims: usize,
}

impl LocalProvider {
    pub fn new(config: &EmbeddingConfig) -> Self {
        let dims = config.dims.unwrap_or(LOCAL_DEFAULT_DIMS);
        let model = config
            .model
            .clone()
            .unwrap_or_else(|| format!("hashed-bow-{}", dims));
        Self { model, dims }
    }
}

impl EmbeddingProvider for LocalProvider {
    fn model_name(&self) -> &str {
        &self.model
    }
    fn dims(&self) -> usize {
        self.dims
    }
}

/// Feature-hash a text into a normalized `dims`-bucket vector.
pub fn hashed_embedding(text: &str, dims: usize) -> Vec<f32> {
    let mut vec = vec![0.0f32; dims.max(1)];

    for token in text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
    {
        let lowered = token.to_lowercase();
        let digest = Sha256::digest(lowered.as_bytes());
        let bucket = u64::from_le_bytes([
            digest[0], digest[1], digest[2], digest[3], digest[4], digest[5], digest[6], digest[7],
        ]) as usize
            % vec.len();
        // Sign bit from another digest byte reduces bucket-collision bias
        let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
        vec[bucket] += sign;
    }

    let norm: f32 = vec.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > f32::EPSILON {
        for v in &mut vec {
            *v /= norm;
        }
    }
    vec
}

// ============ OpenAI Provider ============

/// Embedding provider using the OpenAI API.
///
/// Requires the `OPENAI_API_KEY` environment variable. Retries rate limits
/// (429) and server errors with exponential backoff; other client errors
/// fail immediately.
pub struct OpenAIProvider {
    model: String,
    dims: usize,
}

impl OpenAIProvider {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("embedding.model required for OpenAI provider"))?;
        let dims = config
            .dims
            .ok_or_else(|| anyhow::anyhow!("embedding.dims required for OpenAI provider"))?;

        if std::env::var("OPENAI_API_KEY").is_err() {
            bail!("OPENAI_API_KEY environment variable not set");
        }

        Ok(Self { model, dims })
    }
}

impl EmbeddingProvider for OpenAIProvider {
    fn model_name(&self) -> &str {
        &self.model
    }
    fn dims(&self) -> usize {
        self.dims
    }
}

async fn embed_openai(config: &EmbeddingConfig, texts: &[String]) -> Result<Vec<Vec<f32>>> {
    let api_key =
        std::env::var("OPENAI_API_KEY").map_err(|_| anyhow::anyhow!("OPENAI_API_KEY not set"))?;

    let model = config
        .model
        .as_ref()
        .ok_or_else(|| anyhow::anyhow!("embedding.model required"))?;

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()?;

    let body = serde_json::json!({
        "model": model,
        "input": texts,
    });

    let mut last_err = None;

    for attempt in 0..=config.max_retries {
        if attempt > 0 {
            // Exponential backoff: 1s, 2s, 4s, 8s, ...
            let delay = Duration::from_secs(1 << (attempt - 1).min(5));
            tokio::time::sleep(delay).await;
        }

        let resp = client
            .post("https://api.openai.com/v1/embeddings")
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await;

        match resp {
            Ok(response) => {
                let status = response.status();

                if status.is_success() {
                    let json: serde_json::Value = response.json().await?;
                    return parse_openai_response(&json);
                }

                if status.as_u16() == 429 || status.is_server_error() {
                    let body_text = response.text().await.unwrap_or_default();
                    last_err = Some(anyhow::anyhow!(
                        "OpenAI API error {}: {}",
                        status,
                        body_text
                    ));
                    continue;
                }

                let body_text = response.text().await.unwrap_or_default();
                bail!("OpenAI API error {}: {}", status, body_text);
            }
            Err(e) => {
                last_err = Some(e.into());
                continue;
            }
        }
    }

    Err(last_err.unwrap_or_else(|| anyhow::anyhow!("Embedding failed after retries")))
}

fn parse_openai_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| anyhow::anyhow!("Invalid OpenAI response: missing data array"))?;

    let mut embeddings = Vec::with_capacity(data.len());

    for item in data {
        let embedding = item
            .get("embedding")
            .and_then(|e| e.as_array())
            .ok_or_else(|| anyhow::anyhow!("Invalid OpenAI response: missing embedding"))?;

        let vec: Vec<f32> = embedding
            .iter()
            .map(|v| v.as_f64().unwrap_or(0.0) as f32)
            .collect();

        embeddings.push(vec);
    }

    Ok(embeddings)
}

// ============ Vector math ============

/// Compute cosine similarity between two embedding vectors.
///
/// Returns `0.0` for empty vectors or vectors of different lengths.
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashed_embedding_is_deterministic() {
        let a = hashed_embedding("the quick brown fox", 256);
        let b = hashed_embedding("the quick brown fox", 256);
        assert_eq!(a, b);
    }

    #[test]
    fn hashed_embedding_is_normalized() {
        let v = hashed_embedding("some words to embed", 128);
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn shared_vocabulary_scores_higher() {
        let doc = hashed_embedding("employees accrue twenty days of paid time off", 256);
        let related = hashed_embedding("how many days of paid time off", 256);
        let unrelated = hashed_embedding("kubernetes cluster networking configuration", 256);
        assert!(cosine_similarity(&doc, &related) > cosine_similarity(&doc, &unrelated));
    }

    #[test]
    fn empty_text_embeds_to_zero_vector() {
        let v = hashed_embedding("", 64);
        assert!(v.iter().all(|x| *x == 0.0));
    }

    #[test]
    fn cosine_identical() {
        let v = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_orthogonal() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![0.0, 1.0, 0.0];
        assert!(cosine_similarity(&a, &b).abs() < 1e-6);
    }

    #[test]
    fn cosine_mismatched_lengths() {
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0]), 0.0);
    }

    #[test]
    fn local_provider_reports_model_and_dims() {
        let cfg = EmbeddingConfig::default();
        let p = LocalProvider::new(&cfg);
        assert_eq!(p.dims(), 256);
        assert_eq!(p.model_name(), "hashed-bow-256");
    }
}
