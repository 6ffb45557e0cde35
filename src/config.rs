use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    pub storage: StorageConfig,
    #[serde(default)]
    pub validation: ValidationConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    pub server: ServerConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db: DbConfig {
                path: PathBuf::from("data/docvault.sqlite"),
            },
            storage: StorageConfig {
                upload_root: PathBuf::from("data/uploads"),
                vector_root: PathBuf::from("data/vector_store"),
            },
            validation: ValidationConfig::default(),
            chunking: ChunkingConfig::default(),
            retrieval: RetrievalConfig::default(),
            embedding: EmbeddingConfig::default(),
            server: ServerConfig {
                bind: "127.0.0.1:7440".to_string(),
            },
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    /// Root for stored uploads; one subdirectory per tenant.
    pub upload_root: PathBuf,
    /// Root for serialized indexes; one subdirectory per tenant.
    pub vector_root: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ValidationConfig {
    #[serde(default = "default_max_file_bytes")]
    pub max_file_bytes: u64,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            max_file_bytes: default_max_file_bytes(),
        }
    }
}

fn default_max_file_bytes() -> u64 {
    10 * 1024 * 1024
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_chars")]
    pub chunk_chars: usize,
    #[serde(default = "default_overlap_chars")]
    pub overlap_chars: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_chars: default_chunk_chars(),
            overlap_chars: default_overlap_chars(),
        }
    }
}

fn default_chunk_chars() -> usize {
    500
}
fn default_overlap_chars() -> usize {
    50
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
        }
    }
}

fn default_top_k() -> usize {
    3
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            dims: None,
            batch_size: 64,
            max_retries: 5,
            timeout_secs: 30,
        }
    }
}

fn default_provider() -> String {
    "local".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub bind: String,
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    // Validate chunking
    if config.chunking.chunk_chars == 0 {
        anyhow::bail!("chunking.chunk_chars must be > 0");
    }
    if config.chunking.overlap_chars >= config.chunking.chunk_chars {
        anyhow::bail!("chunking.overlap_chars must be < chunking.chunk_chars");
    }

    // Validate retrieval
    if config.retrieval.top_k == 0 {
        anyhow::bail!("retrieval.top_k must be >= 1");
    }

    // Validate limits
    if config.validation.max_file_bytes == 0 {
        anyhow::bail!("validation.max_file_bytes must be > 0");
    }

    // Validate embedding
    match config.embedding.provider.as_str() {
        "local" | "openai" => {}
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be local or openai.",
            other
        ),
    }
    if config.embedding.provider == "openai" {
        if config.embedding.model.is_none() {
            anyhow::bail!("embedding.model must be specified for the openai provider");
        }
        if config.embedding.dims.is_none() || config.embedding.dims == Some(0) {
            anyhow::bail!("embedding.dims must be > 0 for the openai provider");
        }
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(body: &str) -> (tempfile::TempDir, PathBuf) {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("docvault.toml");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(body.as_bytes()).unwrap();
        (tmp, path)
    }

    fn base_config(extra: &str) -> String {
        format!(
            r#"[db]
path = "data/docvault.sqlite"

[storage]
upload_root = "data/uploads"
vector_root = "data/vector_store"

[server]
bind = "127.0.0.1:7440"

{extra}"#
        )
    }

    #[test]
    fn defaults_apply_when_sections_omitted() {
        let (_tmp, path) = write_config(&base_config(""));
        let cfg = load_config(&path).unwrap();
        assert_eq!(cfg.chunking.chunk_chars, 500);
        assert_eq!(cfg.chunking.overlap_chars, 50);
        assert_eq!(cfg.retrieval.top_k, 3);
        assert_eq!(cfg.validation.max_file_bytes, 10 * 1024 * 1024);
        assert_eq!(cfg.embedding.provider, "local");
    }

    #[test]
    fn overlap_must_be_smaller_than_chunk() {
        let (_tmp, path) = write_config(&base_config(
            "[chunking]\nchunk_chars = 100\noverlap_chars = 100\n",
        ));
        assert!(load_config(&path).is_err());
    }

    #[test]
    fn openai_provider_requires_model_and_dims() {
        let (_tmp, path) = write_config(&base_config("[embedding]\nprovider = \"openai\"\n"));
        assert!(load_config(&path).is_err());
    }

    #[test]
    fn unknown_provider_rejected() {
        let (_tmp, path) = write_config(&base_config("[embedding]\nprovider = \"cohere\"\n"));
        assert!(load_config(&path).is_err());
    }
}
