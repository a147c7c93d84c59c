//! TOML configuration parsing and validation.
//!
//! Every section and field has a default, so an empty file (or a file that
//! only overrides a few values) is valid. Defaults: `nomic-embed-text`
//! embeddings from a local Ollama, 1000-character chunks with 150 characters
//! of overlap, and top-3 retrieval with a 0.7 relevance threshold.
//!
//! ```toml
//! [db]
//! path = "./data/orinda_chats.sqlite"
//!
//! [vector_store]
//! dir = "./data/orinda_vectors"
//! collection = "orinda_rag_collection"
//!
//! [chunking]
//! chunk_size = 1000
//! chunk_overlap = 150
//!
//! [retrieval]
//! top_k = 3
//! min_score = 0.7
//!
//! [embedding]
//! url = "http://localhost:11434"
//! model = "nomic-embed-text"
//! dims = 768
//!
//! [inference]
//! url = "http://localhost:11434"
//! models = ["llama3:70b", "llama3:latest", "llama3.2:latest"]
//! default_model = "llama3.2:latest"
//!
//! [logging]
//! level = "info"
//! dir = "./data/logs"
//! ```

use anyhow::{Context, Result};
use orinda_core::chunk::ChunkingParams;
use orinda_core::retrieve::RetrievalParams;
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub db: DbConfig,
    #[serde(default)]
    pub vector_store: VectorStoreConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub inference: InferenceConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Conversation history database.
#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./data/orinda_chats.sqlite")
}

#[derive(Debug, Deserialize, Clone)]
pub struct VectorStoreConfig {
    #[serde(default = "default_vector_dir")]
    pub dir: PathBuf,
    #[serde(default = "default_collection")]
    pub collection: String,
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            dir: default_vector_dir(),
            collection: default_collection(),
        }
    }
}

impl VectorStoreConfig {
    /// SQLite file inside the store directory.
    pub fn db_path(&self) -> PathBuf {
        self.dir.join("vectors.sqlite")
    }
}

fn default_vector_dir() -> PathBuf {
    PathBuf::from("./data/orinda_vectors")
}
fn default_collection() -> String {
    "orinda_rag_collection".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
        }
    }
}

impl ChunkingConfig {
    pub fn params(&self) -> ChunkingParams {
        ChunkingParams {
            chunk_size: self.chunk_size,
            chunk_overlap: self.chunk_overlap,
        }
    }
}

fn default_chunk_size() -> usize {
    1000
}
fn default_chunk_overlap() -> usize {
    150
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_min_score")]
    pub min_score: f32,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            min_score: default_min_score(),
        }
    }
}

impl RetrievalConfig {
    pub fn params(&self) -> RetrievalParams {
        RetrievalParams {
            top_k: self.top_k,
            min_score: self.min_score,
        }
    }
}

fn default_top_k() -> usize {
    3
}
fn default_min_score() -> f32 {
    0.7
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_ollama_url")]
    pub url: String,
    #[serde(default = "default_embedding_model")]
    pub model: String,
    #[serde(default = "default_dims")]
    pub dims: usize,
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
            url: default_ollama_url(),
            model: default_embedding_model(),
            dims: default_dims(),
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}
fn default_embedding_model() -> String {
    "nomic-embed-text".to_string()
}
fn default_dims() -> usize {
    768
}
fn default_batch_size() -> usize {
    16
}
fn default_max_retries() -> u32 {
    2
}
fn default_timeout_secs() -> u64 {
    60
}

#[derive(Debug, Deserialize, Clone)]
pub struct InferenceConfig {
    #[serde(default = "default_ollama_url")]
    pub url: String,
    #[serde(default = "default_models")]
    pub models: Vec<String>,
    #[serde(default = "default_model")]
    pub default_model: String,
    #[serde(default = "default_inference_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            url: default_ollama_url(),
            models: default_models(),
            default_model: default_model(),
            timeout_secs: default_inference_timeout_secs(),
        }
    }
}

fn default_models() -> Vec<String> {
    vec![
        "llama3:70b".to_string(),
        "llama3:latest".to_string(),
        "llama3.2:latest".to_string(),
    ]
}
fn default_model() -> String {
    "llama3.2:latest".to_string()
}
fn default_inference_timeout_secs() -> u64 {
    600
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,
    /// When set, logs are also written to a daily rolling file here.
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            dir: None,
        }
    }
}

fn default_log_level() -> String {
    "warn".to_string()
}

/// Read and validate a config file. A missing file yields the defaults.
pub fn load_config(path: &Path) -> Result<Config> {
    let config: Config = if path.exists() {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&content).with_context(|| "Failed to parse config file")?
    } else {
        Config::default()
    };

    validate(&config)?;
    Ok(config)
}

/// Check cross-field constraints that serde cannot express.
pub fn validate(config: &Config) -> Result<()> {
    if config.chunking.chunk_size == 0 {
        anyhow::bail!("chunking.chunk_size must be > 0");
    }
    if config.chunking.chunk_overlap >= config.chunking.chunk_size {
        anyhow::bail!("chunking.chunk_overlap must be smaller than chunking.chunk_size");
    }

    if config.retrieval.top_k == 0 {
        anyhow::bail!("retrieval.top_k must be >= 1");
    }
    if !config.retrieval.min_score.is_finite() {
        anyhow::bail!("retrieval.min_score must be a finite number");
    }

    if config.embedding.dims == 0 {
        anyhow::bail!("embedding.dims must be > 0");
    }
    if config.embedding.batch_size == 0 {
        anyhow::bail!("embedding.batch_size must be > 0");
    }
    if config.embedding.model.trim().is_empty() {
        anyhow::bail!("embedding.model must not be empty");
    }

    if config.inference.models.is_empty() {
        anyhow::bail!("inference.models must list at least one model");
    }
    if !config
        .inference
        .models
        .iter()
        .any(|m| m == &config.inference.default_model)
    {
        anyhow::bail!(
            "inference.default_model '{}' is not listed in inference.models",
            config.inference.default_model
        );
    }

    if config.vector_store.collection.trim().is_empty() {
        anyhow::bail!("vector_store.collection must not be empty");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        validate(&config).unwrap();
        assert_eq!(config.chunking.chunk_size, 1000);
        assert_eq!(config.chunking.chunk_overlap, 150);
        assert_eq!(config.retrieval.top_k, 3);
        assert!((config.retrieval.min_score - 0.7).abs() < f32::EPSILON);
        assert_eq!(config.embedding.model, "nomic-embed-text");
        assert_eq!(config.inference.default_model, "llama3.2:latest");
        assert_eq!(config.vector_store.collection, "orinda_rag_collection");
    }

    #[test]
    fn partial_section_keeps_other_defaults() {
        let config: Config = toml::from_str("[retrieval]\nmin_score = 0.5\n").unwrap();
        assert_eq!(config.retrieval.top_k, 3);
        assert!((config.retrieval.min_score - 0.5).abs() < f32::EPSILON);
    }

    #[test]
    fn overlap_must_be_smaller_than_size() {
        let config: Config =
            toml::from_str("[chunking]\nchunk_size = 100\nchunk_overlap = 100\n").unwrap();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn default_model_must_be_listed() {
        let config: Config = toml::from_str(
            "[inference]\nmodels = [\"llama3:latest\"]\ndefault_model = \"mistral\"\n",
        )
        .unwrap();
        let err = validate(&config).unwrap_err();
        assert!(err.to_string().contains("mistral"));
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let config = load_config(Path::new("/definitely/not/here/orinda.toml")).unwrap();
        assert_eq!(config.embedding.dims, 768);
    }
}
