//! Configuration for the ingestion and answer pipelines

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Queue consumption settings
    #[serde(default)]
    pub queue: QueueConfig,
    /// Persistence settings
    #[serde(default)]
    pub storage: StorageConfig,
    /// Chunking settings
    #[serde(default)]
    pub chunking: ChunkingConfig,
    /// Embedding settings
    #[serde(default)]
    pub embeddings: EmbeddingConfig,
    /// LLM settings
    #[serde(default)]
    pub llm: LlmConfig,
    /// Answer synthesis settings
    #[serde(default)]
    pub answering: AnswerConfig,
}

impl AppConfig {
    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        toml::from_str(&raw).map_err(|e| Error::Config(e.to_string()))
    }
}

/// Queue consumption configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Seconds a received message stays invisible before redelivery
    pub visibility_timeout_secs: u64,
    /// Long-poll wait per receive call, in seconds
    pub poll_wait_secs: u64,
    /// Deliveries after which a message is routed to the dead-letter queue
    pub max_deliveries: u32,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            visibility_timeout_secs: 120,
            poll_wait_secs: 10,
            max_deliveries: 5,
        }
    }
}

/// Persistence configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// SQLite database path
    pub database_path: PathBuf,
    /// Bucket holding uploaded documents
    pub bucket: String,
    /// Root directory for the filesystem object store
    pub object_root: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("askdocs.db"),
            bucket: "documents".to_string(),
            object_root: PathBuf::from("objects"),
        }
    }
}

/// Text chunking configuration
///
/// Token counts are approximated with a fixed characters-per-token ratio, so
/// no tokenizer dependency is needed during ingestion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingConfig {
    /// Target chunk size in approximate tokens
    pub target_tokens: usize,
    /// Overlap between consecutive chunks in approximate tokens
    pub overlap_tokens: usize,
    /// Characters per token approximation
    pub chars_per_token: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            target_tokens: 800,
            overlap_tokens: 120,
            chars_per_token: 4,
        }
    }
}

/// Embedding configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Embedding model name
    pub model: String,
    /// Embedding dimensions (768 for nomic-embed-text)
    pub dimensions: usize,
    /// Texts per provider call
    pub batch_size: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: "nomic-embed-text".to_string(),
            dimensions: 768,
            batch_size: 32,
        }
    }
}

/// LLM configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Base URL of an Ollama-compatible endpoint
    pub base_url: String,
    /// Generation model name
    pub generate_model: String,
    /// Sampling temperature; answers must be deterministic
    pub temperature: f32,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Retries for failed requests
    pub max_retries: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            generate_model: "llama3.2:3b".to_string(),
            temperature: 0.0,
            timeout_secs: 120,
            max_retries: 2,
        }
    }
}

/// How citation sources are capped per answer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourcePolicy {
    /// At most one citation per distinct document
    OnePerDocument,
    /// A single citation: the most relevant chunk overall
    #[default]
    SingleBest,
}

/// Answer synthesis configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerConfig {
    /// Chunks retrieved per question
    pub top_k: usize,
    /// Maximum accepted question length in characters
    pub max_question_len: usize,
    /// Citation cap policy
    #[serde(default)]
    pub source_policy: SourcePolicy,
}

impl Default for AnswerConfig {
    fn default() -> Self {
        Self {
            top_k: 5,
            max_question_len: 2_000,
            source_policy: SourcePolicy::default(),
        }
    }
}
