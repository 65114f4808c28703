use crate::DEFAULT_EMBEDDING_DIM;
use crate::error::EmbeddingError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A text → vector function.
///
/// Implementations must return one vector per input text, in input order, and
/// every vector produced during one index build must have the same dimension.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Identifier recorded in the index state (e.g. `nomic-embed-text-v1.5`).
    fn model_name(&self) -> &str;

    /// Embed a batch of texts.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError>;

    /// Embed a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let mut embeddings = self.embed_batch(&[text.to_string()]).await?;
        if embeddings.len() != 1 {
            return Err(EmbeddingError::CountMismatch {
                expected: 1,
                actual: embeddings.len(),
            });
        }
        embeddings
            .pop()
            .ok_or_else(|| EmbeddingError::EmbeddingGeneration("No embedding generated".into()))
    }
}

/// Configuration for the embedding service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Model to use for embeddings
    #[serde(default = "default_model")]
    pub model: EmbeddingModelType,

    /// Target embedding dimension (for Matryoshka truncation)
    #[serde(default = "default_dimension")]
    pub dimension: usize,

    /// Maximum batch size handed to the model in one call
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Show download progress when downloading models
    #[serde(default)]
    pub show_download_progress: bool,
}

fn default_model() -> EmbeddingModelType {
    EmbeddingModelType::NomicEmbedTextV15
}

fn default_dimension() -> usize {
    DEFAULT_EMBEDDING_DIM
}

fn default_batch_size() -> usize {
    32
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            dimension: default_dimension(),
            batch_size: default_batch_size(),
            show_download_progress: false,
        }
    }
}

impl EmbeddingConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.dimension == 0 {
            return Err("dimension must be > 0".to_string());
        }
        if self.batch_size == 0 {
            return Err("batch_size must be > 0".to_string());
        }
        Ok(())
    }
}

/// Supported embedding models
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EmbeddingModelType {
    /// Nomic-embed-text-v1.5 (recommended for code)
    NomicEmbedTextV15,
    /// All-MiniLM-L6-v2 (lightweight, faster)
    AllMiniLmL6V2,
}

impl EmbeddingModelType {
    /// Name recorded in the index state.
    pub fn name(self) -> &'static str {
        match self {
            EmbeddingModelType::NomicEmbedTextV15 => "nomic-embed-text-v1.5",
            EmbeddingModelType::AllMiniLmL6V2 => "all-MiniLM-L6-v2",
        }
    }
}
