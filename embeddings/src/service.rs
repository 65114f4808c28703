use crate::error::EmbeddingError;
use crate::provider::{Embedder, EmbeddingConfig, EmbeddingModelType};
use async_trait::async_trait;
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use log::{debug, info};
use std::sync::Arc;

impl EmbeddingModelType {
    fn to_fastembed_model(self) -> EmbeddingModel {
        match self {
            EmbeddingModelType::NomicEmbedTextV15 => EmbeddingModel::NomicEmbedTextV15,
            EmbeddingModelType::AllMiniLmL6V2 => EmbeddingModel::AllMiniLML6V2,
        }
    }
}

/// Local ONNX embedder backed by fastembed.
///
/// The model is loaded once and shared; inference runs on the blocking pool so
/// an embedding call never stalls the async runtime.
pub struct FastEmbedder {
    model: Arc<TextEmbedding>,
    config: EmbeddingConfig,
}

impl FastEmbedder {
    /// Load the configured model.
    pub async fn with_config(config: EmbeddingConfig) -> Result<Self, EmbeddingError> {
        config.validate().map_err(EmbeddingError::InvalidInput)?;

        info!(
            "Initializing embedding service with model {:?}, dimension {}",
            config.model, config.dimension
        );

        let init_options = InitOptions::new(config.model.to_fastembed_model())
            .with_show_download_progress(config.show_download_progress);

        let model = tokio::task::spawn_blocking(move || TextEmbedding::try_new(init_options))
            .await
            .map_err(|e| EmbeddingError::ModelInitialization(e.to_string()))?
            .map_err(|e| {
                EmbeddingError::ModelInitialization(format!("Failed to initialize model: {e}"))
            })?;

        info!("Embedding service initialized successfully");

        Ok(Self {
            model: Arc::new(model),
            config,
        })
    }

    /// Get the dimension of embeddings produced by this service
    pub fn dimension(&self) -> usize {
        self.config.dimension
    }
}

#[async_trait]
impl Embedder for FastEmbedder {
    fn model_name(&self) -> &str {
        self.config.model.name()
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!("Generating embeddings for {} texts", texts.len());

        let model = Arc::clone(&self.model);
        let texts = texts.to_vec();
        let batch_size = self.config.batch_size;
        let dimension = self.config.dimension;

        let embeddings = tokio::task::spawn_blocking(move || {
            model.embed(texts, Some(batch_size)).map(|batch| {
                batch
                    .into_iter()
                    .map(|mut embedding| {
                        // Matryoshka truncation
                        embedding.truncate(dimension);
                        embedding
                    })
                    .collect::<Vec<_>>()
            })
        })
        .await
        .map_err(|e| EmbeddingError::EmbeddingGeneration(e.to_string()))??;

        debug!("Generated {} embeddings", embeddings.len());
        Ok(embeddings)
    }
}
