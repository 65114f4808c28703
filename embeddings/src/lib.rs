//! # Codeindex Embeddings
//!
//! The text → vector collaborator used by the indexing pipeline and the query
//! engine. The core never talks to a model directly; it holds an
//! `Arc<dyn Embedder>` constructed once by the caller, so tests can inject
//! deterministic fakes and production code can plug in a local model.
//!
//! With the `fastembed` feature enabled, [`FastEmbedder`] provides a local ONNX
//! backend (Nomic-embed-text-v1.5 by default).
//!
//! ## Example
//!
//! ```no_run
//! # #[cfg(feature = "fastembed")]
//! # async fn run() -> Result<(), codeindex_embeddings::EmbeddingError> {
//! use codeindex_embeddings::{EmbeddingConfig, Embedder, FastEmbedder};
//!
//! let embedder = FastEmbedder::with_config(EmbeddingConfig::default()).await?;
//! let vectors = embedder
//!     .embed_batch(&["fn hello() { println!(\"Hello\"); }".to_string()])
//!     .await?;
//! println!("Generated {} embeddings", vectors.len());
//! # Ok(())
//! # }
//! ```

mod error;
mod provider;
#[cfg(feature = "fastembed")]
mod service;

pub use error::EmbeddingError;
pub use provider::Embedder;
pub use provider::EmbeddingConfig;
pub use provider::EmbeddingModelType;
#[cfg(feature = "fastembed")]
pub use service::FastEmbedder;

/// Default embedding dimension for Nomic-embed-text-v1.5
pub const DEFAULT_EMBEDDING_DIM: usize = 768;
