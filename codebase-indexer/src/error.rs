use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IndexerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Embedding error: {0}")]
    Embedding(#[from] codeindex_embeddings::EmbeddingError),

    #[error("Vector store error: {0}")]
    VectorStore(#[from] codeindex_vector_store::VectorStoreError),

    #[error("Lexical index error: {0}")]
    LexicalIndex(#[from] codeindex_lexical_index::LexicalIndexError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Failed to chunk {path}: {message}")]
    Chunking { path: String, message: String },

    #[error("No index found in {0:?}; run a full index build first")]
    NoIndex(PathBuf),

    #[error("Cached index is corrupt: {0}")]
    CorruptIndex(String),

    #[error("Indexing was cancelled")]
    Cancelled,

    #[error("Batch {batch} is out of range ({total_batches} batches)")]
    BatchOutOfRange { batch: usize, total_batches: usize },

    #[error("No batch progress in {0:?}; run index_batch before finalize_index")]
    NoBatchProgress(PathBuf),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Ignore error: {0}")]
    Ignore(String),
}

impl From<ignore::Error> for IndexerError {
    fn from(err: ignore::Error) -> Self {
        IndexerError::Ignore(err.to_string())
    }
}

impl From<toml::de::Error> for IndexerError {
    fn from(err: toml::de::Error) -> Self {
        IndexerError::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, IndexerError>;
