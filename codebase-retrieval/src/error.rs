use thiserror::Error;

#[derive(Error, Debug)]
pub enum RetrievalError {
    #[error("Indexer error: {0}")]
    Indexer(#[from] codeindex_indexer::IndexerError),

    #[error("Vector store error: {0}")]
    VectorStore(#[from] codeindex_vector_store::VectorStoreError),

    #[error("Embedding error: {0}")]
    Embedding(#[from] codeindex_embeddings::EmbeddingError),

    #[error("Invalid retrieval configuration: {0}")]
    Config(String),

    #[error("Reranking error: {0}")]
    Reranking(String),
}

pub type Result<T> = std::result::Result<T, RetrievalError>;
