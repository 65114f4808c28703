use thiserror::Error;

/// Errors that can occur during vector store operations
#[derive(Debug, Error)]
pub enum VectorStoreError {
    /// A vector's length does not match the index dimension
    #[error("Dimension mismatch: index is {expected}-d, got {actual}-d vector")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Failed to add data to the vector store
    #[error("Failed to add data: {0}")]
    AdditionFailed(String),

    /// The serialized index could not be interpreted
    #[error("Corrupt vector index: {0}")]
    Corrupt(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Binary (de)serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),
}
