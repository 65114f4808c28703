use thiserror::Error;

#[derive(Error, Debug)]
pub enum LexicalIndexError {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Inconsistent BM25 index: {0}")]
    Inconsistent(String),
}

pub type Result<T> = std::result::Result<T, LexicalIndexError>;
