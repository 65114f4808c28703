//! # Codeindex Vector Store
//!
//! The chunk data model shared by the indexer and the query engine, and the
//! dense half of hybrid retrieval: a flat (brute-force) vector index over
//! L2-normalized embeddings, where inner product equals cosine similarity.
//!
//! ## Example
//!
//! ```
//! use codeindex_vector_store::{FlatIndex, VectorIndex};
//!
//! let mut index = FlatIndex::new(3);
//! index.add(&[vec![1.0, 0.0, 0.0], vec![0.0, 1.0, 0.0]]).unwrap();
//!
//! let hits = index.search(&[0.9, 0.1, 0.0], 1).unwrap();
//! assert_eq!(hits[0].0, 0);
//! ```

mod chunk;
mod error;
mod flat;

pub use chunk::{ChunkType, CodeChunk};
pub use error::VectorStoreError;
pub use flat::{DocId, FlatIndex, VectorIndex, normalize};
