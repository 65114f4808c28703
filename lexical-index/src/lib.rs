//! # Codeindex Lexical Index
//!
//! The sparse half of hybrid retrieval: a code-aware tokenizer and an Okapi
//! BM25 index (k1 = 1.2, b = 0.75) keyed by the same dense docIds as the
//! vector index.
//!
//! ```
//! use codeindex_lexical_index::Bm25Index;
//!
//! let index = Bm25Index::build(["fn authenticateUser() {}", "fn connect() {}"]);
//! let hits = index.search("authenticate user", 10);
//! assert_eq!(hits[0].0, 0);
//! ```

mod bm25;
mod error;
mod tokenize;

pub use bm25::{B, Bm25Index, DocId, K1};
pub use error::{LexicalIndexError, Result};
pub use tokenize::tokenize;
