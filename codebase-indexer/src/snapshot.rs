use crate::state::IndexState;
use codeindex_lexical_index::Bm25Index;
use codeindex_vector_store::{CodeChunk, DocId, FlatIndex, VectorIndex};
use std::collections::BTreeSet;

/// One complete build: chunk metadata, lexical index, optional vector index and
/// the state that describes them, all sharing a single docId assignment.
///
/// Snapshots are immutable; builds publish a new `Arc<IndexSnapshot>` rather
/// than mutating the current one.
#[derive(Debug, Clone)]
pub struct IndexSnapshot {
    chunks: Vec<CodeChunk>,
    bm25: Bm25Index,
    vectors: Option<FlatIndex>,
    state: IndexState,
}

impl IndexSnapshot {
    /// Returns `None` unless every index covers exactly `chunks.len()` docIds.
    pub fn new(
        chunks: Vec<CodeChunk>,
        bm25: Bm25Index,
        vectors: Option<FlatIndex>,
        state: IndexState,
    ) -> Option<Self> {
        if bm25.document_count() != chunks.len() {
            return None;
        }
        if vectors.as_ref().is_some_and(|v| v.len() != chunks.len()) {
            return None;
        }
        Some(Self {
            chunks,
            bm25,
            vectors,
            state,
        })
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn chunk(&self, doc_id: DocId) -> Option<&CodeChunk> {
        self.chunks.get(doc_id as usize)
    }

    pub fn chunks(&self) -> &[CodeChunk] {
        &self.chunks
    }

    pub fn bm25(&self) -> &Bm25Index {
        &self.bm25
    }

    pub fn vectors(&self) -> Option<&FlatIndex> {
        self.vectors.as_ref()
    }

    pub fn state(&self) -> &IndexState {
        &self.state
    }

    pub(crate) fn set_state(&mut self, state: IndexState) {
        self.state = state;
    }

    pub fn has_hybrid_index(&self) -> bool {
        self.vectors.is_some()
    }

    /// Distinct indexed file paths, sorted
    pub fn indexed_files(&self) -> Vec<String> {
        self.chunks
            .iter()
            .map(|chunk| chunk.file_path.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}
