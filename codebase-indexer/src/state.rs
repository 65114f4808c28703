use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// SHA-256 digests of the artifacts written alongside an [`IndexState`].
///
/// A state file whose digests do not match the artifacts on disk describes a
/// different build and is not trusted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactDigests {
    /// `gen-<n>` directory the artifacts live in
    #[serde(default)]
    pub generation: u64,
    pub metadata: String,
    pub bm25: String,
    /// Absent when the build has no vector index
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vectors: Option<String>,
}

/// Record of what produced the persisted index (`index-state.json`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexState {
    /// Version of the on-disk format
    pub version: u32,

    /// Source-control commit indexed, or `"unknown"`
    pub commit_hash: String,

    pub indexed_at: DateTime<Utc>,

    /// Distinct files contributing chunks
    pub file_count: usize,

    pub chunk_count: usize,

    /// Model name reported by the embedder
    pub embedding_model: String,

    /// False when the build fell back to lexical-only search
    pub has_hybrid_index: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vector_dimension: Option<usize>,

    #[serde(default)]
    pub artifacts: ArtifactDigests,
}

impl IndexState {
    pub const CURRENT_VERSION: u32 = 1;

    pub fn new(
        commit_hash: impl Into<String>,
        file_count: usize,
        chunk_count: usize,
        embedding_model: impl Into<String>,
        vector_dimension: Option<usize>,
    ) -> Self {
        Self {
            version: Self::CURRENT_VERSION,
            commit_hash: commit_hash.into(),
            indexed_at: Utc::now(),
            file_count,
            chunk_count,
            embedding_model: embedding_model.into(),
            has_hybrid_index: vector_dimension.is_some(),
            vector_dimension,
            artifacts: ArtifactDigests::default(),
        }
    }

    /// Human-readable index mode
    pub fn mode(&self) -> &'static str {
        if self.has_hybrid_index {
            "hybrid"
        } else {
            "keyword-only"
        }
    }
}

/// Hex SHA-256 of `bytes`
pub fn digest(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}
