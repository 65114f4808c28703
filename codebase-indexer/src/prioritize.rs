//! Chunk-budget prioritization.
//!
//! When a repository yields more chunks than the configured budget, each chunk
//! gets a path/size relevance score and only the best `max_chunks` survive. The
//! weights are policy, not law, so they live in [`PriorityWeights`] and can be
//! overridden from configuration.

use crate::paths::is_test_path;
use codeindex_vector_store::CodeChunk;
use serde::{Deserialize, Serialize};

/// Score contributions used by [`prioritize`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PriorityWeights {
    /// Path starts with `src/`, `lib/` or `app/`
    pub source_root: i32,
    /// Path contains `index.`, `main.` or `app.`
    pub entry_point: i32,
    /// Path contains `config` or ends with `.json`/`.yaml`
    pub config_file: i32,
    /// Path matches the test-file heuristic
    pub test_file: i32,
    /// Path contains `vendor/`, `generated/` or `.min.`
    pub vendored: i32,
    /// Content shorter than `small_content_chars`
    pub small_content: i32,
    /// Content longer than `large_content_chars`
    pub large_content: i32,
    pub small_content_chars: usize,
    pub large_content_chars: usize,
}

impl Default for PriorityWeights {
    fn default() -> Self {
        Self {
            source_root: 100,
            entry_point: 50,
            config_file: 30,
            test_file: -50,
            vendored: -100,
            small_content: 20,
            large_content: -10,
            small_content_chars: 1000,
            large_content_chars: 3000,
        }
    }
}

impl PriorityWeights {
    pub fn score(&self, chunk: &CodeChunk) -> i32 {
        let path = chunk.file_path.as_str();
        let mut score = 0;

        if ["src/", "lib/", "app/"].iter().any(|p| path.starts_with(p)) {
            score += self.source_root;
        }
        if ["index.", "main.", "app."].iter().any(|p| path.contains(p)) {
            score += self.entry_point;
        }
        if path.contains("config") || path.ends_with(".json") || path.ends_with(".yaml") {
            score += self.config_file;
        }
        if is_test_path(path) {
            score += self.test_file;
        }
        if ["vendor/", "generated/", ".min."].iter().any(|p| path.contains(p)) {
            score += self.vendored;
        }

        let length = chunk.content.chars().count();
        if length < self.small_content_chars {
            score += self.small_content;
        } else if length > self.large_content_chars {
            score += self.large_content;
        }
        score
    }
}

/// Keep the `max_chunks` highest-scoring chunks, best first; equal scores keep
/// discovery order.
pub fn prioritize(
    chunks: Vec<CodeChunk>,
    max_chunks: usize,
    weights: &PriorityWeights,
) -> Vec<CodeChunk> {
    if chunks.len() <= max_chunks {
        return chunks;
    }

    let mut scored: Vec<(i32, CodeChunk)> = chunks
        .into_iter()
        .map(|chunk| (weights.score(&chunk), chunk))
        .collect();
    // stable: ties stay in discovery order
    scored.sort_by(|a, b| b.0.cmp(&a.0));
    scored.truncate(max_chunks);
    scored.into_iter().map(|(_, chunk)| chunk).collect()
}
