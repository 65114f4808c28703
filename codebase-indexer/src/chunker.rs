use crate::error::{IndexerError, Result};
use crate::language::Language;
use codeindex_vector_store::{ChunkType, CodeChunk};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Splits one source file into chunk records.
///
/// `relative_path` uses `/` separators and is relative to `root`; it becomes the
/// chunk's `file_path`. Chunks must come back in file order and carry the exact
/// text of their line range. An AST-aware chunker plugs in here; [`LineChunker`]
/// is the built-in fallback.
pub trait Chunker: Send + Sync {
    fn chunk_file(&self, root: &Path, relative_path: &str) -> Result<Vec<CodeChunk>>;
}

/// Configuration for [`LineChunker`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineChunkerConfig {
    /// Lines per chunk window
    #[serde(default = "default_max_lines")]
    pub max_lines: usize,

    /// Lines shared between consecutive windows
    #[serde(default)]
    pub overlap_lines: usize,
}

fn default_max_lines() -> usize {
    60
}

impl Default for LineChunkerConfig {
    fn default() -> Self {
        Self {
            max_lines: default_max_lines(),
            overlap_lines: 0,
        }
    }
}

impl LineChunkerConfig {
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.max_lines == 0 {
            return Err("max_lines must be greater than 0".into());
        }
        if self.overlap_lines >= self.max_lines {
            return Err("overlap_lines must be less than max_lines".into());
        }
        Ok(())
    }
}

/// Fixed-size line windows with language detection by extension.
#[derive(Debug, Clone, Default)]
pub struct LineChunker {
    config: LineChunkerConfig,
}

impl LineChunker {
    pub fn new(config: LineChunkerConfig) -> Self {
        Self { config }
    }

    /// Chunk already-loaded file content. Chunk text is the exact source of
    /// its line range, original line endings included, minus the terminator of
    /// the last line.
    pub fn chunk_content(&self, relative_path: &str, content: &str) -> Vec<CodeChunk> {
        let language = Language::from_path(Path::new(relative_path));
        let lines: Vec<&str> = content.split_inclusive('\n').collect();
        let max_lines = self.config.max_lines.max(1);
        let step = max_lines.saturating_sub(self.config.overlap_lines).max(1);

        let mut chunks = Vec::new();
        let mut start = 0;
        while start < lines.len() {
            let end = (start + max_lines).min(lines.len());
            let window = &lines[start..end];

            if window.iter().any(|line| !line.trim().is_empty()) {
                let text = window.concat();
                let text = text
                    .strip_suffix('\n')
                    .map_or(text.as_str(), |t| t.strip_suffix('\r').unwrap_or(t));
                chunks.push(
                    CodeChunk::new(relative_path, start + 1, end, text)
                        .with_language(language.name())
                        .with_chunk_type(ChunkType::Other),
                );
            }

            if end == lines.len() {
                break;
            }
            start += step;
        }
        chunks
    }
}

impl Chunker for LineChunker {
    fn chunk_file(&self, root: &Path, relative_path: &str) -> Result<Vec<CodeChunk>> {
        let content =
            fs::read_to_string(root.join(relative_path)).map_err(|e| IndexerError::Chunking {
                path: relative_path.to_string(),
                message: e.to_string(),
            })?;
        Ok(self.chunk_content(relative_path, &content))
    }
}
