use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Kind of code construct a chunk covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkType {
    Function,
    Method,
    Class,
    Struct,
    Enum,
    Interface,
    Service,
    Module,
    Type,
    Other,
}

/// A contiguous, semantically bounded span of source text.
///
/// This is also the record persisted per docId in `metadata.json`: the
/// chunker's location fields plus the domain fields filled in after chunking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeChunk {
    /// Stable identifier, `path:startLine-endLine`
    pub id: String,

    /// Path of the source file, relative to the repository root
    pub file_path: String,

    /// Starting line number (1-indexed)
    pub start_line: usize,

    /// Ending line number (1-indexed, inclusive)
    pub end_line: usize,

    /// Exact source text of the line range
    pub content: String,

    /// Programming language of the code
    pub language: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_type: Option<ChunkType>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub documentation: Option<String>,

    /// Business-domain tags
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub domain_categories: BTreeSet<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain_context: Option<String>,

    #[serde(default)]
    pub is_public_api: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}

impl CodeChunk {
    /// Create a new code chunk with no semantic metadata
    pub fn new(
        file_path: impl Into<String>,
        start_line: usize,
        end_line: usize,
        content: impl Into<String>,
    ) -> Self {
        let file_path = file_path.into();
        Self {
            id: Self::make_id(&file_path, start_line, end_line),
            file_path,
            start_line,
            end_line,
            content: content.into(),
            language: "unknown".to_string(),
            chunk_type: None,
            name: None,
            parent_name: None,
            documentation: None,
            domain_categories: BTreeSet::new(),
            domain_context: None,
            is_public_api: false,
            signature: None,
        }
    }

    /// `path:start-end`
    pub fn make_id(file_path: &str, start_line: usize, end_line: usize) -> String {
        format!("{file_path}:{start_line}-{end_line}")
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_chunk_type(mut self, chunk_type: ChunkType) -> Self {
        self.chunk_type = Some(chunk_type);
        self
    }

    /// Get the number of lines in this chunk
    pub fn line_count(&self) -> usize {
        if self.end_line >= self.start_line {
            self.end_line - self.start_line + 1
        } else {
            0
        }
    }

    /// A chunk is well-formed when its line range is non-empty and 1-indexed.
    pub fn is_valid(&self) -> bool {
        self.start_line >= 1 && self.start_line <= self.end_line
    }

    /// Text fed to the lexical index: content, name, documentation, domain
    /// context and file path.
    pub fn lexical_text(&self) -> String {
        let mut parts: Vec<&str> = vec![self.content.as_str()];
        parts.extend(self.name.as_deref());
        parts.extend(self.documentation.as_deref());
        parts.extend(self.domain_context.as_deref());
        parts.push(self.file_path.as_str());
        parts.join(" ")
    }

    /// Text fed to the embedder.
    pub fn embedding_text(&self) -> String {
        match &self.name {
            Some(name) => format!("// {} ({name})\n{}", self.file_path, self.content),
            None => format!("// {}\n{}", self.file_path, self.content),
        }
    }
}
