use crate::chunker::LineChunkerConfig;
use crate::error::{IndexerError, Result};
use crate::prioritize::PriorityWeights;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default store directory name, created under the indexed root
pub const DEFAULT_STORE_DIR: &str = ".codeindex";

/// Configuration for codebase indexing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexerConfig {
    /// Root directory to index
    pub root_dir: PathBuf,

    /// Directory holding the persisted artifacts (default `<root>/.codeindex`)
    #[serde(default)]
    pub store_dir: Option<PathBuf>,

    /// Indexable file extensions, without the dot
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,

    /// Paths to skip, gitignore syntax
    #[serde(default = "default_exclude_patterns")]
    pub exclude_patterns: Vec<String>,

    /// Files larger than this are not indexed
    #[serde(default = "default_max_file_bytes")]
    pub max_file_bytes: u64,

    /// Built-in chunker configuration
    #[serde(default)]
    pub chunker: LineChunkerConfig,

    /// Chunks per embedding request
    #[serde(default = "default_embed_batch_size")]
    pub embed_batch_size: usize,

    /// Embedding batches in flight at once
    #[serde(default = "default_max_concurrent_batches")]
    pub max_concurrent_batches: usize,

    /// Chunk budget; above it chunks are prioritized and truncated
    #[serde(default)]
    pub max_chunks: Option<usize>,

    /// Prioritization weights used when `max_chunks` is exceeded
    #[serde(default)]
    pub priority: PriorityWeights,

    /// Rebuild a cached index whose recorded commit differs from the
    /// repository's current commit. Off by default: the caller decides when
    /// to refresh.
    #[serde(default)]
    pub verify_commit_on_load: bool,

    /// Yield to the runtime every N files while chunking
    #[serde(default = "default_yield_every_files")]
    pub yield_every_files: usize,
}

fn default_extensions() -> Vec<String> {
    [
        "rs", "py", "js", "jsx", "mjs", "ts", "tsx", "go", "java", "kt", "c", "h", "cpp", "cc",
        "hpp", "cs", "rb", "php", "swift", "sh", "bash",
    ]
    .iter()
    .map(|ext| (*ext).to_string())
    .collect()
}

fn default_exclude_patterns() -> Vec<String> {
    [
        "node_modules/",
        "target/",
        "dist/",
        "build/",
        ".git/",
        "*.min.js",
        "*.map",
    ]
    .iter()
    .map(|pattern| (*pattern).to_string())
    .collect()
}

fn default_max_file_bytes() -> u64 {
    1024 * 1024
}

fn default_embed_batch_size() -> usize {
    32
}

fn default_max_concurrent_batches() -> usize {
    num_cpus::get().clamp(1, 4)
}

fn default_yield_every_files() -> usize {
    50
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            root_dir: PathBuf::from("."),
            store_dir: None,
            extensions: default_extensions(),
            exclude_patterns: default_exclude_patterns(),
            max_file_bytes: default_max_file_bytes(),
            chunker: LineChunkerConfig::default(),
            embed_batch_size: default_embed_batch_size(),
            max_concurrent_batches: default_max_concurrent_batches(),
            max_chunks: None,
            priority: PriorityWeights::default(),
            verify_commit_on_load: false,
            yield_every_files: default_yield_every_files(),
        }
    }
}

impl IndexerConfig {
    /// Configuration for `root_dir` with every other field defaulted.
    pub fn for_root(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
            ..Default::default()
        }
    }

    /// Parse a TOML document. Relative `store_dir` values stay relative to the
    /// process working directory.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Resolved store directory
    pub fn store_path(&self) -> PathBuf {
        self.store_dir
            .clone()
            .unwrap_or_else(|| self.root_dir.join(DEFAULT_STORE_DIR))
    }

    /// Validate configuration
    pub fn validate(&self) -> std::result::Result<(), String> {
        if !self.root_dir.exists() {
            return Err(format!("Root directory does not exist: {:?}", self.root_dir));
        }

        if !self.root_dir.is_dir() {
            return Err(format!("Root path is not a directory: {:?}", self.root_dir));
        }

        if self.extensions.is_empty() {
            return Err("At least one file extension must be indexable".to_string());
        }

        if self.embed_batch_size == 0 {
            return Err("Embedding batch size must be > 0".to_string());
        }

        if self.max_concurrent_batches == 0 {
            return Err("Max concurrent batches must be > 0".to_string());
        }

        if self.max_chunks == Some(0) {
            return Err("Chunk budget must be > 0 when set".to_string());
        }

        if self.yield_every_files == 0 {
            return Err("yield_every_files must be > 0".to_string());
        }

        self.chunker.validate()?;

        Ok(())
    }

    pub(crate) fn validated(self) -> Result<Self> {
        self.validate().map_err(IndexerError::Config)?;
        Ok(self)
    }
}
