/*!
# Codeindex Indexer

Builds and maintains the hybrid (BM25 + vector) index of a source repository.

## Features

- **Full builds**: discover, chunk, embed and index every file
- **Incremental updates**: re-chunk only changed files, rebuild both indices
- **Batched builds**: checkpoint embedding work across process invocations
- **Chunk budget**: prioritize chunks when a repository is too large
- **Atomic persistence**: each build lands in its own generation directory and one
  state-file rename commits it; a failed save keeps the previous build
- **Graceful degradation**: lexical-only mode when embeddings are unavailable

## Example

```rust,no_run
use codeindex_embeddings::Embedder;
use codeindex_indexer::{CodebaseIndexer, IndexerConfig};
use std::sync::Arc;

async fn build(embedder: Arc<dyn Embedder>) -> anyhow::Result<()> {
    let indexer = CodebaseIndexer::new(IndexerConfig::for_root("./my-project"), embedder)?;
    let stats = indexer.index_repository().await?;

    println!(
        "Indexed {} files into {} chunks (hybrid: {})",
        stats.files_processed, stats.chunks_indexed, stats.has_hybrid_index
    );

    let update = indexer
        .update_index(&["src/main.rs".to_string()])
        .await?;
    println!("Replaced {} chunks with {}", update.chunks_removed, update.chunks_added);
    Ok(())
}
```
*/

mod chunker;
mod config;
mod embed;
mod error;
mod indexer;
mod language;
mod paths;
mod prioritize;
mod progress;
mod snapshot;
mod source_control;
mod state;
mod storage;

pub use chunker::{Chunker, LineChunker, LineChunkerConfig};
pub use config::{DEFAULT_STORE_DIR, IndexerConfig};
pub use error::{IndexerError, Result};
pub use indexer::{BatchStats, CodebaseIndexer, IndexLifecycle, IndexStats, UpdateStats};
pub use language::Language;
pub use paths::{PathFilter, is_test_path, matches_file_type};
pub use prioritize::{PriorityWeights, prioritize};
pub use progress::{IndexPhase, IndexProgress, ProgressCallback};
pub use snapshot::IndexSnapshot;
pub use source_control::{GitCli, SourceControl, StaticCommit, UNKNOWN_COMMIT};
pub use state::{ArtifactDigests, IndexState};
pub use storage::{
    BATCH_METADATA_FILE, BM25_FILE, BatchProgress, IndexStore, METADATA_FILE, STATE_FILE,
    VECTORS_FILE,
};
