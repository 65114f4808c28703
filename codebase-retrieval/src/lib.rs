/*!
# Codeindex Retrieval

Query engine over the hybrid code index built by `codeindex-indexer`:
- **Keyword search** via BM25 over chunk text, names and paths
- **Vector search** via cosine similarity over chunk embeddings
- **Reciprocal Rank Fusion (RRF)** for combining both rankings
- **Optional reranking** through a pluggable [`Reranker`]

## Features

- **Three modes**: `keyword`, `vector`, `hybrid` (default)
- **Graceful degradation**: vector and hybrid queries fall back to keyword
  search when the index has no vectors or the query cannot be embedded
- **Filters**: extension allow-list and test-file exclusion
- **LRU caching**: repeat queries against the same published index
- **Snapshot publishing**: searches always see one complete build
- **Performance metrics**: per-stage timings via `search_with_stats`

## Architecture

```text
Query
  ├─> Keyword (BM25)          top 3×max
  ├─> Vector (embed + cosine) top 3×max
  └─> RRF fusion
        └─> Filters (fileTypes, excludeTests)
              └─> Reranking (optional, top 3×max)
                    └─> Truncate to max
```

## Example

```rust,no_run
use codeindex_retrieval::{HybridRetrieval, RetrievalConfig, SearchOptions};
use std::path::Path;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let retrieval = HybridRetrieval::new(RetrievalConfig::default(), None)?;
    retrieval.load_from(Path::new(".codeindex")).await?;

    let options = SearchOptions::keyword().with_max_results(5).excluding_tests();
    for (i, result) in retrieval.search("authenticateUser", &options).await?.iter().enumerate() {
        println!(
            "{}. {}:{} (score: {:.2})",
            i + 1,
            result.chunk.file_path,
            result.chunk.start_line,
            result.score
        );
    }

    Ok(())
}
```
*/

mod config;
mod error;
mod fusion;
mod rerank;
mod result;
mod retrieval;

pub use config::{RetrievalConfig, SearchMode, SearchOptions};
pub use error::{Result, RetrievalError};
pub use fusion::FusionEngine;
pub use rerank::{HeuristicReranker, Reranker};
pub use result::{SearchResult, SearchResults, SearchStats};
pub use retrieval::{CacheStats, HybridRetrieval};
