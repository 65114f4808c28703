use crate::chunker::{Chunker, LineChunker};
use crate::config::IndexerConfig;
use crate::embed::{EmbedRequest, EmbeddedChunks, embed_chunks};
use crate::error::{IndexerError, Result};
use crate::paths::{PathFilter, relative_path};
use crate::prioritize::prioritize;
use crate::progress::{IndexPhase, ProgressCallback, ProgressReporter};
use crate::snapshot::IndexSnapshot;
use crate::source_control::{GitCli, SourceControl, UNKNOWN_COMMIT};
use crate::state::IndexState;
use crate::storage::{BatchProgress, IndexStore};
use codeindex_embeddings::Embedder;
use codeindex_lexical_index::Bm25Index;
use codeindex_vector_store::{CodeChunk, VectorIndex};
use ignore::WalkBuilder;
use log::{debug, info, warn};
use std::collections::BTreeSet;
use std::fs;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;

/// Where the index is in its life cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexLifecycle {
    /// Nothing built or loaded yet
    Empty,
    /// Full build in progress
    Building,
    /// A complete build is published
    Built,
    /// Incremental update in progress
    Updating,
    /// Batched build with `batch` of `total` batches checkpointed
    BatchBuilding { batch: usize, total: usize },
    /// Assembling the final index from batch checkpoints
    Finalizing,
}

/// Statistics about a full build or a finalized batched build
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndexStats {
    pub files_discovered: usize,
    pub files_processed: usize,
    pub files_failed: usize,
    /// Chunks produced before the budget was applied
    pub chunks_created: usize,
    pub chunks_indexed: usize,
    pub chunks_embedded: usize,
    pub embedding_failures: usize,
    pub has_hybrid_index: bool,
    pub commit_hash: String,
}

/// Result of [`CodebaseIndexer::update_index`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateStats {
    pub files_updated: usize,
    pub chunks_removed: usize,
    pub chunks_added: usize,
    pub chunk_count: usize,
    pub has_hybrid_index: bool,
    pub commit_hash: String,
}

/// Result of one [`CodebaseIndexer::index_batch`] call
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchStats {
    pub batch_number: usize,
    pub total_batches: usize,
    pub chunks_in_batch: usize,
    /// Chunks checkpointed across all batches so far
    pub chunks_accumulated: usize,
    pub embedding_failures: usize,
    pub batches_completed: usize,
    /// Every batch has been checkpointed; `finalize_index` is next
    pub is_complete: bool,
}

struct ChunkedFiles {
    chunks: Vec<CodeChunk>,
    files_processed: usize,
    files_failed: usize,
}

/// Builds, updates and persists the hybrid index for one repository.
///
/// Only one build, update or batch step runs at a time. Readers take the
/// current [`IndexSnapshot`] via [`CodebaseIndexer::snapshot`]; a finished build
/// replaces it wholesale.
pub struct CodebaseIndexer {
    config: IndexerConfig,
    root: PathBuf,
    store: IndexStore,
    filter: PathFilter,
    embedder: Arc<dyn Embedder>,
    chunker: Arc<dyn Chunker>,
    source_control: Arc<dyn SourceControl>,
    progress: ProgressReporter,
    cancel: CancellationToken,
    current: RwLock<Option<Arc<IndexSnapshot>>>,
    lifecycle: RwLock<IndexLifecycle>,
    writer: Mutex<()>,
}

impl CodebaseIndexer {
    /// Create new indexer. The store directory is created if missing.
    pub fn new(config: IndexerConfig, embedder: Arc<dyn Embedder>) -> Result<Self> {
        let config = config.validated()?;
        let root = fs::canonicalize(&config.root_dir)?;
        let store_dir = config.store_path();
        fs::create_dir_all(&store_dir)?;
        let store_dir = fs::canonicalize(&store_dir)?;

        let filter = PathFilter::new(
            &root,
            &store_dir,
            &config.exclude_patterns,
            &config.extensions,
        )?;

        Ok(Self {
            chunker: Arc::new(LineChunker::new(config.chunker.clone())),
            config,
            root,
            store: IndexStore::new(store_dir),
            filter,
            embedder,
            source_control: Arc::new(GitCli),
            progress: ProgressReporter::default(),
            cancel: CancellationToken::new(),
            current: RwLock::new(None),
            lifecycle: RwLock::new(IndexLifecycle::Empty),
            writer: Mutex::new(()),
        })
    }

    pub fn with_chunker(mut self, chunker: Arc<dyn Chunker>) -> Self {
        self.chunker = chunker;
        self
    }

    pub fn with_source_control(mut self, source_control: Arc<dyn SourceControl>) -> Self {
        self.source_control = source_control;
        self
    }

    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.progress = ProgressReporter::new(Some(callback));
        self
    }

    /// Token checked between files and between embedding batches.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn config(&self) -> &IndexerConfig {
        &self.config
    }

    /// Canonical repository root
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn store(&self) -> &IndexStore {
        &self.store
    }

    pub fn embedder(&self) -> Arc<dyn Embedder> {
        self.embedder.clone()
    }

    pub async fn lifecycle(&self) -> IndexLifecycle {
        *self.lifecycle.read().await
    }

    /// The most recently published build, if any.
    pub async fn snapshot(&self) -> Option<Arc<IndexSnapshot>> {
        self.current.read().await.clone()
    }

    /// Full rebuild: discover, chunk, prioritize, embed, index, persist.
    pub async fn index_repository(&self) -> Result<IndexStats> {
        let (stats, _) = self
            .run_exclusive(Some(IndexLifecycle::Building), async {
                let built = self.full_build().await?;
                Ok((built, IndexLifecycle::Built))
            })
            .await?;
        Ok(stats)
    }

    /// Re-index `changed_files` (paths relative to the root, or absolute
    /// under it) on top of the existing index.
    ///
    /// Unchanged chunks are kept verbatim, changed files that still exist are
    /// re-chunked, deleted ones drop out. The whole working set is then
    /// re-embedded and both indices rebuilt.
    pub async fn update_index(&self, changed_files: &[String]) -> Result<UpdateStats> {
        self.run_exclusive(Some(IndexLifecycle::Updating), async {
            let stats = self.run_update(changed_files).await?;
            Ok((stats, IndexLifecycle::Built))
        })
        .await
    }

    /// Checkpoint one slice of a batched build.
    ///
    /// Every call discovers and chunks the whole repository, embeds only chunks
    /// `[batch_number * batch_size, (batch_number + 1) * batch_size)` and merges
    /// their metadata into the on-disk batch checkpoint.
    pub async fn index_batch(&self, batch_number: usize, batch_size: usize) -> Result<BatchStats> {
        if batch_size == 0 {
            return Err(IndexerError::Config("Batch size must be > 0".to_string()));
        }
        self.run_exclusive(None, async {
            let stats = self.run_batch(batch_number, batch_size).await?;
            let lifecycle = IndexLifecycle::BatchBuilding {
                batch: stats.batches_completed,
                total: stats.total_batches,
            };
            Ok((stats, lifecycle))
        })
        .await
    }

    /// Turn the batch checkpoint into a published, persisted index.
    pub async fn finalize_index(&self) -> Result<IndexStats> {
        self.run_exclusive(Some(IndexLifecycle::Finalizing), async {
            let stats = self.run_finalize().await?;
            Ok((stats, IndexLifecycle::Built))
        })
        .await
    }

    /// Chunk metadata of the persisted index, ordered by docId, without
    /// loading either search index.
    pub fn load_metadata_only(&self) -> Result<Vec<CodeChunk>> {
        self.store
            .load_metadata()?
            .ok_or_else(|| IndexerError::NoIndex(self.store.dir().to_path_buf()))
    }

    /// State of the published build, else of the persisted one.
    pub async fn get_index_state(&self) -> Result<Option<IndexState>> {
        if let Some(snapshot) = self.snapshot().await {
            return Ok(Some(snapshot.state().clone()));
        }
        self.store.load_state()
    }

    /// Sorted distinct file paths in the published or persisted index.
    pub async fn get_indexed_files(&self) -> Result<Vec<String>> {
        if let Some(snapshot) = self.snapshot().await {
            return Ok(snapshot.indexed_files());
        }
        let files: BTreeSet<String> = self
            .store
            .load_metadata()?
            .unwrap_or_default()
            .into_iter()
            .map(|chunk| chunk.file_path)
            .collect();
        Ok(files.into_iter().collect())
    }

    /// Reuse the persisted build when it is intact, otherwise build.
    ///
    /// The recorded commit is only logged unless
    /// [`IndexerConfig::verify_commit_on_load`] is set, in which case a cache
    /// recorded at a different (known) commit is rebuilt.
    pub async fn load_or_build(&self) -> Result<Arc<IndexSnapshot>> {
        {
            let _writer = self.writer.lock().await;
            match self.store.load() {
                Ok(Some(snapshot)) => {
                    let recorded = snapshot.state().commit_hash.clone();
                    info!(
                        "Loaded cached index from {:?}: {} chunks, {} mode, commit {recorded}",
                        self.store.dir(),
                        snapshot.len(),
                        snapshot.state().mode()
                    );
                    if !self.is_stale(&recorded) {
                        let snapshot = Arc::new(snapshot);
                        *self.current.write().await = Some(snapshot.clone());
                        *self.lifecycle.write().await = IndexLifecycle::Built;
                        return Ok(snapshot);
                    }
                }
                Ok(None) => info!("No cached index in {:?}; building", self.store.dir()),
                Err(err) => warn!("Cached index is unusable ({err}); rebuilding"),
            }
        }

        let (_, snapshot) = self
            .run_exclusive(Some(IndexLifecycle::Building), async {
                let built = self.full_build().await?;
                Ok((built, IndexLifecycle::Built))
            })
            .await?;
        Ok(snapshot)
    }

    fn is_stale(&self, recorded: &str) -> bool {
        if !self.config.verify_commit_on_load {
            return false;
        }
        let current = self.source_control.current_commit(&self.root);
        if current == UNKNOWN_COMMIT || recorded == UNKNOWN_COMMIT || current == recorded {
            return false;
        }
        info!("Cached index was built at {recorded} but HEAD is {current}; rebuilding");
        true
    }

    /// Hold the writer lock around `op`, moving the lifecycle to `entering`
    /// first (if given) and to the lifecycle `op` returns on success. On
    /// failure the previous lifecycle is restored.
    async fn run_exclusive<T, F>(&self, entering: Option<IndexLifecycle>, op: F) -> Result<T>
    where
        F: Future<Output = Result<(T, IndexLifecycle)>>,
    {
        let _writer = self.writer.lock().await;
        let previous = self.lifecycle().await;
        if let Some(entering) = entering {
            *self.lifecycle.write().await = entering;
        }

        match op.await {
            Ok((value, next)) => {
                *self.lifecycle.write().await = next;
                Ok(value)
            }
            Err(err) => {
                *self.lifecycle.write().await = previous;
                Err(err)
            }
        }
    }

    async fn full_build(&self) -> Result<(IndexStats, Arc<IndexSnapshot>)> {
        info!("Starting codebase indexing in {:?}", self.root);

        let files = self.discover_files()?;
        let chunked = self.chunk_files(&files).await?;
        let chunks_created = chunked.chunks.len();
        let chunks = self.apply_budget(chunked.chunks);

        let (snapshot, embedded) = self.build_snapshot(chunks).await?;
        let snapshot = self.persist_and_publish(snapshot).await?;

        let stats = IndexStats {
            files_discovered: files.len(),
            files_processed: chunked.files_processed,
            files_failed: chunked.files_failed,
            chunks_created,
            chunks_indexed: snapshot.len(),
            chunks_embedded: embedded.embedded,
            embedding_failures: embedded.failed,
            has_hybrid_index: snapshot.has_hybrid_index(),
            commit_hash: snapshot.state().commit_hash.clone(),
        };
        Ok((stats, snapshot))
    }

    async fn run_update(&self, changed_files: &[String]) -> Result<UpdateStats> {
        let existing = match self.snapshot().await {
            Some(snapshot) => snapshot.chunks().to_vec(),
            None if self.store.has_index() => self.load_metadata_only()?,
            None => return Err(IndexerError::NoIndex(self.store.dir().to_path_buf())),
        };

        let changed: BTreeSet<String> = changed_files
            .iter()
            .filter_map(|path| match self.normalize_changed_path(path) {
                Ok(relative) => Some(relative),
                Err(err) => {
                    warn!("Ignoring changed path: {err}");
                    None
                }
            })
            .collect();
        info!(
            "Updating index: {} changed files, {} existing chunks",
            changed.len(),
            existing.len()
        );

        let (removed, kept): (Vec<CodeChunk>, Vec<CodeChunk>) = existing
            .into_iter()
            .partition(|chunk| changed.contains(&chunk.file_path));

        let present: Vec<String> = changed
            .iter()
            .filter(|file| {
                if !self.root.join(file.as_str()).is_file() {
                    debug!("{file} no longer exists; dropping its chunks");
                    return false;
                }
                self.is_candidate(file)
            })
            .cloned()
            .collect();
        let rechunked = self.chunk_files(&present).await?;

        let chunks_removed = removed.len();
        let chunks_added = rechunked.chunks.len();
        let mut working = kept;
        working.extend(rechunked.chunks);
        let working = self.apply_budget(working);

        let (snapshot, _) = self.build_snapshot(working).await?;
        let snapshot = self.persist_and_publish(snapshot).await?;

        Ok(UpdateStats {
            files_updated: changed.len(),
            chunks_removed,
            chunks_added,
            chunk_count: snapshot.len(),
            has_hybrid_index: snapshot.has_hybrid_index(),
            commit_hash: snapshot.state().commit_hash.clone(),
        })
    }

    async fn run_batch(&self, batch_number: usize, batch_size: usize) -> Result<BatchStats> {
        let files = self.discover_files()?;
        let chunked = self.chunk_files(&files).await?;
        let chunks = self.apply_budget(chunked.chunks);

        let total_batches = chunks.len().div_ceil(batch_size);
        if batch_number >= total_batches {
            return Err(IndexerError::BatchOutOfRange {
                batch: batch_number,
                total_batches,
            });
        }
        *self.lifecycle.write().await = IndexLifecycle::BatchBuilding {
            batch: batch_number + 1,
            total: total_batches,
        };

        let mut progress = match self.store.load_batch_progress()? {
            Some(progress)
                if progress.total_chunks == chunks.len() && progress.batch_size == batch_size =>
            {
                progress
            }
            Some(_) => {
                warn!("Repository changed since the last batch; restarting batch checkpoint");
                BatchProgress::new(chunks.len(), batch_size)
            }
            None => BatchProgress::new(chunks.len(), batch_size),
        };

        let start = batch_number * batch_size;
        let end = (start + batch_size).min(chunks.len());
        let slice = &chunks[start..end];
        info!(
            "Indexing batch {}/{total_batches}: chunks {start}..{end}",
            batch_number + 1
        );

        let embedded = embed_chunks(self.embed_request(), slice).await?;
        for (offset, chunk) in slice.iter().enumerate() {
            progress.chunks.insert(start + offset, chunk.clone());
        }
        progress.completed_batches.insert(batch_number);
        self.store.save_batch_progress(&progress)?;

        Ok(BatchStats {
            batch_number,
            total_batches,
            chunks_in_batch: slice.len(),
            chunks_accumulated: progress.chunks.len(),
            embedding_failures: embedded.failed,
            batches_completed: progress.completed_batches.len(),
            is_complete: progress.is_complete(),
        })
    }

    async fn run_finalize(&self) -> Result<IndexStats> {
        let progress = self
            .store
            .load_batch_progress()?
            .filter(|progress| !progress.chunks.is_empty())
            .ok_or_else(|| IndexerError::NoBatchProgress(self.store.dir().to_path_buf()))?;

        if !progress.is_complete() {
            warn!(
                "Finalizing with {} of {} batches checkpointed",
                progress.completed_batches.len(),
                progress.total_batches()
            );
        }

        let chunks: Vec<CodeChunk> = progress.chunks.into_values().collect();
        let chunks_created = chunks.len();
        let (snapshot, embedded) = self.build_snapshot(chunks).await?;
        let snapshot = self.persist_and_publish(snapshot).await?;
        self.store.clear_batch_progress()?;

        Ok(IndexStats {
            files_discovered: snapshot.state().file_count,
            files_processed: snapshot.state().file_count,
            files_failed: 0,
            chunks_created,
            chunks_indexed: snapshot.len(),
            chunks_embedded: embedded.embedded,
            embedding_failures: embedded.failed,
            has_hybrid_index: snapshot.has_hybrid_index(),
            commit_hash: snapshot.state().commit_hash.clone(),
        })
    }

    /// Discover indexable files as sorted, root-relative `/` paths.
    fn discover_files(&self) -> Result<Vec<String>> {
        self.progress.report(IndexPhase::Discovering, 0, 0, None);

        let root = self.root.clone();
        let filter = self.filter.clone();
        let mut builder = WalkBuilder::new(&self.root);
        builder
            .hidden(false)
            .git_ignore(true)
            .git_exclude(true)
            .require_git(false)
            .sort_by_file_name(|a, b| a.cmp(b))
            .filter_entry(move |entry| {
                let is_dir = entry.file_type().is_some_and(|t| t.is_dir());
                match relative_path(&root, entry.path()) {
                    Some(relative) => !filter.is_excluded(&relative, is_dir),
                    None => true,
                }
            });

        let mut files = Vec::new();
        for entry in builder.build() {
            if self.cancel.is_cancelled() {
                return Err(IndexerError::Cancelled);
            }
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    warn!("Skipping unreadable path during discovery: {err}");
                    continue;
                }
            };
            if !entry.file_type().is_some_and(|t| t.is_file()) {
                continue;
            }
            let Some(relative) = relative_path(&self.root, entry.path()) else {
                continue;
            };
            if self.is_candidate(&relative) {
                files.push(relative);
            }
        }
        files.sort();

        info!("Discovered {} files", files.len());
        self.progress
            .report(IndexPhase::Discovering, files.len(), files.len(), None);
        Ok(files)
    }

    fn is_candidate(&self, relative: &str) -> bool {
        if !self.filter.is_indexable(relative) {
            return false;
        }
        match fs::metadata(self.root.join(relative)) {
            Ok(metadata) if metadata.len() > self.config.max_file_bytes => {
                debug!("Skipping {relative}: {} bytes", metadata.len());
                false
            }
            Ok(_) => true,
            Err(err) => {
                warn!("Skipping {relative}: {err}");
                false
            }
        }
    }

    /// Resolve a caller-supplied changed path against the root. Existing files
    /// are canonicalized so `..` and symlinks cannot escape the repository;
    /// deleted files fall back to a strict lexical check.
    fn normalize_changed_path(&self, path: &str) -> Result<String> {
        let path = Path::new(path);
        let joined = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        };
        let relative = match (fs::canonicalize(&joined), fs::canonicalize(&self.root)) {
            (Ok(canonical), Ok(root)) => relative_path(&root, &canonical),
            _ => relative_path(&self.root, path),
        };
        relative.ok_or_else(|| {
            IndexerError::InvalidPath(format!("{} is outside the repository", path.display()))
        })
    }

    /// Chunk `files` one by one; files that fail are logged and skipped.
    async fn chunk_files(&self, files: &[String]) -> Result<ChunkedFiles> {
        let mut chunked = ChunkedFiles {
            chunks: Vec::new(),
            files_processed: 0,
            files_failed: 0,
        };

        for (idx, file) in files.iter().enumerate() {
            if self.cancel.is_cancelled() {
                return Err(IndexerError::Cancelled);
            }
            if idx > 0 && idx % self.config.yield_every_files == 0 {
                tokio::task::yield_now().await;
            }
            self.progress
                .report(IndexPhase::Chunking, idx + 1, files.len(), Some(file.as_str()));

            match self.chunker.chunk_file(&self.root, file) {
                Ok(chunks) => {
                    chunked.files_processed += 1;
                    for chunk in chunks {
                        if chunk.is_valid() {
                            chunked.chunks.push(chunk);
                        } else {
                            warn!("Dropping chunk {} with invalid line range", chunk.id);
                        }
                    }
                }
                Err(err) => {
                    warn!("Failed to chunk {file}: {err}");
                    chunked.files_failed += 1;
                }
            }
        }

        debug!(
            "Chunked {} files into {} chunks ({} failed)",
            chunked.files_processed,
            chunked.chunks.len(),
            chunked.files_failed
        );
        Ok(chunked)
    }

    fn apply_budget(&self, chunks: Vec<CodeChunk>) -> Vec<CodeChunk> {
        match self.config.max_chunks {
            Some(max_chunks) if chunks.len() > max_chunks => {
                self.progress
                    .report(IndexPhase::Prioritizing, 0, chunks.len(), None);
                info!(
                    "{} chunks exceed the budget of {max_chunks}; keeping the highest priority",
                    chunks.len()
                );
                let kept = prioritize(chunks, max_chunks, &self.config.priority);
                self.progress
                    .report(IndexPhase::Prioritizing, kept.len(), kept.len(), None);
                kept
            }
            _ => chunks,
        }
    }

    fn embed_request(&self) -> EmbedRequest<'_> {
        EmbedRequest {
            embedder: self.embedder.as_ref(),
            batch_size: self.config.embed_batch_size,
            max_concurrent_batches: self.config.max_concurrent_batches,
            cancel: &self.cancel,
            progress: &self.progress,
        }
    }

    /// Embed and index `chunks`; docId `i` is `chunks[i]` in both indices.
    async fn build_snapshot(
        &self,
        chunks: Vec<CodeChunk>,
    ) -> Result<(IndexSnapshot, EmbeddedChunks)> {
        let mut embedded = embed_chunks(self.embed_request(), &chunks).await?;
        let vectors = embedded.index.take();
        if self.cancel.is_cancelled() {
            return Err(IndexerError::Cancelled);
        }

        let bm25 = Bm25Index::build(chunks.iter().map(CodeChunk::lexical_text));
        let file_count = chunks
            .iter()
            .map(|chunk| chunk.file_path.as_str())
            .collect::<BTreeSet<_>>()
            .len();
        let commit = self.source_control.current_commit(&self.root);
        let state = IndexState::new(
            commit,
            file_count,
            chunks.len(),
            self.embedder.model_name(),
            vectors.as_ref().map(VectorIndex::dimension),
        );

        let snapshot = IndexSnapshot::new(chunks, bm25, vectors, state)
            .ok_or_else(|| {
                IndexerError::CorruptIndex("built indices disagree on document count".to_string())
            })?;
        Ok((snapshot, embedded))
    }

    async fn persist_and_publish(&self, mut snapshot: IndexSnapshot) -> Result<Arc<IndexSnapshot>> {
        self.progress.report(IndexPhase::Storing, 0, 1, None);
        let state = self.store.save(&snapshot)?;
        snapshot.set_state(state);

        let snapshot = Arc::new(snapshot);
        *self.current.write().await = Some(snapshot.clone());

        let state = snapshot.state();
        info!(
            "Index ready: {} chunks from {} files, {} mode, commit {}",
            state.chunk_count,
            state.file_count,
            state.mode(),
            state.commit_hash
        );
        self.progress.report(IndexPhase::Complete, 1, 1, None);
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::IndexProgress;
    use async_trait::async_trait;
    use codeindex_embeddings::EmbeddingError;
    use pretty_assertions::assert_eq;
    use std::sync::Mutex as StdMutex;
    use tempfile::TempDir;

    struct CountingEmbedder;

    #[async_trait]
    impl Embedder for CountingEmbedder {
        fn model_name(&self) -> &str {
            "counting"
        }

        async fn embed_batch(
            &self,
            texts: &[String],
        ) -> std::result::Result<Vec<Vec<f32>>, EmbeddingError> {
            Ok(texts
                .iter()
                .map(|t| vec![t.len() as f32, t.lines().count() as f32, 1.0])
                .collect())
        }
    }

    fn repo() -> TempDir {
        let dir = TempDir::new().unwrap();
        let write = |path: &str, content: &str| {
            let full = dir.path().join(path);
            fs::create_dir_all(full.parent().unwrap()).unwrap();
            fs::write(full, content).unwrap();
        };
        write("src/main.rs", "fn main() {\n    run();\n}\n");
        write("src/lib.py", "def run():\n    return 1\n");
        write("README.md", "# not indexed\n");
        write("node_modules/dep/index.js", "module.exports = 1;\n");
        dir
    }

    fn indexer(dir: &TempDir) -> CodebaseIndexer {
        CodebaseIndexer::new(
            IndexerConfig::for_root(dir.path()),
            Arc::new(CountingEmbedder),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_discovery_respects_filters() {
        let dir = repo();
        let indexer = indexer(&dir);
        let files = indexer.discover_files().unwrap();
        assert_eq!(files, vec!["src/lib.py", "src/main.rs"]);
    }

    #[tokio::test]
    async fn test_discovery_skips_large_files() {
        let dir = repo();
        fs::write(dir.path().join("src/big.rs"), "x".repeat(64)).unwrap();
        let mut config = IndexerConfig::for_root(dir.path());
        config.max_file_bytes = 32;
        let indexer = CodebaseIndexer::new(config, Arc::new(CountingEmbedder)).unwrap();

        let files = indexer.discover_files().unwrap();
        assert!(!files.contains(&"src/big.rs".to_string()));
    }

    #[tokio::test]
    async fn test_lifecycle_and_progress() {
        let dir = repo();
        let phases = Arc::new(StdMutex::new(Vec::new()));
        let sink = phases.clone();
        let indexer = indexer(&dir).with_progress(Arc::new(move |p: IndexProgress| {
            sink.lock().unwrap().push(p.phase);
        }));

        assert_eq!(indexer.lifecycle().await, IndexLifecycle::Empty);
        let stats = indexer.index_repository().await.unwrap();
        assert_eq!(indexer.lifecycle().await, IndexLifecycle::Built);

        assert_eq!(stats.files_processed, 2);
        assert_eq!(stats.chunks_indexed, 2);
        assert!(stats.has_hybrid_index);

        let phases = phases.lock().unwrap();
        for phase in [
            IndexPhase::Discovering,
            IndexPhase::Chunking,
            IndexPhase::Embedding,
            IndexPhase::Storing,
            IndexPhase::Complete,
        ] {
            assert!(phases.contains(&phase), "missing {phase:?}");
        }
        assert!(!phases.contains(&IndexPhase::Prioritizing));
    }

    #[tokio::test]
    async fn test_cancelled_build_restores_lifecycle() {
        let dir = repo();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let indexer = indexer(&dir).with_cancellation(cancel);

        let result = indexer.index_repository().await;
        assert!(matches!(result, Err(IndexerError::Cancelled)));
        assert_eq!(indexer.lifecycle().await, IndexLifecycle::Empty);
        assert!(!indexer.store().has_index());
    }

    #[tokio::test]
    async fn test_budget_prioritizes_chunks() {
        let dir = repo();
        fs::create_dir_all(dir.path().join("vendor")).unwrap();
        fs::write(dir.path().join("vendor/lib.rs"), "fn vendored() {}\n").unwrap();
        let mut config = IndexerConfig::for_root(dir.path());
        config.max_chunks = Some(2);
        let indexer = CodebaseIndexer::new(config, Arc::new(CountingEmbedder)).unwrap();

        let stats = indexer.index_repository().await.unwrap();
        assert_eq!(stats.chunks_created, 3);
        assert_eq!(stats.chunks_indexed, 2);
        let files = indexer.get_indexed_files().await.unwrap();
        assert_eq!(files, vec!["src/lib.py", "src/main.rs"]);
    }

    #[tokio::test]
    async fn test_absolute_changed_paths_are_normalized() {
        let dir = repo();
        let indexer = indexer(&dir);
        let absolute = indexer.root().join("src/main.rs");
        assert_eq!(
            indexer.normalize_changed_path(&absolute.to_string_lossy()).ok(),
            Some("src/main.rs".to_string())
        );
        assert_eq!(
            indexer.normalize_changed_path("src/lib.py").ok(),
            Some("src/lib.py".to_string())
        );
        assert_eq!(indexer.normalize_changed_path("/outside/file.rs").ok(), None);
    }
}
