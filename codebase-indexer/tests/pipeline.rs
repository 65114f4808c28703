use async_trait::async_trait;
use codeindex_embeddings::{Embedder, EmbeddingError};
use codeindex_indexer::{
    BM25_FILE, CodebaseIndexer, IndexLifecycle, IndexerConfig, IndexerError, METADATA_FILE,
    StaticCommit, UNKNOWN_COMMIT,
};
use codeindex_vector_store::VectorIndex;
use pretty_assertions::assert_eq;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

/// Deterministic bag-of-words embedder.
struct HashEmbedder;

#[async_trait]
impl Embedder for HashEmbedder {
    fn model_name(&self) -> &str {
        "hash-bag-32"
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        Ok(texts.iter().map(|text| hash_bag(text)).collect())
    }
}

fn hash_bag(text: &str) -> Vec<f32> {
    let mut vector = vec![0.0; 32];
    for word in text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
    {
        let hash = word
            .to_lowercase()
            .bytes()
            .fold(2_166_136_261_u32, |h, b| (h ^ u32::from(b)).wrapping_mul(16_777_619));
        vector[(hash % 32) as usize] += 1.0;
    }
    vector
}

/// Same hashing as [`HashEmbedder`], folded into 16 dimensions.
struct NarrowHashEmbedder;

#[async_trait]
impl Embedder for NarrowHashEmbedder {
    fn model_name(&self) -> &str {
        "hash-bag-16"
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        Ok(texts
            .iter()
            .map(|text| {
                let wide = hash_bag(text);
                (0..16).map(|i| wide[i] + wide[i + 16]).collect()
            })
            .collect())
    }
}

struct FailingEmbedder;

#[async_trait]
impl Embedder for FailingEmbedder {
    fn model_name(&self) -> &str {
        "always-fails"
    }

    async fn embed_batch(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        Err(EmbeddingError::ModelInitialization("model unavailable".into()))
    }
}

fn write(root: &Path, path: &str, content: &str) {
    let full = root.join(path);
    fs::create_dir_all(full.parent().unwrap()).unwrap();
    fs::write(full, content).unwrap();
}

fn create_repo() -> TempDir {
    let dir = TempDir::new().unwrap();
    write(
        dir.path(),
        "src/a.ts",
        "export function authenticateUser(token: string) {\n  return verify(token);\n}\n",
    );
    write(
        dir.path(),
        "src/b.ts",
        "export const formatDate = (d: Date) => d.toISOString();\n",
    );
    write(
        dir.path(),
        "src/c.ts",
        "export class Cart {\n  items: string[] = [];\n}\n",
    );
    dir
}

fn indexer(root: &Path, embedder: Arc<dyn Embedder>) -> CodebaseIndexer {
    CodebaseIndexer::new(IndexerConfig::for_root(root), embedder)
        .unwrap()
        .with_source_control(Arc::new(StaticCommit("c0ffee".to_string())))
}

#[test_log::test(tokio::test)]
async fn test_full_build_persists_all_artifacts() {
    let repo = create_repo();
    let indexer = indexer(repo.path(), Arc::new(HashEmbedder));

    let stats = indexer.index_repository().await.unwrap();
    assert_eq!(stats.files_processed, 3);
    assert_eq!(stats.chunks_indexed, 3);
    assert_eq!(stats.embedding_failures, 0);
    assert!(stats.has_hybrid_index);
    assert_eq!(stats.commit_hash, "c0ffee");

    let state = indexer.get_index_state().await.unwrap().unwrap();
    assert_eq!(state.file_count, 3);
    assert_eq!(state.chunk_count, 3);
    assert_eq!(state.embedding_model, "hash-bag-32");
    assert!(state.has_hybrid_index);

    assert!(indexer.store().dir().join("index-state.json").exists());
    let artifacts = indexer.store().artifact_dir().unwrap().unwrap();
    for name in [METADATA_FILE, BM25_FILE, "vectors.bin"] {
        assert!(artifacts.join(name).exists(), "missing {name}");
    }
    assert_eq!(
        indexer.get_indexed_files().await.unwrap(),
        vec!["src/a.ts", "src/b.ts", "src/c.ts"]
    );
    assert_eq!(indexer.load_metadata_only().unwrap().len(), 3);
}

#[tokio::test]
async fn test_update_with_no_changes_keeps_chunk_count() {
    let repo = create_repo();
    let indexer = indexer(repo.path(), Arc::new(HashEmbedder));
    let before = indexer.index_repository().await.unwrap();

    let update = indexer.update_index(&[]).await.unwrap();
    assert_eq!(update.files_updated, 0);
    assert_eq!(update.chunks_removed, 0);
    assert_eq!(update.chunks_added, 0);
    assert_eq!(update.chunk_count, before.chunks_indexed);

    let state = indexer.get_index_state().await.unwrap().unwrap();
    assert_eq!(state.chunk_count, before.chunks_indexed);
    assert_eq!(indexer.lifecycle().await, IndexLifecycle::Built);
}

#[tokio::test]
async fn test_update_rechunks_changed_and_drops_deleted_files() {
    let repo = create_repo();
    let indexer = indexer(repo.path(), Arc::new(HashEmbedder));
    indexer.index_repository().await.unwrap();

    write(
        repo.path(),
        "src/a.ts",
        "export function authenticateAdmin(token: string) {\n  return verifyAdmin(token);\n}\n",
    );
    fs::remove_file(repo.path().join("src/c.ts")).unwrap();
    write(repo.path(), "src/d.ts", "export const answer = 42;\n");

    let update = indexer
        .update_index(&[
            "src/a.ts".to_string(),
            "src/c.ts".to_string(),
            "src/d.ts".to_string(),
        ])
        .await
        .unwrap();
    assert_eq!(update.files_updated, 3);
    assert_eq!(update.chunks_removed, 2);
    assert_eq!(update.chunks_added, 2);
    assert_eq!(update.chunk_count, 3);

    let snapshot = indexer.snapshot().await.unwrap();
    assert_eq!(snapshot.indexed_files(), vec!["src/a.ts", "src/b.ts", "src/d.ts"]);
    let a = snapshot
        .chunks()
        .iter()
        .find(|chunk| chunk.file_path == "src/a.ts")
        .unwrap();
    assert!(a.content.contains("authenticateAdmin"));
    assert!(snapshot.bm25().search("authenticate user", 10).iter().all(|(doc_id, _)| {
        snapshot.chunk(*doc_id).unwrap().file_path != "src/c.ts"
    }));
}

#[test_log::test(tokio::test)]
async fn test_update_ignores_paths_outside_repository() {
    let outer = TempDir::new().unwrap();
    let repo = outer.path().join("repo");
    write(
        &repo,
        "src/a.ts",
        "export function authenticateUser(token: string) {\n  return verify(token);\n}\n",
    );
    write(outer.path(), "secret/leak.ts", "export const apiKey = 'hunter2';\n");
    let indexer = indexer(&repo, Arc::new(HashEmbedder));
    indexer.index_repository().await.unwrap();

    let escaped = repo.join("../secret/leak.ts").to_string_lossy().into_owned();
    let update = indexer
        .update_index(&["../secret/leak.ts".to_string(), escaped])
        .await
        .unwrap();
    assert_eq!(update.files_updated, 0);
    assert_eq!(update.chunks_added, 0);
    assert_eq!(update.chunk_count, 1);
    assert_eq!(indexer.get_indexed_files().await.unwrap(), vec!["src/a.ts"]);

    // `..` that stays inside the root resolves to the real file.
    let update = indexer
        .update_index(&["src/../src/a.ts".to_string()])
        .await
        .unwrap();
    assert_eq!(update.files_updated, 1);
    assert_eq!(update.chunk_count, 1);
    assert_eq!(indexer.get_indexed_files().await.unwrap(), vec!["src/a.ts"]);
}

#[tokio::test]
async fn test_update_without_index_is_an_error() {
    let repo = create_repo();
    let indexer = indexer(repo.path(), Arc::new(HashEmbedder));

    let err = indexer
        .update_index(&["src/a.ts".to_string()])
        .await
        .unwrap_err();
    assert!(matches!(err, IndexerError::NoIndex(_)));
    assert_eq!(indexer.lifecycle().await, IndexLifecycle::Empty);
    assert!(indexer.get_index_state().await.unwrap().is_none());
}

#[tokio::test]
async fn test_update_from_persisted_index_in_new_process() {
    let repo = create_repo();
    indexer(repo.path(), Arc::new(HashEmbedder))
        .index_repository()
        .await
        .unwrap();

    let fresh = indexer(repo.path(), Arc::new(HashEmbedder));
    assert!(fresh.snapshot().await.is_none());
    let update = fresh.update_index(&["src/b.ts".to_string()]).await.unwrap();
    assert_eq!(update.chunks_removed, 1);
    assert_eq!(update.chunks_added, 1);
    assert_eq!(update.chunk_count, 3);
}

#[test_log::test(tokio::test)]
async fn test_failing_embedder_degrades_to_lexical_only() {
    let repo = create_repo();
    let indexer = indexer(repo.path(), Arc::new(FailingEmbedder));

    let stats = indexer.index_repository().await.unwrap();
    assert!(!stats.has_hybrid_index);
    assert_eq!(stats.embedding_failures, 3);
    assert_eq!(stats.chunks_indexed, 3);

    let state = indexer.get_index_state().await.unwrap().unwrap();
    assert!(!state.has_hybrid_index);
    let artifacts = indexer.store().artifact_dir().unwrap().unwrap();
    assert!(!artifacts.join("vectors.bin").exists());

    let snapshot = indexer.snapshot().await.unwrap();
    assert!(snapshot.vectors().is_none());
    assert!(!snapshot.bm25().search("authenticateUser", 5).is_empty());
}

#[tokio::test]
async fn test_load_or_build_reuses_cache() {
    let repo = create_repo();
    let first = indexer(repo.path(), Arc::new(HashEmbedder));
    first.index_repository().await.unwrap();
    let built_at = first.get_index_state().await.unwrap().unwrap().indexed_at;

    let second = indexer(repo.path(), Arc::new(FailingEmbedder));
    let snapshot = second.load_or_build().await.unwrap();
    assert_eq!(snapshot.state().indexed_at, built_at);
    assert!(snapshot.has_hybrid_index());
    assert_eq!(second.lifecycle().await, IndexLifecycle::Built);
}

#[tokio::test]
async fn test_stale_cache_is_reused_unless_verification_enabled() {
    let repo = create_repo();
    indexer(repo.path(), Arc::new(HashEmbedder))
        .index_repository()
        .await
        .unwrap();

    let moved_on = || Arc::new(StaticCommit("beef".to_string()));

    let lenient = indexer(repo.path(), Arc::new(HashEmbedder)).with_source_control(moved_on());
    let snapshot = lenient.load_or_build().await.unwrap();
    assert_eq!(snapshot.state().commit_hash, "c0ffee");

    let mut config = IndexerConfig::for_root(repo.path());
    config.verify_commit_on_load = true;
    let strict = CodebaseIndexer::new(config, Arc::new(HashEmbedder))
        .unwrap()
        .with_source_control(moved_on());
    let snapshot = strict.load_or_build().await.unwrap();
    assert_eq!(snapshot.state().commit_hash, "beef");
}

#[tokio::test]
async fn test_unknown_commit_never_counts_as_stale() {
    let repo = create_repo();
    indexer(repo.path(), Arc::new(HashEmbedder))
        .index_repository()
        .await
        .unwrap();

    let mut config = IndexerConfig::for_root(repo.path());
    config.verify_commit_on_load = true;
    let strict = CodebaseIndexer::new(config, Arc::new(HashEmbedder))
        .unwrap()
        .with_source_control(Arc::new(StaticCommit(UNKNOWN_COMMIT.to_string())));
    let snapshot = strict.load_or_build().await.unwrap();
    assert_eq!(snapshot.state().commit_hash, "c0ffee");
}

#[test_log::test(tokio::test)]
async fn test_corrupt_cache_triggers_rebuild() {
    let repo = create_repo();
    let first = indexer(repo.path(), Arc::new(HashEmbedder));
    first.index_repository().await.unwrap();
    let artifacts = first.store().artifact_dir().unwrap().unwrap();
    fs::write(artifacts.join(METADATA_FILE), b"{ truncated").unwrap();

    let second = indexer(repo.path(), Arc::new(HashEmbedder));
    let snapshot = second.load_or_build().await.unwrap();
    assert_eq!(snapshot.len(), 3);
    assert!(second.store().load().unwrap().is_some());
}

#[tokio::test]
async fn test_load_or_build_on_empty_store_builds() {
    let repo = create_repo();
    let indexer = indexer(repo.path(), Arc::new(HashEmbedder));
    let snapshot = indexer.load_or_build().await.unwrap();
    assert_eq!(snapshot.len(), 3);
    assert!(indexer.store().has_index());
}

#[tokio::test]
async fn test_batched_build_then_finalize() {
    let repo = create_repo();
    let indexer = indexer(repo.path(), Arc::new(HashEmbedder));

    let first = indexer.index_batch(0, 2).await.unwrap();
    assert_eq!(first.total_batches, 2);
    assert_eq!(first.chunks_in_batch, 2);
    assert!(!first.is_complete);
    assert_eq!(
        indexer.lifecycle().await,
        IndexLifecycle::BatchBuilding { batch: 1, total: 2 }
    );
    assert!(!indexer.store().has_index());

    let second = indexer.index_batch(1, 2).await.unwrap();
    assert_eq!(second.chunks_in_batch, 1);
    assert_eq!(second.chunks_accumulated, 3);
    assert!(second.is_complete);

    let stats = indexer.finalize_index().await.unwrap();
    assert_eq!(stats.chunks_indexed, 3);
    assert!(stats.has_hybrid_index);
    assert_eq!(indexer.lifecycle().await, IndexLifecycle::Built);
    assert!(indexer.store().has_index());
    assert!(
        indexer
            .store()
            .load_batch_progress()
            .unwrap()
            .is_none()
    );
    assert_eq!(indexer.get_indexed_files().await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_batch_checkpoint_restarts_when_layout_changes() {
    let repo = create_repo();
    let indexer = indexer(repo.path(), Arc::new(HashEmbedder));

    let first = indexer.index_batch(0, 2).await.unwrap();
    assert_eq!(first.chunks_accumulated, 2);

    // Different batch size: the old checkpoint is discarded.
    let resized = indexer.index_batch(0, 1).await.unwrap();
    assert_eq!(resized.total_batches, 3);
    assert_eq!(resized.batches_completed, 1);
    assert_eq!(resized.chunks_accumulated, 1);

    // Different chunk count: discarded again.
    write(repo.path(), "src/d.ts", "export const discount = 0.1;\n");
    let grown = indexer.index_batch(1, 1).await.unwrap();
    assert_eq!(grown.total_batches, 4);
    assert_eq!(grown.batches_completed, 1);
    assert_eq!(grown.chunks_accumulated, 1);

    let progress = indexer.store().load_batch_progress().unwrap().unwrap();
    assert_eq!(progress.total_chunks, 4);
    assert_eq!(progress.batch_size, 1);
    assert_eq!(progress.chunks.keys().copied().collect::<Vec<_>>(), vec![1]);
}

#[tokio::test]
async fn test_finalize_incomplete_checkpoint_indexes_checkpointed_chunks() {
    let repo = create_repo();
    let indexer = indexer(repo.path(), Arc::new(HashEmbedder));

    let first = indexer.index_batch(0, 2).await.unwrap();
    assert!(!first.is_complete);

    let stats = indexer.finalize_index().await.unwrap();
    assert_eq!(stats.chunks_created, 2);
    assert_eq!(stats.chunks_indexed, 2);
    assert_eq!(indexer.lifecycle().await, IndexLifecycle::Built);
    assert!(indexer.store().has_index());
    assert!(indexer.store().load_batch_progress().unwrap().is_none());
    assert_eq!(indexer.get_indexed_files().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_rebuild_adopts_new_embedding_dimension() {
    let repo = create_repo();
    let wide = indexer(repo.path(), Arc::new(HashEmbedder));
    wide.index_repository().await.unwrap();
    let snapshot = wide.snapshot().await.unwrap();
    assert_eq!(snapshot.state().vector_dimension, Some(32));

    let narrow = indexer(repo.path(), Arc::new(NarrowHashEmbedder));
    narrow.index_repository().await.unwrap();
    let snapshot = narrow.snapshot().await.unwrap();
    assert_eq!(snapshot.state().vector_dimension, Some(16));
    assert_eq!(snapshot.vectors().unwrap().dimension(), 16);
    assert_eq!(snapshot.state().embedding_model, "hash-bag-16");

    let state = narrow.store().load_state().unwrap().unwrap();
    assert_eq!(state.vector_dimension, Some(16));
    let reloaded = narrow.store().load().unwrap().unwrap();
    assert_eq!(reloaded.vectors().unwrap().dimension(), 16);
}

#[tokio::test]
async fn test_batch_out_of_range_and_finalize_without_batches() {
    let repo = create_repo();
    let indexer = indexer(repo.path(), Arc::new(HashEmbedder));

    assert!(matches!(
        indexer.index_batch(5, 2).await,
        Err(IndexerError::BatchOutOfRange {
            batch: 5,
            total_batches: 2
        })
    ));
    assert!(matches!(
        indexer.index_batch(0, 0).await,
        Err(IndexerError::Config(_))
    ));
    assert!(matches!(
        indexer.finalize_index().await,
        Err(IndexerError::NoBatchProgress(_))
    ));
    assert_eq!(indexer.lifecycle().await, IndexLifecycle::Empty);
}

#[tokio::test]
async fn test_empty_repository_builds_empty_index() {
    let dir = TempDir::new().unwrap();
    let indexer = indexer(dir.path(), Arc::new(HashEmbedder));
    let stats = indexer.index_repository().await.unwrap();
    assert_eq!(stats.chunks_indexed, 0);

    let snapshot = indexer.snapshot().await.unwrap();
    assert!(snapshot.is_empty());
    assert!(snapshot.bm25().search("anything", 10).is_empty());
}

#[tokio::test]
async fn test_config_from_toml_file_drives_indexer() -> anyhow::Result<()> {
    let repo = create_repo();
    let config_path = repo.path().join("codeindex.toml");
    fs::write(
        &config_path,
        format!(
            "root_dir = {:?}\nmax_chunks = 1\n\n[chunker]\nmax_lines = 2\n",
            repo.path()
        ),
    )?;

    let config = IndexerConfig::from_toml_file(&config_path)?;
    let indexer = CodebaseIndexer::new(config, Arc::new(HashEmbedder))?;
    let stats = indexer.index_repository().await?;
    assert!(stats.chunks_created > 3);
    assert_eq!(stats.chunks_indexed, 1);
    Ok(())
}
