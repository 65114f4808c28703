use crate::config::{RetrievalConfig, SearchMode, SearchOptions};
use crate::error::{Result, RetrievalError};
use crate::fusion::FusionEngine;
use crate::rerank::Reranker;
use crate::result::{SearchResult, SearchResults, SearchStats};
use codeindex_embeddings::Embedder;
use codeindex_indexer::{
    CodebaseIndexer, IndexSnapshot, IndexStore, is_test_path, matches_file_type,
};
use codeindex_vector_store::{CodeChunk, DocId, VectorIndex};
use log::{debug, info, warn};
use lru::LruCache;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::num::NonZeroUsize;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{Mutex, RwLock};

type CacheKey = (u64, String, SearchOptions);

/// The published snapshot and its publication number; cached results are keyed
/// by the number so nothing computed against an older build is served.
#[derive(Clone)]
struct Published {
    snapshot: Arc<IndexSnapshot>,
    generation: u64,
}

/// A ranked candidate before it is joined with its chunk.
#[derive(Debug, Clone, Copy)]
struct Candidate {
    doc_id: DocId,
    score: f32,
    vector_score: Option<f32>,
    bm25_score: Option<f32>,
    rerank_score: Option<f32>,
}

impl Candidate {
    fn new(doc_id: DocId, score: f32) -> Self {
        Self {
            doc_id,
            score,
            vector_score: None,
            bm25_score: None,
            rerank_score: None,
        }
    }
}

/// Query engine over the latest published [`IndexSnapshot`].
///
/// Keyword search runs BM25 alone, vector search runs cosine similarity alone,
/// and hybrid search runs both and fuses them with RRF. Vector search needs
/// both an embedder and a snapshot with vectors; without either, or when the
/// query cannot be embedded, the search degrades to keyword mode and says so in
/// [`SearchResults::mode`].
pub struct HybridRetrieval {
    config: RetrievalConfig,
    embedder: Option<Arc<dyn Embedder>>,
    reranker: Option<Arc<dyn Reranker>>,
    fusion: FusionEngine,
    current: RwLock<Option<Published>>,
    cache: Option<Mutex<LruCache<CacheKey, SearchResults>>>,
}

impl HybridRetrieval {
    /// Create new hybrid retrieval engine with nothing published yet.
    pub fn new(config: RetrievalConfig, embedder: Option<Arc<dyn Embedder>>) -> Result<Self> {
        config.validate().map_err(RetrievalError::Config)?;

        let cache = if config.enable_cache {
            let size = NonZeroUsize::new(config.cache_size)
                .ok_or_else(|| RetrievalError::Config("Invalid cache size".to_string()))?;
            Some(Mutex::new(LruCache::new(size)))
        } else {
            None
        };

        Ok(Self {
            fusion: FusionEngine::new(config.rrf_k),
            config,
            embedder,
            reranker: None,
            current: RwLock::new(None),
            cache,
        })
    }

    pub fn with_reranker(mut self, reranker: Arc<dyn Reranker>) -> Self {
        self.reranker = Some(reranker);
        self
    }

    /// Get configuration
    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    /// The snapshot searches currently run against.
    pub async fn snapshot(&self) -> Option<Arc<IndexSnapshot>> {
        self.current
            .read()
            .await
            .as_ref()
            .map(|published| published.snapshot.clone())
    }

    /// Make `snapshot` the one searched from now on. Cached results are
    /// dropped.
    pub async fn publish(&self, snapshot: Arc<IndexSnapshot>) {
        {
            let mut current = self.current.write().await;
            let generation = current.as_ref().map_or(0, |p| p.generation + 1);
            info!(
                "Publishing index: {} chunks, {} mode",
                snapshot.len(),
                snapshot.state().mode()
            );
            *current = Some(Published {
                snapshot,
                generation,
            });
        }
        self.clear_cache().await;
    }

    /// Publish the indexer's latest build if it differs from the current one.
    ///
    /// Returns whether anything was published.
    pub async fn refresh_from(&self, indexer: &CodebaseIndexer) -> bool {
        let Some(latest) = indexer.snapshot().await else {
            return false;
        };
        if let Some(current) = self.snapshot().await {
            if Arc::ptr_eq(&current, &latest) {
                return false;
            }
        }
        self.publish(latest).await;
        true
    }

    /// Load and publish the persisted build in `store_dir`.
    ///
    /// Returns `Ok(false)` when the directory holds no index; a corrupt index is
    /// an error.
    pub async fn load_from(&self, store_dir: &Path) -> Result<bool> {
        match IndexStore::new(store_dir).load()? {
            Some(snapshot) => {
                self.publish(Arc::new(snapshot)).await;
                Ok(true)
            }
            None => {
                info!("No index found in {store_dir:?}");
                Ok(false)
            }
        }
    }

    /// Ranked results for `query`.
    pub async fn search(&self, query: &str, options: &SearchOptions) -> Result<Vec<SearchResult>> {
        Ok(self.search_with_stats(query, options).await?.results)
    }

    /// Ranked results for `query` together with per-stage statistics.
    pub async fn search_with_stats(
        &self,
        query: &str,
        options: &SearchOptions,
    ) -> Result<SearchResults> {
        let start = Instant::now();
        let max_results = options
            .max_results
            .unwrap_or(self.config.default_max_results);

        let published = self.current.read().await.clone();
        let Some(published) = published else {
            debug!("Search before any index was published");
            return Ok(SearchResults::new(query, options.mode));
        };
        if query.trim().is_empty() || max_results == 0 || published.snapshot.is_empty() {
            return Ok(SearchResults::new(query, options.mode));
        }

        let key: CacheKey = (published.generation, query.to_string(), options.clone());
        if let Some(cache) = &self.cache {
            if let Some(cached) = cache.lock().await.get(&key) {
                debug!("Cache hit for query: '{query}'");
                let mut results = cached.clone();
                results.stats.cache_hit = true;
                results.stats.total_time_ms = start.elapsed().as_millis() as u64;
                return Ok(results);
            }
        }

        let snapshot = published.snapshot.as_ref();
        let mut stats = SearchStats::default();

        let query_vector = match options.mode {
            SearchMode::Keyword => None,
            SearchMode::Vector | SearchMode::Hybrid => {
                let vector_start = Instant::now();
                let embedded = self.embed_query(snapshot, query).await;
                stats.vector_time_ms = vector_start.elapsed().as_millis() as u64;
                stats.degraded_to_keyword = embedded.is_none();
                embedded
            }
        };

        let (mode, candidates, total_candidates) = match (options.mode, query_vector) {
            (SearchMode::Hybrid, Some(query_vector)) => {
                let pool = max_results.saturating_mul(self.config.hybrid_candidate_multiplier);
                let vector = self.vector_channel(snapshot, &query_vector, pool, &mut stats)?;
                let keyword = self.keyword_channel(snapshot, query, pool, &mut stats);

                let fusion_start = Instant::now();
                let fused = self.fuse(&vector, &keyword);
                stats.fusion_time_ms = fusion_start.elapsed().as_millis() as u64;
                let total = fused.len();
                (SearchMode::Hybrid, fused, total)
            }
            (SearchMode::Vector, Some(query_vector)) => {
                let pool = max_results.saturating_mul(self.config.keyword_candidate_multiplier);
                let vector = self.vector_channel(snapshot, &query_vector, pool, &mut stats)?;
                let candidates: Vec<Candidate> = vector
                    .iter()
                    .map(|(doc_id, score)| Candidate {
                        vector_score: Some(*score),
                        ..Candidate::new(*doc_id, *score)
                    })
                    .collect();
                let total = candidates.len();
                (SearchMode::Vector, candidates, total)
            }
            _ => {
                let pool = max_results.saturating_mul(self.config.keyword_candidate_multiplier);
                let keyword = self.keyword_channel(snapshot, query, pool, &mut stats);
                let candidates: Vec<Candidate> = keyword
                    .iter()
                    .map(|(doc_id, score)| Candidate {
                        bm25_score: Some(*score),
                        ..Candidate::new(*doc_id, *score)
                    })
                    .collect();
                let total = candidates.len();
                (SearchMode::Keyword, candidates, total)
            }
        };

        let mut candidates: Vec<Candidate> = candidates
            .into_iter()
            .filter(|candidate| {
                snapshot
                    .chunk(candidate.doc_id)
                    .is_some_and(|chunk| Self::passes_filters(chunk, options))
            })
            .collect();

        if options.rerank {
            let rerank_start = Instant::now();
            let pool = max_results.saturating_mul(self.config.rerank_candidate_multiplier);
            candidates.truncate(pool);
            candidates = self.rerank(snapshot, query, candidates).await;
            stats.rerank_time_ms = rerank_start.elapsed().as_millis() as u64;
        }
        candidates.truncate(max_results);

        let results = candidates
            .iter()
            .filter_map(|candidate| {
                snapshot.chunk(candidate.doc_id).map(|chunk| SearchResult {
                    chunk: chunk.clone(),
                    score: candidate.score,
                    vector_score: candidate.vector_score,
                    bm25_score: candidate.bm25_score,
                    rerank_score: candidate.rerank_score,
                })
            })
            .collect();

        stats.total_time_ms = start.elapsed().as_millis() as u64;
        let search_results = SearchResults {
            query: query.to_string(),
            mode,
            results,
            total_candidates,
            stats,
        };

        if let Some(cache) = &self.cache {
            cache.lock().await.put(key, search_results.clone());
        }

        debug!(
            "{mode:?} search for '{query}' returned {} of {total_candidates} candidates in {}ms",
            search_results.len(),
            search_results.stats.total_time_ms
        );
        Ok(search_results)
    }

    /// Embedding of `query`, or `None` when vector search cannot run.
    async fn embed_query(&self, snapshot: &IndexSnapshot, query: &str) -> Option<Vec<f32>> {
        let Some(vectors) = snapshot.vectors() else {
            debug!("Index has no vectors; using keyword search");
            return None;
        };
        let Some(embedder) = &self.embedder else {
            debug!("No embedder configured; using keyword search");
            return None;
        };

        match embedder.embed(query).await {
            Ok(vector) if vector.len() == vectors.dimension() => Some(vector),
            Ok(vector) => {
                warn!(
                    "Query embedding has dimension {} but the index has {}; using keyword search",
                    vector.len(),
                    vectors.dimension()
                );
                None
            }
            Err(err) => {
                warn!("Failed to embed query ({err}); using keyword search");
                None
            }
        }
    }

    fn vector_channel(
        &self,
        snapshot: &IndexSnapshot,
        query_vector: &[f32],
        limit: usize,
        stats: &mut SearchStats,
    ) -> Result<Vec<(DocId, f32)>> {
        let Some(vectors) = snapshot.vectors() else {
            return Ok(Vec::new());
        };
        let started = Instant::now();
        let hits = vectors.search(query_vector, limit)?;
        stats.vector_time_ms += started.elapsed().as_millis() as u64;
        stats.vector_count = hits.len();
        Ok(hits)
    }

    fn keyword_channel(
        &self,
        snapshot: &IndexSnapshot,
        query: &str,
        limit: usize,
        stats: &mut SearchStats,
    ) -> Vec<(DocId, f32)> {
        let started = Instant::now();
        let hits = snapshot.bm25().search(query, limit);
        stats.keyword_time_ms = started.elapsed().as_millis() as u64;
        stats.keyword_count = hits.len();
        hits
    }

    fn fuse(&self, vector: &[(DocId, f32)], keyword: &[(DocId, f32)]) -> Vec<Candidate> {
        let vector_scores: BTreeMap<DocId, f32> = vector.iter().copied().collect();
        let bm25_scores: BTreeMap<DocId, f32> = keyword.iter().copied().collect();

        self.fusion
            .fuse(&[vector, keyword])
            .into_iter()
            .map(|(doc_id, score)| Candidate {
                vector_score: vector_scores.get(&doc_id).copied(),
                bm25_score: bm25_scores.get(&doc_id).copied(),
                ..Candidate::new(doc_id, score)
            })
            .collect()
    }

    fn passes_filters(chunk: &CodeChunk, options: &SearchOptions) -> bool {
        if options.exclude_tests && is_test_path(&chunk.file_path) {
            return false;
        }
        options.file_types.is_empty() || matches_file_type(&chunk.file_path, &options.file_types)
    }

    /// Reorder `candidates` by reranker score. Without a reranker, or when it
    /// fails, the order is left as is.
    async fn rerank(
        &self,
        snapshot: &IndexSnapshot,
        query: &str,
        mut candidates: Vec<Candidate>,
    ) -> Vec<Candidate> {
        let Some(reranker) = &self.reranker else {
            debug!("Rerank requested but no reranker is configured");
            return candidates;
        };
        if candidates.is_empty() {
            return candidates;
        }

        let documents: Vec<String> = candidates
            .iter()
            .map(|candidate| {
                snapshot
                    .chunk(candidate.doc_id)
                    .map(CodeChunk::embedding_text)
                    .unwrap_or_default()
            })
            .collect();

        let scored = reranker
            .score(query, &documents)
            .await
            .and_then(|scores| {
                if scores.len() == candidates.len() {
                    Ok(scores)
                } else {
                    Err(RetrievalError::Reranking(format!(
                        "{} scores for {} candidates",
                        scores.len(),
                        candidates.len()
                    )))
                }
            });
        let scores = match scored {
            Ok(scores) => scores,
            Err(err) => {
                warn!(
                    "Reranker {} failed ({err}); keeping fused order",
                    reranker.name()
                );
                return candidates;
            }
        };

        for (candidate, score) in candidates.iter_mut().zip(scores) {
            candidate.rerank_score = Some(score);
            candidate.score = score;
        }
        candidates.sort_by(|a, b| match b.score.total_cmp(&a.score) {
            Ordering::Equal => a.doc_id.cmp(&b.doc_id),
            other => other,
        });
        candidates
    }

    /// Clear search cache
    pub async fn clear_cache(&self) {
        if let Some(cache) = &self.cache {
            cache.lock().await.clear();
            debug!("Search cache cleared");
        }
    }

    /// Get cache statistics
    pub async fn cache_stats(&self) -> CacheStats {
        match &self.cache {
            Some(cache) => {
                let cache = cache.lock().await;
                CacheStats {
                    size: cache.len(),
                    capacity: cache.cap().get(),
                }
            }
            None => CacheStats::default(),
        }
    }
}

/// Cache statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub size: usize,
    pub capacity: usize,
}
