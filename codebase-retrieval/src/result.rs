use crate::config::SearchMode;
use codeindex_vector_store::CodeChunk;
use serde::{Deserialize, Serialize};

/// A single search result: the chunk's fields plus its scores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    #[serde(flatten)]
    pub chunk: CodeChunk,

    /// Ranking score: rerank score when reranked, RRF score in hybrid mode,
    /// otherwise the single channel's score
    pub score: f32,

    /// Cosine similarity, when the vector channel returned this chunk
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vector_score: Option<f32>,

    /// BM25 score, when the keyword channel returned this chunk
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bm25_score: Option<f32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rerank_score: Option<f32>,
}

/// Collection of search results with metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResults {
    /// Query that produced these results
    pub query: String,

    /// Mode actually used, after any fallback to keyword search
    pub mode: SearchMode,

    /// Search results
    pub results: Vec<SearchResult>,

    /// Distinct candidates considered before filtering
    pub total_candidates: usize,

    /// Search statistics
    pub stats: SearchStats,
}

/// Search performance statistics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchStats {
    /// Total search time in milliseconds
    pub total_time_ms: u64,

    pub keyword_time_ms: u64,

    /// Query embedding plus vector scan
    pub vector_time_ms: u64,

    pub fusion_time_ms: u64,

    pub rerank_time_ms: u64,

    pub keyword_count: usize,

    pub vector_count: usize,

    /// Vector search was requested but could not run
    pub degraded_to_keyword: bool,

    /// Cache hit
    pub cache_hit: bool,
}

impl SearchResults {
    /// Create new search results
    pub fn new(query: impl Into<String>, mode: SearchMode) -> Self {
        Self {
            query: query.into(),
            mode,
            results: Vec::new(),
            total_candidates: 0,
            stats: SearchStats::default(),
        }
    }

    /// Get top N results
    pub fn top(&self, n: usize) -> &[SearchResult] {
        &self.results[..n.min(self.results.len())]
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Number of results
    pub fn len(&self) -> usize {
        self.results.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn create_test_result(score: f32) -> SearchResult {
        SearchResult {
            chunk: CodeChunk::new("src/a.ts", 1, 3, "export const a = 1;")
                .with_language("typescript"),
            score,
            vector_score: None,
            bm25_score: Some(score),
            rerank_score: None,
        }
    }

    #[test]
    fn test_search_results_top() {
        let mut results = SearchResults::new("query", SearchMode::Keyword);
        assert!(results.is_empty());
        results.results = vec![
            create_test_result(0.9),
            create_test_result(0.8),
            create_test_result(0.7),
        ];

        assert_eq!(results.len(), 3);
        assert_eq!(results.top(2).len(), 2);
        assert_eq!(results.top(5).len(), 3);
        assert_eq!(results.top(1)[0].score, 0.9);
    }

    #[test]
    fn test_result_json_flattens_chunk_fields() {
        let json = serde_json::to_value(create_test_result(1.5)).unwrap();
        assert_eq!(json["filePath"], "src/a.ts");
        assert_eq!(json["startLine"], 1);
        assert_eq!(json["language"], "typescript");
        assert_eq!(json["score"], 1.5);
        assert_eq!(json["bm25Score"], 1.5);
        assert!(json.get("vectorScore").is_none());
        assert!(json.get("rerankScore").is_none());

        let back: SearchResult = serde_json::from_value(json).unwrap();
        assert_eq!(back, create_test_result(1.5));
    }
}
