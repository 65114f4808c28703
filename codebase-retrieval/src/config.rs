use serde::{Deserialize, Serialize};

/// Which channels a search consults.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    /// Vector and keyword channels fused with RRF
    #[default]
    Hybrid,
    /// Cosine similarity only; degrades to keyword without vectors
    Vector,
    /// BM25 only
    Keyword,
}

/// Per-query options.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SearchOptions {
    /// Result count; [`RetrievalConfig::default_max_results`] when unset
    pub max_results: Option<usize>,

    /// Extension allow-list (`"ts"` or `".ts"`); empty allows everything
    pub file_types: Vec<String>,

    /// Drop test, spec, story and mock files
    pub exclude_tests: bool,

    pub mode: SearchMode,

    /// Rerank the fused candidates when a reranker is configured
    pub rerank: bool,
}

impl SearchOptions {
    pub fn keyword() -> Self {
        Self::default().with_mode(SearchMode::Keyword)
    }

    pub fn vector() -> Self {
        Self::default().with_mode(SearchMode::Vector)
    }

    pub fn hybrid() -> Self {
        Self::default()
    }

    pub fn with_mode(mut self, mode: SearchMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = Some(max_results);
        self
    }

    pub fn with_file_types<I, S>(mut self, file_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.file_types = file_types.into_iter().map(Into::into).collect();
        self
    }

    pub fn excluding_tests(mut self) -> Self {
        self.exclude_tests = true;
        self
    }

    pub fn with_rerank(mut self) -> Self {
        self.rerank = true;
        self
    }
}

/// Configuration for hybrid retrieval
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// RRF constant k (higher = less emphasis on top results)
    #[serde(default = "default_rrf_k")]
    pub rrf_k: f32,

    /// Result count when a query does not set one
    #[serde(default = "default_max_results")]
    pub default_max_results: usize,

    /// Candidates requested per single-channel search, as a multiple of the
    /// result count
    #[serde(default = "default_keyword_candidate_multiplier")]
    pub keyword_candidate_multiplier: usize,

    /// Candidates requested from each channel before fusion
    #[serde(default = "default_hybrid_candidate_multiplier")]
    pub hybrid_candidate_multiplier: usize,

    /// Candidates handed to the reranker
    #[serde(default = "default_rerank_candidate_multiplier")]
    pub rerank_candidate_multiplier: usize,

    /// Enable caching of search results
    #[serde(default = "default_true")]
    pub enable_cache: bool,

    /// Cache size (number of queries to cache)
    #[serde(default = "default_cache_size")]
    pub cache_size: usize,
}

fn default_rrf_k() -> f32 {
    60.0
}

fn default_max_results() -> usize {
    10
}

fn default_keyword_candidate_multiplier() -> usize {
    2
}

fn default_hybrid_candidate_multiplier() -> usize {
    3
}

fn default_rerank_candidate_multiplier() -> usize {
    3
}

fn default_true() -> bool {
    true
}

fn default_cache_size() -> usize {
    100
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            rrf_k: default_rrf_k(),
            default_max_results: default_max_results(),
            keyword_candidate_multiplier: default_keyword_candidate_multiplier(),
            hybrid_candidate_multiplier: default_hybrid_candidate_multiplier(),
            rerank_candidate_multiplier: default_rerank_candidate_multiplier(),
            enable_cache: true,
            cache_size: default_cache_size(),
        }
    }
}

impl RetrievalConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.rrf_k.is_nan() || self.rrf_k <= 0.0 {
            return Err(format!("rrf_k must be > 0, got {}", self.rrf_k));
        }

        if self.default_max_results == 0 {
            return Err("default_max_results must be > 0".to_string());
        }

        for (name, value) in [
            (
                "keyword_candidate_multiplier",
                self.keyword_candidate_multiplier,
            ),
            (
                "hybrid_candidate_multiplier",
                self.hybrid_candidate_multiplier,
            ),
            (
                "rerank_candidate_multiplier",
                self.rerank_candidate_multiplier,
            ),
        ] {
            if value == 0 {
                return Err(format!("{name} must be > 0"));
            }
        }

        if self.enable_cache && self.cache_size == 0 {
            return Err("cache_size must be > 0 when caching is enabled".to_string());
        }

        Ok(())
    }

    /// Config without the query cache, for callers that publish often.
    pub fn uncached() -> Self {
        Self {
            enable_cache: false,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_config_valid() {
        let config = RetrievalConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.rrf_k, 60.0);
        assert_eq!(config.default_max_results, 10);
        assert!(RetrievalConfig::uncached().validate().is_ok());
    }

    #[test]
    fn test_invalid_values_rejected() {
        let config = RetrievalConfig {
            rrf_k: 0.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = RetrievalConfig {
            rrf_k: f32::NAN,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = RetrievalConfig {
            hybrid_candidate_multiplier: 0,
            ..Default::default()
        };
        assert_eq!(
            config.validate(),
            Err("hybrid_candidate_multiplier must be > 0".to_string())
        );

        let config = RetrievalConfig {
            cache_size: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
        let config = RetrievalConfig {
            cache_size: 0,
            enable_cache: false,
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_options_from_json() {
        let options: SearchOptions = serde_json::from_str(
            r#"{"maxResults": 5, "fileTypes": [".ts"], "excludeTests": true, "mode": "keyword"}"#,
        )
        .unwrap();
        assert_eq!(
            options,
            SearchOptions::keyword()
                .with_max_results(5)
                .with_file_types([".ts"])
                .excluding_tests()
        );

        let defaults: SearchOptions = serde_json::from_str("{}").unwrap();
        assert_eq!(defaults.mode, SearchMode::Hybrid);
        assert!(!defaults.rerank);
    }
}
