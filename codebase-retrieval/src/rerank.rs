use crate::error::Result;
use async_trait::async_trait;
use codeindex_lexical_index::tokenize;
use log::debug;
use std::collections::BTreeSet;

/// Precision scorer applied to already-ranked candidates.
///
/// Implementations return one score per document, in input order. Scores have
/// no required range; only their order matters.
#[async_trait]
pub trait Reranker: Send + Sync {
    fn name(&self) -> &str;

    async fn score(&self, query: &str, documents: &[String]) -> Result<Vec<f32>>;
}

/// Model-free reranker built on lexical overlap.
///
/// Rewards an exact occurrence of the query, the share of query words found
/// verbatim and the share of query tokens (after camelCase/snake_case
/// splitting) present in the document. Very short or very long documents are
/// damped.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicReranker;

impl HeuristicReranker {
    fn score_document(query: &str, query_tokens: &BTreeSet<String>, document: &str) -> f32 {
        let features = Features::extract(query, query_tokens, document);
        let mut score = 0.0;

        if features.exact_match {
            score += 1.0;
        }
        score += 0.5 * features.word_coverage;
        score += features.token_coverage;

        let damping = if features.line_count < 3 {
            0.9
        } else if features.line_count > 200 {
            0.85
        } else {
            1.0
        };
        score * damping
    }
}

#[async_trait]
impl Reranker for HeuristicReranker {
    fn name(&self) -> &str {
        "heuristic"
    }

    async fn score(&self, query: &str, documents: &[String]) -> Result<Vec<f32>> {
        let query_tokens: BTreeSet<String> = tokenize(query).into_iter().collect();
        let query = query.trim().to_lowercase();
        debug!("Heuristic reranking {} documents", documents.len());

        Ok(documents
            .iter()
            .map(|document| Self::score_document(&query, &query_tokens, document))
            .collect())
    }
}

#[derive(Debug)]
struct Features {
    exact_match: bool,
    word_coverage: f32,
    token_coverage: f32,
    line_count: usize,
}

impl Features {
    /// `query` must already be lowercased.
    fn extract(query: &str, query_tokens: &BTreeSet<String>, document: &str) -> Self {
        let lowered = document.to_lowercase();

        let words: Vec<&str> = query.split_whitespace().collect();
        let word_coverage = if words.is_empty() {
            0.0
        } else {
            words.iter().filter(|word| lowered.contains(*word)).count() as f32 / words.len() as f32
        };

        let token_coverage = if query_tokens.is_empty() {
            0.0
        } else {
            let document_tokens: BTreeSet<String> = tokenize(document).into_iter().collect();
            query_tokens.intersection(&document_tokens).count() as f32 / query_tokens.len() as f32
        };

        Self {
            exact_match: !query.is_empty() && lowered.contains(query),
            word_coverage,
            token_coverage,
            line_count: document.lines().count(),
        }
    }
}
