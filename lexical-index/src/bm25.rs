use crate::error::{LexicalIndexError, Result};
use crate::tokenize::tokenize;
use log::debug;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

/// Dense per-build document identifier, shared with the vector index.
pub type DocId = u32;

/// Term-frequency saturation
pub const K1: f64 = 1.2;

/// Document-length normalization strength
pub const B: f64 = 0.75;

/// Okapi BM25 index over a fixed corpus.
///
/// The index is immutable once built; a changed corpus means a new build.
/// The serialized form is the `bm25-index.json` artifact.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bm25Index {
    document_frequency: BTreeMap<String, u32>,
    term_frequency: BTreeMap<DocId, BTreeMap<String, u32>>,
    document_length: BTreeMap<DocId, u32>,
    average_document_length: f64,
    document_count: u32,
}

impl Bm25Index {
    /// Build an index where the i-th text becomes docId `i`.
    pub fn build<I, S>(documents: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut index = Self::default();
        let mut total_length: u64 = 0;

        for (doc_id, text) in documents.into_iter().enumerate() {
            let doc_id = doc_id as DocId;
            let tokens = tokenize(text.as_ref());

            let mut frequencies: BTreeMap<String, u32> = BTreeMap::new();
            for token in tokens.iter() {
                *frequencies.entry(token.clone()).or_insert(0) += 1;
            }
            for term in frequencies.keys() {
                *index.document_frequency.entry(term.clone()).or_insert(0) += 1;
            }

            let length = tokens.len() as u32;
            total_length += u64::from(length);
            index.document_length.insert(doc_id, length);
            index.term_frequency.insert(doc_id, frequencies);
            index.document_count += 1;
        }

        if index.document_count > 0 {
            index.average_document_length = total_length as f64 / f64::from(index.document_count);
        }

        debug!(
            "Built BM25 index: {} documents, {} terms, avg length {:.1}",
            index.document_count,
            index.document_frequency.len(),
            index.average_document_length
        );
        index
    }

    pub fn document_count(&self) -> usize {
        self.document_count as usize
    }

    pub fn is_empty(&self) -> bool {
        self.document_count == 0
    }

    pub fn average_document_length(&self) -> f64 {
        self.average_document_length
    }

    /// Number of documents containing `term` (already tokenized form).
    pub fn document_frequency(&self, term: &str) -> u32 {
        self.document_frequency.get(term).copied().unwrap_or(0)
    }

    fn idf(&self, term: &str) -> f64 {
        let n = f64::from(self.document_count);
        let df = f64::from(self.document_frequency(term));
        ((n - df + 0.5) / (df + 0.5) + 1.0).ln()
    }

    fn score_terms(&self, doc_id: DocId, terms: &BTreeSet<String>) -> f64 {
        let Some(frequencies) = self.term_frequency.get(&doc_id) else {
            return 0.0;
        };
        let length = f64::from(self.document_length.get(&doc_id).copied().unwrap_or(0));
        let avg = if self.average_document_length > 0.0 {
            self.average_document_length
        } else {
            1.0
        };

        terms
            .iter()
            .filter_map(|term| frequencies.get(term).map(|tf| (term, f64::from(*tf))))
            .map(|(term, tf)| {
                let norm = K1 * (1.0 - B + B * length / avg);
                self.idf(term) * tf * (K1 + 1.0) / (tf + norm)
            })
            .sum()
    }

    /// BM25 score of one document for a free-text query.
    pub fn score(&self, doc_id: DocId, query: &str) -> f32 {
        let terms: BTreeSet<String> = tokenize(query).into_iter().collect();
        self.score_terms(doc_id, &terms) as f32
    }

    /// Every document with a positive score, best first, ties by docId.
    pub fn search_all(&self, query: &str) -> Vec<(DocId, f32)> {
        let terms: BTreeSet<String> = tokenize(query).into_iter().collect();
        if terms.is_empty() || self.is_empty() {
            return Vec::new();
        }

        let mut scored: Vec<(DocId, f32)> = self
            .term_frequency
            .iter()
            .filter(|(_, frequencies)| terms.iter().any(|t| frequencies.contains_key(t)))
            .map(|(doc_id, _)| (*doc_id, self.score_terms(*doc_id, &terms) as f32))
            .filter(|(_, score)| *score > 0.0)
            .collect();

        scored.sort_by(|a, b| match b.1.total_cmp(&a.1) {
            Ordering::Equal => a.0.cmp(&b.0),
            other => other,
        });
        scored
    }

    /// Top `limit` results of [`Bm25Index::search_all`].
    pub fn search(&self, query: &str, limit: usize) -> Vec<(DocId, f32)> {
        let mut results = self.search_all(query);
        results.truncate(limit);
        results
    }

    pub fn to_json(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Parse `bm25-index.json`, rejecting indices whose tables disagree.
    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        let index: Self = serde_json::from_slice(bytes)?;
        index.check_consistency()?;
        Ok(index)
    }

    fn check_consistency(&self) -> Result<()> {
        let count = self.document_count as usize;
        if self.term_frequency.len() != count || self.document_length.len() != count {
            return Err(LexicalIndexError::Inconsistent(format!(
                "documentCount {count} but {} termFrequency and {} documentLength entries",
                self.term_frequency.len(),
                self.document_length.len()
            )));
        }
        if let Some((doc_id, _)) = self
            .term_frequency
            .keys()
            .enumerate()
            .find(|(expected, doc_id)| **doc_id as usize != *expected)
        {
            return Err(LexicalIndexError::Inconsistent(format!(
                "docIds are not dense, gap before {doc_id}"
            )));
        }
        Ok(())
    }
}
