use codeindex_vector_store::DocId;
use log::debug;
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

/// Reciprocal Rank Fusion over any number of ranked lists.
///
/// ```text
/// fused(d) = Σ_lists 1 / (k + rank(d) + 1)
/// ```
///
/// Ranks are 0-based; a document missing from a list contributes nothing for
/// it. Only ranks matter, so channels with unrelated score scales (cosine,
/// BM25) can be fused without normalization.
#[derive(Debug, Clone, Copy)]
pub struct FusionEngine {
    k: f32,
}

impl FusionEngine {
    pub fn new(k: f32) -> Self {
        Self { k }
    }

    pub fn k(&self) -> f32 {
        self.k
    }

    /// Fused `(docId, score)` for every document in at least one list, best
    /// first, ties by docId.
    ///
    /// A docId repeated within one list only counts at its best rank.
    pub fn fuse(&self, lists: &[&[(DocId, f32)]]) -> Vec<(DocId, f32)> {
        let mut scores: BTreeMap<DocId, f32> = BTreeMap::new();

        for list in lists {
            let mut seen = BTreeSet::new();
            for (rank, (doc_id, _)) in list.iter().enumerate() {
                if !seen.insert(*doc_id) {
                    continue;
                }
                *scores.entry(*doc_id).or_insert(0.0) += 1.0 / (self.k + rank as f32 + 1.0);
            }
        }

        let mut fused: Vec<(DocId, f32)> = scores.into_iter().collect();
        fused.sort_by(|a, b| match b.1.total_cmp(&a.1) {
            Ordering::Equal => a.0.cmp(&b.0),
            other => other,
        });

        debug!(
            "RRF fused {} lists into {} documents",
            lists.len(),
            fused.len()
        );
        fused
    }
}
