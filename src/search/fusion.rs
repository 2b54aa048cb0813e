//! Reciprocal Rank Fusion.
//!
//! `fused(k) = Σ_i weight_i / (rrf_k + rank_i(k))` over the lists `k` appears
//! in. Only ranks matter, so BM25 scores and cosine similarities never need to
//! share a scale. A missing list (semantic side unavailable) contributes
//! nothing, which makes lexical-only fusion the degraded mode.

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

use crate::config::HybridConfig;
use crate::document::PageKey;
use crate::search::types::{FusionWeights, RankedList, Source, compare_scored};

/// One fused candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusedEntry {
    pub key: PageKey,
    pub score: f32,
    pub source: Source,
    pub lexical_rank: Option<usize>,
    pub semantic_rank: Option<usize>,
    pub lexical_score: Option<f32>,
    pub similarity: Option<f32>,
}

/// RRF parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RrfFusion {
    rrf_k: f32,
    weights: FusionWeights,
}

impl RrfFusion {
    pub fn new(rrf_k: f32, weights: FusionWeights) -> Self {
        RrfFusion { rrf_k, weights }
    }

    pub fn from_config(config: &HybridConfig) -> Self {
        Self::new(
            config.rrf_k,
            FusionWeights::new(config.lexical_weight, config.semantic_weight),
        )
    }

    pub fn with_weights(mut self, weights: FusionWeights) -> Self {
        self.weights = weights;
        self
    }

    pub fn rrf_k(&self) -> f32 {
        self.rrf_k
    }

    pub fn weights(&self) -> FusionWeights {
        self.weights
    }

    /// RRF term of one list at a 1-based rank.
    pub fn contribution(&self, weight: f32, rank: usize) -> f32 {
        weight / (self.rrf_k + rank as f32)
    }

    /// Merge two ranked lists, deduplicating by page key.
    ///
    /// The result is ordered by fused score descending, ties by key ascending.
    pub fn fuse(&self, lexical: Option<&RankedList>, semantic: Option<&RankedList>) -> Vec<FusedEntry> {
        let mut fused: AHashMap<PageKey, FusedEntry> = AHashMap::new();

        if let Some(list) = lexical {
            for entry in list.iter() {
                let contribution = self.contribution(self.weights.lexical, entry.rank);
                fused.insert(
                    entry.key.clone(),
                    FusedEntry {
                        key: entry.key.clone(),
                        score: contribution,
                        source: Source::Lexical,
                        lexical_rank: Some(entry.rank),
                        semantic_rank: None,
                        lexical_score: Some(entry.score),
                        similarity: None,
                    },
                );
            }
        }

        if let Some(list) = semantic {
            for entry in list.iter() {
                let contribution = self.contribution(self.weights.semantic, entry.rank);
                fused
                    .entry(entry.key.clone())
                    .and_modify(|existing| {
                        existing.score += contribution;
                        existing.source = Source::Both;
                        existing.semantic_rank = Some(entry.rank);
                        existing.similarity = Some(entry.score);
                    })
                    .or_insert_with(|| FusedEntry {
                        key: entry.key.clone(),
                        score: contribution,
                        source: Source::Semantic,
                        lexical_rank: None,
                        semantic_rank: Some(entry.rank),
                        lexical_score: None,
                        similarity: Some(entry.score),
                    });
            }
        }

        let mut entries: Vec<FusedEntry> = fused.into_values().collect();
        entries.sort_by(|a, b| compare_scored(&a.key, a.score, &b.key, b.score));
        entries
    }
}

impl Default for RrfFusion {
    fn default() -> Self {
        RrfFusion::from_config(&HybridConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::types::RankedEntry;

    fn list(keys: &[&str]) -> RankedList {
        RankedList {
            entries: keys
                .iter()
                .enumerate()
                .map(|(i, k)| RankedEntry {
                    key: PageKey::new(*k, 1),
                    rank: i + 1,
                    score: 10.0 - i as f32,
                })
                .collect(),
            total_hits: keys.len(),
        }
    }

    fn order(entries: &[FusedEntry]) -> Vec<&str> {
        entries.iter().map(|e| e.key.doc_id.as_str()).collect()
    }

    #[test]
    fn test_rrf_example() {
        let fusion = RrfFusion::default();
        let lexical = list(&["A", "B", "C"]);
        let semantic = list(&["B", "D"]);
        let fused = fusion.fuse(Some(&lexical), Some(&semantic));

        assert_eq!(order(&fused), vec!["B", "A", "D", "C"]);
        let b = &fused[0];
        assert!((b.score - (1.0 / 61.0 + 1.0 / 62.0)).abs() < 1e-7);
        assert_eq!(b.source, Source::Both);
        assert_eq!(b.lexical_rank, Some(2));
        assert_eq!(b.semantic_rank, Some(1));
        assert!((fused[1].score - 1.0 / 61.0).abs() < 1e-7);
        assert_eq!(fused[1].source, Source::Lexical);
        assert_eq!(fused[2].source, Source::Semantic);
    }

    #[test]
    fn test_lexical_only_degraded_mode() {
        let fusion = RrfFusion::default();
        let lexical = list(&["A", "B"]);
        let fused = fusion.fuse(Some(&lexical), None);

        assert_eq!(order(&fused), vec!["A", "B"]);
        assert!((fused[0].score - 1.0 / 61.0).abs() < 1e-7);
        assert!(fused.iter().all(|e| e.source == Source::Lexical));
    }

    #[test]
    fn test_ties_break_by_key() {
        let fusion = RrfFusion::default();
        let lexical = list(&["B", "A"]);
        let semantic = list(&["A", "B"]);
        let fused = fusion.fuse(Some(&lexical), Some(&semantic));
        assert_eq!(order(&fused), vec!["A", "B"]);
    }

    #[test]
    fn test_weights() {
        let fusion = RrfFusion::default().with_weights(FusionWeights::new(0.0, 1.0));
        let lexical = list(&["A"]);
        let semantic = list(&["B"]);
        let fused = fusion.fuse(Some(&lexical), Some(&semantic));
        assert_eq!(order(&fused), vec!["B", "A"]);
        assert_eq!(fused[1].score, 0.0);
    }

    #[test]
    fn test_empty_inputs() {
        assert!(RrfFusion::default().fuse(None, None).is_empty());
    }
}
