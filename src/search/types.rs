//! Types shared by the retrieval strategies and the hybrid engine.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::document::PageKey;
use crate::error::{FolioError, Result};

/// Which retrieval strategies a search uses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    /// BM25 over the inverted index only.
    Lexical,
    /// Vector similarity only.
    Semantic,
    /// Both, merged with reciprocal rank fusion.
    #[default]
    Hybrid,
}

impl fmt::Display for SearchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SearchMode::Lexical => "lexical",
            SearchMode::Semantic => "semantic",
            SearchMode::Hybrid => "hybrid",
        };
        f.write_str(name)
    }
}

impl FromStr for SearchMode {
    type Err = FolioError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lexical" => Ok(SearchMode::Lexical),
            "semantic" => Ok(SearchMode::Semantic),
            "hybrid" => Ok(SearchMode::Hybrid),
            other => Err(FolioError::invalid_argument(format!("unknown search mode '{other}'"))),
        }
    }
}

/// Which ranked lists a result appeared in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Lexical,
    Semantic,
    Both,
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Source::Lexical => "lexical",
            Source::Semantic => "semantic",
            Source::Both => "both",
        };
        f.write_str(name)
    }
}

/// One entry of a [`RankedList`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedEntry {
    pub key: PageKey,
    /// 1-based position in the full ranking, independent of pagination.
    pub rank: usize,
    /// Strategy-specific raw score (BM25, cosine similarity, fused score).
    pub score: f32,
}

/// Ordered output of one retrieval strategy.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RankedList {
    pub entries: Vec<RankedEntry>,
    /// Number of keys that matched before pagination.
    pub total_hits: usize,
}

impl RankedList {
    /// An empty list.
    pub fn empty() -> Self {
        RankedList::default()
    }

    /// Rank scored keys by score descending, ties by key ascending, and keep
    /// the window `[offset, offset + limit)`.
    pub fn from_scored(mut scored: Vec<(PageKey, f32)>, limit: usize, offset: usize) -> Self {
        let total_hits = scored.len();
        scored.sort_by(|a, b| compare_scored(&a.0, a.1, &b.0, b.1));

        let entries = scored
            .into_iter()
            .enumerate()
            .skip(offset)
            .take(limit)
            .map(|(i, (key, score))| RankedEntry {
                key,
                rank: i + 1,
                score,
            })
            .collect();

        RankedList { entries, total_hits }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, RankedEntry> {
        self.entries.iter()
    }

    /// Find the entry for a key.
    pub fn get(&self, key: &PageKey) -> Option<&RankedEntry> {
        self.entries.iter().find(|e| &e.key == key)
    }
}

/// Descending score, then ascending key.
pub(crate) fn compare_scored(a_key: &PageKey, a_score: f32, b_key: &PageKey, b_score: f32) -> Ordering {
    b_score.total_cmp(&a_score).then_with(|| a_key.cmp(b_key))
}

/// Per-source RRF weights.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FusionWeights {
    pub lexical: f32,
    pub semantic: f32,
}

impl Default for FusionWeights {
    fn default() -> Self {
        FusionWeights {
            lexical: 1.0,
            semantic: 1.0,
        }
    }
}

impl FusionWeights {
    pub fn new(lexical: f32, semantic: f32) -> Self {
        FusionWeights { lexical, semantic }
    }

    pub fn validate(&self) -> Result<()> {
        for (name, w) in [("lexical", self.lexical), ("semantic", self.semantic)] {
            if !w.is_finite() || w < 0.0 {
                return Err(FolioError::invalid_argument(format!(
                    "{name} weight must be a finite non-negative number, got {w}"
                )));
            }
        }
        Ok(())
    }
}

/// Unified score of a result.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Score {
    /// Fused RRF score in hybrid mode, BM25 in lexical mode, similarity in
    /// semantic mode.
    pub raw: f32,
    /// `raw` divided by the best raw score of the query, in `[0, 1]`.
    pub normalized: f32,
    pub source: Source,
}

/// A search request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    /// Defaults to `hybrid.default_mode`.
    pub mode: Option<SearchMode>,
    /// Defaults to `search.default_limit`, clamped to `search.max_limit`.
    pub limit: Option<usize>,
    pub offset: usize,
    /// Overrides the configured fusion weights.
    pub weights: Option<FusionWeights>,
}

impl SearchRequest {
    pub fn new<S: Into<String>>(query: S) -> Self {
        SearchRequest {
            query: query.into(),
            mode: None,
            limit: None,
            offset: 0,
            weights: None,
        }
    }

    pub fn with_mode(mut self, mode: SearchMode) -> Self {
        self.mode = Some(mode);
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    pub fn with_weights(mut self, weights: FusionWeights) -> Self {
        self.weights = Some(weights);
        self
    }
}

/// One page of the answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub key: PageKey,
    pub score: Score,
    /// Absolute rank in the lexical candidate list.
    pub lexical_rank: Option<usize>,
    /// Absolute rank in the semantic candidate list.
    pub semantic_rank: Option<usize>,
    /// BM25 score, when the page matched lexically.
    pub lexical_score: Option<f32>,
    /// Cosine similarity of the best chunk, when the page matched semantically.
    pub similarity: Option<f32>,
    /// Highlighted excerpt.
    pub snippet: String,
}

/// Per-query statistics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchStats {
    pub query: String,
    pub mode: SearchMode,
    /// Matches before pagination.
    pub total_results: usize,
    pub lexical_candidates: usize,
    pub semantic_candidates: usize,
    /// Pages present in both candidate lists.
    pub overlap_count: usize,
    pub semantic_available: bool,
    pub parse_ms: f64,
    pub lexical_ms: f64,
    pub semantic_ms: f64,
    pub fusion_ms: f64,
    pub snippet_ms: f64,
    pub total_ms: f64,
    /// 1-based page number of this result window.
    pub page: usize,
    pub total_pages: usize,
    pub warnings: Vec<String>,
}

/// Results and statistics of one search.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    pub results: Vec<SearchResult>,
    pub stats: SearchStats,
}

impl SearchResponse {
    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}
