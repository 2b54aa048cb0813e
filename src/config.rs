//! Engine configuration.
//!
//! [`FolioConfig`] groups one section per component. Every section has
//! defaults, so a JSON file only needs the keys it wants to override:
//!
//! ```
//! use folio::config::FolioConfig;
//!
//! let config = FolioConfig::from_json(r#"{ "chunking": { "max_chunk_chars": 800 } }"#).unwrap();
//! assert_eq!(config.chunking.max_chunk_chars, 800);
//! assert_eq!(config.chunking.chunk_overlap_chars, 200);
//! ```

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::analysis::FoldingPolicy;
use crate::error::{FolioError, Result};
use crate::search::types::SearchMode;

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FolioConfig {
    pub lexical: LexicalConfig,
    pub chunking: ChunkingConfig,
    pub embedding: EmbeddingConfig,
    pub hybrid: HybridConfig,
    pub search: SearchConfig,
    pub indexing: IndexingConfig,
}

/// Tokenizer and BM25 settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LexicalConfig {
    /// BM25 term-frequency saturation.
    pub k1: f32,
    /// BM25 length normalization.
    pub b: f32,
    /// Accent folding applied to both indexed text and query terms.
    pub folding: FoldingPolicy,
    /// Terms dropped after normalization.
    pub stop_words: Vec<String>,
}

impl Default for LexicalConfig {
    fn default() -> Self {
        Self {
            k1: 1.2,
            b: 0.75,
            folding: FoldingPolicy::Diacritics,
            stop_words: Vec::new(),
        }
    }
}

/// Chunking settings for the semantic side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    pub max_chunk_chars: usize,
    pub chunk_overlap_chars: usize,
    /// How far back from a window edge to look for whitespace to cut on.
    pub boundary_lookback_chars: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_chunk_chars: 1000,
            chunk_overlap_chars: 200,
            boundary_lookback_chars: 100,
        }
    }
}

/// Embedding collaborator settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub enabled: bool,
    pub dimension: usize,
    pub batch_size: usize,
    /// Attempts per batch, including the first one.
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub timeout_ms: u64,
    pub passage_prefix: String,
    pub query_prefix: String,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dimension: 1024,
            batch_size: 32,
            max_attempts: 2,
            initial_backoff_ms: 200,
            timeout_ms: 30_000,
            passage_prefix: "passage: ".to_string(),
            query_prefix: "query: ".to_string(),
        }
    }
}

impl EmbeddingConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn initial_backoff(&self) -> Duration {
        Duration::from_millis(self.initial_backoff_ms)
    }
}

/// Rank fusion settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HybridConfig {
    pub rrf_k: f32,
    pub lexical_weight: f32,
    pub semantic_weight: f32,
    pub default_mode: SearchMode,
    /// Candidates fetched per source = max(window * multiplier, min_candidates).
    pub candidate_multiplier: usize,
    pub min_candidates: usize,
}

impl Default for HybridConfig {
    fn default() -> Self {
        Self {
            rrf_k: 60.0,
            lexical_weight: 1.0,
            semantic_weight: 1.0,
            default_mode: SearchMode::Hybrid,
            candidate_multiplier: 5,
            min_candidates: 100,
        }
    }
}

/// Query surface settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub default_limit: usize,
    pub max_limit: usize,
    pub snippet_chars: usize,
    pub highlight_open: String,
    pub highlight_close: String,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_limit: 50,
            max_limit: 500,
            snippet_chars: 150,
            highlight_open: "<mark>".to_string(),
            highlight_close: "</mark>".to_string(),
        }
    }
}

/// Batch indexing settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexingConfig {
    /// Documents processed concurrently. 0 means one per CPU.
    pub workers: usize,
    pub skip_unchanged: bool,
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            workers: 0,
            skip_unchanged: true,
        }
    }
}

impl IndexingConfig {
    pub fn effective_workers(&self) -> usize {
        if self.workers == 0 {
            num_cpus::get().max(1)
        } else {
            self.workers
        }
    }
}

impl FolioConfig {
    /// Parse a configuration from a JSON string and validate it.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: FolioConfig = serde_json::from_str(json)
            .map_err(|e| FolioError::configuration(format!("invalid JSON: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration file and validate it.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).map_err(|e| {
            FolioError::configuration(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_json(&json)
    }

    /// Check cross-field invariants. Called before any indexing work begins.
    pub fn validate(&self) -> Result<()> {
        let lexical = &self.lexical;
        if !(lexical.k1.is_finite() && lexical.k1 >= 0.0) {
            return Err(FolioError::configuration("lexical.k1 must be >= 0"));
        }
        if !(0.0..=1.0).contains(&lexical.b) {
            return Err(FolioError::configuration("lexical.b must be within [0, 1]"));
        }

        let chunking = &self.chunking;
        if chunking.max_chunk_chars == 0 {
            return Err(FolioError::configuration(
                "chunking.max_chunk_chars must be positive",
            ));
        }
        if chunking.chunk_overlap_chars >= chunking.max_chunk_chars {
            return Err(FolioError::configuration(format!(
                "chunking.chunk_overlap_chars ({}) must be smaller than max_chunk_chars ({})",
                chunking.chunk_overlap_chars, chunking.max_chunk_chars
            )));
        }
        if chunking.boundary_lookback_chars
            >= chunking.max_chunk_chars - chunking.chunk_overlap_chars
        {
            return Err(FolioError::configuration(
                "chunking.boundary_lookback_chars must be smaller than the chunk stride",
            ));
        }

        let embedding = &self.embedding;
        if embedding.dimension == 0 {
            return Err(FolioError::configuration("embedding.dimension must be positive"));
        }
        if embedding.batch_size == 0 {
            return Err(FolioError::configuration("embedding.batch_size must be positive"));
        }
        if embedding.max_attempts == 0 {
            return Err(FolioError::configuration("embedding.max_attempts must be >= 1"));
        }

        let hybrid = &self.hybrid;
        if !(hybrid.rrf_k.is_finite() && hybrid.rrf_k > 0.0) {
            return Err(FolioError::configuration("hybrid.rrf_k must be positive"));
        }
        for (name, weight) in [
            ("lexical_weight", hybrid.lexical_weight),
            ("semantic_weight", hybrid.semantic_weight),
        ] {
            if !(weight.is_finite() && weight >= 0.0) {
                return Err(FolioError::configuration(format!(
                    "hybrid.{name} must be a non-negative number"
                )));
            }
        }

        let search = &self.search;
        if search.default_limit == 0 || search.max_limit == 0 {
            return Err(FolioError::configuration("search limits must be positive"));
        }
        if search.default_limit > search.max_limit {
            return Err(FolioError::configuration(
                "search.default_limit must not exceed search.max_limit",
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = FolioConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.lexical.k1, 1.2);
        assert_eq!(config.lexical.b, 0.75);
        assert_eq!(config.hybrid.rrf_k, 60.0);
        assert_eq!(config.hybrid.default_mode, SearchMode::Hybrid);
    }

    #[test]
    fn test_overlap_must_be_smaller_than_max() {
        let mut config = FolioConfig::default();
        config.chunking.chunk_overlap_chars = config.chunking.max_chunk_chars;

        match config.validate() {
            Err(FolioError::Configuration(msg)) => assert!(msg.contains("chunk_overlap_chars")),
            other => panic!("expected configuration error, got {other:?}"),
        }
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = FolioConfig::from_json(
            r#"{ "hybrid": { "rrf_k": 10.0, "default_mode": "lexical" }, "lexical": { "folding": "none" } }"#,
        )
        .unwrap();

        assert_eq!(config.hybrid.rrf_k, 10.0);
        assert_eq!(config.hybrid.default_mode, SearchMode::Lexical);
        assert_eq!(config.hybrid.lexical_weight, 1.0);
        assert_eq!(config.lexical.folding, FoldingPolicy::None);
        assert_eq!(config.search.snippet_chars, 150);
    }

    #[test]
    fn test_invalid_json_is_configuration_error() {
        let result = FolioConfig::from_json("{ not json");
        assert!(matches!(result, Err(FolioError::Configuration(_))));
    }

    #[test]
    fn test_negative_weight_rejected() {
        let mut config = FolioConfig::default();
        config.hybrid.semantic_weight = -1.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_effective_workers() {
        let mut indexing = IndexingConfig::default();
        assert!(indexing.effective_workers() >= 1);
        indexing.workers = 3;
        assert_eq!(indexing.effective_workers(), 3);
    }
}
