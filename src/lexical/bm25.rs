//! Okapi BM25.
//!
//! `score(D, Q) = Σ IDF(t) · tf·(k1 + 1) / (tf + k1·(1 − b + b·|D|/avgdl))`
//! with `IDF(t) = ln((N − df + 0.5) / (df + 0.5) + 1)`.

use serde::{Deserialize, Serialize};

use crate::config::LexicalConfig;

/// BM25 parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bm25 {
    /// Term frequency saturation.
    pub k1: f32,
    /// Page length normalization.
    pub b: f32,
}

impl Default for Bm25 {
    fn default() -> Self {
        Bm25 { k1: 1.2, b: 0.75 }
    }
}

impl Bm25 {
    pub fn new(k1: f32, b: f32) -> Self {
        Bm25 { k1, b }
    }

    pub fn from_config(config: &LexicalConfig) -> Self {
        Bm25::new(config.k1, config.b)
    }

    /// Inverse document frequency. Always positive.
    pub fn idf(&self, total_pages: usize, doc_freq: usize) -> f32 {
        let n = total_pages as f32;
        let df = doc_freq as f32;
        ((n - df + 0.5) / (df + 0.5) + 1.0).ln()
    }

    /// Saturated, length-normalized term frequency.
    pub fn tf_norm(&self, term_freq: f32, page_length: f32, avg_page_length: f32) -> f32 {
        if term_freq <= 0.0 {
            return 0.0;
        }
        let length_ratio = if avg_page_length > 0.0 {
            page_length / avg_page_length
        } else {
            1.0
        };
        let denom = term_freq + self.k1 * (1.0 - self.b + self.b * length_ratio);
        term_freq * (self.k1 + 1.0) / denom
    }

    /// Contribution of one term to one page.
    pub fn term_score(&self, idf: f32, term_freq: f32, page_length: f32, avg_page_length: f32) -> f32 {
        idf * self.tf_norm(term_freq, page_length, avg_page_length)
    }
}
