//! Feature-hashing embedder that needs no model.
//!
//! Every analyzed term is hashed with CRC-32 into one of `dimension` buckets
//! with a sign taken from the hash, giving a bag-of-words vector. Similarity
//! between such vectors approximates term overlap, which is enough for tests,
//! benchmarks and offline use of the semantic code path.

use async_trait::async_trait;

use crate::analysis::Analyzer;
use crate::embedding::embedder::Embedder;
use crate::error::{FolioError, Result};

/// Deterministic bag-of-words embedder.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimension: usize,
    analyzer: Analyzer,
}

impl HashingEmbedder {
    pub fn new(dimension: usize) -> Result<Self> {
        Self::with_analyzer(dimension, Analyzer::default())
    }

    pub fn with_analyzer(dimension: usize, analyzer: Analyzer) -> Result<Self> {
        if dimension == 0 {
            return Err(FolioError::configuration("hashing embedder dimension must be positive"));
        }
        Ok(HashingEmbedder { dimension, analyzer })
    }

    /// Embed one text synchronously.
    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0; self.dimension];
        let terms = self.analyzer.terms(text);

        if terms.is_empty() {
            // Texts without terms still get a non-zero, text-specific vector.
            let hash = crc32fast::hash(text.as_bytes());
            vector[hash as usize % self.dimension] = 1.0;
            return vector;
        }

        for term in terms {
            let hash = crc32fast::hash(term.as_bytes());
            let bucket = (hash >> 1) as usize % self.dimension;
            let sign = if hash & 1 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }

        if vector.iter().all(|v| *v == 0.0) {
            vector[0] = 1.0;
        }
        vector
    }
}

#[async_trait]
impl Embedder for HashingEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        "hashing"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cosine(a: &[f32], b: &[f32]) -> f32 {
        let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
        let na: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        let nb: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
        dot / (na * nb)
    }

    #[test]
    fn test_deterministic_and_non_zero() {
        let embedder = HashingEmbedder::new(64).unwrap();
        assert_eq!(embedder.embed_text("civil aviation"), embedder.embed_text("civil aviation"));
        assert!(embedder.embed_text("...").iter().any(|v| *v != 0.0));
        assert!(embedder.embed_text("").iter().any(|v| *v != 0.0));
    }

    #[test]
    fn test_overlap_increases_similarity() {
        let embedder = HashingEmbedder::new(256).unwrap();
        let query = embedder.embed_text("aircraft maintenance");
        let close = embedder.embed_text("maintenance of aircraft engines");
        let far = embedder.embed_text("maritime shipping law");
        assert!(cosine(&query, &close) > cosine(&query, &far));
    }

    #[tokio::test]
    async fn test_batch_preserves_order() {
        let embedder = HashingEmbedder::new(32).unwrap();
        let texts = vec!["alpha".to_string(), "beta".to_string()];
        let vectors = embedder.embed(&texts).await.unwrap();
        assert_eq!(vectors.len(), 2);
        assert_eq!(vectors[0], embedder.embed_text("alpha"));
        assert_eq!(vectors[1], embedder.embed_text("beta"));
    }

    #[test]
    fn test_zero_dimension_rejected() {
        assert!(HashingEmbedder::new(0).is_err());
    }
}
