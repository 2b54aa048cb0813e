//! The embedding collaborator interface.
//!
//! An [`Embedder`] turns a batch of texts into vectors of a fixed dimension,
//! in input order, or fails as a whole. Real implementations wrap a model
//! server; the crate itself ships [`FallbackEmbedder`] to chain backends and
//! [`HashingEmbedder`](crate::embedding::HashingEmbedder) for offline use.
//!
//! # Custom implementation
//!
//! ```
//! use async_trait::async_trait;
//! use folio::embedding::Embedder;
//! use folio::error::Result;
//!
//! #[derive(Debug)]
//! struct ConstantEmbedder;
//!
//! #[async_trait]
//! impl Embedder for ConstantEmbedder {
//!     async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
//!         Ok(texts.iter().map(|_| vec![1.0, 0.0]).collect())
//!     }
//!
//!     fn dimension(&self) -> usize {
//!         2
//!     }
//! }
//! ```

use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use crate::error::{FolioError, Result};

/// Batch text embedding.
#[async_trait]
pub trait Embedder: Send + Sync + Debug {
    /// Embed a batch of texts.
    ///
    /// On success the output has one vector per input, in input order.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Dimension of every produced vector.
    fn dimension(&self) -> usize;

    /// Identifier used in logs.
    fn name(&self) -> &str {
        "unknown"
    }
}

/// Tries embedders in a fixed order and returns the first success.
///
/// All embedders must share one dimension, otherwise vectors from different
/// backends would not be comparable.
#[derive(Debug, Clone)]
pub struct FallbackEmbedder {
    embedders: Vec<Arc<dyn Embedder>>,
}

impl FallbackEmbedder {
    /// Build a chain from a primary embedder and its fallbacks, in order.
    pub fn new(embedders: Vec<Arc<dyn Embedder>>) -> Result<Self> {
        let Some(first) = embedders.first() else {
            return Err(FolioError::configuration("fallback embedder needs at least one backend"));
        };
        let dimension = first.dimension();
        if let Some(other) = embedders.iter().find(|e| e.dimension() != dimension) {
            return Err(FolioError::configuration(format!(
                "embedder '{}' has dimension {} but '{}' has {}",
                other.name(),
                other.dimension(),
                first.name(),
                dimension
            )));
        }
        Ok(FallbackEmbedder { embedders })
    }

    pub fn len(&self) -> usize {
        self.embedders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.embedders.is_empty()
    }
}

#[async_trait]
impl Embedder for FallbackEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut last_error = None;
        for embedder in &self.embedders {
            match embedder.embed(texts).await {
                Ok(vectors) => return Ok(vectors),
                Err(e) => {
                    warn!(embedder = embedder.name(), error = %e, "embedding backend failed, trying next");
                    last_error = Some(e);
                }
            }
        }
        Err(last_error.unwrap_or_else(|| FolioError::embedding_unavailable("no embedding backend configured")))
    }

    fn dimension(&self) -> usize {
        self.embedders.first().map_or(0, |e| e.dimension())
    }

    fn name(&self) -> &str {
        "fallback"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug)]
    struct Fixed {
        value: f32,
        dimension: usize,
    }

    #[async_trait]
    impl Embedder for Fixed {
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|_| vec![self.value; self.dimension]).collect())
        }

        fn dimension(&self) -> usize {
            self.dimension
        }
    }

    #[derive(Debug, Default)]
    struct Down {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Embedder for Down {
        async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(FolioError::embedding_unavailable("connection refused"))
        }

        fn dimension(&self) -> usize {
            2
        }
    }

    #[tokio::test]
    async fn test_fallback_uses_next_backend() {
        let primary = Arc::new(Down::default());
        let backends: Vec<Arc<dyn Embedder>> = vec![
            primary.clone(),
            Arc::new(Fixed { value: 0.5, dimension: 2 }),
        ];
        let chain = FallbackEmbedder::new(backends).unwrap();

        let vectors = chain.embed(&["a".to_string()]).await.unwrap();
        assert_eq!(vectors, vec![vec![0.5, 0.5]]);
        assert_eq!(primary.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_fallback_reports_last_error() {
        let backends: Vec<Arc<dyn Embedder>> = vec![Arc::new(Down::default()), Arc::new(Down::default())];
        let chain = FallbackEmbedder::new(backends).unwrap();
        let err = chain.embed(&["a".to_string()]).await.unwrap_err();
        assert!(matches!(err, FolioError::EmbeddingUnavailable(_)));
    }

    #[test]
    fn test_fallback_rejects_mixed_dimensions() {
        let backends: Vec<Arc<dyn Embedder>> = vec![
            Arc::new(Fixed { value: 1.0, dimension: 2 }),
            Arc::new(Fixed { value: 1.0, dimension: 3 }),
        ];
        let result = FallbackEmbedder::new(backends);
        assert!(matches!(result, Err(FolioError::Configuration(_))));
        assert!(FallbackEmbedder::new(Vec::new()).is_err());
    }
}
