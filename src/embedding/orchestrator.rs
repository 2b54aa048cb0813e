//! Batching, retry and timeout around an [`Embedder`].
//!
//! Chunks are sent in batches of `batch_size`. A batch that fails or times out
//! is retried with exponential backoff up to `max_attempts` attempts in total;
//! if it still fails, every chunk of that batch is reported as failed. A batch
//! is never partially embedded.
//!
//! Nothing here writes to an index: callers receive the finished vectors and
//! apply them afterwards, so dropping an embedding future midway leaves the
//! indexes untouched.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::chunking::{Chunk, ChunkKey};
use crate::config::EmbeddingConfig;
use crate::embedding::embedder::Embedder;
use crate::error::{FolioError, Result};

/// Vectors produced for a set of chunks, and the chunks that could not be
/// embedded.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EmbeddingOutcome {
    pub vectors: BTreeMap<ChunkKey, Vec<f32>>,
    pub failed: BTreeSet<ChunkKey>,
}

impl EmbeddingOutcome {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Drives an embedder with the configured batching and failure policy.
#[derive(Debug, Clone)]
pub struct EmbeddingOrchestrator {
    embedder: Arc<dyn Embedder>,
    config: EmbeddingConfig,
}

impl EmbeddingOrchestrator {
    /// Fails if the embedder's dimension differs from the configured one.
    pub fn new(embedder: Arc<dyn Embedder>, config: EmbeddingConfig) -> Result<Self> {
        if embedder.dimension() != config.dimension {
            return Err(FolioError::configuration(format!(
                "embedder '{}' produces {} dimensions, configuration expects {}",
                embedder.name(),
                embedder.dimension(),
                config.dimension
            )));
        }
        Ok(EmbeddingOrchestrator { embedder, config })
    }

    pub fn dimension(&self) -> usize {
        self.config.dimension
    }

    pub fn config(&self) -> &EmbeddingConfig {
        &self.config
    }

    /// Embed passages. Failures are reported per chunk, never as an error.
    pub async fn embed_chunks(&self, chunks: &[Chunk]) -> EmbeddingOutcome {
        let mut outcome = EmbeddingOutcome::default();
        let batch_count = chunks.len().div_ceil(self.config.batch_size);

        for (batch_idx, batch) in chunks.chunks(self.config.batch_size).enumerate() {
            let texts: Vec<String> = batch
                .iter()
                .map(|c| format!("{}{}", self.config.passage_prefix, c.text))
                .collect();

            match self.call_with_retry(&texts).await {
                Ok(vectors) => {
                    for (chunk, vector) in batch.iter().zip(vectors) {
                        outcome.vectors.insert(chunk.key.clone(), vector);
                    }
                    debug!(batch = batch_idx + 1, batches = batch_count, size = batch.len(), "embedded batch");
                }
                Err(e) => {
                    warn!(
                        batch = batch_idx + 1,
                        batches = batch_count,
                        size = batch.len(),
                        error = %e,
                        "embedding batch failed, chunks left without vectors"
                    );
                    outcome.failed.extend(batch.iter().map(|c| c.key.clone()));
                }
            }
        }

        outcome
    }

    /// Embed a query string with the query prefix.
    pub async fn embed_query(&self, query: &str) -> Result<Vec<f32>> {
        let texts = vec![format!("{}{}", self.config.query_prefix, query)];
        let mut vectors = self.call_with_retry(&texts).await?;
        vectors
            .pop()
            .ok_or_else(|| FolioError::embedding_unavailable("embedder returned no vector for the query"))
    }

    async fn call_with_retry(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let attempts = self.config.max_attempts.max(1);
        let mut backoff = self.config.initial_backoff();
        let mut last_error = FolioError::embedding_unavailable("no attempt made");

        for attempt in 1..=attempts {
            match tokio::time::timeout(self.config.timeout(), self.embedder.embed(texts)).await {
                Ok(Ok(vectors)) => return self.check_vectors(texts.len(), vectors),
                Ok(Err(e)) => last_error = e,
                Err(_) => {
                    last_error = FolioError::embedding_unavailable(format!(
                        "embedding call timed out after {} ms",
                        self.config.timeout_ms
                    ))
                }
            }

            if attempt < attempts {
                debug!(attempt, backoff_ms = backoff.as_millis() as u64, error = %last_error, "retrying embedding call");
                tokio::time::sleep(backoff).await;
                backoff = backoff.saturating_mul(2).min(Duration::from_secs(60));
            }
        }

        Err(match last_error {
            e @ FolioError::EmbeddingUnavailable(_) => e,
            other => FolioError::embedding_unavailable(other.to_string()),
        })
    }

    fn check_vectors(&self, expected: usize, vectors: Vec<Vec<f32>>) -> Result<Vec<Vec<f32>>> {
        if vectors.len() != expected {
            return Err(FolioError::embedding_unavailable(format!(
                "embedder returned {} vectors for {} texts",
                vectors.len(),
                expected
            )));
        }
        if let Some(bad) = vectors.iter().find(|v| v.len() != self.config.dimension) {
            return Err(FolioError::embedding_unavailable(format!(
                "embedder returned a {}-dimensional vector, expected {}",
                bad.len(),
                self.config.dimension
            )));
        }
        Ok(vectors)
    }
}
