//! Text embedding for the semantic side of the index.
//!
//! The model itself is an external collaborator behind the [`Embedder`]
//! trait. [`EmbeddingOrchestrator`] adds batching, timeouts, bounded retries
//! and the E5-style `passage: ` / `query: ` prefixes.

pub mod embedder;
pub mod hashing;
pub mod orchestrator;

pub use embedder::{Embedder, FallbackEmbedder};
pub use hashing::HashingEmbedder;
pub use orchestrator::{EmbeddingOrchestrator, EmbeddingOutcome};
