//! Semantic retrieval over chunk embeddings.
//!
//! The baseline is exact brute-force k-NN with cosine similarity computed as
//! a dot product of pre-normalized vectors.

pub mod index;
pub mod similarity;

pub use index::{SemanticHits, VectorIndex, VectorStats};
