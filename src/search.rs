//! Query-time retrieval: ranked lists, rank fusion, snippets and the
//! [`HybridSearchEngine`] that ties them together.

pub mod engine;
pub mod fusion;
pub mod snippet;
pub mod types;

pub use engine::HybridSearchEngine;
pub use fusion::{FusedEntry, RrfFusion};
pub use snippet::SnippetBuilder;
pub use types::{
    FusionWeights, RankedEntry, RankedList, Score, SearchMode, SearchRequest, SearchResponse,
    SearchResult, SearchStats, Source,
};
