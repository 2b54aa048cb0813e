//! # Folio
//!
//! Hybrid lexical and semantic retrieval over the pages of extracted documents.
//!
//! ## Features
//!
//! - BM25 page index with boolean, phrase and prefix queries
//! - Overlapping chunking and batched embedding with retry and timeouts
//! - Brute-force cosine similarity over normalized chunk vectors
//! - Reciprocal rank fusion of both rankings with explainable scores
//! - Incremental indexing keyed by content hash, with atomic per-document updates
//! - Pluggable storage and text extraction backends
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use folio::config::FolioConfig;
//! use folio::embedding::HashingEmbedder;
//! use folio::indexer::IncrementalIndexer;
//! use folio::search::SearchRequest;
//! use folio::storage::MemoryStorage;
//!
//! # async fn run() -> folio::error::Result<()> {
//! let config = FolioConfig::default();
//! let embedder = Arc::new(HashingEmbedder::new(config.embedding.dimension)?);
//! let indexer = IncrementalIndexer::open(config, Arc::new(MemoryStorage::new()))?
//!     .with_embedder(embedder)?;
//!
//! indexer
//!     .index_document("manual", vec![(1, "Engine maintenance schedule".to_string())], None)
//!     .await?;
//!
//! let response = indexer
//!     .search_engine()?
//!     .search(SearchRequest::new("engine maintenance"))
//!     .await?;
//! assert_eq!(response.results[0].key.doc_id, "manual");
//! # Ok(())
//! # }
//! ```

pub mod analysis;
pub mod chunking;
pub mod cli;
pub mod config;
pub mod document;
pub mod embedding;
pub mod error;
pub mod extraction;
pub mod indexer;
pub mod lexical;
pub mod query;
pub mod search;
pub mod storage;
pub mod vector;

pub mod prelude {
    pub use crate::chunking::ChunkKey;
    pub use crate::config::FolioConfig;
    pub use crate::document::PageKey;
    pub use crate::embedding::{Embedder, HashingEmbedder};
    pub use crate::error::{FolioError, Result};
    pub use crate::indexer::{IncrementalIndexer, IndexingStats, SourceFile};
    pub use crate::search::{HybridSearchEngine, SearchMode, SearchRequest, SearchResponse};
    pub use crate::storage::{FileStorage, MemoryStorage, Storage};
}

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
