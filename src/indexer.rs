//! Incremental index maintenance.
//!
//! - [`catalog`]: persisted per-document records and their storage keys.
//! - [`state`]: the in-memory lexical and vector indexes behind one lock.
//! - [`pipeline`]: the [`IncrementalIndexer`] that detects changes by content
//!   hash and applies each document update atomically.

pub mod catalog;
pub mod pipeline;
pub mod state;

pub use catalog::{Catalog, DocumentRecord};
pub use pipeline::{
    DocumentReport, IncrementalIndexer, IndexOutcome, IndexingStats, SourceFile, content_hash,
    prepare_pages,
};
pub use state::{IndexState, IndexStats, SharedState};
