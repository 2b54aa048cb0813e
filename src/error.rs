//! Error types for the Folio library.
//!
//! All fallible operations return [`FolioError`] through the crate-wide
//! [`Result`] alias. The variants follow the retrieval engine's failure
//! taxonomy: query syntax problems are reported with the offending position,
//! embedding outages degrade search instead of failing it, consistency
//! violations roll back the document update that caused them, and
//! configuration problems are raised before any indexing work starts.
//!
//! # Examples
//!
//! ```
//! use folio::error::{FolioError, Result};
//!
//! fn check(limit: usize) -> Result<()> {
//!     if limit == 0 {
//!         return Err(FolioError::invalid_argument("limit must be positive"));
//!     }
//!     Ok(())
//! }
//!
//! assert!(check(0).is_err());
//! ```

use std::io;

use thiserror::Error;

/// The main error type for Folio operations.
#[derive(Error, Debug)]
pub enum FolioError {
    /// Malformed boolean, phrase or prefix syntax. `position` is a character
    /// offset into the query string.
    #[error("Query syntax error at position {position}: {message}")]
    QuerySyntax { position: usize, message: String },

    /// The embedding collaborator is down, timed out, or returned unusable output.
    #[error("Embedding unavailable: {0}")]
    EmbeddingUnavailable(String),

    /// A referential-integrity invariant was violated.
    #[error("Index consistency error: {0}")]
    IndexConsistency(String),

    /// Invalid configuration.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// An extraction backend failed on a source file.
    #[error("Extraction error ({path}): {message}")]
    Extraction { path: String, message: String },

    /// Storage-related errors
    #[error("Storage error: {0}")]
    Storage(String),

    /// I/O errors (file operations, network, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Binary record encoding errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    /// Operation cancelled
    #[error("Operation cancelled: {0}")]
    Cancelled(String),

    /// Invalid argument
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Generic anyhow error
    #[error("Anyhow error: {0}")]
    Anyhow(#[from] anyhow::Error),
}

/// Result type alias for operations that may fail with FolioError.
pub type Result<T> = std::result::Result<T, FolioError>;

impl FolioError {
    /// Create a new query syntax error at the given character position.
    pub fn query_syntax<S: Into<String>>(position: usize, msg: S) -> Self {
        FolioError::QuerySyntax {
            position,
            message: msg.into(),
        }
    }

    /// Create a new embedding-unavailable error.
    pub fn embedding_unavailable<S: Into<String>>(msg: S) -> Self {
        FolioError::EmbeddingUnavailable(msg.into())
    }

    /// Create a new index consistency error.
    pub fn consistency<S: Into<String>>(msg: S) -> Self {
        FolioError::IndexConsistency(msg.into())
    }

    /// Create a new configuration error.
    pub fn configuration<S: Into<String>>(msg: S) -> Self {
        FolioError::Configuration(msg.into())
    }

    /// Create a new extraction error for a source path.
    pub fn extraction<P: Into<String>, S: Into<String>>(path: P, msg: S) -> Self {
        FolioError::Extraction {
            path: path.into(),
            message: msg.into(),
        }
    }

    /// Create a new storage error.
    pub fn storage<S: Into<String>>(msg: S) -> Self {
        FolioError::Storage(msg.into())
    }

    /// Create a new cancelled error.
    pub fn cancelled<S: Into<String>>(msg: S) -> Self {
        FolioError::Cancelled(msg.into())
    }

    /// Create a new invalid argument error.
    pub fn invalid_argument<S: Into<String>>(msg: S) -> Self {
        FolioError::InvalidArgument(msg.into())
    }

    /// Whether retrying the failed operation may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, FolioError::EmbeddingUnavailable(_))
    }
}
