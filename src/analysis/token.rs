//! Token type produced by the analyzer.
//!
//! # Examples
//!
//! ```
//! use folio::analysis::token::Token;
//!
//! let token = Token::new("world", 1, 6, 11);
//! assert_eq!(token.term, "world");
//! assert_eq!(token.position, 1);
//! assert_eq!(token.len(), 5);
//! ```

use serde::{Deserialize, Serialize};

/// A single normalized term with its position and source span.
///
/// `position` counts word runs from zero, including runs that were dropped as
/// stop words, so that phrase matching sees the original adjacency.
/// `start_offset` and `end_offset` are byte offsets into the analyzed text.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    /// The normalized term text.
    pub term: String,

    /// Position in the word sequence (0-based).
    pub position: u32,

    /// Byte offset where the source word starts.
    pub start_offset: usize,

    /// Byte offset where the source word ends.
    pub end_offset: usize,
}

impl Token {
    /// Create a new token.
    pub fn new<S: Into<String>>(term: S, position: u32, start_offset: usize, end_offset: usize) -> Self {
        Token {
            term: term.into(),
            position,
            start_offset,
            end_offset,
        }
    }

    /// Length of the source span in bytes.
    pub fn len(&self) -> usize {
        self.end_offset - self.start_offset
    }

    /// Whether the source span is empty.
    pub fn is_empty(&self) -> bool {
        self.end_offset == self.start_offset
    }
}
