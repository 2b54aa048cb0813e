//! Document and page identity.
//!
//! A document is the unit of change detection: it is inserted, replaced or
//! skipped as a whole. A page is the unit of retrieval: every posting, chunk
//! and search result is keyed by a [`PageKey`].

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Unique key of a page: `(doc_id, page_num)`.
///
/// The derived ordering (doc_id first, then page_num) is the tie-break order
/// used by every ranked list in the crate.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PageKey {
    pub doc_id: String,
    pub page_num: u32,
}

impl PageKey {
    pub fn new<S: Into<String>>(doc_id: S, page_num: u32) -> Self {
        PageKey {
            doc_id: doc_id.into(),
            page_num,
        }
    }
}

impl fmt::Display for PageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.doc_id, self.page_num)
    }
}

/// Extracted text of one page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub page_num: u32,
    pub text: String,
}

impl Page {
    pub fn new<S: Into<String>>(page_num: u32, text: S) -> Self {
        Page {
            page_num,
            text: text.into(),
        }
    }
}

/// Metadata of an indexed document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMeta {
    /// Stable identifier, derived from the file path by default.
    pub doc_id: String,
    /// Hex digest of the cleaned page texts.
    pub content_hash: String,
    /// Number of indexed pages.
    pub page_count: u32,
    /// Where the document was read from, if known.
    pub source: Option<String>,
    /// When this version of the document was indexed.
    pub indexed_at: DateTime<Utc>,
}
