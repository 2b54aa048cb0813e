//! Lexical retrieval: an inverted index over pages ranked with BM25.
//!
//! Boolean trees are evaluated with sorted-list intersection, union and
//! difference over posting lists. Phrases use positional intersection and
//! prefixes expand to every indexed term sharing the prefix.

pub mod bm25;
pub mod index;
pub mod posting;

pub use bm25::Bm25;
pub use index::{LexicalIndex, LexicalStats};
pub use posting::{Posting, PostingList};
