//! Lexical query language.
//!
//! [`QueryParser`] compiles a query string with `AND` / `OR` / `NOT`,
//! `"quoted phrases"`, `prefix*` and parentheses into a [`LexicalQuery`] tree.
//! The tree is consumed only by the lexical index; vector retrieval sees the
//! raw query text.

pub mod ast;
pub mod parser;

pub use ast::{HighlightTerms, LexicalQuery, PhraseTerm};
pub use parser::QueryParser;
