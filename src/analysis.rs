//! Text analysis for Folio.
//!
//! This module turns raw page text into normalized terms. The same
//! [`Analyzer`] must be used at index time and at query time; a term that is
//! folded differently on the two sides silently stops matching.

pub mod analyzer;
pub mod normalize;
pub mod token;

pub use analyzer::Analyzer;
pub use normalize::{FoldingPolicy, clean_text, fold_term};
pub use token::Token;
