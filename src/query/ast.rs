//! Strategy-agnostic boolean/phrase query tree.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// One term of a phrase and its offset from the first phrase term.
///
/// Offsets are taken from the analyzer, so a stop word removed from the middle
/// of a phrase still leaves a gap of one position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhraseTerm {
    pub term: String,
    pub offset: u32,
}

/// A parsed lexical query. All terms are already normalized by the analyzer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LexicalQuery {
    /// Exact term.
    Term(String),
    /// Every indexed term starting with the prefix; each expansion scores on its own.
    Prefix(String),
    /// Terms at consecutive positions (respecting offsets).
    Phrase(Vec<PhraseTerm>),
    /// All children must match; `Not` children exclude.
    And(Vec<LexicalQuery>),
    /// Any child may match.
    Or(Vec<LexicalQuery>),
    /// Exclusion. Matches nothing on its own.
    Not(Box<LexicalQuery>),
    /// Nothing left after analysis (stop words, punctuation, empty input).
    Empty,
}

impl LexicalQuery {
    /// Build a conjunction, dropping empty operands and unwrapping singletons.
    pub fn and(children: Vec<LexicalQuery>) -> LexicalQuery {
        let mut flat = Vec::with_capacity(children.len());
        for child in children {
            match child {
                LexicalQuery::Empty => {}
                LexicalQuery::And(inner) => flat.extend(inner),
                other => flat.push(other),
            }
        }
        match flat.len() {
            0 => LexicalQuery::Empty,
            1 => flat.pop().unwrap_or(LexicalQuery::Empty),
            _ => LexicalQuery::And(flat),
        }
    }

    /// Build a disjunction, dropping empty operands and unwrapping singletons.
    pub fn or(children: Vec<LexicalQuery>) -> LexicalQuery {
        let mut flat = Vec::with_capacity(children.len());
        for child in children {
            match child {
                LexicalQuery::Empty => {}
                LexicalQuery::Or(inner) => flat.extend(inner),
                other => flat.push(other),
            }
        }
        match flat.len() {
            0 => LexicalQuery::Empty,
            1 => flat.pop().unwrap_or(LexicalQuery::Empty),
            _ => LexicalQuery::Or(flat),
        }
    }

    /// Build a negation. Negating nothing is nothing.
    pub fn not(inner: LexicalQuery) -> LexicalQuery {
        match inner {
            LexicalQuery::Empty => LexicalQuery::Empty,
            other => LexicalQuery::Not(Box::new(other)),
        }
    }

    /// Whether the query can match nothing at all.
    pub fn is_empty(&self) -> bool {
        matches!(self, LexicalQuery::Empty)
    }

    /// Whether the query only excludes pages and so can never match by itself.
    pub fn is_exclusion_only(&self) -> bool {
        match self {
            LexicalQuery::Not(_) => true,
            LexicalQuery::And(children) => children.iter().all(|c| matches!(c, LexicalQuery::Not(_))),
            _ => false,
        }
    }

    /// Terms and prefixes that can make a page match, for snippet highlighting.
    /// Negated branches are skipped.
    pub fn highlight_terms(&self) -> HighlightTerms {
        let mut out = HighlightTerms::default();
        self.collect_highlights(&mut out);
        out
    }

    fn collect_highlights(&self, out: &mut HighlightTerms) {
        match self {
            LexicalQuery::Term(term) => {
                out.exact.insert(term.clone());
            }
            LexicalQuery::Prefix(prefix) => {
                out.prefixes.insert(prefix.clone());
            }
            LexicalQuery::Phrase(terms) => {
                out.exact.extend(terms.iter().map(|t| t.term.clone()));
            }
            LexicalQuery::And(children) | LexicalQuery::Or(children) => {
                for child in children {
                    child.collect_highlights(out);
                }
            }
            LexicalQuery::Not(_) | LexicalQuery::Empty => {}
        }
    }
}

impl fmt::Display for LexicalQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LexicalQuery::Term(term) => write!(f, "{term}"),
            LexicalQuery::Prefix(prefix) => write!(f, "{prefix}*"),
            LexicalQuery::Phrase(terms) => {
                let words: Vec<&str> = terms.iter().map(|t| t.term.as_str()).collect();
                write!(f, "\"{}\"", words.join(" "))
            }
            LexicalQuery::And(children) => write_group(f, children, " AND "),
            LexicalQuery::Or(children) => write_group(f, children, " OR "),
            LexicalQuery::Not(inner) => write!(f, "NOT {inner}"),
            LexicalQuery::Empty => write!(f, "()"),
        }
    }
}

fn write_group(f: &mut fmt::Formatter<'_>, children: &[LexicalQuery], sep: &str) -> fmt::Result {
    write!(f, "(")?;
    for (i, child) in children.iter().enumerate() {
        if i > 0 {
            write!(f, "{sep}")?;
        }
        write!(f, "{child}")?;
    }
    write!(f, ")")
}

/// Normalized terms to highlight in snippets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HighlightTerms {
    pub exact: BTreeSet<String>,
    pub prefixes: BTreeSet<String>,
}

impl HighlightTerms {
    /// Whether a normalized term should be highlighted.
    pub fn matches(&self, term: &str) -> bool {
        self.exact.contains(term) || self.prefixes.iter().any(|p| term.starts_with(p.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.exact.is_empty() && self.prefixes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn term(t: &str) -> LexicalQuery {
        LexicalQuery::Term(t.to_string())
    }

    #[test]
    fn test_constructors_simplify() {
        assert_eq!(LexicalQuery::and(vec![]), LexicalQuery::Empty);
        assert_eq!(LexicalQuery::and(vec![LexicalQuery::Empty, term("a")]), term("a"));
        assert_eq!(
            LexicalQuery::or(vec![term("a"), LexicalQuery::or(vec![term("b"), term("c")])]),
            LexicalQuery::Or(vec![term("a"), term("b"), term("c")])
        );
        assert_eq!(LexicalQuery::not(LexicalQuery::Empty), LexicalQuery::Empty);
    }

    #[test]
    fn test_highlight_terms_skip_negations() {
        let query = LexicalQuery::and(vec![
            term("aviation"),
            LexicalQuery::Prefix("regl".to_string()),
            LexicalQuery::not(term("military")),
        ]);
        let highlights = query.highlight_terms();

        assert!(highlights.matches("aviation"));
        assert!(highlights.matches("reglement"));
        assert!(!highlights.matches("military"));
    }

    #[test]
    fn test_display() {
        let query = LexicalQuery::or(vec![
            LexicalQuery::and(vec![term("a"), LexicalQuery::not(term("b"))]),
            LexicalQuery::Prefix("c".to_string()),
        ]);
        assert_eq!(query.to_string(), "((a AND NOT b) OR c*)");
    }
}
