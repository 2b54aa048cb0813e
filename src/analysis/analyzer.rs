//! Unicode-aware analyzer shared by indexing and query parsing.
//!
//! Text is first split on Unicode word boundaries (UAX #29), then each word
//! segment is split again into runs of letters and digits, so that
//! "l'aviation" yields `l` and `aviation` and CJK ideographs stay separate.
//! Every run is folded with the configured [`FoldingPolicy`].
//!
//! # Examples
//!
//! ```
//! use folio::analysis::{Analyzer, FoldingPolicy};
//!
//! let analyzer = Analyzer::new(FoldingPolicy::Diacritics);
//! let terms = analyzer.terms("Sécurité aérienne, l'aviation civile!");
//! assert_eq!(terms, vec!["securite", "aerienne", "l", "aviation", "civile"]);
//! ```

use ahash::AHashSet;
use unicode_normalization::char::is_combining_mark;
use unicode_segmentation::UnicodeSegmentation;

use crate::analysis::normalize::{FoldingPolicy, fold_term};
use crate::analysis::token::Token;
use crate::config::LexicalConfig;

/// Deterministic tokenizer + normalizer.
///
/// The analyzer holds no mutable state; cloning it is cheap enough to hand a
/// copy to every worker.
#[derive(Clone, Debug, Default)]
pub struct Analyzer {
    folding: FoldingPolicy,
    stop_words: AHashSet<String>,
}

impl Analyzer {
    /// Create an analyzer without stop words.
    pub fn new(folding: FoldingPolicy) -> Self {
        Analyzer {
            folding,
            stop_words: AHashSet::new(),
        }
    }

    /// Create an analyzer from the lexical configuration section.
    pub fn from_config(config: &LexicalConfig) -> Self {
        Self::new(config.folding).with_stop_words(config.stop_words.iter().map(String::as_str))
    }

    /// Add stop words. They are folded with the same policy as indexed terms.
    pub fn with_stop_words<'a, I>(mut self, words: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        for word in words {
            let folded = fold_term(word.trim(), self.folding);
            if !folded.is_empty() {
                self.stop_words.insert(folded);
            }
        }
        self
    }

    /// The folding policy in effect.
    pub fn folding(&self) -> FoldingPolicy {
        self.folding
    }

    /// Whether a folded term is a stop word.
    pub fn is_stop_word(&self, term: &str) -> bool {
        self.stop_words.contains(term)
    }

    /// Tokenize `text` into positioned, normalized terms.
    ///
    /// Stop words consume a position but are not emitted.
    pub fn analyze(&self, text: &str) -> Vec<Token> {
        let mut tokens = Vec::new();
        let mut position: u32 = 0;

        for (segment_start, segment) in text.split_word_bound_indices() {
            if !segment.chars().any(char::is_alphanumeric) {
                continue;
            }

            for (run_start, run_end) in word_runs(segment) {
                let start = segment_start + run_start;
                let end = segment_start + run_end;
                let term = fold_term(&text[start..end], self.folding);
                if term.is_empty() {
                    continue;
                }

                if !self.stop_words.contains(&term) {
                    tokens.push(Token::new(term, position, start, end));
                }
                position += 1;
            }
        }

        tokens
    }

    /// Normalized terms of `text`, in order, stop words removed.
    pub fn terms(&self, text: &str) -> Vec<String> {
        self.analyze(text).into_iter().map(|t| t.term).collect()
    }
}

/// Byte ranges of letter/digit runs inside a word segment.
///
/// Combining marks stay attached to the run they follow.
fn word_runs(segment: &str) -> Vec<(usize, usize)> {
    let mut runs = Vec::new();
    let mut current: Option<usize> = None;

    for (idx, c) in segment.char_indices() {
        let in_run = c.is_alphanumeric() || (current.is_some() && is_combining_mark(c));
        match (in_run, current) {
            (true, None) => current = Some(idx),
            (false, Some(start)) => {
                runs.push((start, idx));
                current = None;
            }
            _ => {}
        }
    }
    if let Some(start) = current {
        runs.push((start, segment.len()));
    }

    runs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_positions_and_offsets() {
        let analyzer = Analyzer::new(FoldingPolicy::Diacritics);
        let text = "Civil  Aviation, rules.";
        let tokens = analyzer.analyze(text);

        assert_eq!(tokens.len(), 3);
        assert_eq!(tokens[0], Token::new("civil", 0, 0, 5));
        assert_eq!(tokens[1], Token::new("aviation", 1, 7, 15));
        assert_eq!(tokens[2].position, 2);
        assert_eq!(&text[tokens[2].start_offset..tokens[2].end_offset], "rules");
    }

    #[test]
    fn test_accent_folding_symmetry() {
        let analyzer = Analyzer::new(FoldingPolicy::Diacritics);
        assert_eq!(analyzer.terms("aviación"), analyzer.terms("AVIACION"));

        let strict = Analyzer::new(FoldingPolicy::None);
        assert_ne!(strict.terms("aviación"), strict.terms("aviacion"));
    }

    #[test]
    fn test_decomposed_input_stays_one_term() {
        let analyzer = Analyzer::new(FoldingPolicy::Diacritics);
        let tokens = analyzer.analyze("se\u{0301}curite\u{0301}");
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].term, "securite");
    }

    #[test]
    fn test_stop_words_keep_position_gap() {
        let analyzer = Analyzer::new(FoldingPolicy::Diacritics).with_stop_words(["de", "la"]);
        let tokens = analyzer.analyze("contrôle de la navigation");

        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[0].term, "controle");
        assert_eq!(tokens[0].position, 0);
        assert_eq!(tokens[1].term, "navigation");
        assert_eq!(tokens[1].position, 3);
    }

    #[test]
    fn test_punctuation_only_yields_nothing() {
        let analyzer = Analyzer::default();
        assert!(analyzer.analyze("--- ... !!!").is_empty());
        assert!(analyzer.analyze("").is_empty());
    }

    #[test]
    fn test_mixed_segments_split_on_non_alphanumerics() {
        let analyzer = Analyzer::default();
        assert_eq!(analyzer.terms("(EU) 2024/123"), vec!["eu", "2024", "123"]);
    }

    #[test]
    fn test_deterministic() {
        let analyzer = Analyzer::default();
        let text = "Règlement (UE) n° 965/2012 — opérations aériennes";
        assert_eq!(analyzer.analyze(text), analyzer.analyze(text));
    }
}
