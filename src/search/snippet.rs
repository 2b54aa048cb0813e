//! Snippet extraction with match highlighting.

use crate::analysis::Analyzer;
use crate::config::SearchConfig;
use crate::query::HighlightTerms;

const ELLIPSIS: &str = "...";

/// Builds short excerpts of page or chunk text.
#[derive(Debug, Clone)]
pub struct SnippetBuilder {
    analyzer: Analyzer,
    max_chars: usize,
    open: String,
    close: String,
}

impl SnippetBuilder {
    pub fn new(analyzer: Analyzer, config: &SearchConfig) -> Self {
        SnippetBuilder {
            analyzer,
            max_chars: config.snippet_chars.max(1),
            open: config.highlight_open.clone(),
            close: config.highlight_close.clone(),
        }
    }

    /// Window of `text` around the first highlighted term, with every
    /// highlighted term in the window wrapped in the highlight markers.
    ///
    /// Without any match, the beginning of the text is returned.
    pub fn highlight(&self, text: &str, terms: &HighlightTerms) -> String {
        let tokens = self.analyzer.analyze(text);
        let anchor = tokens
            .iter()
            .find(|t| terms.matches(&t.term))
            .map_or(0, |t| t.start_offset);

        let mut start = back_chars(text, anchor, self.max_chars / 3);
        if start > 0 {
            if let Some(ws) = text[start..anchor].find(char::is_whitespace) {
                start += ws + 1;
            }
        }
        let mut end = forward_chars(text, start, self.max_chars);
        if end < text.len() && !text[end..].starts_with(char::is_whitespace) {
            if let Some(ws) = text[anchor..end].rfind(char::is_whitespace) {
                end = anchor + ws;
            }
        }

        let mut out = String::with_capacity(end - start + 32);
        if start > 0 {
            out.push_str(ELLIPSIS);
        }

        let mut cursor = start;
        for token in tokens
            .iter()
            .filter(|t| t.start_offset >= start && t.end_offset <= end && terms.matches(&t.term))
        {
            out.push_str(&text[cursor..token.start_offset]);
            out.push_str(&self.open);
            out.push_str(&text[token.start_offset..token.end_offset]);
            out.push_str(&self.close);
            cursor = token.end_offset;
        }
        out.push_str(&text[cursor..end]);

        if end < text.len() {
            out.push_str(ELLIPSIS);
        }
        flatten_whitespace(&out)
    }

    /// Leading excerpt of a chunk, used for pages found only by similarity.
    pub fn excerpt(&self, text: &str) -> String {
        let end = forward_chars(text, 0, self.max_chars);
        if end >= text.len() {
            return flatten_whitespace(text);
        }
        let cut = if text[end..].starts_with(char::is_whitespace) {
            end
        } else {
            text[..end].rfind(char::is_whitespace).filter(|&ws| ws > 0).unwrap_or(end)
        };
        let mut out = flatten_whitespace(&text[..cut]);
        out.push_str(ELLIPSIS);
        out
    }
}

/// Byte index `n` characters before `from`, or 0.
fn back_chars(text: &str, from: usize, n: usize) -> usize {
    if n == 0 {
        return from;
    }
    text[..from]
        .char_indices()
        .rev()
        .nth(n - 1)
        .map_or(0, |(i, _)| i)
}

/// Byte index `n` characters after `from`, or the end of the text.
fn forward_chars(text: &str, from: usize, n: usize) -> usize {
    text[from..]
        .char_indices()
        .nth(n)
        .map_or(text.len(), |(i, _)| from + i)
}

fn flatten_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
