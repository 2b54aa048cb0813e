//! Overlapping fixed-size chunking of page text for embedding.
//!
//! The chunker walks the text in windows of `max_chunk_chars` characters. When
//! more text remains after a window, the cut is moved back to the last
//! whitespace within `boundary_lookback_chars` of the window edge, or made
//! exactly at the edge if there is none. The next window starts
//! `chunk_overlap_chars` before the cut, so consecutive chunks of a page share
//! exactly that many characters. The remainder of the page becomes the last
//! chunk, however short. All offsets count Unicode scalar values, not bytes.
//!
//! # Examples
//!
//! ```
//! use folio::chunking::Chunker;
//!
//! let chunker = Chunker::new(1000, 200, 100).unwrap();
//! let text = "x".repeat(2500);
//! let spans = chunker.spans(&text);
//! assert_eq!(spans, vec![(0, 1000), (800, 1800), (1600, 2500)]);
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::ChunkingConfig;
use crate::document::PageKey;
use crate::error::{FolioError, Result};

/// Key of a chunk: its page and its index within the page.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ChunkKey {
    pub page: PageKey,
    pub chunk_index: u32,
}

impl ChunkKey {
    pub fn new(page: PageKey, chunk_index: u32) -> Self {
        ChunkKey { page, chunk_index }
    }
}

impl fmt::Display for ChunkKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.page, self.chunk_index)
    }
}

/// A contiguous slice of a page's text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub key: ChunkKey,
    /// Character offset of the first character, inclusive.
    pub char_start: usize,
    /// Character offset after the last character.
    pub char_end: usize,
    pub text: String,
}

impl Chunk {
    /// Length in characters.
    pub fn char_len(&self) -> usize {
        self.char_end - self.char_start
    }
}

/// Deterministic overlapping chunker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunker {
    max_chars: usize,
    overlap_chars: usize,
    lookback_chars: usize,
}

impl Chunker {
    /// Create a chunker. Fails when the overlap is not smaller than the chunk
    /// size, or when the lookback could prevent the walk from advancing.
    pub fn new(max_chars: usize, overlap_chars: usize, lookback_chars: usize) -> Result<Self> {
        if max_chars == 0 {
            return Err(FolioError::configuration("max_chunk_chars must be positive"));
        }
        if overlap_chars >= max_chars {
            return Err(FolioError::configuration(format!(
                "chunk_overlap_chars ({overlap_chars}) must be smaller than max_chunk_chars ({max_chars})"
            )));
        }
        if lookback_chars >= max_chars - overlap_chars {
            return Err(FolioError::configuration(format!(
                "boundary_lookback_chars ({lookback_chars}) must be smaller than the stride ({})",
                max_chars - overlap_chars
            )));
        }

        Ok(Chunker {
            max_chars,
            overlap_chars,
            lookback_chars,
        })
    }

    pub fn from_config(config: &ChunkingConfig) -> Result<Self> {
        Self::new(
            config.max_chunk_chars,
            config.chunk_overlap_chars,
            config.boundary_lookback_chars,
        )
    }

    pub fn max_chars(&self) -> usize {
        self.max_chars
    }

    pub fn overlap_chars(&self) -> usize {
        self.overlap_chars
    }

    /// Character spans `(start, end)` of the chunks of `text`.
    pub fn spans(&self, text: &str) -> Vec<(usize, usize)> {
        let chars: Vec<char> = text.chars().collect();
        self.spans_of(&chars)
    }

    fn spans_of(&self, chars: &[char]) -> Vec<(usize, usize)> {
        let len = chars.len();
        let mut spans = Vec::new();
        if len == 0 {
            return spans;
        }

        let mut start = 0;
        loop {
            if len - start <= self.max_chars {
                spans.push((start, len));
                break;
            }

            let window_end = start + self.max_chars;
            let floor = window_end - self.lookback_chars;
            let end = (floor..=window_end)
                .rev()
                .find(|&i| chars[i].is_whitespace())
                .unwrap_or(window_end);

            spans.push((start, end));
            start = end - self.overlap_chars;
        }

        spans
    }

    /// Split a page into chunks.
    pub fn chunk_page(&self, page: &PageKey, text: &str) -> Vec<Chunk> {
        let chars: Vec<char> = text.chars().collect();
        self.spans_of(&chars)
            .into_iter()
            .enumerate()
            .map(|(i, (start, end))| Chunk {
                key: ChunkKey::new(page.clone(), i as u32),
                char_start: start,
                char_end: end,
                text: chars[start..end].iter().collect(),
            })
            .collect()
    }
}
