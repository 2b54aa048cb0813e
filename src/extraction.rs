//! Page text extraction from source files.
//!
//! Extraction backends implement [`Extractor`]. An [`ExtractorChain`] holds an
//! explicit, ordered list of backends (primary first) and falls back to the
//! next one when a backend reports [`FolioError::Extraction`]. Any other error
//! kind stops the chain. Only [`PlainTextExtractor`] ships with the crate; PDF
//! backends are supplied by the host application through the same trait.
//!
//! # Example
//!
//! ```no_run
//! use folio::extraction::{ExtractorChain, PlainTextExtractor};
//!
//! let chain = ExtractorChain::new(vec![Box::new(PlainTextExtractor::new())]);
//! let pages = chain.extract("report.txt".as_ref()).unwrap();
//! for (page_num, text) in pages {
//!     println!("{page_num}: {} chars", text.len());
//! }
//! ```

use std::fmt::Debug;
use std::fs;
use std::path::Path;

use tracing::{debug, warn};

use crate::error::{FolioError, Result};

/// Page separator in plain-text exports.
pub const FORM_FEED: char = '\x0c';

/// A source-file text extraction backend.
pub trait Extractor: Send + Sync + Debug {
    /// Backend name used in logs.
    fn name(&self) -> &str;

    /// Whether this backend can handle the file at all.
    fn supports(&self, path: &Path) -> bool;

    /// Extract `(page_num, text)` pairs, page numbers starting at 1.
    fn extract(&self, path: &Path) -> Result<Vec<(u32, String)>>;
}

/// Ordered list of extraction backends, tried primary first.
#[derive(Debug, Default)]
pub struct ExtractorChain {
    extractors: Vec<Box<dyn Extractor>>,
}

impl ExtractorChain {
    pub fn new(extractors: Vec<Box<dyn Extractor>>) -> Self {
        ExtractorChain { extractors }
    }

    /// Append a backend after the existing ones.
    pub fn push(&mut self, extractor: Box<dyn Extractor>) {
        self.extractors.push(extractor);
    }

    pub fn names(&self) -> Vec<&str> {
        self.extractors.iter().map(|e| e.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.extractors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.extractors.is_empty()
    }

    /// Whether any backend supports the file.
    pub fn supports(&self, path: &Path) -> bool {
        self.extractors.iter().any(|e| e.supports(path))
    }

    /// Run the backends in order and return the first success.
    pub fn extract(&self, path: &Path) -> Result<Vec<(u32, String)>> {
        let mut last_error = None;

        for extractor in self.extractors.iter().filter(|e| e.supports(path)) {
            match extractor.extract(path) {
                Ok(pages) => {
                    debug!(backend = extractor.name(), path = %path.display(), pages = pages.len(), "extracted");
                    return Ok(pages);
                }
                Err(e @ FolioError::Extraction { .. }) => {
                    warn!(backend = extractor.name(), path = %path.display(), error = %e, "extraction backend failed, trying next");
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error.unwrap_or_else(|| {
            FolioError::extraction(path.display().to_string(), "no extraction backend supports this file")
        }))
    }
}

/// Reads UTF-8 text files, one page per form-feed separated section.
#[derive(Debug, Clone)]
pub struct PlainTextExtractor {
    extensions: Vec<String>,
}

impl Default for PlainTextExtractor {
    fn default() -> Self {
        PlainTextExtractor {
            extensions: vec!["txt".to_string(), "text".to_string()],
        }
    }
}

impl PlainTextExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the accepted file extensions (case-insensitive, without dot).
    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extensions = extensions
            .into_iter()
            .map(|e| e.into().to_ascii_lowercase())
            .collect();
        self
    }

    /// Split text into pages on form feeds.
    pub fn split_pages(text: &str) -> Vec<(u32, String)> {
        text.split(FORM_FEED)
            .enumerate()
            .map(|(i, page)| (i as u32 + 1, page.to_string()))
            .collect()
    }
}

impl Extractor for PlainTextExtractor {
    fn name(&self) -> &str {
        "plain-text"
    }

    fn supports(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| self.extensions.iter().any(|x| x.eq_ignore_ascii_case(e)))
    }

    fn extract(&self, path: &Path) -> Result<Vec<(u32, String)>> {
        let bytes = fs::read(path)
            .map_err(|e| FolioError::extraction(path.display().to_string(), e.to_string()))?;
        let text = String::from_utf8(bytes)
            .map_err(|e| FolioError::extraction(path.display().to_string(), format!("not valid UTF-8: {e}")))?;
        Ok(Self::split_pages(&text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    #[derive(Debug)]
    struct Failing {
        calls: AtomicUsize,
    }

    impl Extractor for Failing {
        fn name(&self) -> &str {
            "failing"
        }

        fn supports(&self, _path: &Path) -> bool {
            true
        }

        fn extract(&self, path: &Path) -> Result<Vec<(u32, String)>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(FolioError::extraction(path.display().to_string(), "corrupt"))
        }
    }

    #[derive(Debug)]
    struct Broken;

    impl Extractor for Broken {
        fn name(&self) -> &str {
            "broken"
        }

        fn supports(&self, _path: &Path) -> bool {
            true
        }

        fn extract(&self, _path: &Path) -> Result<Vec<(u32, String)>> {
            Err(FolioError::storage("disk gone"))
        }
    }

    #[test]
    fn test_split_pages() {
        let pages = PlainTextExtractor::split_pages("one\x0ctwo\x0c");
        assert_eq!(
            pages,
            vec![(1, "one".to_string()), (2, "two".to_string()), (3, String::new())]
        );
    }

    #[test]
    fn test_fallback_to_next_backend() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("doc.txt");
        fs::write(&path, "first page\x0csecond page").unwrap();

        let chain = ExtractorChain::new(vec![
            Box::new(Failing {
                calls: AtomicUsize::new(0),
            }),
            Box::new(PlainTextExtractor::new()),
        ]);
        assert_eq!(chain.names(), vec!["failing", "plain-text"]);

        let pages = chain.extract(&path).unwrap();
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[1], (2, "second page".to_string()));
    }

    #[test]
    fn test_last_error_returned() {
        let chain = ExtractorChain::new(vec![Box::new(Failing {
            calls: AtomicUsize::new(0),
        })]);
        let err = chain.extract(Path::new("x.pdf")).unwrap_err();
        assert!(matches!(err, FolioError::Extraction { .. }));
    }

    #[test]
    fn test_other_errors_stop_the_chain() {
        let chain = ExtractorChain::new(vec![Box::new(Broken), Box::new(PlainTextExtractor::new())]);
        assert!(matches!(chain.extract(Path::new("x.txt")), Err(FolioError::Storage(_))));
    }

    #[test]
    fn test_unsupported_file() {
        let chain = ExtractorChain::new(vec![Box::new(PlainTextExtractor::new())]);
        assert!(!chain.supports(Path::new("scan.pdf")));
        assert!(chain.supports(Path::new("notes.TXT")));
        assert!(matches!(
            chain.extract(Path::new("scan.pdf")),
            Err(FolioError::Extraction { .. })
        ));
    }

    #[test]
    fn test_invalid_utf8_is_extraction_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("bin.txt");
        fs::write(&path, [0xff, 0xfe, 0x00]).unwrap();
        let err = PlainTextExtractor::new().extract(&path).unwrap_err();
        assert!(matches!(err, FolioError::Extraction { .. }));
    }
}
