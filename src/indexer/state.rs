//! In-memory index state shared by the indexer and the search engine.
//!
//! One `RwLock` guards the lexical index, the vector index and the loaded
//! document records together. A document update takes the write lock once
//! and swaps the whole document, so a reader holding the read lock sees the
//! document either before or after the update.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::chunking::ChunkKey;
use crate::config::FolioConfig;
use crate::document::PageKey;
use crate::error::{FolioError, Result};
use crate::indexer::catalog::DocumentRecord;
use crate::lexical::LexicalIndex;
use crate::vector::VectorIndex;

/// Handle shared between writers and readers.
pub type SharedState = Arc<RwLock<IndexState>>;

/// Snapshot of index sizes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndexStats {
    pub documents: usize,
    pub pages: usize,
    pub terms: usize,
    pub chunks: usize,
    pub vectors: usize,
    /// Pages with at least one chunk that has no vector.
    pub pages_without_vectors: usize,
    pub avg_page_length: f32,
}

#[derive(Debug)]
pub struct IndexState {
    pub lexical: LexicalIndex,
    pub vector: VectorIndex,
    pub documents: BTreeMap<String, DocumentRecord>,
}

impl IndexState {
    pub fn new(config: &FolioConfig) -> Self {
        IndexState {
            lexical: LexicalIndex::from_config(&config.lexical),
            vector: VectorIndex::new(config.embedding.dimension),
            documents: BTreeMap::new(),
        }
    }

    pub fn shared(config: &FolioConfig) -> SharedState {
        Arc::new(RwLock::new(Self::new(config)))
    }

    pub fn document(&self, doc_id: &str) -> Option<&DocumentRecord> {
        self.documents.get(doc_id)
    }

    pub fn page_text(&self, key: &PageKey) -> Option<&str> {
        self.documents
            .get(&key.doc_id)?
            .page(key.page_num)
            .map(|p| p.text.as_str())
    }

    pub fn chunk_text(&self, key: &ChunkKey) -> Option<&str> {
        self.documents
            .get(&key.page.doc_id)?
            .chunk(key)
            .map(|c| c.text.as_str())
    }

    /// Install a document, replacing any previous version.
    ///
    /// On failure the previous version is restored and the error returned, so
    /// the state never holds a partial document. Returns the replaced record.
    pub fn replace(&mut self, record: DocumentRecord) -> Result<Option<DocumentRecord>> {
        let doc_id = record.doc_id().to_string();
        let previous = self.remove_document(&doc_id);

        match self.insert(record) {
            Ok(()) => Ok(previous),
            Err(e) => {
                self.purge(&doc_id);
                if let Some(old) = previous {
                    if let Err(restore) = self.insert(old) {
                        self.purge(&doc_id);
                        error!(doc_id = %doc_id, error = %restore, "failed to restore previous version");
                    }
                }
                error!(doc_id = %doc_id, error = %e, "document update rolled back");
                Err(e)
            }
        }
    }

    /// Remove a document from both indexes. Returns its record.
    pub fn remove_document(&mut self, doc_id: &str) -> Option<DocumentRecord> {
        let record = self.documents.remove(doc_id)?;
        self.purge(doc_id);
        Some(record)
    }

    pub fn clear(&mut self) {
        self.lexical.clear();
        self.vector.clear();
        self.documents.clear();
    }

    pub fn stats(&self) -> IndexStats {
        let lexical = self.lexical.stats();
        IndexStats {
            documents: self.documents.len(),
            pages: lexical.pages,
            terms: lexical.terms,
            chunks: self.documents.values().map(|r| r.chunks.len()).sum(),
            vectors: self.vector.len(),
            pages_without_vectors: self
                .documents
                .values()
                .map(|r| r.pending_pages().len())
                .sum(),
            avg_page_length: lexical.avg_page_length,
        }
    }

    /// Check that every posting and vector of a document references a page of
    /// its record, and that every page of the record is indexed.
    pub fn check_document(&self, doc_id: &str) -> Result<()> {
        let indexed = self.lexical.document_pages(doc_id);
        let Some(record) = self.documents.get(doc_id) else {
            if indexed.is_empty() {
                return Ok(());
            }
            return Err(FolioError::consistency(format!(
                "{} indexed pages reference unknown document {doc_id}",
                indexed.len()
            )));
        };

        let expected: Vec<PageKey> = record.page_keys().collect();
        if indexed != expected {
            return Err(FolioError::consistency(format!(
                "document {doc_id} has {} indexed pages, record holds {}",
                indexed.len(),
                expected.len()
            )));
        }
        for key in record.vectors.keys() {
            if !self.vector.contains(key) {
                return Err(FolioError::consistency(format!("vector for {key} missing from index")));
            }
        }
        Ok(())
    }

    fn insert(&mut self, record: DocumentRecord) -> Result<()> {
        record.validate(self.vector.dimension())?;
        let doc_id = record.doc_id().to_string();

        for page in &record.pages {
            self.lexical.add_page(&doc_id, page.page_num, &page.text);
        }
        for (key, vector) in &record.vectors {
            self.vector.upsert(key.clone(), vector).map_err(|e| {
                FolioError::consistency(format!("cannot index vector for {key}: {e}"))
            })?;
        }

        self.documents.insert(doc_id.clone(), record);
        self.check_document(&doc_id)
    }

    fn purge(&mut self, doc_id: &str) {
        self.lexical.remove_document(doc_id);
        self.vector.remove_document(doc_id);
        self.documents.remove(doc_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indexer::catalog::tests::record;

    fn state() -> IndexState {
        let mut config = FolioConfig::default();
        config.embedding.dimension = 2;
        IndexState::new(&config)
    }

    #[test]
    fn test_replace_swaps_whole_document() {
        let mut state = state();
        state.replace(record("a", &["old words", "more old"])).unwrap();
        assert_eq!(state.stats().pages, 2);
        assert_eq!(state.lexical.df("old"), 2);

        let previous = state.replace(record("a", &["new words"])).unwrap();
        assert_eq!(previous.unwrap().pages.len(), 2);
        assert_eq!(state.lexical.df("old"), 0);
        assert_eq!(state.lexical.df("new"), 1);
        assert_eq!(state.page_text(&PageKey::new("a", 1)), Some("new words"));
        assert!(state.page_text(&PageKey::new("a", 2)).is_none());
        state.check_document("a").unwrap();
    }

    #[test]
    fn test_failed_update_rolls_back() {
        let mut state = state();
        let mut good = record("a", &["kept text"]);
        good.vectors
            .insert(ChunkKey::new(PageKey::new("a", 1), 0), vec![1.0, 0.0]);
        state.replace(good).unwrap();

        let mut bad = record("a", &["replacement"]);
        bad.vectors
            .insert(ChunkKey::new(PageKey::new("a", 1), 0), vec![0.0, 0.0]);
        let err = state.replace(bad).unwrap_err();
        assert!(matches!(err, FolioError::IndexConsistency(_)));

        assert_eq!(state.page_text(&PageKey::new("a", 1)), Some("kept text"));
        assert_eq!(state.lexical.df("kept"), 1);
        assert_eq!(state.lexical.df("replacement"), 0);
        assert_eq!(state.vector.len(), 1);
        state.check_document("a").unwrap();
    }

    #[test]
    fn test_remove_and_stats() {
        let mut state = state();
        let mut rec = record("a", &["one", "two"]);
        rec.failed.insert(ChunkKey::new(PageKey::new("a", 2), 0));
        state.replace(rec).unwrap();
        state.replace(record("b", &["three"])).unwrap();

        let stats = state.stats();
        assert_eq!(stats.documents, 2);
        assert_eq!(stats.chunks, 3);
        assert_eq!(stats.pages_without_vectors, 1);

        assert!(state.remove_document("a").is_some());
        assert!(state.remove_document("a").is_none());
        assert_eq!(state.stats().pages, 1);
        assert!(state.lexical.document_pages("a").is_empty());
    }
}
