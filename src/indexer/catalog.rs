//! Persisted document records.
//!
//! A [`DocumentRecord`] holds everything needed to rebuild a document's share
//! of the in-memory indexes: cleaned pages, chunks, chunk vectors and the
//! chunks still waiting for a vector. The [`Catalog`] stores one record per
//! document under `doc/<encoded id>`.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::chunking::{Chunk, ChunkKey};
use crate::document::{DocumentMeta, Page, PageKey};
use crate::error::{FolioError, Result};
use crate::storage::{Storage, decode_key, encode_key};

const RECORD_PREFIX: &str = "doc/";

/// Complete persisted state of one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub meta: DocumentMeta,
    /// Non-empty cleaned pages, ascending by page number.
    pub pages: Vec<Page>,
    pub chunks: Vec<Chunk>,
    pub vectors: BTreeMap<ChunkKey, Vec<f32>>,
    /// Chunks that have no vector yet, because embedding failed or was off.
    pub failed: BTreeSet<ChunkKey>,
}

impl DocumentRecord {
    pub fn doc_id(&self) -> &str {
        &self.meta.doc_id
    }

    pub fn page(&self, page_num: u32) -> Option<&Page> {
        self.pages
            .binary_search_by_key(&page_num, |p| p.page_num)
            .ok()
            .map(|i| &self.pages[i])
    }

    pub fn chunk(&self, key: &ChunkKey) -> Option<&Chunk> {
        self.chunks
            .binary_search_by(|c| c.key.cmp(key))
            .ok()
            .map(|i| &self.chunks[i])
    }

    pub fn page_keys(&self) -> impl Iterator<Item = PageKey> + '_ {
        self.pages
            .iter()
            .map(|p| PageKey::new(self.meta.doc_id.clone(), p.page_num))
    }

    /// Pages with at least one chunk lacking a vector.
    pub fn pending_pages(&self) -> BTreeSet<PageKey> {
        self.failed.iter().map(|k| k.page.clone()).collect()
    }

    /// Chunks whose key is in the failed set.
    pub fn failed_chunks(&self) -> Vec<Chunk> {
        self.chunks
            .iter()
            .filter(|c| self.failed.contains(&c.key))
            .cloned()
            .collect()
    }

    /// Check referential integrity inside the record.
    ///
    /// Every chunk must belong to a page of the record, every vector and every
    /// failed key must belong to a chunk, a chunk cannot be both embedded and
    /// failed, and vectors must have `dimension` components.
    pub fn validate(&self, dimension: usize) -> Result<()> {
        let doc_id = self.doc_id();

        if self.meta.page_count as usize != self.pages.len() {
            return Err(FolioError::consistency(format!(
                "document {doc_id} declares {} pages but holds {}",
                self.meta.page_count,
                self.pages.len()
            )));
        }
        if !self.pages.windows(2).all(|w| w[0].page_num < w[1].page_num) {
            return Err(FolioError::consistency(format!(
                "document {doc_id} has unsorted or duplicate pages"
            )));
        }
        if !self.chunks.windows(2).all(|w| w[0].key < w[1].key) {
            return Err(FolioError::consistency(format!(
                "document {doc_id} has unsorted or duplicate chunks"
            )));
        }

        for chunk in &self.chunks {
            if chunk.key.page.doc_id != doc_id || self.page(chunk.key.page.page_num).is_none() {
                return Err(FolioError::consistency(format!(
                    "chunk {} references a page missing from document {doc_id}",
                    chunk.key
                )));
            }
        }

        for (key, vector) in &self.vectors {
            if self.chunk(key).is_none() {
                return Err(FolioError::consistency(format!("vector for unknown chunk {key}")));
            }
            if vector.len() != dimension {
                return Err(FolioError::consistency(format!(
                    "vector for {key} has dimension {}, index expects {dimension}",
                    vector.len()
                )));
            }
            if self.failed.contains(key) {
                return Err(FolioError::consistency(format!(
                    "chunk {key} is both embedded and failed"
                )));
            }
        }

        if let Some(key) = self.failed.iter().find(|k| self.chunk(k).is_none()) {
            return Err(FolioError::consistency(format!("failed marker for unknown chunk {key}")));
        }
        Ok(())
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        Ok(bincode::deserialize(bytes)?)
    }
}

/// Document records in a [`Storage`].
#[derive(Debug, Clone)]
pub struct Catalog {
    storage: Arc<dyn Storage>,
}

impl Catalog {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Catalog { storage }
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    /// Storage key of a document's record.
    pub fn record_key(doc_id: &str) -> String {
        format!("{RECORD_PREFIX}{}", encode_key(doc_id))
    }

    pub fn load(&self, doc_id: &str) -> Result<Option<DocumentRecord>> {
        self.storage
            .get(&Self::record_key(doc_id))?
            .map(|bytes| DocumentRecord::decode(&bytes))
            .transpose()
    }

    /// Persist a record with a single `put`.
    pub fn save(&self, record: &DocumentRecord) -> Result<()> {
        self.storage
            .put(&Self::record_key(record.doc_id()), &record.encode()?)
    }

    pub fn remove(&self, doc_id: &str) -> Result<bool> {
        self.storage.delete(&Self::record_key(doc_id))
    }

    /// Ids of every stored document.
    pub fn doc_ids(&self) -> Result<Vec<String>> {
        Ok(self
            .storage
            .list(RECORD_PREFIX)?
            .iter()
            .filter_map(|key| key.strip_prefix(RECORD_PREFIX).and_then(decode_key))
            .collect())
    }

    /// Load every stored record.
    ///
    /// Each id is paired with its own outcome, so one unreadable record does
    /// not hide the others. Only a failure to list the storage is an error.
    pub fn load_all(&self) -> Result<Vec<(String, Result<DocumentRecord>)>> {
        Ok(self
            .doc_ids()?
            .into_iter()
            .map(|doc_id| {
                let record = self.load_checked(&doc_id);
                (doc_id, record)
            })
            .collect())
    }

    fn load_checked(&self, doc_id: &str) -> Result<DocumentRecord> {
        let record = self
            .load(doc_id)?
            .ok_or_else(|| FolioError::storage(format!("record for {doc_id} vanished while loading")))?;
        if record.doc_id() != doc_id {
            return Err(FolioError::consistency(format!(
                "record stored under {doc_id} belongs to {}",
                record.doc_id()
            )));
        }
        Ok(record)
    }

    pub fn clear(&self) -> Result<()> {
        self.storage.clear()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use chrono::Utc;

    pub(crate) fn record(doc_id: &str, pages: &[&str]) -> DocumentRecord {
        let pages: Vec<Page> = pages
            .iter()
            .enumerate()
            .map(|(i, t)| Page::new(i as u32 + 1, *t))
            .collect();
        let chunks = pages
            .iter()
            .map(|p| Chunk {
                key: ChunkKey::new(PageKey::new(doc_id, p.page_num), 0),
                char_start: 0,
                char_end: p.text.chars().count(),
                text: p.text.clone(),
            })
            .collect();
        DocumentRecord {
            meta: DocumentMeta {
                doc_id: doc_id.to_string(),
                content_hash: "h".to_string(),
                page_count: pages.len() as u32,
                source: None,
                indexed_at: Utc::now(),
            },
            pages,
            chunks,
            vectors: BTreeMap::new(),
            failed: BTreeSet::new(),
        }
    }

    #[test]
    fn test_record_lookup_and_validate() {
        let mut rec = record("a", &["one", "two"]);
        assert_eq!(rec.page(2).unwrap().text, "two");
        assert!(rec.page(3).is_none());
        let key = ChunkKey::new(PageKey::new("a", 1), 0);
        assert_eq!(rec.chunk(&key).unwrap().text, "one");
        assert!(rec.validate(2).is_ok());

        rec.vectors.insert(key.clone(), vec![1.0, 0.0]);
        assert!(rec.validate(2).is_ok());
        assert!(rec.validate(3).is_err());

        rec.failed.insert(key);
        assert!(matches!(rec.validate(2), Err(FolioError::IndexConsistency(_))));
    }

    #[test]
    fn test_orphan_chunk_is_inconsistent() {
        let mut rec = record("a", &["one"]);
        rec.chunks.push(Chunk {
            key: ChunkKey::new(PageKey::new("a", 9), 0),
            char_start: 0,
            char_end: 1,
            text: "x".to_string(),
        });
        assert!(matches!(rec.validate(2), Err(FolioError::IndexConsistency(_))));
    }

    #[test]
    fn test_load_all_reports_unreadable_records_individually() {
        let storage = Arc::new(MemoryStorage::new());
        let catalog = Catalog::new(storage.clone());
        catalog.save(&record("good", &["fine"])).unwrap();
        storage.put(&Catalog::record_key("bad"), b"not bincode").unwrap();

        let loaded = catalog.load_all().unwrap();
        assert_eq!(loaded.len(), 2);
        let (bad_id, bad) = &loaded[0];
        assert_eq!(bad_id, "bad");
        assert!(bad.is_err());
        let (good_id, good) = &loaded[1];
        assert_eq!(good_id, "good");
        assert_eq!(good.as_ref().unwrap().pages.len(), 1);
    }

    #[test]
    fn test_catalog_round_trip() {
        let catalog = Catalog::new(Arc::new(MemoryStorage::new()));
        let mut rec = record("reports/2024 q1.txt", &["alpha", "beta"]);
        rec.vectors
            .insert(ChunkKey::new(PageKey::new("reports/2024 q1.txt", 1), 0), vec![0.5, 0.5]);

        catalog.save(&rec).unwrap();
        assert_eq!(catalog.doc_ids().unwrap(), vec!["reports/2024 q1.txt"]);
        assert_eq!(catalog.load("reports/2024 q1.txt").unwrap().unwrap(), rec);
        let loaded = catalog.load_all().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].1.as_ref().unwrap(), &rec);

        assert!(catalog.remove("reports/2024 q1.txt").unwrap());
        assert!(catalog.load("reports/2024 q1.txt").unwrap().is_none());
    }
}
