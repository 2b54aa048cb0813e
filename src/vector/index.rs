//! Exact k-nearest-neighbour index over chunk vectors.
//!
//! Vectors are stored normalized next to their original norm. A query scores
//! every stored vector in parallel, then rolls chunk hits up to pages by
//! keeping only the best chunk of each page.

use std::collections::{BTreeMap, BTreeSet};

use ahash::AHashMap;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::chunking::ChunkKey;
use crate::document::PageKey;
use crate::error::{FolioError, Result};
use crate::search::RankedList;
use crate::vector::similarity::{dot, normalize};

#[derive(Debug, Clone)]
struct StoredVector {
    key: ChunkKey,
    unit: Vec<f32>,
    norm: f32,
}

/// Page-level result of a vector query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SemanticHits {
    /// Pages ranked by the similarity of their best chunk.
    pub ranked: RankedList,
    /// Best chunk of every ranked page.
    pub best_chunks: BTreeMap<PageKey, ChunkKey>,
}

/// Summary of the index contents.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VectorStats {
    pub dimension: usize,
    pub vectors: usize,
    pub pages: usize,
}

/// Brute-force cosine index.
#[derive(Debug, Clone)]
pub struct VectorIndex {
    dimension: usize,
    entries: Vec<StoredVector>,
    positions: AHashMap<ChunkKey, usize>,
    by_page: BTreeMap<PageKey, BTreeSet<u32>>,
}

impl VectorIndex {
    pub fn new(dimension: usize) -> Self {
        VectorIndex {
            dimension,
            entries: Vec::new(),
            positions: AHashMap::new(),
            by_page: BTreeMap::new(),
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of pages with at least one vector.
    pub fn page_count(&self) -> usize {
        self.by_page.len()
    }

    pub fn has_page(&self, page: &PageKey) -> bool {
        self.by_page.contains_key(page)
    }

    pub fn contains(&self, key: &ChunkKey) -> bool {
        self.positions.contains_key(key)
    }

    /// Original (pre-normalization) norm of a stored vector.
    pub fn norm(&self, key: &ChunkKey) -> Option<f32> {
        self.positions.get(key).map(|&i| self.entries[i].norm)
    }

    /// Stored unit vector of a chunk.
    pub fn unit_vector(&self, key: &ChunkKey) -> Option<&[f32]> {
        self.positions.get(key).map(|&i| self.entries[i].unit.as_slice())
    }

    pub fn stats(&self) -> VectorStats {
        VectorStats {
            dimension: self.dimension,
            vectors: self.entries.len(),
            pages: self.by_page.len(),
        }
    }

    /// Store or replace the vector of a chunk.
    pub fn upsert(&mut self, key: ChunkKey, vector: &[f32]) -> Result<()> {
        if vector.len() != self.dimension {
            return Err(FolioError::invalid_argument(format!(
                "vector for {key} has dimension {}, index expects {}",
                vector.len(),
                self.dimension
            )));
        }
        let (unit, norm) = normalize(vector)?;

        match self.positions.get(&key) {
            Some(&idx) => {
                self.entries[idx].unit = unit;
                self.entries[idx].norm = norm;
            }
            None => {
                self.by_page
                    .entry(key.page.clone())
                    .or_default()
                    .insert(key.chunk_index);
                self.positions.insert(key.clone(), self.entries.len());
                self.entries.push(StoredVector { key, unit, norm });
            }
        }
        Ok(())
    }

    /// Remove one chunk vector. Returns whether it existed.
    pub fn remove(&mut self, key: &ChunkKey) -> bool {
        let Some(idx) = self.positions.remove(key) else {
            return false;
        };

        self.entries.swap_remove(idx);
        if let Some(moved) = self.entries.get(idx) {
            self.positions.insert(moved.key.clone(), idx);
        }

        if let Some(chunks) = self.by_page.get_mut(&key.page) {
            chunks.remove(&key.chunk_index);
            if chunks.is_empty() {
                self.by_page.remove(&key.page);
            }
        }
        true
    }

    /// Remove every chunk vector of a page. Returns the number removed.
    pub fn remove_by_page(&mut self, doc_id: &str, page_num: u32) -> usize {
        let page = PageKey::new(doc_id, page_num);
        let Some(chunks) = self.by_page.get(&page).cloned() else {
            return 0;
        };
        for chunk_index in &chunks {
            self.remove(&ChunkKey::new(page.clone(), *chunk_index));
        }
        chunks.len()
    }

    /// Remove every vector of a document. Returns the number removed.
    pub fn remove_document(&mut self, doc_id: &str) -> usize {
        let start = PageKey::new(doc_id, 0);
        let end = PageKey::new(doc_id, u32::MAX);
        let pages: Vec<PageKey> = self.by_page.range(start..=end).map(|(k, _)| k.clone()).collect();
        pages
            .iter()
            .map(|page| self.remove_by_page(&page.doc_id, page.page_num))
            .sum()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.positions.clear();
        self.by_page.clear();
    }

    /// Top `k` pages by cosine similarity of their best chunk.
    pub fn query(&self, query_vector: &[f32], k: usize) -> Result<RankedList> {
        Ok(self.query_with_chunks(query_vector, k)?.ranked)
    }

    /// Like [`query`](Self::query), also reporting which chunk won each page.
    pub fn query_with_chunks(&self, query_vector: &[f32], k: usize) -> Result<SemanticHits> {
        if query_vector.len() != self.dimension {
            return Err(FolioError::invalid_argument(format!(
                "query vector has dimension {}, index expects {}",
                query_vector.len(),
                self.dimension
            )));
        }
        if self.entries.is_empty() || k == 0 {
            return Ok(SemanticHits::default());
        }
        let (query_unit, _) = normalize(query_vector)?;

        let similarities: Vec<f32> = self
            .entries
            .par_iter()
            .map(|entry| dot(&entry.unit, &query_unit))
            .collect();

        let mut best: AHashMap<&PageKey, (f32, &ChunkKey)> = AHashMap::new();
        for (entry, &similarity) in self.entries.iter().zip(&similarities) {
            best.entry(&entry.key.page)
                .and_modify(|current| {
                    let better = similarity > current.0
                        || (similarity == current.0 && entry.key.chunk_index < current.1.chunk_index);
                    if better {
                        *current = (similarity, &entry.key);
                    }
                })
                .or_insert((similarity, &entry.key));
        }

        let scored = best
            .iter()
            .map(|(page, (similarity, _))| ((*page).clone(), *similarity))
            .collect();
        let ranked = RankedList::from_scored(scored, k, 0);
        let best_chunks = ranked
            .iter()
            .filter_map(|e| best.get(&e.key).map(|(_, chunk)| (e.key.clone(), (*chunk).clone())))
            .collect();

        Ok(SemanticHits { ranked, best_chunks })
    }
}
