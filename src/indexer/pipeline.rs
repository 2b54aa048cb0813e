//! Incremental indexing pipeline.
//!
//! For each document: clean the pages, hash them, and compare against the
//! stored record. An unchanged document is skipped without any write. A new
//! or changed document is chunked and embedded outside every lock, then
//! committed in one step: the record is persisted with a single storage
//! `put` and swapped into the shared state under the write lock. Writers are
//! serialized by a commit mutex; readers are never blocked by embedding.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use futures::stream::{self, StreamExt};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::analysis::clean_text;
use crate::chunking::{Chunk, Chunker};
use crate::config::FolioConfig;
use crate::document::{DocumentMeta, Page, PageKey};
use crate::embedding::{Embedder, EmbeddingOrchestrator, EmbeddingOutcome};
use crate::error::{FolioError, Result};
use crate::extraction::{ExtractorChain, PlainTextExtractor};
use crate::indexer::catalog::{Catalog, DocumentRecord};
use crate::indexer::state::{IndexState, IndexStats, SharedState};
use crate::search::HybridSearchEngine;
use crate::storage::Storage;
use crate::vector::similarity::normalize;

/// What happened to one document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexOutcome {
    Inserted,
    Updated,
    Skipped,
}

/// Result of indexing one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentReport {
    pub doc_id: String,
    pub outcome: IndexOutcome,
    pub pages: usize,
    pub chunks_embedded: usize,
    pub chunks_failed: usize,
}

/// Counters of a batch run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndexingStats {
    pub documents_seen: usize,
    pub documents_inserted: usize,
    pub documents_updated: usize,
    pub documents_skipped: usize,
    pub documents_failed: usize,
    pub pages_indexed: usize,
    pub chunks_embedded: usize,
    pub chunks_failed: usize,
    pub errors: Vec<String>,
}

impl IndexingStats {
    fn record(&mut self, report: &DocumentReport) {
        match report.outcome {
            IndexOutcome::Inserted => self.documents_inserted += 1,
            IndexOutcome::Updated => self.documents_updated += 1,
            IndexOutcome::Skipped => {
                self.documents_skipped += 1;
                return;
            }
        }
        self.pages_indexed += report.pages;
        self.chunks_embedded += report.chunks_embedded;
        self.chunks_failed += report.chunks_failed;
    }

    fn fail(&mut self, doc_id: &str, error: &FolioError) {
        self.documents_failed += 1;
        self.errors.push(format!("{doc_id}: {error}"));
    }
}

/// A file to index and the id its document gets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub doc_id: String,
    pub path: PathBuf,
}

impl SourceFile {
    /// Use the path itself, with `/` separators, as the id.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref().to_path_buf();
        SourceFile {
            doc_id: path_id(&path),
            path,
        }
    }

    /// Use the path relative to `root` as the id.
    pub fn relative_to<P: AsRef<Path>>(root: &Path, path: P) -> Self {
        let path = path.as_ref().to_path_buf();
        let doc_id = path_id(path.strip_prefix(root).unwrap_or(&path));
        SourceFile { doc_id, path }
    }
}

fn path_id(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Clean raw pages, drop the empty ones and order them by page number.
///
/// When a page number repeats, the first occurrence wins.
pub fn prepare_pages(pages: Vec<(u32, String)>) -> Vec<Page> {
    let mut prepared: Vec<Page> = pages
        .into_iter()
        .map(|(num, text)| Page::new(num, clean_text(&text)))
        .filter(|p| !p.text.is_empty())
        .collect();
    prepared.sort_by_key(|p| p.page_num);
    prepared.dedup_by_key(|p| p.page_num);
    prepared
}

/// Hex SHA-256 over page numbers and cleaned texts.
pub fn content_hash(pages: &[Page]) -> String {
    let mut hasher = Sha256::new();
    for page in pages {
        hasher.update(page.page_num.to_le_bytes());
        hasher.update((page.text.len() as u64).to_le_bytes());
        hasher.update(page.text.as_bytes());
    }
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

/// Map a failed extraction task to an error. A task cancelled by runtime
/// shutdown is reported as such; a panicking backend is an extraction error.
fn extraction_join_error(path: &Path, error: tokio::task::JoinError) -> FolioError {
    if error.is_cancelled() {
        FolioError::cancelled(format!("extraction of {} was cancelled", path.display()))
    } else {
        FolioError::extraction(path.display().to_string(), format!("extraction backend panicked: {error}"))
    }
}

/// Keeps the persisted catalog and the in-memory indexes in step.
#[derive(Debug)]
pub struct IncrementalIndexer {
    config: FolioConfig,
    catalog: Catalog,
    state: SharedState,
    chunker: Chunker,
    orchestrator: Option<Arc<EmbeddingOrchestrator>>,
    extractors: Arc<ExtractorChain>,
    commit_lock: Mutex<()>,
    skipped_records: usize,
}

impl IncrementalIndexer {
    /// Validate the configuration, load every stored record and rebuild the
    /// in-memory indexes from them.
    ///
    /// A record that cannot be decoded or fails its consistency checks is
    /// logged and left out; see [`skipped_records`](Self::skipped_records).
    /// The document is reinserted the next time its source is indexed.
    pub fn open(config: FolioConfig, storage: Arc<dyn Storage>) -> Result<Self> {
        config.validate()?;
        let chunker = Chunker::from_config(&config.chunking)?;
        let catalog = Catalog::new(storage);

        let start = Instant::now();
        let mut state = IndexState::new(&config);
        let mut skipped_records = 0;
        for (doc_id, loaded) in catalog.load_all()? {
            let installed = loaded.and_then(|record| state.replace(record));
            if let Err(e) = installed {
                warn!(doc_id = %doc_id, error = %e, "stored record skipped; reindex or reset to repair it");
                skipped_records += 1;
            }
        }
        info!(
            documents = state.documents.len(),
            pages = state.lexical.page_count(),
            vectors = state.vector.len(),
            skipped = skipped_records,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "index loaded"
        );

        Ok(IncrementalIndexer {
            config,
            catalog,
            state: Arc::new(parking_lot::RwLock::new(state)),
            chunker,
            orchestrator: None,
            extractors: Arc::new(ExtractorChain::new(vec![Box::new(PlainTextExtractor::new())])),
            commit_lock: Mutex::new(()),
            skipped_records,
        })
    }

    /// Wire in an embedding backend. Ignored when embedding is disabled in
    /// the configuration.
    pub fn with_embedder(mut self, embedder: Arc<dyn Embedder>) -> Result<Self> {
        if !self.config.embedding.enabled {
            info!(embedder = embedder.name(), "embedding disabled, running lexical only");
            return Ok(self);
        }
        let orchestrator = EmbeddingOrchestrator::new(embedder, self.config.embedding.clone())?;
        self.orchestrator = Some(Arc::new(orchestrator));
        Ok(self)
    }

    /// Replace the extraction backends.
    pub fn with_extractors(mut self, extractors: ExtractorChain) -> Self {
        self.extractors = Arc::new(extractors);
        self
    }

    pub fn config(&self) -> &FolioConfig {
        &self.config
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn state(&self) -> SharedState {
        Arc::clone(&self.state)
    }

    /// Stored records that could not be loaded when the index was opened.
    pub fn skipped_records(&self) -> usize {
        self.skipped_records
    }

    pub fn has_embedder(&self) -> bool {
        self.orchestrator.is_some()
    }

    pub fn extractors(&self) -> &ExtractorChain {
        &self.extractors
    }

    /// A search engine reading the same shared state.
    pub fn search_engine(&self) -> Result<HybridSearchEngine> {
        HybridSearchEngine::new(
            self.state(),
            self.orchestrator.clone(),
            self.config.clone(),
        )
    }

    pub fn stats(&self) -> IndexStats {
        self.state.read().stats()
    }

    /// Index one document from already-extracted `(page_num, text)` pairs.
    pub async fn index_document(
        &self,
        doc_id: &str,
        pages: Vec<(u32, String)>,
        source: Option<String>,
    ) -> Result<DocumentReport> {
        if doc_id.is_empty() {
            return Err(FolioError::invalid_argument("document id must not be empty"));
        }

        let pages = prepare_pages(pages);
        let hash = content_hash(&pages);

        let existing_hash = self
            .state
            .read()
            .document(doc_id)
            .map(|r| r.meta.content_hash.clone());
        if self.config.indexing.skip_unchanged && existing_hash.as_deref() == Some(hash.as_str()) {
            debug!(doc_id = %doc_id, "document unchanged, skipped");
            return Ok(DocumentReport {
                doc_id: doc_id.to_string(),
                outcome: IndexOutcome::Skipped,
                pages: pages.len(),
                chunks_embedded: 0,
                chunks_failed: 0,
            });
        }

        let chunks: Vec<Chunk> = pages
            .iter()
            .flat_map(|p| self.chunker.chunk_page(&PageKey::new(doc_id, p.page_num), &p.text))
            .collect();

        let (outcome, attempted) = match &self.orchestrator {
            Some(orchestrator) => (self.embed(orchestrator, &chunks).await, true),
            None => (
                EmbeddingOutcome {
                    failed: chunks.iter().map(|c| c.key.clone()).collect(),
                    ..EmbeddingOutcome::default()
                },
                false,
            ),
        };

        let record = DocumentRecord {
            meta: DocumentMeta {
                doc_id: doc_id.to_string(),
                content_hash: hash,
                page_count: pages.len() as u32,
                source,
                indexed_at: Utc::now(),
            },
            pages,
            chunks,
            vectors: outcome.vectors,
            failed: outcome.failed,
        };

        let report = DocumentReport {
            doc_id: doc_id.to_string(),
            outcome: if existing_hash.is_some() {
                IndexOutcome::Updated
            } else {
                IndexOutcome::Inserted
            },
            pages: record.pages.len(),
            chunks_embedded: record.vectors.len(),
            chunks_failed: if attempted { record.failed.len() } else { 0 },
        };

        self.commit(record, None)?;
        info!(
            doc_id = %doc_id,
            outcome = ?report.outcome,
            pages = report.pages,
            chunks_embedded = report.chunks_embedded,
            chunks_failed = report.chunks_failed,
            "document indexed"
        );
        Ok(report)
    }

    /// Extract and index files, at most `indexing.workers` at a time.
    ///
    /// A file that cannot be extracted or indexed is logged, counted as failed
    /// and skipped; the run continues.
    pub async fn index_sources(&self, sources: Vec<SourceFile>) -> IndexingStats {
        let start = Instant::now();
        let mut stats = IndexingStats::default();

        let mut seen = BTreeSet::new();
        let sources: Vec<SourceFile> = sources
            .into_iter()
            .filter(|s| seen.insert(s.doc_id.clone()))
            .collect();
        stats.documents_seen = sources.len();

        let workers = self.config.indexing.effective_workers();
        let mut results = stream::iter(sources)
            .map(|source| async move {
                let result = self.index_source(&source).await;
                (source.doc_id, result)
            })
            .buffer_unordered(workers);

        while let Some((doc_id, result)) = results.next().await {
            match result {
                Ok(report) => stats.record(&report),
                Err(e) => {
                    warn!(doc_id = %doc_id, error = %e, "document skipped");
                    stats.fail(&doc_id, &e);
                }
            }
        }

        info!(
            seen = stats.documents_seen,
            inserted = stats.documents_inserted,
            updated = stats.documents_updated,
            skipped = stats.documents_skipped,
            failed = stats.documents_failed,
            chunks_failed = stats.chunks_failed,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "indexing run finished"
        );
        stats
    }

    /// Like [`index_sources`](Self::index_sources), with ids derived from the paths.
    pub async fn index_paths<P: AsRef<Path>>(&self, paths: &[P]) -> IndexingStats {
        self.index_sources(paths.iter().map(SourceFile::from_path).collect())
            .await
    }

    async fn index_source(&self, source: &SourceFile) -> Result<DocumentReport> {
        let extractors = Arc::clone(&self.extractors);
        let path = source.path.clone();
        let pages = tokio::task::spawn_blocking(move || extractors.extract(&path))
            .await
            .map_err(|e| extraction_join_error(&source.path, e))??;

        self.index_document(
            &source.doc_id,
            pages,
            Some(source.path.display().to_string()),
        )
        .await
    }

    /// Remove a document from storage and from both indexes.
    pub fn delete_document(&self, doc_id: &str) -> Result<bool> {
        let _guard = self.commit_lock.lock();
        let stored = self.catalog.remove(doc_id)?;
        let indexed = self.state.write().remove_document(doc_id).is_some();
        if stored || indexed {
            info!(doc_id = %doc_id, "document deleted");
        }
        Ok(stored || indexed)
    }

    /// Clear storage and both indexes.
    pub fn reset(&self) -> Result<()> {
        let _guard = self.commit_lock.lock();
        self.catalog.clear()?;
        self.state.write().clear();
        info!("index reset");
        Ok(())
    }

    /// Retry embedding of every chunk still lacking a vector.
    pub async fn reembed_failed(&self) -> Result<IndexingStats> {
        let orchestrator = self
            .orchestrator
            .clone()
            .ok_or_else(|| FolioError::embedding_unavailable("no embedder configured"))?;

        let pending: Vec<DocumentRecord> = self
            .state
            .read()
            .documents
            .values()
            .filter(|r| !r.failed.is_empty())
            .cloned()
            .collect();

        let mut stats = IndexingStats {
            documents_seen: pending.len(),
            ..IndexingStats::default()
        };

        for mut record in pending {
            let doc_id = record.doc_id().to_string();
            let outcome = self.embed(&orchestrator, &record.failed_chunks()).await;
            stats.chunks_embedded += outcome.vectors.len();
            stats.chunks_failed += outcome.failed.len();
            if outcome.vectors.is_empty() {
                stats.documents_skipped += 1;
                continue;
            }

            let hash = record.meta.content_hash.clone();
            record.failed = outcome.failed;
            record.vectors.extend(outcome.vectors);
            match self.commit(record, Some(&hash)) {
                Ok(_) => {
                    stats.documents_updated += 1;
                    info!(doc_id = %doc_id, "missing vectors embedded");
                }
                Err(e) => {
                    warn!(doc_id = %doc_id, error = %e, "re-embedding not applied");
                    stats.fail(&doc_id, &e);
                }
            }
        }
        Ok(stats)
    }

    async fn embed(&self, orchestrator: &EmbeddingOrchestrator, chunks: &[Chunk]) -> EmbeddingOutcome {
        let mut outcome = orchestrator.embed_chunks(chunks).await;

        let unusable: Vec<_> = outcome
            .vectors
            .iter()
            .filter(|(_, v)| normalize(v).is_err())
            .map(|(k, _)| k.clone())
            .collect();
        for key in unusable {
            warn!(chunk = %key, "embedder returned a zero or non-finite vector");
            outcome.vectors.remove(&key);
            outcome.failed.insert(key);
        }
        outcome
    }

    /// Persist a record and swap it into the shared state.
    ///
    /// With `expected_hash`, the commit only happens if the stored version
    /// still has that content hash.
    fn commit(&self, record: DocumentRecord, expected_hash: Option<&str>) -> Result<()> {
        let _guard = self.commit_lock.lock();
        let doc_id = record.doc_id().to_string();

        if let Some(expected) = expected_hash {
            let current = self
                .state
                .read()
                .document(&doc_id)
                .map(|r| r.meta.content_hash.clone());
            if current.as_deref() != Some(expected) {
                return Err(FolioError::consistency(format!(
                    "document {doc_id} changed while it was being re-embedded"
                )));
            }
        }

        record.validate(self.config.embedding.dimension)?;
        self.catalog.save(&record)?;

        let result = self.state.write().replace(record);
        if let Err(e) = result {
            let previous = self.state.read().document(&doc_id).cloned();
            let restored = match previous {
                Some(old) => self.catalog.save(&old),
                None => self.catalog.remove(&doc_id).map(|_| ()),
            };
            if let Err(restore) = restored {
                warn!(doc_id = %doc_id, error = %restore, "stored record could not be restored");
            }
            return Err(e);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HashingEmbedder;
    use crate::storage::MemoryStorage;

    fn config() -> FolioConfig {
        let mut config = FolioConfig::default();
        config.embedding.dimension = 64;
        config.embedding.initial_backoff_ms = 1;
        config.chunking.max_chunk_chars = 40;
        config.chunking.chunk_overlap_chars = 10;
        config.chunking.boundary_lookback_chars = 10;
        config
    }

    fn indexer() -> IncrementalIndexer {
        IncrementalIndexer::open(config(), Arc::new(MemoryStorage::new()))
            .unwrap()
            .with_embedder(Arc::new(HashingEmbedder::new(64).unwrap()))
            .unwrap()
    }

    fn pages(texts: &[&str]) -> Vec<(u32, String)> {
        texts
            .iter()
            .enumerate()
            .map(|(i, t)| (i as u32 + 1, t.to_string()))
            .collect()
    }

    #[test]
    fn test_prepare_pages_and_hash() {
        let prepared = prepare_pages(vec![
            (2, "  second\t\tpage ".to_string()),
            (1, "first".to_string()),
            (3, " \n ".to_string()),
        ]);
        assert_eq!(prepared, vec![Page::new(1, "first"), Page::new(2, "second page")]);

        let same = prepare_pages(vec![(1, "first".to_string()), (2, "second page".to_string())]);
        assert_eq!(content_hash(&prepared), content_hash(&same));
        assert_ne!(content_hash(&prepared), content_hash(&same[..1]));
        assert_eq!(content_hash(&prepared).len(), 64);
    }

    #[tokio::test]
    async fn test_soft_hyphenated_words_are_indexed_whole() {
        let indexer = indexer();
        indexer
            .index_document("pdf", pages(&["avia\u{00AD}tion civile\u{200B} et s\u{00E9}cu\u{00AD}rit\u{00E9}"]), None)
            .await
            .unwrap();

        let state = indexer.state();
        let state = state.read();
        assert_eq!(state.lexical.df("aviation"), 1);
        assert_eq!(state.lexical.df("securite"), 1);
        assert_eq!(state.lexical.df("avia"), 0);
        assert_eq!(state.page_text(&PageKey::new("pdf", 1)), Some("aviation civile et s\u{00E9}curit\u{00E9}"));
    }

    #[tokio::test]
    async fn test_extraction_join_errors() {
        let path = Path::new("docs/report.txt");

        let task = tokio::spawn(std::future::pending::<()>());
        task.abort();
        let cancelled = task.await.unwrap_err();
        let err = extraction_join_error(path, cancelled);
        assert!(matches!(err, FolioError::Cancelled(_)));
        assert!(err.to_string().contains("docs/report.txt"));

        let panicked = tokio::task::spawn_blocking(|| panic!("decoder crashed")).await.unwrap_err();
        let err = extraction_join_error(path, panicked);
        assert!(matches!(err, FolioError::Extraction { .. }));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_source_file_ids() {
        let source = SourceFile::relative_to(Path::new("/data"), "/data/sub/report.txt");
        assert_eq!(source.doc_id, "sub/report.txt");
        assert_eq!(SourceFile::from_path("a/b.txt").doc_id, "a/b.txt");
    }

    #[tokio::test]
    async fn test_insert_skip_update() {
        let indexer = indexer();
        let text = "Civil aviation authorities publish safety reports every year.";

        let report = indexer.index_document("doc", pages(&[text]), None).await.unwrap();
        assert_eq!(report.outcome, IndexOutcome::Inserted);
        assert!(report.chunks_embedded > 1);
        assert_eq!(report.chunks_failed, 0);

        let before = indexer.catalog().load("doc").unwrap().unwrap();
        let report = indexer.index_document("doc", pages(&[text]), None).await.unwrap();
        assert_eq!(report.outcome, IndexOutcome::Skipped);
        assert_eq!(indexer.catalog().load("doc").unwrap().unwrap(), before);

        let report = indexer
            .index_document("doc", pages(&["Entirely different words."]), None)
            .await
            .unwrap();
        assert_eq!(report.outcome, IndexOutcome::Updated);

        let state = indexer.state();
        let state = state.read();
        assert_eq!(state.lexical.df("aviation"), 0);
        assert_eq!(state.lexical.df("different"), 1);
        assert!(
            state
                .document("doc")
                .unwrap()
                .chunks
                .iter()
                .all(|c| state.vector.contains(&c.key))
        );
        state.check_document("doc").unwrap();
    }

    #[tokio::test]
    async fn test_without_embedder_chunks_are_pending() {
        let indexer = IncrementalIndexer::open(config(), Arc::new(MemoryStorage::new())).unwrap();
        indexer
            .index_document("doc", pages(&["some words on a page"]), None)
            .await
            .unwrap();

        let stats = indexer.stats();
        assert_eq!(stats.vectors, 0);
        assert_eq!(stats.pages_without_vectors, 1);
        assert!(matches!(
            indexer.reembed_failed().await,
            Err(FolioError::EmbeddingUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_reopen_rebuilds_indexes() {
        let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
        {
            let indexer = IncrementalIndexer::open(config(), Arc::clone(&storage))
                .unwrap()
                .with_embedder(Arc::new(HashingEmbedder::new(64).unwrap()))
                .unwrap();
            indexer
                .index_document("a", pages(&["alpha page", "beta page"]), None)
                .await
                .unwrap();
        }

        let reopened = IncrementalIndexer::open(config(), storage).unwrap();
        let stats = reopened.stats();
        assert_eq!(stats.documents, 1);
        assert_eq!(stats.pages, 2);
        assert_eq!(stats.vectors, 2);
        assert!(
            reopened
                .state()
                .read()
                .page_text(&PageKey::new("a", 2))
                .is_some()
        );
    }

    #[tokio::test]
    async fn test_delete_and_reset() {
        let indexer = indexer();
        indexer.index_document("a", pages(&["one"]), None).await.unwrap();
        indexer.index_document("b", pages(&["two"]), None).await.unwrap();

        assert!(indexer.delete_document("a").unwrap());
        assert!(!indexer.delete_document("a").unwrap());
        assert_eq!(indexer.stats().documents, 1);
        assert!(indexer.catalog().load("a").unwrap().is_none());

        indexer.reset().unwrap();
        assert_eq!(indexer.stats(), IndexStats::default());
        assert!(indexer.catalog().doc_ids().unwrap().is_empty());
    }
}
