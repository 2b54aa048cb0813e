//! Hybrid search engine.
//!
//! A query runs through `parse`, `retrieve`, `fuse`, `paginate` and `snippet`.
//! The query embedding is computed first, outside any lock. Lexical and
//! vector retrieval then run in parallel against one read guard of the shared
//! state, so both see the same snapshot, and snippets are cut from that same
//! snapshot. Problems on the semantic side never fail a search: they are
//! logged, reported in [`SearchStats::warnings`] and the search continues with
//! the lexical list alone.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, warn};

use crate::config::FolioConfig;
use crate::embedding::EmbeddingOrchestrator;
use crate::error::{FolioError, Result};
use crate::indexer::state::{IndexState, SharedState};
use crate::query::{HighlightTerms, QueryParser};
use crate::search::fusion::{FusedEntry, RrfFusion};
use crate::search::snippet::SnippetBuilder;
use crate::search::types::{
    Score, SearchMode, SearchRequest, SearchResponse, SearchResult, SearchStats, Source,
};
use crate::vector::SemanticHits;

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}

/// Query surface over the shared lexical and vector indexes.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use folio::config::FolioConfig;
/// use folio::indexer::IncrementalIndexer;
/// use folio::search::{SearchMode, SearchRequest};
/// use folio::storage::MemoryStorage;
///
/// # async fn example() -> folio::error::Result<()> {
/// let indexer = IncrementalIndexer::open(FolioConfig::default(), Arc::new(MemoryStorage::new()))?;
/// indexer
///     .index_document("manual", vec![(1, "civil aviation safety".to_string())], None)
///     .await?;
///
/// let engine = indexer.search_engine()?;
/// let request = SearchRequest::new("\"civil aviation\"").with_mode(SearchMode::Lexical);
/// let response = engine.search(request).await?;
/// for result in &response.results {
///     println!("{} {:.3} {}", result.key, result.score.raw, result.snippet);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct HybridSearchEngine {
    state: SharedState,
    orchestrator: Option<Arc<EmbeddingOrchestrator>>,
    config: FolioConfig,
    parser: QueryParser,
    snippets: SnippetBuilder,
    fusion: RrfFusion,
}

impl HybridSearchEngine {
    /// Create an engine over `state`. Without an orchestrator, semantic
    /// retrieval is unavailable and hybrid searches run lexical only.
    pub fn new(
        state: SharedState,
        orchestrator: Option<Arc<EmbeddingOrchestrator>>,
        config: FolioConfig,
    ) -> Result<Self> {
        config.validate()?;
        if let Some(orchestrator) = &orchestrator {
            let index_dimension = state.read().vector.dimension();
            if orchestrator.dimension() != index_dimension {
                return Err(FolioError::configuration(format!(
                    "embedding dimension {} does not match vector index dimension {index_dimension}",
                    orchestrator.dimension()
                )));
            }
        }

        let analyzer = state.read().lexical.analyzer().clone();
        Ok(HybridSearchEngine {
            parser: QueryParser::new(analyzer.clone()),
            snippets: SnippetBuilder::new(analyzer, &config.search),
            fusion: RrfFusion::from_config(&config.hybrid),
            state,
            orchestrator,
            config,
        })
    }

    pub fn config(&self) -> &FolioConfig {
        &self.config
    }

    /// Whether a query embedder is wired in.
    pub fn semantic_enabled(&self) -> bool {
        self.orchestrator.is_some()
    }

    /// Size of each strategy's candidate list for a result window.
    pub fn candidate_limit(&self, limit: usize, offset: usize) -> usize {
        limit
            .saturating_add(offset)
            .saturating_mul(self.config.hybrid.candidate_multiplier)
            .max(self.config.hybrid.min_candidates)
    }

    /// Run a search.
    ///
    /// Fails only for invalid requests and query syntax errors.
    pub async fn search(&self, request: SearchRequest) -> Result<SearchResponse> {
        let total_start = Instant::now();

        let mode = request.mode.unwrap_or(self.config.hybrid.default_mode);
        let limit = match request.limit {
            Some(0) => return Err(FolioError::invalid_argument("limit must be positive")),
            Some(limit) => limit.min(self.config.search.max_limit),
            None => self.config.search.default_limit,
        };
        let weights = request.weights.unwrap_or_else(|| self.fusion.weights());
        weights.validate()?;

        let mut stats = SearchStats {
            query: request.query.clone(),
            mode,
            page: request.offset / limit + 1,
            ..SearchStats::default()
        };

        let query_text = request.query.trim();
        if query_text.is_empty() {
            stats.total_ms = elapsed_ms(total_start);
            return Ok(SearchResponse {
                results: Vec::new(),
                stats,
            });
        }

        let parse_start = Instant::now();
        let lexical_query = match mode {
            SearchMode::Semantic => None,
            SearchMode::Lexical | SearchMode::Hybrid => Some(self.parser.parse(query_text)?),
        };
        stats.parse_ms = elapsed_ms(parse_start);

        let embed_start = Instant::now();
        let query_vector = match mode {
            SearchMode::Lexical => None,
            SearchMode::Semantic | SearchMode::Hybrid => self.embed_query(query_text, &mut stats).await,
        };
        let embed_ms = elapsed_ms(embed_start);

        let candidates = self.candidate_limit(limit, request.offset);
        let guard = self.state.read();
        let index: &IndexState = &guard;

        let ((lexical, lexical_ms), (semantic, vector_ms)) = rayon::join(
            || {
                let start = Instant::now();
                let list = lexical_query
                    .as_ref()
                    .map(|q| index.lexical.query(q, candidates, 0));
                (list, elapsed_ms(start))
            },
            || {
                let start = Instant::now();
                let hits = query_vector
                    .as_ref()
                    .map(|v| index.vector.query_with_chunks(v, candidates));
                (hits, elapsed_ms(start))
            },
        );

        let semantic: Option<SemanticHits> = match semantic {
            Some(Ok(hits)) => Some(hits),
            Some(Err(e)) => {
                warn!(error = %e, "vector retrieval failed, continuing without it");
                stats.warnings.push(format!("semantic retrieval unavailable: {e}"));
                None
            }
            None => None,
        };
        stats.semantic_available = semantic.is_some();
        stats.lexical_ms = lexical_ms;
        stats.semantic_ms = embed_ms + vector_ms;
        stats.lexical_candidates = lexical.as_ref().map_or(0, |l| l.len());
        stats.semantic_candidates = semantic.as_ref().map_or(0, |h| h.ranked.len());

        let fusion_start = Instant::now();
        let fusion = self.fusion.with_weights(weights);
        let semantic_list = semantic.as_ref().map(|h| &h.ranked);
        let fused = match mode {
            SearchMode::Lexical => fusion.fuse(lexical.as_ref(), None),
            SearchMode::Semantic => fusion.fuse(None, semantic_list),
            SearchMode::Hybrid => fusion.fuse(lexical.as_ref(), semantic_list),
        };
        stats.overlap_count = fused.iter().filter(|e| e.source == Source::Both).count();
        stats.total_results = match (mode, &lexical) {
            (SearchMode::Lexical, Some(list)) => list.total_hits,
            _ => fused.len(),
        };
        stats.total_pages = stats.total_results.div_ceil(limit);
        let best = fused.first().map_or(0.0, |e| raw_score(mode, e));
        stats.fusion_ms = elapsed_ms(fusion_start);

        let snippet_start = Instant::now();
        let highlights = lexical_query
            .as_ref()
            .map(|q| q.highlight_terms())
            .unwrap_or_default();
        let results: Vec<SearchResult> = fused
            .iter()
            .skip(request.offset)
            .take(limit)
            .map(|entry| {
                let raw = raw_score(mode, entry);
                let normalized = if best > 0.0 {
                    (raw / best).clamp(0.0, 1.0)
                } else {
                    0.0
                };
                SearchResult {
                    key: entry.key.clone(),
                    score: Score {
                        raw,
                        normalized,
                        source: entry.source,
                    },
                    lexical_rank: entry.lexical_rank,
                    semantic_rank: entry.semantic_rank,
                    lexical_score: entry.lexical_score,
                    similarity: entry.similarity,
                    snippet: self.snippet(index, entry, semantic.as_ref(), &highlights),
                }
            })
            .collect();
        stats.snippet_ms = elapsed_ms(snippet_start);
        drop(guard);

        stats.total_ms = elapsed_ms(total_start);
        debug!(
            query = %stats.query,
            mode = %mode,
            results = results.len(),
            total = stats.total_results,
            parse_ms = stats.parse_ms,
            lexical_ms = stats.lexical_ms,
            semantic_ms = stats.semantic_ms,
            fusion_ms = stats.fusion_ms,
            snippet_ms = stats.snippet_ms,
            total_ms = stats.total_ms,
            "search finished"
        );

        Ok(SearchResponse { results, stats })
    }

    async fn embed_query(&self, query: &str, stats: &mut SearchStats) -> Option<Vec<f32>> {
        let Some(orchestrator) = &self.orchestrator else {
            stats
                .warnings
                .push("semantic retrieval unavailable: no embedder configured".to_string());
            return None;
        };

        match orchestrator.embed_query(query).await {
            Ok(vector) => Some(vector),
            Err(e) => {
                warn!(error = %e, "query embedding failed, falling back to lexical results");
                stats.warnings.push(format!("semantic retrieval unavailable: {e}"));
                None
            }
        }
    }

    fn snippet(
        &self,
        index: &IndexState,
        entry: &FusedEntry,
        semantic: Option<&SemanticHits>,
        highlights: &HighlightTerms,
    ) -> String {
        if entry.lexical_rank.is_some() {
            if let Some(text) = index.page_text(&entry.key) {
                return self.snippets.highlight(text, highlights);
            }
        }

        let chunk_text = semantic
            .and_then(|h| h.best_chunks.get(&entry.key))
            .and_then(|chunk| index.chunk_text(chunk));
        match chunk_text {
            Some(text) if !highlights.is_empty() => self.snippets.highlight(text, highlights),
            Some(text) => self.snippets.excerpt(text),
            None => index
                .page_text(&entry.key)
                .map(|text| self.snippets.excerpt(text))
                .unwrap_or_default(),
        }
    }
}

/// Raw score shown for a fused entry in the given mode.
fn raw_score(mode: SearchMode, entry: &FusedEntry) -> f32 {
    match mode {
        SearchMode::Lexical => entry.lexical_score.unwrap_or(0.0),
        SearchMode::Semantic => entry.similarity.unwrap_or(0.0),
        SearchMode::Hybrid => entry.score,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::{Embedder, HashingEmbedder};
    use crate::indexer::IncrementalIndexer;
    use crate::search::types::FusionWeights;
    use crate::storage::MemoryStorage;
    use async_trait::async_trait;

    #[derive(Debug)]
    struct Down;

    #[async_trait]
    impl Embedder for Down {
        async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Err(FolioError::embedding_unavailable("service down"))
        }

        fn dimension(&self) -> usize {
            256
        }
    }

    fn config() -> FolioConfig {
        let mut config = FolioConfig::default();
        config.embedding.dimension = 256;
        config.embedding.initial_backoff_ms = 1;
        config
    }

    async fn corpus(with_embedder: bool) -> IncrementalIndexer {
        let mut indexer = IncrementalIndexer::open(config(), Arc::new(MemoryStorage::new())).unwrap();
        if with_embedder {
            indexer = indexer
                .with_embedder(Arc::new(HashingEmbedder::new(256).unwrap()))
                .unwrap();
        }
        let docs = [
            ("manual", vec!["Civil aviation safety rules.", "Military aviation budget."]),
            ("history", vec!["The aviator flew over civil airfields."]),
            ("cooking", vec!["Bread needs flour, water and patience."]),
        ];
        for (doc_id, pages) in docs {
            let pages = pages
                .into_iter()
                .enumerate()
                .map(|(i, t)| (i as u32 + 1, t.to_string()))
                .collect();
            indexer.index_document(doc_id, pages, None).await.unwrap();
        }
        indexer
    }

    fn keys(response: &SearchResponse) -> Vec<String> {
        response.results.iter().map(|r| r.key.to_string()).collect()
    }

    #[tokio::test]
    async fn test_lexical_search_with_snippets() {
        let engine = corpus(false).await.search_engine().unwrap();
        let response = engine
            .search(SearchRequest::new("aviation NOT military").with_mode(SearchMode::Lexical))
            .await
            .unwrap();

        assert_eq!(keys(&response), vec!["manual#1"]);
        let result = &response.results[0];
        assert_eq!(result.score.source, Source::Lexical);
        assert_eq!(result.score.normalized, 1.0);
        assert_eq!(result.lexical_rank, Some(1));
        assert!(result.snippet.contains("<mark>aviation</mark>"));
        assert_eq!(response.stats.total_results, 1);
        assert_eq!(response.stats.total_pages, 1);
        assert!(response.stats.warnings.is_empty());
    }

    #[tokio::test]
    async fn test_hybrid_without_embedder_degrades_to_lexical() {
        let engine = corpus(false).await.search_engine().unwrap();
        let response = engine.search(SearchRequest::new("aviat*")).await.unwrap();

        assert_eq!(response.stats.mode, SearchMode::Hybrid);
        assert!(!response.stats.semantic_available);
        assert_eq!(response.stats.warnings.len(), 1);
        assert_eq!(response.len(), 3);
        assert!(response.results.iter().all(|r| r.score.source == Source::Lexical));
        let first = &response.results[0];
        assert!((first.score.raw - 1.0 / 61.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_hybrid_with_embedder_labels_sources() {
        let engine = corpus(true).await.search_engine().unwrap();
        let response = engine
            .search(SearchRequest::new("civil aviation").with_limit(10))
            .await
            .unwrap();

        assert!(response.stats.semantic_available);
        assert!(response.stats.semantic_candidates > 0);
        let manual = response
            .results
            .iter()
            .find(|r| r.key.to_string() == "manual#1")
            .unwrap();
        assert_eq!(manual.score.source, Source::Both);
        assert!(manual.similarity.is_some());
        assert!(response.stats.overlap_count >= 1);
        assert!(
            response
                .results
                .windows(2)
                .all(|w| w[0].score.raw >= w[1].score.raw)
        );
    }

    #[tokio::test]
    async fn test_semantic_mode_uses_chunk_excerpts() {
        let engine = corpus(true).await.search_engine().unwrap();
        let response = engine
            .search(SearchRequest::new("bread flour").with_mode(SearchMode::Semantic))
            .await
            .unwrap();

        assert_eq!(response.results[0].key.to_string(), "cooking#1");
        assert_eq!(response.results[0].score.source, Source::Semantic);
        assert_eq!(response.results[0].snippet, "Bread needs flour, water and patience.");
        assert!(response.results.iter().all(|r| r.lexical_rank.is_none()));
    }

    #[tokio::test]
    async fn test_semantic_mode_without_embedder_is_empty() {
        let engine = corpus(false).await.search_engine().unwrap();
        let response = engine
            .search(SearchRequest::new("aviation").with_mode(SearchMode::Semantic))
            .await
            .unwrap();
        assert!(response.is_empty());
        assert!(!response.stats.warnings.is_empty());
    }

    #[tokio::test]
    async fn test_embedder_outage_keeps_lexical_results() {
        let indexer = corpus(true).await;
        let orchestrator = EmbeddingOrchestrator::new(Arc::new(Down), config().embedding).unwrap();
        let engine = HybridSearchEngine::new(indexer.state(), Some(Arc::new(orchestrator)), config()).unwrap();

        let response = engine.search(SearchRequest::new("aviation")).await.unwrap();
        assert_eq!(response.len(), 2);
        assert!(!response.stats.semantic_available);
        assert!(response.stats.warnings[0].contains("service down"));
    }

    #[tokio::test]
    async fn test_pagination() {
        let engine = corpus(false).await.search_engine().unwrap();
        let request = SearchRequest::new("aviat*").with_mode(SearchMode::Lexical);
        let all = engine.search(request.clone()).await.unwrap();
        let second = engine.search(request.with_limit(2).with_offset(2)).await.unwrap();

        assert_eq!(second.len(), 1);
        assert_eq!(second.results[0].key, all.results[2].key);
        assert_eq!(second.stats.page, 2);
        assert_eq!(second.stats.total_pages, 2);
        assert_eq!(second.results[0].lexical_rank, Some(3));
    }

    #[tokio::test]
    async fn test_request_validation() {
        let engine = corpus(false).await.search_engine().unwrap();

        let empty = engine.search(SearchRequest::new("   ")).await.unwrap();
        assert!(empty.is_empty());

        let err = engine.search(SearchRequest::new("\"civil aviation")).await.unwrap_err();
        assert!(matches!(err, FolioError::QuerySyntax { position: 0, .. }));

        assert!(engine.search(SearchRequest::new("x").with_limit(0)).await.is_err());
        assert!(
            engine
                .search(SearchRequest::new("x").with_weights(FusionWeights::new(-1.0, 1.0)))
                .await
                .is_err()
        );
    }

    #[test]
    fn test_candidate_limit() {
        let config = config();
        let state = IndexState::shared(&config);
        let engine = HybridSearchEngine::new(state, None, config).unwrap();
        assert_eq!(engine.candidate_limit(10, 0), 100);
        assert_eq!(engine.candidate_limit(50, 10), 300);
    }
}
