use std::fs;
use std::path::Path;
use std::sync::Arc;

use tempfile::TempDir;

use folio::config::FolioConfig;
use folio::embedding::HashingEmbedder;
use folio::error::FolioError;
use folio::indexer::{IncrementalIndexer, SourceFile};
use folio::search::{HybridSearchEngine, SearchMode, SearchRequest, SearchResponse, Source};
use folio::storage::{FileStorage, Storage};

const DIMENSION: usize = 256;

fn config() -> FolioConfig {
    let mut config = FolioConfig::default();
    config.embedding.dimension = DIMENSION;
    config.embedding.initial_backoff_ms = 1;
    config
}

fn write_corpus(dir: &Path) {
    let files = [
        (
            "aviation.txt",
            "Civil aviation rules for airline operators.\u{000C}\
             Airport security screening of passengers.\u{000C}\
             Military aviation budgets and procurement.",
        ),
        ("history.txt", "The aviator crossed the channel in a small airplane."),
        ("kitchen.txt", "Bread baking needs flour, water, salt and patience."),
        ("garden.txt", "Tomatoes need sun, water and regular pruning."),
    ];
    for (name, text) in files {
        fs::write(dir.join(name), text).unwrap();
    }
}

async fn open_indexed(docs: &Path, index: &Path) -> IncrementalIndexer {
    let storage: Arc<dyn Storage> = Arc::new(FileStorage::new(index).unwrap());
    let indexer = IncrementalIndexer::open(config(), storage)
        .unwrap()
        .with_embedder(Arc::new(HashingEmbedder::new(DIMENSION).unwrap()))
        .unwrap();

    let mut paths: Vec<_> = fs::read_dir(docs).unwrap().map(|e| e.unwrap().path()).collect();
    paths.sort();
    let sources = paths.iter().map(|p| SourceFile::relative_to(docs, p)).collect();
    let stats = indexer.index_sources(sources).await;
    assert_eq!(stats.documents_failed, 0);
    indexer
}

async fn engine() -> (TempDir, TempDir, HybridSearchEngine) {
    let docs = TempDir::new().unwrap();
    let index = TempDir::new().unwrap();
    write_corpus(docs.path());
    let indexer = open_indexed(docs.path(), index.path()).await;
    let engine = indexer.search_engine().unwrap();
    (docs, index, engine)
}

fn keys(response: &SearchResponse) -> Vec<String> {
    response.results.iter().map(|r| r.key.to_string()).collect()
}

#[tokio::test]
async fn test_hybrid_search_ranks_and_explains() {
    let (_docs, _index, engine) = engine().await;

    let response = engine
        .search(SearchRequest::new("airport security").with_mode(SearchMode::Hybrid))
        .await
        .unwrap();

    let top = &response.results[0];
    assert_eq!(top.key.doc_id, "aviation.txt");
    assert_eq!(top.key.page_num, 2);
    assert_eq!(top.score.source, Source::Both);
    assert_eq!(top.lexical_rank, Some(1));
    assert!(top.similarity.is_some());
    assert!((top.score.normalized - 1.0).abs() < 1e-6);
    assert!(top.snippet.contains("<mark>Airport</mark>"));

    let stats = &response.stats;
    assert!(stats.semantic_available);
    assert!(stats.warnings.is_empty());
    assert!(stats.overlap_count >= 1);
    assert_eq!(stats.total_results, response.results.len());
    assert!(
        response
            .results
            .windows(2)
            .all(|w| w[0].score.raw >= w[1].score.raw)
    );
    assert!(response.results.iter().all(|r| (0.0..=1.0).contains(&r.score.normalized)));
}

#[tokio::test]
async fn test_modes_report_their_own_raw_scores() {
    let (_docs, _index, engine) = engine().await;

    let lexical = engine
        .search(SearchRequest::new("aviation").with_mode(SearchMode::Lexical))
        .await
        .unwrap();
    assert_eq!(lexical.stats.total_results, 2);
    assert!(lexical.results.iter().all(|r| r.score.source == Source::Lexical));
    assert!(
        lexical
            .results
            .iter()
            .all(|r| Some(r.score.raw) == r.lexical_score && r.score.raw > 0.0)
    );

    let semantic = engine
        .search(SearchRequest::new("water and sun for tomatoes").with_mode(SearchMode::Semantic))
        .await
        .unwrap();
    assert_eq!(semantic.results[0].key.doc_id, "garden.txt");
    assert!(semantic.results.iter().all(|r| r.score.source == Source::Semantic));
    assert!(
        semantic
            .results
            .iter()
            .all(|r| Some(r.score.raw) == r.similarity && (-1.0..=1.0).contains(&r.score.raw))
    );
}

#[tokio::test]
async fn test_pagination_is_a_window_of_one_ranking() {
    let (_docs, _index, engine) = engine().await;
    let query = "aviation OR water OR airplane";

    let all = engine
        .search(SearchRequest::new(query).with_limit(10))
        .await
        .unwrap();
    assert!(all.results.len() >= 5);

    let mut paged = Vec::new();
    for offset in 0..all.results.len() {
        let page = engine
            .search(SearchRequest::new(query).with_limit(1).with_offset(offset))
            .await
            .unwrap();
        assert_eq!(page.stats.page, offset + 1);
        assert_eq!(page.stats.total_pages, all.stats.total_results);
        paged.extend(keys(&page));
    }
    assert_eq!(paged, keys(&all));
}

#[tokio::test]
async fn test_boolean_syntax_through_the_engine() {
    let (_docs, _index, engine) = engine().await;

    let response = engine
        .search(SearchRequest::new("aviation NOT military").with_mode(SearchMode::Lexical))
        .await
        .unwrap();
    assert_eq!(keys(&response), vec!["aviation.txt#1".to_string()]);

    let response = engine
        .search(SearchRequest::new("\"security screening\"").with_mode(SearchMode::Lexical))
        .await
        .unwrap();
    assert_eq!(keys(&response), vec!["aviation.txt#2".to_string()]);

    let err = engine
        .search(SearchRequest::new("\"unterminated phrase"))
        .await
        .unwrap_err();
    assert!(matches!(err, FolioError::QuerySyntax { .. }));
}

#[tokio::test]
async fn test_search_after_reopen_without_embedder() {
    let docs = TempDir::new().unwrap();
    let index = TempDir::new().unwrap();
    write_corpus(docs.path());
    drop(open_indexed(docs.path(), index.path()).await);

    let storage: Arc<dyn Storage> = Arc::new(FileStorage::new(index.path()).unwrap());
    let reopened = IncrementalIndexer::open(config(), storage).unwrap();
    let engine = reopened.search_engine().unwrap();
    assert!(!engine.semantic_enabled());

    let response = engine.search(SearchRequest::new("bread")).await.unwrap();
    assert_eq!(keys(&response), vec!["kitchen.txt#1".to_string()]);
    assert!(!response.stats.semantic_available);
    assert_eq!(response.stats.warnings.len(), 1);
}

#[tokio::test]
async fn test_response_serializes_to_json() {
    let (_docs, _index, engine) = engine().await;
    let response = engine.search(SearchRequest::new("bread flour")).await.unwrap();

    let json = serde_json::to_string(&response).unwrap();
    let decoded: SearchResponse = serde_json::from_str(&json).unwrap();
    assert_eq!(keys(&decoded), keys(&response));
    assert_eq!(decoded.results[0].snippet, response.results[0].snippet);
    assert_eq!(decoded.results[0].score.source, response.results[0].score.source);
    assert_eq!(decoded.stats.query, "bread flour");
}
