//! Output formatting for CLI commands.

use serde::Serialize;

use crate::error::Result;
use crate::indexer::{IndexStats, IndexingStats};
use crate::search::SearchResponse;

/// Print any serializable value as pretty JSON.
pub fn output_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn output_search_human(response: &SearchResponse) {
    let stats = &response.stats;
    println!(
        "{} results for '{}' ({} mode, page {}/{}, {:.1} ms)",
        stats.total_results,
        stats.query,
        stats.mode,
        stats.page,
        stats.total_pages.max(1),
        stats.total_ms
    );
    for warning in &stats.warnings {
        println!("warning: {warning}");
    }
    println!();

    for (i, result) in response.results.iter().enumerate() {
        println!(
            "{:>3}. {}  page {}  [{}] score {:.4} ({:.0}%)",
            i + 1,
            result.key.doc_id,
            result.key.page_num,
            result.score.source,
            result.score.raw,
            result.score.normalized * 100.0
        );
        if !result.snippet.is_empty() {
            println!("     {}", result.snippet);
        }
    }
}

pub fn output_indexing_human(stats: &IndexingStats) {
    println!("Documents seen:     {}", stats.documents_seen);
    println!("  inserted:         {}", stats.documents_inserted);
    println!("  updated:          {}", stats.documents_updated);
    println!("  skipped:          {}", stats.documents_skipped);
    println!("  failed:           {}", stats.documents_failed);
    println!("Pages indexed:      {}", stats.pages_indexed);
    println!("Chunks embedded:    {}", stats.chunks_embedded);
    println!("Chunks failed:      {}", stats.chunks_failed);
    for error in &stats.errors {
        println!("error: {error}");
    }
}

pub fn output_stats_human(stats: &IndexStats) {
    println!("Documents:              {}", stats.documents);
    println!("Pages:                  {}", stats.pages);
    println!("Terms:                  {}", stats.terms);
    println!("Chunks:                 {}", stats.chunks);
    println!("Vectors:                {}", stats.vectors);
    println!("Pages without vectors:  {}", stats.pages_without_vectors);
    println!("Average page length:    {:.1}", stats.avg_page_length);
}
