//! Command implementations for the Folio CLI.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::cli::args::*;
use crate::cli::output::*;
use crate::config::FolioConfig;
use crate::embedding::HashingEmbedder;
use crate::error::{FolioError, Result};
use crate::extraction::ExtractorChain;
use crate::indexer::{IncrementalIndexer, SourceFile};
use crate::search::SearchRequest;
use crate::storage::{FileStorage, Storage};

/// Execute a CLI command.
pub async fn execute_command(args: FolioArgs) -> Result<()> {
    match &args.command {
        Command::Index(index_args) => index_directory(index_args.clone(), &args).await,
        Command::Search(search_args) => search_index(search_args.clone(), &args).await,
        Command::Stats(stats_args) => show_stats(stats_args.clone(), &args),
    }
}

/// Index every supported file below a directory.
async fn index_directory(args: IndexArgs, cli_args: &FolioArgs) -> Result<()> {
    if !args.dir.is_dir() {
        return Err(FolioError::invalid_argument(format!(
            "not a directory: {}",
            args.dir.display()
        )));
    }

    let index_path = cli_args.index_path(&args.dir);
    let indexer = open_indexer(cli_args, &index_path, true, args.reset)?;

    let files = collect_files(&args.dir, &index_path, indexer.extractors())?;
    info!(dir = %args.dir.display(), files = files.len(), "indexing directory");
    let sources = files
        .iter()
        .map(|path| SourceFile::relative_to(&args.dir, path))
        .collect();

    let mut stats = indexer.index_sources(sources).await;
    if args.reembed {
        let retried = indexer.reembed_failed().await?;
        stats.chunks_embedded += retried.chunks_embedded;
        stats.chunks_failed = retried.chunks_failed;
    }

    if args.json {
        output_json(&stats)
    } else {
        output_indexing_human(&stats);
        Ok(())
    }
}

/// Run a query against an existing index.
async fn search_index(args: SearchArgs, cli_args: &FolioArgs) -> Result<()> {
    let index_path = cli_args.index_path(&args.dir);
    let indexer = open_indexer(cli_args, &index_path, false, false)?;
    let engine = indexer.search_engine()?;

    let mut request = SearchRequest::new(args.query).with_offset(args.offset);
    if let Some(limit) = args.limit {
        request = request.with_limit(limit);
    }
    if let Some(mode) = args.mode {
        request = request.with_mode(mode.into());
    }

    let response = engine.search(request).await?;
    if args.json {
        output_json(&response)
    } else {
        output_search_human(&response);
        Ok(())
    }
}

/// Show statistics of an existing index.
fn show_stats(args: StatsArgs, cli_args: &FolioArgs) -> Result<()> {
    let index_path = cli_args.index_path(&args.dir);
    let indexer = open_indexer(cli_args, &index_path, false, false)?;
    let stats = indexer.stats();

    if args.json {
        output_json(&stats)
    } else {
        println!("Index: {}", index_path.display());
        output_stats_human(&stats);
        Ok(())
    }
}

fn load_config(cli_args: &FolioArgs) -> Result<FolioConfig> {
    match &cli_args.config {
        Some(path) => FolioConfig::from_file(path),
        None => Ok(FolioConfig::default()),
    }
}

/// Open the index at `index_path`. With `reset`, stored records are cleared
/// before anything is loaded, so a damaged index can always be rebuilt.
fn open_indexer(
    cli_args: &FolioArgs,
    index_path: &Path,
    create: bool,
    reset: bool,
) -> Result<IncrementalIndexer> {
    if !create && !index_path.is_dir() {
        return Err(FolioError::invalid_argument(format!(
            "no index at {}; run `folio index` first",
            index_path.display()
        )));
    }

    let config = load_config(cli_args)?;
    let storage = Arc::new(FileStorage::new(index_path)?);
    if reset {
        info!(index = %index_path.display(), "resetting index");
        storage.clear()?;
    }
    let indexer = IncrementalIndexer::open(config, storage)?;
    if indexer.skipped_records() > 0 {
        warn!(
            index = %index_path.display(),
            skipped = indexer.skipped_records(),
            "some stored documents could not be loaded; run `folio index --reset` to rebuild"
        );
    }

    if cli_args.hashing_embedder {
        let embedder = HashingEmbedder::new(indexer.config().embedding.dimension)?;
        indexer.with_embedder(Arc::new(embedder))
    } else {
        Ok(indexer)
    }
}

/// Recursively collect supported files, skipping hidden entries and the index itself.
fn collect_files(root: &Path, index_path: &Path, extractors: &ExtractorChain) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut pending = vec![root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        for entry in fs::read_dir(&dir)? {
            let path = entry?.path();
            let hidden = path
                .file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.starts_with('.'));
            if hidden || path == index_path {
                continue;
            }

            if path.is_dir() {
                pending.push(path);
            } else if extractors.supports(&path) {
                files.push(path);
            } else {
                debug!(path = %path.display(), "no extractor, skipping");
            }
        }
    }

    files.sort();
    Ok(files)
}
