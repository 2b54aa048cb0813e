//! Command line argument parsing for the Folio CLI using clap.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueEnum};

use crate::search::SearchMode;

/// Name of the index directory created inside the indexed directory.
pub const DEFAULT_INDEX_DIR: &str = ".folio";

/// Folio - hybrid lexical and semantic page retrieval
#[derive(Parser, Debug, Clone)]
#[command(name = "folio")]
#[command(about = "Hybrid lexical and semantic search over extracted document pages")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(long_about = None)]
pub struct FolioArgs {
    /// Verbosity (-v info, -vv debug). RUST_LOG takes precedence.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Configuration file (JSON)
    #[arg(short, long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Index location (default: <DIR>/.folio)
    #[arg(long, value_name = "PATH", global = true)]
    pub index: Option<PathBuf>,

    /// Embed with the built-in hashing embedder
    #[arg(long, global = true)]
    pub hashing_embedder: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

impl FolioArgs {
    /// Default log filter for the verbosity count.
    pub fn log_level(&self) -> &'static str {
        match self.verbose {
            0 => "error",
            1 => "info",
            _ => "debug",
        }
    }

    /// Where the index of `dir` lives.
    pub fn index_path(&self, dir: &Path) -> PathBuf {
        self.index
            .clone()
            .unwrap_or_else(|| dir.join(DEFAULT_INDEX_DIR))
    }
}

/// Available CLI commands
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Index the text files of a directory
    Index(IndexArgs),

    /// Search an indexed directory
    Search(SearchArgs),

    /// Show index statistics
    Stats(StatsArgs),
}

/// Arguments for indexing
#[derive(Parser, Debug, Clone)]
pub struct IndexArgs {
    /// Directory with the files to index
    #[arg(value_name = "DIR")]
    pub dir: PathBuf,

    /// Clear the index before indexing
    #[arg(long)]
    pub reset: bool,

    /// Retry embedding of chunks that have no vector yet
    #[arg(long)]
    pub reembed: bool,

    /// Print the summary as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for searching
#[derive(Parser, Debug, Clone)]
pub struct SearchArgs {
    /// Indexed directory
    #[arg(value_name = "DIR")]
    pub dir: PathBuf,

    /// Query string
    #[arg(value_name = "QUERY")]
    pub query: String,

    /// Maximum number of results to return
    #[arg(short, long)]
    pub limit: Option<usize>,

    /// Offset for pagination
    #[arg(short, long, default_value = "0")]
    pub offset: usize,

    /// Retrieval mode (default from configuration)
    #[arg(short = 'm', long)]
    pub mode: Option<ModeArg>,

    /// Print the response as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for statistics
#[derive(Parser, Debug, Clone)]
pub struct StatsArgs {
    /// Indexed directory
    #[arg(value_name = "DIR")]
    pub dir: PathBuf,

    /// Print the statistics as JSON
    #[arg(long)]
    pub json: bool,
}

/// Search modes available in CLI
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeArg {
    /// BM25 only
    Lexical,
    /// Vector similarity only
    Semantic,
    /// Both, fused by reciprocal rank
    Hybrid,
}

impl From<ModeArg> for SearchMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Lexical => SearchMode::Lexical,
            ModeArg::Semantic => SearchMode::Semantic,
            ModeArg::Hybrid => SearchMode::Hybrid,
        }
    }
}
