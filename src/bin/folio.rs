//! Folio CLI binary.

use std::process;

use clap::Parser;
use folio::cli::{FolioArgs, execute_command};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let args = FolioArgs::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(args.log_level()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = execute_command(args).await {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}
