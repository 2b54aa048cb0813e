//! Command line interface for Folio.

pub mod args;
pub mod commands;
pub mod output;

pub use args::{Command, FolioArgs};
pub use commands::execute_command;
