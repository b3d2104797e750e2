//! Command-line interface for caseforge.
//!
//! Provides the `generate` and `export` commands.

mod commands;

pub use commands::{parse_cli, run_with_cli, Cli, Commands, ExportArgs, GenerateArgs};
