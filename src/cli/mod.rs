//! CLI module for Feedline
//!
//! Provides command-line interface for:
//! - start: Wire the message router, then serve the HTTP API
//! - check: Validate configuration without starting anything

mod args;
mod commands;
mod errors;

pub use args::{Cli, Command};
pub use commands::{bootstrap, check, run, run_command, serve, start};
pub use errors::{CliError, CliResult};
