//! CLI argument definitions using clap
//!
//! Commands:
//! - feedline start --config <path>
//! - feedline check --config <path>

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Feedline - topic feed fan-out and live streaming for short posts
#[derive(Parser, Debug)]
#[command(name = "feedline")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the router and the HTTP API
    Start {
        /// Path to configuration file
        #[arg(long, default_value = "./feedline.json")]
        config: PathBuf,
    },

    /// Load and validate configuration, then print the effective settings
    Check {
        /// Path to configuration file
        #[arg(long, default_value = "./feedline.json")]
        config: PathBuf,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_start_with_config() {
        let cli = Cli::try_parse_from(["feedline", "start", "--config", "/etc/feedline.json"]).unwrap();
        match cli.command {
            Command::Start { config } => assert_eq!(config, PathBuf::from("/etc/feedline.json")),
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_default_config_path() {
        let cli = Cli::try_parse_from(["feedline", "check"]).unwrap();
        match cli.command {
            Command::Check { config } => assert_eq!(config, PathBuf::from("./feedline.json")),
            other => panic!("unexpected command {:?}", other),
        }
    }
}
