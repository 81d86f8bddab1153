//! CLI definitions for WebHands.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// WebHands CLI.
#[derive(Parser)]
#[command(name = "webhands")]
#[command(about = "Dual-engine browser automation for autonomous agents")]
#[command(version)]
pub(crate) struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config/default.toml", global = true, env = "WEBHANDS_CONFIG")]
    pub config: PathBuf,

    /// Disable the live engine for this run
    #[arg(long, global = true)]
    pub fetch_only: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Execute one browser action given as a JSON object
    Exec {
        /// Action parameters, e.g. '{"action":"open","url":"https://example.com"}'
        params: String,

        /// Pretty-print the result envelope
        #[arg(long)]
        pretty: bool,
    },

    /// Execute a JSON-lines script of actions against one browser session
    Script {
        /// Script file, or `-` for stdin
        file: PathBuf,

        /// Keep going after a failed action
        #[arg(long)]
        keep_going: bool,
    },

    /// Validate the configuration file and print warnings
    CheckConfig,
}
