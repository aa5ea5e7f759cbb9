//! CLI commands implementation.
//!
//! This module contains the CLI parser and dispatches to command-specific modules.

mod classify;
mod process;
mod serve;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::Settings;

#[derive(Parser)]
#[command(name = "blobflow")]
#[command(about = "Blob-triggered extraction, enrichment and persistence pipeline")]
#[command(version)]
pub struct Cli {
    /// Config file path (defaults to ./blobflow.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP trigger API
    Serve {
        /// Address to bind: port, host, or host:port
        #[arg(short, long, default_value = "127.0.0.1:7071")]
        bind: String,
        /// Also watch the local source container for new files
        #[arg(short, long)]
        watch: bool,
    },

    /// Process one file in the foreground and print the outcome
    Process {
        /// Blob name, e.g. call_42.wav
        name: String,
        /// Source URI (derived from storage settings when omitted)
        #[arg(short, long)]
        uri: Option<String>,
        /// Source container (defaults to the configured one)
        #[arg(long)]
        container: Option<String>,
    },

    /// Show which extraction path each file name would take
    Classify {
        /// File names to classify
        #[arg(required = true)]
        names: Vec<String>,
    },
}

/// Run the CLI.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let settings = Settings::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Serve { bind, watch } => serve::cmd_serve(&settings, &bind, watch).await,
        Commands::Process {
            name,
            uri,
            container,
        } => process::cmd_process(&settings, &name, uri.as_deref(), container.as_deref()).await,
        Commands::Classify { names } => classify::cmd_classify(&settings, &names),
    }
}
