//! CLI parse: clap types for permit-preview. No behavior; definitions only.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Permit Preview CLI - preview generation for permit application records
#[derive(Parser)]
#[command(name = "permit-preview")]
#[command(about = "Generate composite previews of permit application records")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Workspace root directory
    #[arg(long, default_value = ".")]
    pub workspace: PathBuf,

    /// Configuration file path (overrides default config loading)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(long, default_value = "false")]
    pub verbose: bool,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long)]
    pub log_format: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print the cache signature of a record
    Signature {
        /// Path to the record JSON
        #[arg(long)]
        record: PathBuf,
    },
    /// Generate the preview for a record and export its pages
    Preview {
        /// Path to the record JSON
        #[arg(long)]
        record: PathBuf,
        /// Output directory for the manifest and page assets
        #[arg(long)]
        out: PathBuf,
    },
    /// Print the effective configuration as TOML
    Config,
}
