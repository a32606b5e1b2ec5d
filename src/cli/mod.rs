//! CLI command definitions and parsing
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "listinsight",
    version,
    about = "Cross-source overlap and agreement analysis for DNS blocklists and allowlists",
    long_about = "listinsight takes the validated, normalized source files produced by a blocklist \
                  pipeline and reports which sources overlap (and where allowlists and blocklists \
                  disagree) and which entries are corroborated by the most independent sources."
)]
pub struct Cli {
    /// Global config file path (defaults to ~/.config/listinsight/config.toml)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Override the top-level worker budget (0 = available parallelism)
    #[arg(long, global = true, value_name = "N")]
    pub max_workers: Option<usize>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run overlap detection and top-K aggregation over a manifest
    Analyze {
        /// JSON manifest of processed source files
        #[arg(short, long, value_name = "FILE")]
        manifest: PathBuf,

        /// Skip overlap detection
        #[arg(long)]
        skip_overlap: bool,

        /// Skip top-K aggregation
        #[arg(long)]
        skip_top: bool,
    },

    /// Write compact overlap summaries only
    Overlap {
        /// JSON manifest of processed source files
        #[arg(short, long, value_name = "FILE")]
        manifest: PathBuf,
    },

    /// Write top-K entry sets only
    Top {
        /// JSON manifest of processed source files
        #[arg(short, long, value_name = "FILE")]
        manifest: PathBuf,

        /// Minimum-source thresholds (repeatable; defaults to the config)
        #[arg(long = "min-sources", value_name = "N")]
        min_sources: Vec<usize>,

        /// Maximum entries per top set (defaults to the config)
        #[arg(long, value_name = "N")]
        max_entries: Option<usize>,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Validate configuration file
    Validate {
        /// Path to config file (defaults to standard location)
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Initialize default configuration
    Init {
        /// Force overwrite existing config
        #[arg(short, long)]
        force: bool,
    },
}

impl Cli {
    /// Parse CLI arguments from command line
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
