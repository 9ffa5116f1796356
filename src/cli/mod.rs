//! CLI command definitions and parsing
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "soilscan",
    version,
    author = "neur0map",
    about = "Soil texture classification from photographs",
    long_about = "Soilscan classifies a soil photograph as sandy, clay, loam or silt. It asks a hosted \
                  vision model first and falls back to an offline colour heuristic, then reports \
                  properties, crop suitability and management advice."
)]
pub struct Cli {
    /// Global config file path (defaults to ~/.config/soilscan/config.toml)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Classify a soil image
    Analyze {
        /// Image file (JPEG, PNG, GIF, WebP, TIFF or BMP)
        image: PathBuf,

        /// Declared file name (defaults to the image's file name)
        #[arg(short, long)]
        name: Option<String>,

        /// Skip the remote model and use the colour heuristic only
        #[arg(long)]
        offline: bool,

        /// Profile to use (e.g., "offline")
        #[arg(short, long)]
        profile: Option<String>,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,

        /// Include advice, action plans and timing
        #[arg(short, long)]
        detailed: bool,

        /// Write the text report to this file
        #[arg(short, long, value_name = "PATH", conflicts_with = "report_dir")]
        report: Option<PathBuf>,

        /// Write the text report into this directory under its standard name
        #[arg(long, value_name = "DIR")]
        report_dir: Option<PathBuf>,
    },

    /// Show advice for a soil type
    Advice {
        /// Soil type or description (e.g., "sandy", "heavy clay")
        soil_type: String,

        /// Print the advice as JSON
        #[arg(long)]
        json: bool,
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
