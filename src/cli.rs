//! CLI argument definitions.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "streamforged")]
#[command(author, version, about = "On-demand MPEG-DASH transcoding server", long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the streaming server
    Start {
        /// Host to bind to (overrides config)
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Print the DASH manifest the server would return for a file
    Manifest {
        /// Media file
        file: PathBuf,

        /// Comma-separated codec strings the client can decode
        #[arg(long, value_delimiter = ',')]
        playable_codecs: Vec<String>,
    },

    /// Probe a media file and display its streams
    Probe {
        /// File to probe
        file: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check that ffmpeg and ffprobe are available
    CheckTools,

    /// Validate a configuration file
    Validate {
        /// Configuration file to validate (defaults to --config)
        config: Option<PathBuf>,
    },

    /// Show version information
    Version,
}
