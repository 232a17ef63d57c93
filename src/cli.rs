use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Offline analysis of eye-tracking session logs
#[derive(Parser, Debug)]
#[command(name = "gaze-trace")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Analysis config file (TOML)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Score gaze density and write the log with heatmap columns
    Heatmap {
        /// Session log
        file: PathBuf,

        /// Output file (defaults to `<file>.heatmap.csv`)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print the gaze trail as JSON
    Trail {
        /// Session log
        file: PathBuf,

        /// Only keep segments no longer than this
        #[arg(long)]
        max_distance: Option<f64>,
    },

    /// Write the culled log
    Cull {
        /// Session log
        file: PathBuf,

        /// Output file
        #[arg(short, long)]
        output: PathBuf,

        /// First row to keep (inclusive)
        #[arg(long, requires = "to")]
        from: Option<usize>,

        /// Last row to keep (inclusive)
        #[arg(long, requires = "from")]
        to: Option<usize>,
    },

    /// Replay the trajectory on a fixed tick and print frames as JSON lines
    Replay {
        /// Session log
        file: PathBuf,

        /// Seconds of playback per tick
        #[arg(long, default_value = "0.1")]
        tick: f64,

        /// Stop after this many seconds of playback
        #[arg(long)]
        duration: Option<f64>,

        /// Number of speed-up steps applied before playing
        #[arg(long, default_value = "0")]
        faster: u32,
    },

    /// Print the effective configuration as TOML
    Config,
}
