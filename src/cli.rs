use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "plexlink")]
#[command(about = "Hardlink media into a Plex-shaped library with metadata-enriched names")]
#[command(version)]
pub struct Cli {
    /// Path to the JSON configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Watch configured directories and process files as they settle
    Start,

    /// Process a file or directory once
    Run {
        /// Source file or directory
        input: PathBuf,

        /// Destination root (defaults to default_dest_dir from config)
        dest: Option<PathBuf>,

        /// Only process files whose name is absent from the destination
        #[arg(long)]
        missing_only: bool,
    },

    /// Classify a filename and print the resulting descriptor
    Classify {
        /// Filename to classify (no need for the file to exist)
        filename: String,
    },

    /// Inspect and replay the redo log
    Redo {
        #[command(subcommand)]
        action: RedoAction,
    },

    /// Validate a configuration file
    Validate {
        /// Config file to validate (falls back to --config)
        config: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
pub enum RedoAction {
    /// List pending redo entries
    List,

    /// Replay a single entry by id
    Run {
        id: i64,
    },

    /// Replay every pending entry
    RunAll,
}
