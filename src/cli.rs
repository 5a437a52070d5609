use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "flvrec")]
#[command(author, version, about = "Live FLV stream recorder")]
pub struct Cli {
    /// Path to config file
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
    /// Record a live FLV stream into a seekable file
    Record {
        /// Input stream file, or "-" for stdin
        #[arg(required = true)]
        input: String,

        /// Output FLV file
        #[arg(short, long)]
        output: PathBuf,

        /// Also write the last seconds of the stream to this file
        #[arg(long)]
        clip: Option<PathBuf>,

        /// Length of the clip in seconds
        #[arg(long)]
        clip_window: Option<u64>,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Display the metadata and tag counts of a recorded file
    Inspect {
        /// File to inspect
        #[arg(required = true)]
        file: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show version information
    Version,
}
