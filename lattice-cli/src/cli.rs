use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "lattice", about = "Lattice secondary-index CLI", version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new store file with the default point schema
    Init {
        /// Path of the store file to create
        store: PathBuf,
    },

    /// Ingest local files into a store
    Ingest {
        /// Path to the store file
        store: PathBuf,

        /// File or directory to ingest
        input: PathBuf,

        /// Restrict ingest to these file extensions (repeatable)
        #[arg(long = "extension")]
        extensions: Vec<String>,
    },

    /// Recalculate the persisted statistics of a store
    RecalcStats {
        /// Path to the store file
        store: PathBuf,

        /// Optionally recalculate a single adapter's statistics
        #[arg(long)]
        adapter_id: Option<String>,
    },
}
