//! Lattice CLI library.
//!
//! Command handlers and store-file plumbing behind the `lattice` binary.
//! Library consumers can construct a [`cli::Cli`] programmatically and call
//! [`run`] directly.

pub mod cli;
pub mod commands;
pub mod error;
pub mod store_file;

use cli::{Cli, Commands};
use error::CliResult;

/// Dispatch a parsed [`Cli`] to the appropriate command handler.
pub fn run(cli: Cli) -> CliResult<()> {
    match cli.command {
        Commands::Init { store } => commands::init::run(&store),
        Commands::Ingest {
            store,
            input,
            extensions,
        } => commands::ingest::run(&store, &input, &extensions),
        Commands::RecalcStats { store, adapter_id } => {
            commands::recalc_stats::run(&store, adapter_id.as_deref())
        }
    }
}
