//! dsync CLI
//!
//! The command-line interface for manifest-based data synchronization.

mod cli;
mod commands;
mod error;

use clap::Parser;
use colored::Colorize;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use cli::{Cli, Commands};
use error::Result;

fn main() {
    if let Err(e) = run() {
        eprintln!("{}: {}", "error".red().bold(), e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    // Setup tracing if verbose
    if cli.verbose {
        let subscriber = FmtSubscriber::builder()
            .with_max_level(Level::DEBUG)
            .with_target(true)
            .finish();
        tracing::subscriber::set_global_default(subscriber)
            .expect("Failed to set tracing subscriber");
        tracing::debug!("Verbose mode enabled");
    }

    match cli.command {
        Commands::Init {
            remote,
            kind,
            no_normalize,
            no_hash,
            data_dirs,
        } => commands::cmd_init(&remote, &kind, no_normalize, no_hash, data_dirs),
        Commands::Status { json, normalize } => commands::cmd_status(json, normalize),
        Commands::Sync {
            message,
            dry_run,
            resolve,
            normalize,
            json,
        } => commands::cmd_sync(&message, dry_run, resolve.as_deref(), normalize, json),
        Commands::Log { json } => commands::cmd_log(json),
        Commands::ValidateChain { normalize: _ } => commands::cmd_validate_chain(),
        Commands::Completions { shell } => {
            commands::cmd_completions(shell);
            Ok(())
        }
    }
}
