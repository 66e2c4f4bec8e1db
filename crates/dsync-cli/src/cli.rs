//! CLI argument parsing using clap derive

use clap::{Parser, Subcommand};
use clap_complete::Shell;

/// dsync - Reproducible-data synchronization with manifest reconciliation
#[derive(Parser, Debug)]
#[command(name = "dsync")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// The command to run
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Initialize a repository in the current directory
    ///
    /// Creates a .dsync/ control area with config.toml.
    ///
    /// Examples:
    ///   dsync init --remote /srv/backup
    ///   dsync init --remote tank/data --kind zfs
    ///   dsync init --remote /srv/backup -d data -d assets
    Init {
        /// Remote root (a directory path for the local kind)
        #[arg(short, long)]
        remote: String,

        /// Remote kind (local or memory; others need an external transport)
        #[arg(short, long, default_value = "local")]
        kind: String,

        /// Keep raw (possibly decomposed) Unicode path keys
        #[arg(long)]
        no_normalize: bool,

        /// Skip content hashing; change detection degrades to size+mtime
        #[arg(long)]
        no_hash: bool,

        /// Restrict syncing to these subtrees (repeatable)
        #[arg(short = 'd', long = "data-dir")]
        data_dirs: Vec<String>,
    },

    /// Show what sync would do
    Status {
        /// Output as JSON for scripting
        #[arg(long)]
        json: bool,

        /// Override the configured path normalization
        #[arg(long)]
        normalize: Option<bool>,
    },

    /// Reconcile the local tree with the remote
    Sync {
        /// Message recorded in the new snapshot
        #[arg(short, long, default_value = "sync")]
        message: String,

        /// Compute and print the plan without applying it
        #[arg(long)]
        dry_run: bool,

        /// Conflict resolution: keep-local, keep-remote, or keep-both
        #[arg(long)]
        resolve: Option<String>,

        /// Override the configured path normalization
        #[arg(long)]
        normalize: Option<bool>,

        /// Output as JSON for scripting
        #[arg(long)]
        json: bool,
    },

    /// Show committed snapshot history
    Log {
        /// Output as JSON for scripting
        #[arg(long)]
        json: bool,
    },

    /// Verify the snapshot chain's links and hashes
    ValidateChain {
        /// Override the configured path normalization
        #[arg(long)]
        normalize: Option<bool>,
    },

    /// Generate shell completions
    Completions {
        /// Target shell
        shell: Shell,
    },
}
