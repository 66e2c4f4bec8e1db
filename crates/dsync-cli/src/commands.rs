//! Command implementations

use clap::CommandFactory;
use clap_complete::Shell;
use colored::Colorize;
use std::env;

use dsync_core::{
    ConflictPolicy, ExecuteOptions, Metadata, Operation, RemoteConfig, RepoConfig, Repository,
    SyncPlan,
};

use crate::cli::Cli;
use crate::error::{Error, Result};

fn open_repo(normalize: Option<bool>) -> Result<Repository> {
    let mut repo = Repository::open(env::current_dir()?)?;
    if let Some(normalize) = normalize {
        repo.set_normalize_paths(normalize);
    }
    Ok(repo)
}

pub fn cmd_init(
    remote: &str,
    kind: &str,
    no_normalize: bool,
    no_hash: bool,
    data_dirs: Vec<String>,
) -> Result<()> {
    let config = RepoConfig {
        remote: RemoteConfig {
            kind: kind.to_string(),
            path: remote.to_string(),
        },
        normalize_paths: !no_normalize,
        compute_hashes: !no_hash,
        data_dirs,
    };
    Repository::init(env::current_dir()?, config)?;

    println!(
        "{} Initialized repository ({kind} remote: {remote})",
        "dsync".green().bold()
    );
    if no_hash {
        println!(
            "{} content hashing disabled; change detection falls back to size+mtime",
            "warning:".yellow().bold()
        );
    }
    Ok(())
}

pub fn cmd_status(json: bool, normalize: Option<bool>) -> Result<()> {
    let repo = open_repo(normalize)?;
    let backend = repo.config().backend()?;
    let plan = repo.status(&backend)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&plan)?);
        return Ok(());
    }

    if plan.is_empty() {
        println!("{}", "Up to date.".green());
    } else {
        print_plan(&plan);
    }
    Ok(())
}

pub fn cmd_sync(
    message: &str,
    dry_run: bool,
    resolve: Option<&str>,
    normalize: Option<bool>,
    json: bool,
) -> Result<()> {
    let repo = open_repo(normalize)?;
    let backend = repo.config().backend()?;

    if dry_run {
        let plan = repo.status(&backend)?;
        if json {
            println!("{}", serde_json::to_string_pretty(&plan)?);
        } else if plan.is_empty() {
            println!("{}", "Up to date; nothing to sync.".green());
        } else {
            println!("{}", "[dry-run] Would apply:".bold());
            print_plan(&plan);
        }
        return Ok(());
    }

    let options = ExecuteOptions {
        message: message.to_string(),
        conflict_policy: parse_policy(resolve)?,
        cancel: None,
    };
    let outcome = repo.sync(&backend, &options)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome.plan)?);
        return Ok(());
    }

    match outcome.result {
        None => println!("{}", "Up to date; nothing to sync.".green()),
        Some(result) => {
            print_plan(&outcome.plan);
            let snapshot = result
                .new_cache
                .metadata()
                .map(|m| m.snapshot_id.to_string())
                .unwrap_or_default();
            match result.backend_snapshot {
                Some(name) => println!(
                    "{} Committed {snapshot} ({} operations, backend snapshot {name})",
                    "dsync".green().bold(),
                    result.operations_applied
                ),
                None => println!(
                    "{} Committed {snapshot} ({} operations)",
                    "dsync".green().bold(),
                    result.operations_applied
                ),
            }
        }
    }
    Ok(())
}

pub fn cmd_log(json: bool) -> Result<()> {
    let repo = open_repo(None)?;
    let history = repo.load_history()?;
    let metadata: Vec<&Metadata> = history.iter().filter_map(|m| m.metadata()).collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&metadata)?);
        return Ok(());
    }

    if metadata.is_empty() {
        println!("No snapshots committed yet.");
        return Ok(());
    }
    for meta in metadata {
        println!(
            "{}  {}  {}  {}",
            meta.snapshot_id.to_string().yellow(),
            meta.created_at.format("%Y-%m-%d %H:%M:%S"),
            short_hash(&meta.snapshot_hash).dimmed(),
            meta.snapshot_message
        );
    }
    Ok(())
}

pub fn cmd_validate_chain() -> Result<()> {
    let repo = open_repo(None)?;
    let report = repo.validate()?;

    if report.is_valid() {
        println!(
            "{} Chain intact ({} snapshots).",
            "dsync".green().bold(),
            report.snapshots_checked
        );
        return Ok(());
    }

    for chain_break in &report.breaks {
        eprintln!("{} {chain_break}", "break:".red().bold());
    }
    Err(Error::ChainBroken {
        breaks: report.breaks.len(),
    })
}

pub fn cmd_completions(shell: Shell) {
    clap_complete::generate(shell, &mut Cli::command(), "dsync", &mut std::io::stdout());
}

fn parse_policy(resolve: Option<&str>) -> Result<ConflictPolicy> {
    match resolve {
        None => Ok(ConflictPolicy::Fail),
        Some("keep-local") => Ok(ConflictPolicy::KeepLocal),
        Some("keep-remote") => Ok(ConflictPolicy::KeepRemote),
        Some("keep-both") => Ok(ConflictPolicy::KeepBothRenamed),
        Some(other) => Err(Error::InvalidArgument {
            message: format!(
                "unknown conflict resolution {other:?} (expected keep-local, keep-remote, or keep-both)"
            ),
        }),
    }
}

fn print_plan(plan: &SyncPlan) {
    for op in plan.operations() {
        match op {
            Operation::Upload { path, .. } => {
                println!("  {} {path}", "upload".cyan())
            }
            Operation::Download { path, .. } => {
                println!("  {} {path}", "download".cyan())
            }
            Operation::DeleteLocal { path } => {
                println!("  {} {path}", "delete-local".red())
            }
            Operation::DeleteRemote { path } => {
                println!("  {} {path}", "delete-remote".red())
            }
            Operation::CreateDirLocal { path } => {
                println!("  {} {path}", "mkdir-local".blue())
            }
            Operation::CreateDirRemote { path } => {
                println!("  {} {path}", "mkdir-remote".blue())
            }
            Operation::Conflict {
                path,
                local_hash,
                cache_hash,
                remote_hash,
            } => {
                println!(
                    "  {} {path} (local {}, cache {}, remote {})",
                    "conflict".yellow().bold(),
                    local_hash.as_deref().unwrap_or("absent"),
                    cache_hash.as_deref().unwrap_or("absent"),
                    remote_hash.as_deref().unwrap_or("absent"),
                );
            }
        }
    }
}

fn short_hash(hash: &str) -> String {
    let hex = hash.strip_prefix("sha256:").unwrap_or(hash);
    hex.chars().take(12).collect()
}
