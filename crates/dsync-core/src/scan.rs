//! Content scanner
//!
//! Walks a directory tree and produces a manifest: one entry per file,
//! symlink, and directory, keyed by normalized relative path. Scanning is a
//! pure function of filesystem state; unreadable files become error-marked
//! entries instead of aborting the walk.

use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use std::path::Path;
use walkdir::WalkDir;

use dsync_fs::checksum;
use dsync_fs::SyncPath;

use crate::manifest::{Entry, Manifest};
use crate::repo::CONTROL_DIR;
use crate::{Error, Result};

/// Scanner configuration
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Rewrite path keys to composed Unicode (NFC) form. Required when the
    /// same tree may be presented in decomposed form by another filesystem.
    pub normalize_paths: bool,

    /// Compute SHA-256 content hashes. When disabled, entries carry no hash
    /// and planner equality degrades to the `(size, mtime)` heuristic, which
    /// is reduced-confidence: coarse mtime resolution can hide changes or
    /// surface spurious ones.
    pub compute_hashes: bool,

    /// Restrict the scan to these subtrees. Empty means the whole tree.
    pub included_subtrees: BTreeSet<SyncPath>,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            normalize_paths: true,
            compute_hashes: true,
            included_subtrees: BTreeSet::new(),
        }
    }
}

impl ScanOptions {
    fn includes(&self, path: &SyncPath) -> bool {
        if self.included_subtrees.is_empty() {
            return true;
        }
        self.included_subtrees
            .iter()
            .any(|subtree| path == subtree || path.starts_with(subtree))
    }
}

/// Scan a directory tree into a manifest.
///
/// # Errors
///
/// Returns [`Error::Scan`] when `root` does not exist or is not a readable
/// directory. Individual unreadable files are recorded as error-marked
/// entries rather than failing the scan.
pub fn scan(root: &Path, options: &ScanOptions) -> Result<Manifest> {
    if !root.is_dir() {
        return Err(Error::Scan {
            path: root.to_path_buf(),
            message: "root does not exist or is not a directory".to_string(),
        });
    }

    let mut manifest = Manifest::new();
    let walker = WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.file_name() != CONTROL_DIR);

    for item in walker {
        let dirent = match item {
            Ok(d) => d,
            Err(e) => {
                // A directory we cannot descend into. Record it when the path
                // is known, otherwise it can only be logged.
                match e.path() {
                    Some(p) if p != root => {
                        let rel = relative_key(root, p, options.normalize_paths)?;
                        if options.includes(&rel) {
                            tracing::warn!(path = %rel, error = %e, "unreadable during scan");
                            manifest.insert(rel, Entry::unreadable(e.to_string()));
                        }
                    }
                    _ => {
                        return Err(Error::Scan {
                            path: root.to_path_buf(),
                            message: e.to_string(),
                        });
                    }
                }
                continue;
            }
        };

        if dirent.path() == root {
            continue;
        }
        let rel = relative_key(root, dirent.path(), options.normalize_paths)?;
        if !options.includes(&rel) {
            continue;
        }

        let entry = create_entry_at(dirent.path(), options);
        manifest.insert(rel, entry);
    }

    Ok(manifest)
}

/// Build a single entry for one path under `root`, the incremental variant of
/// [`scan`].
///
/// # Errors
///
/// Returns [`Error::Scan`] when the path does not exist under `root`.
pub fn create_entry(root: &Path, path: &SyncPath, options: &ScanOptions) -> Result<Entry> {
    let absolute = path.resolve_under(root);
    if absolute.symlink_metadata().is_err() {
        return Err(Error::Scan {
            path: absolute,
            message: "path does not exist".to_string(),
        });
    }
    Ok(create_entry_at(&absolute, options))
}

fn relative_key(root: &Path, path: &Path, normalize: bool) -> Result<SyncPath> {
    let rel = path.strip_prefix(root).map_err(|_| Error::Scan {
        path: path.to_path_buf(),
        message: "walked path escaped the scan root".to_string(),
    })?;
    Ok(SyncPath::from_path(rel, normalize))
}

fn create_entry_at(path: &Path, options: &ScanOptions) -> Entry {
    let meta = match path.symlink_metadata() {
        Ok(m) => m,
        Err(e) => return Entry::unreadable(e.to_string()),
    };

    if meta.file_type().is_symlink() {
        return match std::fs::read_link(path) {
            Ok(target) => Entry::symlink(target.to_string_lossy()),
            Err(e) => Entry::unreadable(e.to_string()),
        };
    }
    if meta.is_dir() {
        return Entry::directory();
    }

    let mtime: Option<DateTime<Utc>> = meta.modified().ok().map(DateTime::from);
    let content_hash = if options.compute_hashes {
        match checksum::compute_file_checksum(path) {
            Ok(hash) => Some(hash),
            Err(e) => return Entry::unreadable(e.to_string()),
        }
    } else {
        None
    };

    Entry::file(meta.len(), mtime, content_hash)
}
