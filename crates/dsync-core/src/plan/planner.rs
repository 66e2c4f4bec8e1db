//! Three-way reconciliation planner
//!
//! Classifies every path in the union of (Local, Cache, Remote) manifests and
//! orders the resulting operations so that directory creation precedes the
//! files inside it and content deletion precedes the deletion of its parent
//! directory. The planner is a pure function: identical inputs always yield
//! an identical plan, which is what makes a transaction safe to recompute and
//! retry after a transient failure.

use std::collections::BTreeSet;

use dsync_fs::SyncPath;

use super::{Operation, SyncPlan};
use crate::manifest::{Entry, Manifest};

/// Compute the sync plan for one (Local, Cache, Remote) manifest triple.
///
/// The cache is the last successfully synced state; a side that still matches
/// it is unmodified and yields to the other side. Absence is a state of its
/// own, so deletions propagate and a path deleted on both sides is a no-op.
/// Divergence to different content on both sides becomes a [`Operation::Conflict`]
/// carrying all three hashes; the planner never picks a winner.
pub fn plan(local: &Manifest, cache: &Manifest, remote: &Manifest) -> SyncPlan {
    let mut paths: BTreeSet<&SyncPath> = BTreeSet::new();
    paths.extend(local.entries().keys());
    paths.extend(cache.entries().keys());
    paths.extend(remote.entries().keys());

    let mut conflicts = Vec::new();
    let mut create_dirs = Vec::new();
    let mut transfers = Vec::new();
    let mut deletions = Vec::new();

    for path in paths {
        let Some(op) = classify(path, local.get(path), cache.get(path), remote.get(path)) else {
            continue;
        };
        match &op {
            Operation::Conflict { .. } => conflicts.push(op),
            Operation::CreateDirLocal { .. } | Operation::CreateDirRemote { .. } => {
                create_dirs.push(op)
            }
            Operation::Upload { .. } | Operation::Download { .. } => transfers.push(op),
            Operation::DeleteLocal { .. } | Operation::DeleteRemote { .. } => deletions.push(op),
        }
    }

    // BTreeSet iteration already sorted directory creations, conflicts, and
    // transfers parent-first. Deletions run child-first. Conflicts sit ahead
    // of transfers so their resolved file operations still land after the
    // directories that contain them.
    deletions.reverse();

    let mut operations = create_dirs;
    operations.extend(conflicts);
    operations.extend(transfers);
    operations.extend(deletions);
    SyncPlan::from_operations(operations)
}

fn classify(
    path: &SyncPath,
    local: Option<&Entry>,
    cache: Option<&Entry>,
    remote: Option<&Entry>,
) -> Option<Operation> {
    let local_matches_cache = entries_equal(local, cache);
    let cache_matches_remote = entries_equal(cache, remote);

    if local_matches_cache && cache_matches_remote {
        return None;
    }

    if local_matches_cache {
        // Local is unmodified since the last sync; the remote is authoritative.
        return Some(match remote {
            Some(entry) if entry.is_dir() => Operation::CreateDirLocal { path: path.clone() },
            Some(entry) => Operation::Download {
                path: path.clone(),
                hash: entry.content_hash.clone(),
            },
            None => Operation::DeleteLocal { path: path.clone() },
        });
    }

    if cache_matches_remote {
        // Remote is unmodified since the last sync; local is authoritative.
        return Some(match local {
            Some(entry) if entry.is_dir() => Operation::CreateDirRemote { path: path.clone() },
            Some(entry) => Operation::Upload {
                path: path.clone(),
                hash: entry.content_hash.clone(),
            },
            None => Operation::DeleteRemote { path: path.clone() },
        });
    }

    // Both sides moved away from the cache.
    if entries_equal(local, remote) {
        // Converged independently to the same content (or both deleted).
        return None;
    }

    Some(Operation::Conflict {
        path: path.clone(),
        local_hash: identity_of(local),
        cache_hash: identity_of(cache),
        remote_hash: identity_of(remote),
    })
}

fn entries_equal(a: Option<&Entry>, b: Option<&Entry>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => a.content_equal(b),
        _ => false,
    }
}

/// The hash (or link target) shown to a human resolving a conflict.
fn identity_of(entry: Option<&Entry>) -> Option<String> {
    let entry = entry?;
    entry
        .content_hash
        .clone()
        .or_else(|| entry.link_target.clone())
}
