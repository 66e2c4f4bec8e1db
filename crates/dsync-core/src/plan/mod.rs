//! Sync plans
//!
//! A plan is an ordered sequence of operations produced by the three-way
//! planner. Conflicts are first-class plan entries, never auto-resolved;
//! the executor refuses to run past one unless the caller supplies a
//! resolution policy.

mod planner;

pub use planner::plan;

use serde::{Deserialize, Serialize};

use dsync_fs::SyncPath;

/// One reconciliation operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Operation {
    /// Copy the local file to the remote. `hash` is the expected content
    /// hash, verified after staging; absent when the scan ran without hashes.
    Upload {
        path: SyncPath,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        hash: Option<String>,
    },

    /// Copy the remote file to the local tree.
    Download {
        path: SyncPath,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        hash: Option<String>,
    },

    /// Remove the local file or (empty) directory.
    DeleteLocal { path: SyncPath },

    /// Remove the remote file or (empty) directory.
    DeleteRemote { path: SyncPath },

    /// Create a directory in the local tree.
    CreateDirLocal { path: SyncPath },

    /// Create a directory on the remote.
    CreateDirRemote { path: SyncPath },

    /// Both sides diverged from the cached state to different content.
    Conflict {
        path: SyncPath,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        local_hash: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        cache_hash: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        remote_hash: Option<String>,
    },
}

impl Operation {
    /// The path this operation touches.
    pub fn path(&self) -> &SyncPath {
        match self {
            Operation::Upload { path, .. }
            | Operation::Download { path, .. }
            | Operation::DeleteLocal { path }
            | Operation::DeleteRemote { path }
            | Operation::CreateDirLocal { path }
            | Operation::CreateDirRemote { path }
            | Operation::Conflict { path, .. } => path,
        }
    }

    /// True for conflict entries.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Operation::Conflict { .. })
    }
}

/// How the executor resolves conflict entries
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConflictPolicy {
    /// Refuse to execute a plan that holds conflicts
    #[default]
    Fail,
    /// The local version wins on both sides
    KeepLocal,
    /// The remote version wins on both sides
    KeepRemote,
    /// The remote version lands at the original path; the local version is
    /// preserved under a deterministic `.conflict-<hash8>` sibling name
    KeepBothRenamed,
}

/// An ordered sequence of reconciliation operations
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncPlan {
    operations: Vec<Operation>,
}

impl SyncPlan {
    /// An empty plan (both sides already reconciled).
    pub fn empty() -> Self {
        Self::default()
    }

    pub(crate) fn from_operations(operations: Vec<Operation>) -> Self {
        Self { operations }
    }

    /// Operations in execution order.
    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    /// Number of operations.
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    /// True when nothing needs to happen.
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// The conflict entries, in order.
    pub fn conflicts(&self) -> impl Iterator<Item = &Operation> {
        self.operations.iter().filter(|op| op.is_conflict())
    }

    /// True when the plan holds at least one conflict.
    pub fn has_conflicts(&self) -> bool {
        self.operations.iter().any(Operation::is_conflict)
    }
}
