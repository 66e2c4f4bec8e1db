//! Transaction executor
//!
//! Staging copies every payload into a temporary area under the control
//! directory and re-verifies content hashes against the plan before any
//! destructive step. Committing applies operations in plan order while
//! recording inverses; rollback replays the inverses in reverse. For
//! snapshot-capable backends a snapshot is requested after all operations
//! succeed, so the crash window narrows to the snapshot call itself.

use chrono::Utc;
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use dsync_fs::{SyncPath, checksum, io};

use crate::backend::Backend;
use crate::manifest::{Entry, EntryKind, Manifest, Metadata, SnapshotId};
use crate::plan::{ConflictPolicy, Operation, SyncPlan};
use crate::{Error, Result};

use super::lock::RepoLock;
use super::{CancelToken, TxnState};

/// Options for one transaction
#[derive(Debug, Clone, Default)]
pub struct ExecuteOptions {
    /// Commit message recorded in the new snapshot metadata
    pub message: String,
    /// How conflict entries in the plan are resolved
    pub conflict_policy: ConflictPolicy,
    /// Cooperative cancellation, checked at operation boundaries
    pub cancel: Option<CancelToken>,
}

/// Outcome of a committed transaction
#[derive(Debug)]
pub struct TransactionResult {
    /// Transaction id, also recorded in the lock marker
    pub transaction: Uuid,
    /// Terminal state, always [`TxnState::Committed`]
    pub state: TxnState,
    /// The manifest to persist as the new cache, with chained metadata
    pub new_cache: Manifest,
    /// Number of operations applied
    pub operations_applied: usize,
    /// Backend snapshot name, for snapshot-capable backends
    pub backend_snapshot: Option<String>,
}

/// One sync plan bound to the state it runs against
pub struct Transaction<'a> {
    plan: &'a SyncPlan,
    backend: &'a Backend,
    local_root: &'a Path,
    control_dir: &'a Path,
    local: &'a Manifest,
    cache: &'a Manifest,
    remote: &'a Manifest,
}

/// A plan operation lowered past conflict resolution.
///
/// `Upload` carries a separate source path because keep-both resolution
/// uploads the local version under its conflict-copy name; `copy_local`
/// additionally materializes the staged bytes in the local tree.
#[derive(Debug, Clone)]
enum Action {
    Upload {
        path: SyncPath,
        from: SyncPath,
        hash: Option<String>,
        copy_local: bool,
    },
    Download {
        path: SyncPath,
        hash: Option<String>,
    },
    DeleteLocal {
        path: SyncPath,
    },
    DeleteRemote {
        path: SyncPath,
    },
    CreateDirLocal {
        path: SyncPath,
    },
    CreateDirRemote {
        path: SyncPath,
    },
}

impl Action {
    fn path(&self) -> &SyncPath {
        match self {
            Action::Upload { path, .. }
            | Action::Download { path, .. }
            | Action::DeleteLocal { path }
            | Action::DeleteRemote { path }
            | Action::CreateDirLocal { path }
            | Action::CreateDirRemote { path } => path,
        }
    }
}

/// A staged action with its verified payload, if it has one.
struct StagedAction {
    action: Action,
    payload: Option<PathBuf>,
}

/// Inverse of one applied mutation, for rollback.
#[derive(Debug)]
enum Inverse {
    RemoveRemoteFile { path: SyncPath },
    RestoreRemoteFile { path: SyncPath, preimage: PathBuf },
    RemoveRemoteDir { path: SyncPath },
    RestoreRemoteDir { path: SyncPath },
    RemoveLocalFile { path: SyncPath },
    RestoreLocalFile { path: SyncPath, preimage: PathBuf },
    RemoveLocalDir { path: SyncPath },
    RestoreLocalDir { path: SyncPath },
    RestoreLocalSymlink { path: SyncPath, target: String },
}

impl<'a> Transaction<'a> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        plan: &'a SyncPlan,
        backend: &'a Backend,
        local_root: &'a Path,
        control_dir: &'a Path,
        local: &'a Manifest,
        cache: &'a Manifest,
        remote: &'a Manifest,
    ) -> Self {
        Self {
            plan,
            backend,
            local_root,
            control_dir,
            local,
            cache,
            remote,
        }
    }

    /// Run the transaction to a terminal state.
    ///
    /// # Errors
    ///
    /// [`Error::UnresolvedConflicts`] when the plan holds conflicts under the
    /// `Fail` policy; [`Error::LockHeld`] when another transaction is in
    /// flight; [`Error::Integrity`] when a staged payload does not match the
    /// plan's hash; [`Error::CommitFailed`] when an operation failed and
    /// rollback restored the prior state; [`Error::IncompleteRollback`] when
    /// rollback itself failed partway.
    pub fn execute(&self, options: &ExecuteOptions) -> Result<TransactionResult> {
        if options.conflict_policy == ConflictPolicy::Fail && self.plan.has_conflicts() {
            let conflicts = self.plan.conflicts().map(describe_conflict).collect();
            return Err(Error::UnresolvedConflicts { conflicts });
        }

        let transaction = Uuid::new_v4();
        let _lock = RepoLock::acquire(self.control_dir, transaction)?;
        let mut state = TxnState::Created;
        tracing::debug!(%transaction, ?state, operations = self.plan.len(), "transaction created");

        let actions = lower_plan(self.plan, options.conflict_policy, self.local, self.remote);

        // Staging: copy and verify every payload before touching anything.
        state = TxnState::Staging;
        tracing::debug!(%transaction, ?state, actions = actions.len(), "staging");
        let staging = tempfile::tempdir_in(self.control_dir)?;
        let mut staged = Vec::with_capacity(actions.len());
        for (idx, action) in actions.into_iter().enumerate() {
            check_cancel(options)?;
            staged.push(self.stage_action(action, staging.path(), idx)?);
        }

        // Committing: apply in plan order, recording inverses.
        state = TxnState::Committing;
        tracing::debug!(%transaction, ?state, "committing");
        let preimage_dir = staging.path().join("preimages");
        fs::create_dir_all(&preimage_dir)?;
        let mut applied: Vec<Inverse> = Vec::new();

        for item in &staged {
            let step = check_cancel(options).and_then(|()| {
                self.apply_action(item, &preimage_dir, &mut applied)
            });
            if let Err(cause) = step {
                return Err(self.roll_back(item.action.path().clone(), cause, applied, &mut state));
            }
        }

        let new_cache = self.merged_manifest(&staged, options);

        // The remote manifest of record is part of the transaction: it must
        // land before the snapshot so the snapshot captures it.
        if let Err(cause) = self.push_remote_manifest(&new_cache, &preimage_dir, &mut applied) {
            let path = SyncPath::new(crate::backend::REMOTE_MANIFEST_PATH);
            return Err(self.roll_back(path, cause, applied, &mut state));
        }

        let backend_snapshot = match self.backend.snapshots() {
            Some(snaps) => match snaps.create_snapshot(&options.message) {
                Ok(name) => Some(name),
                Err(cause) => {
                    let path = SyncPath::new(crate::backend::REMOTE_MANIFEST_PATH);
                    return Err(self.roll_back(path, cause, applied, &mut state));
                }
            },
            None => None,
        };

        state = TxnState::Committed;
        tracing::debug!(%transaction, applied = staged.len(), "committed");
        Ok(TransactionResult {
            transaction,
            state,
            new_cache,
            operations_applied: staged.len(),
            backend_snapshot,
        })
    }

    fn stage_action(
        &self,
        action: Action,
        staging: &Path,
        idx: usize,
    ) -> Result<StagedAction> {
        let payload = match &action {
            Action::Upload { from, hash, .. } => {
                let bytes = self.read_local_payload(from)?;
                Some(self.stage_payload(staging, idx, from, bytes, hash.as_deref())?)
            }
            Action::Download { path, hash } => {
                let bytes = self.backend.transport().read_file(path)?;
                Some(self.stage_payload(staging, idx, path, bytes, hash.as_deref())?)
            }
            _ => None,
        };
        Ok(StagedAction { action, payload })
    }

    /// Read the bytes an upload carries: file contents, or the link target
    /// for symlinks (transports move opaque bytes only).
    fn read_local_payload(&self, path: &SyncPath) -> Result<Vec<u8>> {
        if let Some(entry) = self.local.get(path)
            && entry.kind == EntryKind::Symlink
        {
            return Ok(entry.link_target.clone().unwrap_or_default().into_bytes());
        }
        Ok(io::read_bytes(&self.resolve_local(path))?)
    }

    /// Resolve a manifest key to the on-disk local path.
    ///
    /// Keys are composed (NFC); a file created before normalization may still
    /// carry its decomposed name, so fall back to that spelling when the
    /// composed one does not resolve.
    fn resolve_local(&self, path: &SyncPath) -> PathBuf {
        let native = path.resolve_under(self.local_root);
        if native.symlink_metadata().is_ok() {
            return native;
        }
        let decomposed = path.decomposed().resolve_under(self.local_root);
        if decomposed.symlink_metadata().is_ok() {
            decomposed
        } else {
            native
        }
    }

    fn stage_payload(
        &self,
        staging: &Path,
        idx: usize,
        path: &SyncPath,
        bytes: Vec<u8>,
        expected: Option<&str>,
    ) -> Result<PathBuf> {
        if let Some(expected) = expected {
            let actual = checksum::compute_bytes_checksum(&bytes);
            if actual != expected {
                return Err(Error::Integrity {
                    path: path.clone(),
                    expected: expected.to_string(),
                    actual,
                });
            }
        }
        let target = staging.join(format!("payload-{idx}"));
        io::write_atomic(&target, &bytes)?;
        Ok(target)
    }

    fn apply_action(
        &self,
        item: &StagedAction,
        preimage_dir: &Path,
        applied: &mut Vec<Inverse>,
    ) -> Result<()> {
        match &item.action {
            Action::Upload {
                path, copy_local, ..
            } => {
                let payload = item.payload.as_deref().ok_or_else(|| Error::Backend {
                    backend: self.backend.transport().name().to_string(),
                    message: format!("no staged payload for {path}"),
                })?;
                self.write_remote_from(path, payload, preimage_dir, applied)?;
                if *copy_local {
                    self.write_local_file_from(path, payload, preimage_dir, applied)?;
                }
                Ok(())
            }
            Action::Download { path, .. } => {
                let payload = item.payload.as_deref().ok_or_else(|| Error::Backend {
                    backend: self.backend.transport().name().to_string(),
                    message: format!("no staged payload for {path}"),
                })?;
                let as_symlink = self
                    .remote
                    .get(path)
                    .is_some_and(|e| e.kind == EntryKind::Symlink);
                if as_symlink {
                    self.write_local_symlink_from(path, payload, preimage_dir, applied)
                } else {
                    self.write_local_file_from(path, payload, preimage_dir, applied)
                }
            }
            Action::DeleteLocal { path } => self.delete_local(path, preimage_dir, applied),
            Action::DeleteRemote { path } => self.delete_remote(path, preimage_dir, applied),
            Action::CreateDirLocal { path } => {
                let native = self.resolve_local(path);
                if native.is_dir() {
                    return Ok(());
                }
                fs::create_dir_all(&native).map_err(|e| dsync_fs::Error::io(&native, e))?;
                applied.push(Inverse::RemoveLocalDir { path: path.clone() });
                Ok(())
            }
            Action::CreateDirRemote { path } => {
                if self.backend.transport().file_exists(path)? {
                    return Ok(());
                }
                self.backend.transport().create_dir(path)?;
                applied.push(Inverse::RemoveRemoteDir { path: path.clone() });
                Ok(())
            }
        }
    }

    fn write_remote_from(
        &self,
        path: &SyncPath,
        payload: &Path,
        preimage_dir: &Path,
        applied: &mut Vec<Inverse>,
    ) -> Result<()> {
        let inverse = if self.backend.transport().file_exists(path)? {
            let preimage = preimage_dir.join(format!("remote-{}", applied.len()));
            let prior = self.backend.transport().read_file(path)?;
            io::write_atomic(&preimage, &prior)?;
            Inverse::RestoreRemoteFile {
                path: path.clone(),
                preimage,
            }
        } else {
            Inverse::RemoveRemoteFile { path: path.clone() }
        };

        let bytes = io::read_bytes(payload)?;
        self.backend.transport().write_file(path, &bytes)?;
        applied.push(inverse);
        Ok(())
    }

    fn write_local_file_from(
        &self,
        path: &SyncPath,
        payload: &Path,
        preimage_dir: &Path,
        applied: &mut Vec<Inverse>,
    ) -> Result<()> {
        let native = self.resolve_local(path);
        let inverse = self.local_preimage(path, &native, preimage_dir, applied.len())?;

        if matches!(native.symlink_metadata().map(|m| m.file_type().is_symlink()), Ok(true)) {
            // Replacing a symlink with a regular file: drop the link explicitly.
            fs::remove_file(&native).map_err(|e| dsync_fs::Error::io(&native, e))?;
        }
        let bytes = io::read_bytes(payload)?;
        io::write_atomic(&native, &bytes)?;
        applied.push(inverse);
        Ok(())
    }

    fn write_local_symlink_from(
        &self,
        path: &SyncPath,
        payload: &Path,
        preimage_dir: &Path,
        applied: &mut Vec<Inverse>,
    ) -> Result<()> {
        let native = self.resolve_local(path);
        let inverse = self.local_preimage(path, &native, preimage_dir, applied.len())?;
        let target = String::from_utf8_lossy(&io::read_bytes(payload)?).into_owned();

        if native.symlink_metadata().is_ok() {
            fs::remove_file(&native).map_err(|e| dsync_fs::Error::io(&native, e))?;
        }
        if let Some(parent) = native.parent() {
            fs::create_dir_all(parent).map_err(|e| dsync_fs::Error::io(parent, e))?;
        }
        #[cfg(unix)]
        std::os::unix::fs::symlink(&target, &native)
            .map_err(|e| dsync_fs::Error::io(&native, e))?;
        #[cfg(not(unix))]
        io::write_atomic(&native, target.as_bytes())?;

        applied.push(inverse);
        Ok(())
    }

    /// Capture the pre-state of a local path about to be overwritten.
    fn local_preimage(
        &self,
        path: &SyncPath,
        native: &Path,
        preimage_dir: &Path,
        seq: usize,
    ) -> Result<Inverse> {
        match native.symlink_metadata() {
            Err(_) => Ok(Inverse::RemoveLocalFile { path: path.clone() }),
            Ok(meta) if meta.file_type().is_symlink() => {
                let target = fs::read_link(native)
                    .map_err(|e| dsync_fs::Error::io(native, e))?
                    .to_string_lossy()
                    .into_owned();
                Ok(Inverse::RestoreLocalSymlink {
                    path: path.clone(),
                    target,
                })
            }
            Ok(meta) if meta.is_dir() => Err(Error::Backend {
                backend: "local".to_string(),
                message: format!("{path} is a directory; cannot overwrite with a file"),
            }),
            Ok(_) => {
                let preimage = preimage_dir.join(format!("local-{seq}"));
                let prior = io::read_bytes(native)?;
                io::write_atomic(&preimage, &prior)?;
                Ok(Inverse::RestoreLocalFile {
                    path: path.clone(),
                    preimage,
                })
            }
        }
    }

    fn delete_local(
        &self,
        path: &SyncPath,
        preimage_dir: &Path,
        applied: &mut Vec<Inverse>,
    ) -> Result<()> {
        let native = self.resolve_local(path);
        let Ok(meta) = native.symlink_metadata() else {
            return Ok(()); // already gone
        };

        if meta.is_dir() {
            fs::remove_dir(&native).map_err(|e| dsync_fs::Error::io(&native, e))?;
            applied.push(Inverse::RestoreLocalDir { path: path.clone() });
        } else if meta.file_type().is_symlink() {
            let target = fs::read_link(&native)
                .map_err(|e| dsync_fs::Error::io(&native, e))?
                .to_string_lossy()
                .into_owned();
            fs::remove_file(&native).map_err(|e| dsync_fs::Error::io(&native, e))?;
            applied.push(Inverse::RestoreLocalSymlink {
                path: path.clone(),
                target,
            });
        } else {
            let preimage = preimage_dir.join(format!("local-{}", applied.len()));
            let prior = io::read_bytes(&native)?;
            io::write_atomic(&preimage, &prior)?;
            fs::remove_file(&native).map_err(|e| dsync_fs::Error::io(&native, e))?;
            applied.push(Inverse::RestoreLocalFile {
                path: path.clone(),
                preimage,
            });
        }
        Ok(())
    }

    fn delete_remote(
        &self,
        path: &SyncPath,
        preimage_dir: &Path,
        applied: &mut Vec<Inverse>,
    ) -> Result<()> {
        if !self.backend.transport().file_exists(path)? {
            return Ok(()); // already gone
        }

        let is_dir = self.remote.get(path).is_some_and(Entry::is_dir);
        if is_dir {
            self.backend.transport().delete(path)?;
            applied.push(Inverse::RestoreRemoteDir { path: path.clone() });
        } else {
            let preimage = preimage_dir.join(format!("remote-{}", applied.len()));
            let prior = self.backend.transport().read_file(path)?;
            io::write_atomic(&preimage, &prior)?;
            self.backend.transport().delete(path)?;
            applied.push(Inverse::RestoreRemoteFile {
                path: path.clone(),
                preimage,
            });
        }
        Ok(())
    }

    fn push_remote_manifest(
        &self,
        new_cache: &Manifest,
        preimage_dir: &Path,
        applied: &mut Vec<Inverse>,
    ) -> Result<()> {
        let payload = preimage_dir.join("manifest-payload");
        io::write_atomic(&payload, new_cache.to_json()?.as_bytes())?;
        self.write_remote_from(
            &SyncPath::new(crate::backend::REMOTE_MANIFEST_PATH),
            &payload,
            preimage_dir,
            applied,
        )
    }

    /// Unwind the applied prefix in reverse order.
    fn roll_back(
        &self,
        path: SyncPath,
        cause: Error,
        applied: Vec<Inverse>,
        state: &mut TxnState,
    ) -> Error {
        *state = TxnState::RollingBack;
        tracing::warn!(%path, %cause, applied = applied.len(), "rolling back transaction");

        let mut failures = Vec::new();
        for inverse in applied.iter().rev() {
            if let Err(e) = self.apply_inverse(inverse) {
                tracing::warn!(error = %e, "rollback step failed");
                failures.push(format!("{inverse:?}: {e}"));
            }
        }
        *state = TxnState::RolledBack;

        if !failures.is_empty() {
            Error::IncompleteRollback { path, failures }
        } else if matches!(cause, Error::Cancelled) {
            Error::Cancelled
        } else {
            Error::CommitFailed {
                path,
                message: cause.to_string(),
            }
        }
    }

    fn apply_inverse(&self, inverse: &Inverse) -> Result<()> {
        match inverse {
            Inverse::RemoveRemoteFile { path } | Inverse::RemoveRemoteDir { path } => {
                self.backend.transport().delete(path)
            }
            Inverse::RestoreRemoteFile { path, preimage } => {
                let bytes = io::read_bytes(preimage)?;
                self.backend.transport().write_file(path, &bytes)
            }
            Inverse::RestoreRemoteDir { path } => self.backend.transport().create_dir(path),
            Inverse::RemoveLocalFile { path } => {
                let native = self.resolve_local(path);
                fs::remove_file(&native).map_err(|e| dsync_fs::Error::io(&native, e))?;
                Ok(())
            }
            Inverse::RestoreLocalFile { path, preimage } => {
                let bytes = io::read_bytes(preimage)?;
                let native = self.resolve_local(path);
                if matches!(native.symlink_metadata().map(|m| m.file_type().is_symlink()), Ok(true)) {
                    fs::remove_file(&native).map_err(|e| dsync_fs::Error::io(&native, e))?;
                }
                Ok(io::write_atomic(&native, &bytes)?)
            }
            Inverse::RemoveLocalDir { path } => {
                let native = self.resolve_local(path);
                fs::remove_dir(&native).map_err(|e| dsync_fs::Error::io(&native, e))?;
                Ok(())
            }
            Inverse::RestoreLocalDir { path } => {
                let native = self.resolve_local(path);
                fs::create_dir_all(&native).map_err(|e| dsync_fs::Error::io(&native, e))?;
                Ok(())
            }
            Inverse::RestoreLocalSymlink { path, target } => {
                let native = self.resolve_local(path);
                if native.symlink_metadata().is_ok() {
                    fs::remove_file(&native).map_err(|e| dsync_fs::Error::io(&native, e))?;
                }
                #[cfg(unix)]
                std::os::unix::fs::symlink(target, &native)
                    .map_err(|e| dsync_fs::Error::io(&native, e))?;
                #[cfg(not(unix))]
                io::write_atomic(&native, target.as_bytes())?;
                Ok(())
            }
        }
    }

    /// The manifest both sides agree on after the plan lands: local entries
    /// merged with the plan's results, with chained metadata.
    fn merged_manifest(&self, staged: &[StagedAction], options: &ExecuteOptions) -> Manifest {
        let mut manifest = Manifest::from_entries(self.local.entries().clone());

        for item in staged {
            match &item.action {
                Action::Upload { path, from, .. } => {
                    if let Some(entry) = self.local.get(from) {
                        manifest.insert(path.clone(), entry.clone());
                    }
                }
                Action::Download { path, .. } => {
                    if let Some(entry) = self.remote.get(path) {
                        manifest.insert(path.clone(), entry.clone());
                    }
                }
                Action::DeleteLocal { path } | Action::DeleteRemote { path } => {
                    manifest.remove(path);
                }
                Action::CreateDirLocal { path } | Action::CreateDirRemote { path } => {
                    manifest.insert(path.clone(), Entry::directory());
                }
            }
        }

        let prior = self.cache.metadata();
        let snapshot_id = prior.map_or_else(SnapshotId::first, |m| m.snapshot_id.next());
        let snapshot_hash =
            manifest.compute_chain_hash(prior.map(|m| m.snapshot_hash.as_str()));
        manifest.set_metadata(Metadata {
            snapshot_id,
            snapshot_previous: prior.map(|m| m.snapshot_id),
            snapshot_message: options.message.clone(),
            snapshot_hash,
            created_at: Utc::now(),
        });
        manifest
    }
}

fn check_cancel(options: &ExecuteOptions) -> Result<()> {
    match &options.cancel {
        Some(token) if token.is_cancelled() => Err(Error::Cancelled),
        _ => Ok(()),
    }
}

/// Resolve conflict entries into concrete actions per the policy.
///
/// A conflict may pit an edit against a deletion, so resolution consults the
/// manifests: keeping a side that no longer holds the path deletes it from
/// the other side.
fn lower_plan(
    plan: &SyncPlan,
    policy: ConflictPolicy,
    local: &Manifest,
    remote: &Manifest,
) -> Vec<Action> {
    let mut actions = Vec::with_capacity(plan.len());
    for op in plan.operations() {
        match op {
            Operation::Upload { path, hash } => actions.push(Action::Upload {
                path: path.clone(),
                from: path.clone(),
                hash: hash.clone(),
                copy_local: false,
            }),
            Operation::Download { path, hash } => actions.push(Action::Download {
                path: path.clone(),
                hash: hash.clone(),
            }),
            Operation::DeleteLocal { path } => {
                actions.push(Action::DeleteLocal { path: path.clone() })
            }
            Operation::DeleteRemote { path } => {
                actions.push(Action::DeleteRemote { path: path.clone() })
            }
            Operation::CreateDirLocal { path } => {
                actions.push(Action::CreateDirLocal { path: path.clone() })
            }
            Operation::CreateDirRemote { path } => {
                actions.push(Action::CreateDirRemote { path: path.clone() })
            }
            Operation::Conflict {
                path,
                local_hash,
                remote_hash,
                ..
            } => {
                let local_present = local.get(path).is_some();
                let remote_present = remote.get(path).is_some();
                match policy {
                    // Refusal happened before execution; Fail cannot reach here.
                    ConflictPolicy::Fail => {}
                    ConflictPolicy::KeepLocal => {
                        if local_present {
                            actions.push(Action::Upload {
                                path: path.clone(),
                                from: path.clone(),
                                hash: local_hash.clone(),
                                copy_local: false,
                            });
                        } else {
                            actions.push(Action::DeleteRemote { path: path.clone() });
                        }
                    }
                    ConflictPolicy::KeepRemote => {
                        if remote_present {
                            actions.push(Action::Download {
                                path: path.clone(),
                                hash: remote_hash.clone(),
                            });
                        } else {
                            actions.push(Action::DeleteLocal { path: path.clone() });
                        }
                    }
                    ConflictPolicy::KeepBothRenamed => {
                        if local_present && remote_present {
                            actions.push(Action::Upload {
                                path: conflict_copy_path(path, local_hash.as_deref()),
                                from: path.clone(),
                                hash: local_hash.clone(),
                                copy_local: true,
                            });
                            actions.push(Action::Download {
                                path: path.clone(),
                                hash: remote_hash.clone(),
                            });
                        } else if local_present {
                            // Nothing to rename around: only one version exists.
                            actions.push(Action::Upload {
                                path: path.clone(),
                                from: path.clone(),
                                hash: local_hash.clone(),
                                copy_local: false,
                            });
                        } else if remote_present {
                            actions.push(Action::Download {
                                path: path.clone(),
                                hash: remote_hash.clone(),
                            });
                        }
                    }
                }
            }
        }
    }
    actions
}

/// Deterministic sibling name for a preserved local conflict copy.
fn conflict_copy_path(path: &SyncPath, local_hash: Option<&str>) -> SyncPath {
    let tag = local_hash
        .and_then(|h| h.strip_prefix("sha256:"))
        .map(|hex| hex.chars().take(8).collect::<String>())
        .unwrap_or_else(|| "local".to_string());
    SyncPath::new(format!("{path}.conflict-{tag}"))
}

fn describe_conflict(op: &Operation) -> String {
    match op {
        Operation::Conflict {
            path,
            local_hash,
            cache_hash,
            remote_hash,
        } => format!(
            "{path} (local {}, cache {}, remote {})",
            local_hash.as_deref().unwrap_or("absent"),
            cache_hash.as_deref().unwrap_or("absent"),
            remote_hash.as_deref().unwrap_or("absent"),
        ),
        other => other.path().to_string(),
    }
}
