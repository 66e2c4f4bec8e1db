//! Transaction executor behavior: atomicity, integrity, locking, cancellation

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::sync::Mutex;

use dsync_core::backend::{Backend, MemoryBackend, Transport};
use dsync_core::manifest::{Entry, Manifest};
use dsync_core::txn::{CancelToken, ExecuteOptions, LOCK_FILE, Transaction};
use dsync_core::{ConflictPolicy, Error, RepoConfig, Repository, plan};
use dsync_fs::{SyncPath, checksum};
use tempfile::TempDir;

/// Transport wrapper that fails the Nth mutating call once, then recovers,
/// so rollback can run against a healthy backend.
struct FailingTransport {
    inner: Arc<MemoryBackend>,
    countdown: Mutex<Option<usize>>,
}

impl FailingTransport {
    fn new(inner: Arc<MemoryBackend>, fail_at: usize) -> Self {
        Self {
            inner,
            countdown: Mutex::new(Some(fail_at)),
        }
    }

    fn mutating_call(&self) -> dsync_core::Result<()> {
        let mut slot = self.countdown.lock().unwrap();
        match slot.take() {
            Some(0) => Err(Error::Backend {
                backend: "failing".to_string(),
                message: "injected failure".to_string(),
            }),
            Some(n) => {
                *slot = Some(n - 1);
                Ok(())
            }
            None => Ok(()),
        }
    }
}

impl Transport for FailingTransport {
    fn name(&self) -> &str {
        "failing"
    }

    fn file_exists(&self, path: &SyncPath) -> dsync_core::Result<bool> {
        self.inner.file_exists(path)
    }

    fn read_file(&self, path: &SyncPath) -> dsync_core::Result<Vec<u8>> {
        self.inner.read_file(path)
    }

    fn write_file(&self, path: &SyncPath, bytes: &[u8]) -> dsync_core::Result<()> {
        self.mutating_call()?;
        self.inner.write_file(path, bytes)
    }

    fn delete(&self, path: &SyncPath) -> dsync_core::Result<()> {
        self.mutating_call()?;
        self.inner.delete(path)
    }

    fn create_dir(&self, path: &SyncPath) -> dsync_core::Result<()> {
        self.mutating_call()?;
        self.inner.create_dir(path)
    }
}

fn init_repo(root: &Path) -> Repository {
    Repository::init(root, RepoConfig::local_remote("unused")).unwrap()
}

fn write_local(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn sync_ok(repo: &Repository, backend: &Backend) {
    repo.sync(backend, &ExecuteOptions::default()).unwrap();
}

/// Change a remote file and keep the remote manifest of record consistent.
fn mutate_remote_file(backend: &Backend, rel: &str, content: &str) {
    let path = SyncPath::new(rel);
    backend.transport().write_file(&path, content.as_bytes()).unwrap();

    let mut manifest = backend.read_manifest().unwrap().unwrap();
    manifest.insert(
        path,
        Entry::file(
            content.len() as u64,
            None,
            Some(checksum::compute_bytes_checksum(content.as_bytes())),
        ),
    );
    backend.write_manifest(&manifest).unwrap();
}

fn delete_remote_file(backend: &Backend, rel: &str) {
    let path = SyncPath::new(rel);
    backend.transport().delete(&path).unwrap();

    let mut manifest = backend.read_manifest().unwrap().unwrap();
    manifest.remove(&path);
    backend.write_manifest(&manifest).unwrap();
}

/// Build the mixed-change scenario: one repo synced once, then divergence on
/// both sides that plans an upload, a download, a mkdir, and deletions in
/// both directions.
fn diverged_state(fail_at: Option<usize>) -> (TempDir, Repository, Backend, Arc<MemoryBackend>) {
    let dir = TempDir::new().unwrap();
    let repo = init_repo(dir.path());
    write_local(dir.path(), "edited.txt", "e1");
    write_local(dir.path(), "dl.txt", "d1");
    write_local(dir.path(), "rm-local.txt", "x1");
    write_local(dir.path(), "rm-remote.txt", "y1");

    let memory = Arc::new(MemoryBackend::new());
    let seed_backend = Backend::new(memory.clone());
    sync_ok(&repo, &seed_backend);

    // Local divergence
    write_local(dir.path(), "edited.txt", "e2");
    write_local(dir.path(), "new/n.txt", "n1");
    fs::remove_file(dir.path().join("rm-remote.txt")).unwrap();

    // Remote divergence
    mutate_remote_file(&seed_backend, "dl.txt", "d2");
    delete_remote_file(&seed_backend, "rm-local.txt");

    let backend = match fail_at {
        Some(n) => Backend::new(Arc::new(FailingTransport::new(memory.clone(), n))),
        None => Backend::new(memory.clone()),
    };
    (dir, repo, backend, memory)
}

fn remote_fingerprint(memory: &MemoryBackend) -> Vec<(SyncPath, Option<Vec<u8>>)> {
    memory
        .file_paths()
        .unwrap()
        .into_iter()
        .map(|p| {
            let bytes = memory.read_file(&p).ok();
            (p, bytes)
        })
        .collect()
}

#[test]
fn diverged_state_plans_every_operation_kind() {
    let (_dir, repo, backend, _memory) = diverged_state(None);
    let plan = repo.status(&backend).unwrap();

    let kinds: Vec<&str> = plan
        .operations()
        .iter()
        .map(|op| match op {
            dsync_core::Operation::Upload { .. } => "upload",
            dsync_core::Operation::Download { .. } => "download",
            dsync_core::Operation::DeleteLocal { .. } => "delete-local",
            dsync_core::Operation::DeleteRemote { .. } => "delete-remote",
            dsync_core::Operation::CreateDirLocal { .. } => "mkdir-local",
            dsync_core::Operation::CreateDirRemote { .. } => "mkdir-remote",
            dsync_core::Operation::Conflict { .. } => "conflict",
        })
        .collect();

    assert!(kinds.contains(&"upload"));
    assert!(kinds.contains(&"download"));
    assert!(kinds.contains(&"delete-local"));
    assert!(kinds.contains(&"delete-remote"));
    assert!(kinds.contains(&"mkdir-remote"));
    assert!(!kinds.contains(&"conflict"));
}

#[test]
fn clean_run_commits_and_converges_both_sides() {
    let (dir, repo, backend, _memory) = diverged_state(None);
    let outcome = repo.sync(&backend, &ExecuteOptions::default()).unwrap();
    assert!(outcome.result.is_some());

    // Local side converged
    assert_eq!(fs::read_to_string(dir.path().join("dl.txt")).unwrap(), "d2");
    assert!(!dir.path().join("rm-local.txt").exists());

    // Remote side converged
    let t = backend.transport();
    assert_eq!(t.read_file(&SyncPath::new("edited.txt")).unwrap(), b"e2");
    assert_eq!(t.read_file(&SyncPath::new("new/n.txt")).unwrap(), b"n1");
    assert!(!t.file_exists(&SyncPath::new("rm-remote.txt")).unwrap());

    // Second run is a no-op
    let again = repo.sync(&backend, &ExecuteOptions::default()).unwrap();
    assert!(again.plan.is_empty());
    assert!(again.result.is_none());
}

#[test]
fn failure_at_every_nth_operation_rolls_back_to_the_initial_state() {
    // Count remote mutations in a clean run first; the plan is deterministic.
    let (_dir, repo, backend, _memory) = diverged_state(None);
    let plan = repo.status(&backend).unwrap();
    assert!(!plan.is_empty());

    // Remote mutating calls: mkdir + uploads + delete-remote + manifest push.
    let remote_mutations = 5;

    for fail_at in 0..remote_mutations {
        let (_dir, repo, backend, memory) = diverged_state(Some(fail_at));

        let local_before = repo.scan_local().unwrap();
        let remote_before = remote_fingerprint(&memory);
        let cache_before = repo.load_cache().unwrap();

        let err = repo
            .sync(&backend, &ExecuteOptions::default())
            .expect_err("injected failure must fail the transaction");
        assert!(
            matches!(err, Error::CommitFailed { .. }),
            "fail_at={fail_at}: expected CommitFailed, got {err:?}"
        );

        let local_after = repo.scan_local().unwrap();
        assert!(
            local_after.same_content(&local_before),
            "fail_at={fail_at}: local tree changed across rollback"
        );
        assert_eq!(
            remote_fingerprint(&memory),
            remote_before,
            "fail_at={fail_at}: remote state changed across rollback"
        );
        assert!(
            repo.load_cache().unwrap().same_content(&cache_before),
            "fail_at={fail_at}: cache manifest changed across rollback"
        );
    }
}

#[test]
fn staged_hash_mismatch_aborts_before_any_destructive_step() {
    let dir = TempDir::new().unwrap();
    let repo = init_repo(dir.path());
    write_local(dir.path(), "a.txt", "original");

    let local = repo.scan_local().unwrap();
    let cache = repo.load_cache().unwrap();
    let remote = Manifest::new();
    let stale_plan = plan(&local, &cache, &remote);

    // The file changes between planning and execution: staging must catch it.
    write_local(dir.path(), "a.txt", "tampered");

    let memory = Arc::new(MemoryBackend::new());
    let backend = Backend::new(memory.clone());
    let control = repo.control_dir();
    let txn = Transaction::new(
        &stale_plan,
        &backend,
        dir.path(),
        &control,
        &local,
        &cache,
        &remote,
    );

    let err = txn.execute(&ExecuteOptions::default()).unwrap_err();
    assert!(matches!(err, Error::Integrity { .. }));
    let message = err.to_string();
    assert!(message.contains("a.txt"));

    // Nothing reached the backend.
    assert!(memory.file_paths().unwrap().is_empty());
}

#[test]
fn held_lock_is_reported_immediately() {
    let dir = TempDir::new().unwrap();
    let repo = init_repo(dir.path());
    write_local(dir.path(), "a.txt", "content");

    // A live holder: our own pid.
    let marker = serde_json::json!({
        "owner": "someone",
        "host": hostname::get().unwrap().to_string_lossy(),
        "pid": std::process::id(),
        "transaction": "00000000-0000-0000-0000-000000000000",
        "acquired_at": "2026-01-01T00:00:00Z",
    });
    fs::write(
        repo.control_dir().join(LOCK_FILE),
        serde_json::to_string(&marker).unwrap(),
    )
    .unwrap();

    let backend = Backend::new(Arc::new(MemoryBackend::new()));
    let err = repo.sync(&backend, &ExecuteOptions::default()).unwrap_err();
    assert!(matches!(err, Error::LockHeld { .. }));
}

#[test]
fn lock_is_released_after_a_committed_transaction() {
    let dir = TempDir::new().unwrap();
    let repo = init_repo(dir.path());
    write_local(dir.path(), "a.txt", "content");

    let backend = Backend::new(Arc::new(MemoryBackend::new()));
    sync_ok(&repo, &backend);

    assert!(!repo.control_dir().join(LOCK_FILE).exists());
}

#[test]
fn pre_cancelled_transaction_applies_nothing() {
    let dir = TempDir::new().unwrap();
    let repo = init_repo(dir.path());
    write_local(dir.path(), "a.txt", "content");

    let token = CancelToken::new();
    token.cancel();
    let memory = Arc::new(MemoryBackend::new());
    let backend = Backend::new(memory.clone());

    let err = repo
        .sync(
            &backend,
            &ExecuteOptions {
                cancel: Some(token),
                ..ExecuteOptions::default()
            },
        )
        .unwrap_err();

    assert!(matches!(err, Error::Cancelled));
    assert!(memory.file_paths().unwrap().is_empty());
}

#[test]
fn unresolved_conflict_refuses_naming_path_and_hashes() {
    let dir = TempDir::new().unwrap();
    let repo = init_repo(dir.path());
    write_local(dir.path(), "a.txt", "base");
    let backend = Backend::new(Arc::new(MemoryBackend::new()));
    sync_ok(&repo, &backend);

    write_local(dir.path(), "a.txt", "mine");
    mutate_remote_file(&backend, "a.txt", "theirs");

    let err = repo.sync(&backend, &ExecuteOptions::default()).unwrap_err();
    let message = err.to_string();
    assert!(matches!(err, Error::UnresolvedConflicts { .. }));
    assert!(message.contains("a.txt"));
    assert!(message.contains(&checksum::compute_bytes_checksum(b"mine")));
    assert!(message.contains(&checksum::compute_bytes_checksum(b"theirs")));
}

#[test]
fn keep_remote_resolution_overwrites_local() {
    let dir = TempDir::new().unwrap();
    let repo = init_repo(dir.path());
    write_local(dir.path(), "a.txt", "base");
    let backend = Backend::new(Arc::new(MemoryBackend::new()));
    sync_ok(&repo, &backend);

    write_local(dir.path(), "a.txt", "mine");
    mutate_remote_file(&backend, "a.txt", "theirs");

    let outcome = repo
        .sync(
            &backend,
            &ExecuteOptions {
                conflict_policy: ConflictPolicy::KeepRemote,
                ..ExecuteOptions::default()
            },
        )
        .unwrap();

    assert!(outcome.result.is_some());
    assert_eq!(
        fs::read_to_string(dir.path().join("a.txt")).unwrap(),
        "theirs"
    );
}

#[test]
fn keep_both_resolution_preserves_both_versions_deterministically() {
    let dir = TempDir::new().unwrap();
    let repo = init_repo(dir.path());
    write_local(dir.path(), "a.txt", "base");
    let backend = Backend::new(Arc::new(MemoryBackend::new()));
    sync_ok(&repo, &backend);

    write_local(dir.path(), "a.txt", "mine");
    mutate_remote_file(&backend, "a.txt", "theirs");

    let outcome = repo
        .sync(
            &backend,
            &ExecuteOptions {
                conflict_policy: ConflictPolicy::KeepBothRenamed,
                ..ExecuteOptions::default()
            },
        )
        .unwrap();
    assert!(outcome.result.is_some());

    // Remote version landed at the original path on both sides.
    assert_eq!(
        fs::read_to_string(dir.path().join("a.txt")).unwrap(),
        "theirs"
    );

    // Local version preserved under its hash-derived sibling name, both sides.
    let hash8: String = checksum::compute_bytes_checksum(b"mine")
        .strip_prefix("sha256:")
        .unwrap()
        .chars()
        .take(8)
        .collect();
    let copy = format!("a.txt.conflict-{hash8}");
    assert_eq!(fs::read_to_string(dir.path().join(&copy)).unwrap(), "mine");
    assert_eq!(
        backend
            .transport()
            .read_file(&SyncPath::new(copy))
            .unwrap(),
        b"mine"
    );

    // The resolution is synced state: the next run has nothing to do.
    let again = repo.sync(&backend, &ExecuteOptions::default()).unwrap();
    assert!(again.plan.is_empty());
}

#[test]
fn snapshot_capable_backend_gets_a_snapshot_per_commit() {
    let dir = TempDir::new().unwrap();
    let repo = init_repo(dir.path());
    write_local(dir.path(), "a.txt", "v1");

    let memory = Arc::new(MemoryBackend::new());
    let backend = Backend::with_snapshots(memory.clone(), memory.clone());

    let outcome = repo.sync(&backend, &ExecuteOptions::default()).unwrap();
    let result = outcome.result.unwrap();
    assert!(result.backend_snapshot.is_some());

    use dsync_core::backend::SnapshotOps;
    let snapshots = memory.list_snapshots().unwrap();
    assert_eq!(snapshots.len(), 1);

    // The snapshot captured the manifest of record as committed.
    let at_snapshot = memory.read_manifest_at(&snapshots[0]).unwrap();
    assert!(at_snapshot.same_content(&result.new_cache));
}
