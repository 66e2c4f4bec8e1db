//! Full-pipeline tests: scan → plan → execute → validate across repositories
//!
//! These exercise the public API end to end the way the CLI drives it, with
//! several writers sharing one remote of record.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use dsync_core::backend::{Backend, LocalDirBackend, MemoryBackend};
use dsync_core::txn::ExecuteOptions;
use dsync_core::{ConflictPolicy, RepoConfig, Repository};
use tempfile::TempDir;

struct Site {
    _dir: TempDir,
    repo: Repository,
}

impl Site {
    fn new(remote: &Path) -> Self {
        let dir = TempDir::new().unwrap();
        let repo =
            Repository::init(dir.path(), RepoConfig::local_remote(remote.to_string_lossy()))
                .unwrap();
        Self { _dir: dir, repo }
    }

    fn root(&self) -> &Path {
        self.repo.root()
    }

    fn write(&self, rel: &str, content: &str) {
        let path = self.root().join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn read(&self, rel: &str) -> String {
        fs::read_to_string(self.root().join(rel)).unwrap()
    }

    fn sync(&self, backend: &Backend, message: &str) {
        self.repo
            .sync(
                backend,
                &ExecuteOptions {
                    message: message.to_string(),
                    ..ExecuteOptions::default()
                },
            )
            .unwrap();
    }
}

#[test]
fn three_sites_converge_through_one_remote() {
    let remote_dir = TempDir::new().unwrap();
    let backend = Backend::new(Arc::new(LocalDirBackend::new(remote_dir.path()).unwrap()));

    let alpha = Site::new(remote_dir.path());
    let beta = Site::new(remote_dir.path());
    let gamma = Site::new(remote_dir.path());

    alpha.write("datasets/run1.csv", "1,2,3");
    alpha.write("datasets/run2.csv", "4,5,6");
    alpha.sync(&backend, "publish runs");

    beta.sync(&backend, "pull");
    gamma.sync(&backend, "pull");
    assert_eq!(beta.read("datasets/run1.csv"), "1,2,3");
    assert_eq!(gamma.read("datasets/run2.csv"), "4,5,6");

    // Beta revises one dataset; everyone converges.
    beta.write("datasets/run1.csv", "1,2,3,4");
    beta.sync(&backend, "extend run1");
    alpha.sync(&backend, "pull");
    gamma.sync(&backend, "pull");
    assert_eq!(alpha.read("datasets/run1.csv"), "1,2,3,4");
    assert_eq!(gamma.read("datasets/run1.csv"), "1,2,3,4");

    // Every site's own chain validates.
    for site in [&alpha, &beta, &gamma] {
        let report = site.repo.validate().unwrap();
        assert!(report.is_valid(), "breaks: {:?}", report.breaks);
    }
}

#[test]
fn conflict_resolution_keep_both_converges_all_sites() {
    let remote_dir = TempDir::new().unwrap();
    let backend = Backend::new(Arc::new(LocalDirBackend::new(remote_dir.path()).unwrap()));

    let alpha = Site::new(remote_dir.path());
    let beta = Site::new(remote_dir.path());

    alpha.write("notes.md", "base");
    alpha.sync(&backend, "base");
    beta.sync(&backend, "pull");

    alpha.write("notes.md", "alpha version");
    beta.write("notes.md", "beta version");
    alpha.sync(&backend, "alpha edit");

    // Beta hits the conflict and keeps both versions.
    let err = beta
        .repo
        .sync(&backend, &ExecuteOptions::default())
        .unwrap_err();
    assert!(matches!(
        err,
        dsync_core::Error::UnresolvedConflicts { .. }
    ));

    beta.repo
        .sync(
            &backend,
            &ExecuteOptions {
                message: "resolve".to_string(),
                conflict_policy: ConflictPolicy::KeepBothRenamed,
                cancel: None,
            },
        )
        .unwrap();

    assert_eq!(beta.read("notes.md"), "alpha version");

    // Alpha pulls and sees the preserved copy as well.
    alpha.sync(&backend, "pull");
    let copies: Vec<String> = fs::read_dir(alpha.root())
        .unwrap()
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .filter(|name| name.starts_with("notes.md.conflict-"))
        .collect();
    assert_eq!(copies.len(), 1);
    assert_eq!(alpha.read(&copies[0]), "beta version");
}

#[test]
fn snapshot_capable_remote_records_one_snapshot_per_commit() {
    let memory = Arc::new(MemoryBackend::new());
    let backend = Backend::with_snapshots(memory.clone(), memory.clone());

    let remote_placeholder = TempDir::new().unwrap();
    let site = Site::new(remote_placeholder.path());

    site.write("a.txt", "v1");
    site.sync(&backend, "first");
    site.write("a.txt", "v2");
    site.sync(&backend, "second");

    use dsync_core::backend::SnapshotOps;
    let snapshots = memory.list_snapshots().unwrap();
    assert_eq!(snapshots.len(), 2);

    // Each snapshot's manifest of record matches that point in history.
    let first = memory.read_manifest_at(&snapshots[0]).unwrap();
    let second = memory.read_manifest_at(&snapshots[1]).unwrap();
    assert!(!first.same_content(&second));
    assert_eq!(
        second.metadata().unwrap().snapshot_previous.unwrap(),
        first.metadata().unwrap().snapshot_id
    );

    let report = site.repo.validate().unwrap();
    assert!(report.is_valid());
}

#[test]
fn interrupted_writer_leaves_a_reclaimable_repository() {
    let remote_dir = TempDir::new().unwrap();
    let backend = Backend::new(Arc::new(LocalDirBackend::new(remote_dir.path()).unwrap()));
    let site = Site::new(remote_dir.path());
    site.write("a.txt", "v1");

    // Simulate a crashed writer from this host: marker present, pid gone.
    let marker = serde_json::json!({
        "owner": "ghost",
        "host": hostname(),
        "pid": u32::MAX - 1,
        "transaction": "00000000-0000-0000-0000-000000000000",
        "acquired_at": "2026-01-01T00:00:00Z",
    });
    let lock_path = site.repo.control_dir().join(dsync_core::txn::LOCK_FILE);
    fs::create_dir_all(lock_path.parent().unwrap()).unwrap();
    fs::write(&lock_path, serde_json::to_string(&marker).unwrap()).unwrap();

    // On Linux the stale marker is reclaimed and the sync proceeds.
    if cfg!(target_os = "linux") {
        site.sync(&backend, "after crash");
        assert!(!lock_path.exists());
    }
}

fn hostname() -> String {
    hostname::get()
        .map(|h| h.to_string_lossy().into_owned())
        .unwrap_or_else(|_| "unknown".to_string())
}
