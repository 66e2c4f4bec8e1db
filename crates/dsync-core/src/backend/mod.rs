//! Backend abstraction
//!
//! A backend is composed from capabilities rather than subclassed: every
//! backend has a [`Transport`] (plain file operations), and snapshot-capable
//! backends additionally carry [`SnapshotOps`]. Callers ask whether snapshots
//! are supported instead of inspecting concrete types; the executor degrades
//! to rename-based atomicity when they are not.

mod local;
mod memory;

pub use local::LocalDirBackend;
pub use memory::MemoryBackend;

use std::sync::Arc;

use dsync_fs::SyncPath;

use crate::Result;
use crate::manifest::Manifest;

/// Where the remote's manifest of record lives, relative to the transport root.
pub const REMOTE_MANIFEST_PATH: &str = ".dsync/manifest.json";

/// Plain file operations every backend provides.
///
/// All calls are synchronous and may be slow (network round-trips for remote
/// transports). A transport must enforce its own call timeout and surface an
/// expired timeout as an error, never as an indefinite hang.
pub trait Transport: Send + Sync {
    /// Short human-readable transport name, used in error and log context.
    fn name(&self) -> &str;

    /// True when a file or directory exists at `path`.
    fn file_exists(&self, path: &SyncPath) -> Result<bool>;

    /// Read a file's bytes. Fails with [`crate::Error::NotFound`] if absent.
    fn read_file(&self, path: &SyncPath) -> Result<Vec<u8>>;

    /// Write a file, creating parent directories as needed.
    fn write_file(&self, path: &SyncPath, bytes: &[u8]) -> Result<()>;

    /// Delete a file or empty directory.
    fn delete(&self, path: &SyncPath) -> Result<()>;

    /// Create a directory (and any missing parents).
    fn create_dir(&self, path: &SyncPath) -> Result<()>;
}

/// Snapshot operations for backends with native atomic snapshotting.
pub trait SnapshotOps: Send + Sync {
    /// Take a snapshot of the current backend state.
    fn create_snapshot(&self, message: &str) -> Result<String>;

    /// List snapshot names, oldest first.
    fn list_snapshots(&self) -> Result<Vec<String>>;

    /// Read the manifest of record as it was at a snapshot.
    fn read_manifest_at(&self, snapshot: &str) -> Result<Manifest>;
}

/// A transport plus an optional snapshot capability
#[derive(Clone)]
pub struct Backend {
    transport: Arc<dyn Transport>,
    snapshots: Option<Arc<dyn SnapshotOps>>,
}

impl Backend {
    /// A backend with file operations only.
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            snapshots: None,
        }
    }

    /// A backend with file operations and native snapshots.
    pub fn with_snapshots(transport: Arc<dyn Transport>, snapshots: Arc<dyn SnapshotOps>) -> Self {
        Self {
            transport,
            snapshots: Some(snapshots),
        }
    }

    /// The file-operation capability.
    pub fn transport(&self) -> &dyn Transport {
        self.transport.as_ref()
    }

    /// The snapshot capability, when the backend has one.
    pub fn snapshots(&self) -> Option<&dyn SnapshotOps> {
        self.snapshots.as_deref()
    }

    /// True when the backend supports native snapshots.
    pub fn supports_snapshots(&self) -> bool {
        self.snapshots.is_some()
    }

    /// Read the remote's manifest of record, or None before the first sync.
    pub fn read_manifest(&self) -> Result<Option<Manifest>> {
        let path = SyncPath::new(REMOTE_MANIFEST_PATH);
        if !self.transport.file_exists(&path)? {
            return Ok(None);
        }
        let bytes = self.transport.read_file(&path)?;
        let text = String::from_utf8_lossy(&bytes);
        Ok(Some(Manifest::from_json(&text)?))
    }

    /// Replace the remote's manifest of record.
    pub fn write_manifest(&self, manifest: &Manifest) -> Result<()> {
        let path = SyncPath::new(REMOTE_MANIFEST_PATH);
        self.transport
            .write_file(&path, manifest.to_json()?.as_bytes())
    }
}

impl std::fmt::Debug for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Backend")
            .field("transport", &self.transport.name())
            .field("snapshots", &self.snapshots.is_some())
            .finish()
    }
}
