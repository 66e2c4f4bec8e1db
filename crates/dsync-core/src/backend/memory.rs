//! In-memory backend
//!
//! Holds the remote tree in a map and supports whole-state snapshots, making
//! it the reference implementation of the snapshot capability. Used heavily
//! by the transaction and chain tests, and useful as a scratch remote.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use dsync_fs::SyncPath;

use crate::manifest::Manifest;
use crate::{Error, Result};

use super::{REMOTE_MANIFEST_PATH, SnapshotOps, Transport};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Node {
    File(Vec<u8>),
    Dir,
}

#[derive(Debug, Clone)]
struct SnapshotRecord {
    name: String,
    message: String,
    files: BTreeMap<SyncPath, Node>,
}

#[derive(Debug, Default)]
struct MemoryState {
    files: BTreeMap<SyncPath, Node>,
    snapshots: Vec<SnapshotRecord>,
}

/// Snapshot-capable in-memory transport
#[derive(Debug, Default)]
pub struct MemoryBackend {
    state: Mutex<MemoryState>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> Result<MutexGuard<'_, MemoryState>> {
        self.state.lock().map_err(|_| Error::Backend {
            backend: "memory".to_string(),
            message: "state mutex poisoned".to_string(),
        })
    }

    /// All file paths currently present, for test assertions.
    pub fn file_paths(&self) -> Result<Vec<SyncPath>> {
        Ok(self.state()?.files.keys().cloned().collect())
    }
}

impl Transport for MemoryBackend {
    fn name(&self) -> &str {
        "memory"
    }

    fn file_exists(&self, path: &SyncPath) -> Result<bool> {
        Ok(self.state()?.files.contains_key(path))
    }

    fn read_file(&self, path: &SyncPath) -> Result<Vec<u8>> {
        match self.state()?.files.get(path) {
            Some(Node::File(bytes)) => Ok(bytes.clone()),
            Some(Node::Dir) => Err(Error::Backend {
                backend: "memory".to_string(),
                message: format!("{path} is a directory"),
            }),
            None => Err(Error::NotFound { path: path.clone() }),
        }
    }

    fn write_file(&self, path: &SyncPath, bytes: &[u8]) -> Result<()> {
        let mut state = self.state()?;
        let mut parent = path.parent();
        while let Some(dir) = parent {
            state.files.entry(dir.clone()).or_insert(Node::Dir);
            parent = dir.parent();
        }
        state.files.insert(path.clone(), Node::File(bytes.to_vec()));
        Ok(())
    }

    fn delete(&self, path: &SyncPath) -> Result<()> {
        let mut state = self.state()?;
        if state.files.remove(path).is_none() {
            return Err(Error::NotFound { path: path.clone() });
        }
        Ok(())
    }

    fn create_dir(&self, path: &SyncPath) -> Result<()> {
        let mut state = self.state()?;
        let mut current = Some(path.clone());
        while let Some(dir) = current {
            if dir.is_empty() {
                break;
            }
            state.files.entry(dir.clone()).or_insert(Node::Dir);
            current = dir.parent();
        }
        Ok(())
    }
}

impl SnapshotOps for MemoryBackend {
    fn create_snapshot(&self, message: &str) -> Result<String> {
        let mut state = self.state()?;
        let name = format!("snap-{}", state.snapshots.len() + 1);
        let files = state.files.clone();
        state.snapshots.push(SnapshotRecord {
            name: name.clone(),
            message: message.to_string(),
            files,
        });
        Ok(name)
    }

    fn list_snapshots(&self) -> Result<Vec<String>> {
        Ok(self
            .state()?
            .snapshots
            .iter()
            .map(|s| s.name.clone())
            .collect())
    }

    fn read_manifest_at(&self, snapshot: &str) -> Result<Manifest> {
        let state = self.state()?;
        let record = state
            .snapshots
            .iter()
            .find(|s| s.name == snapshot)
            .ok_or_else(|| Error::Backend {
                backend: "memory".to_string(),
                message: format!("no snapshot named {snapshot:?}"),
            })?;
        match record.files.get(&SyncPath::new(REMOTE_MANIFEST_PATH)) {
            Some(Node::File(bytes)) => Manifest::from_json(&String::from_utf8_lossy(bytes)),
            _ => Err(Error::Backend {
                backend: "memory".to_string(),
                message: format!("snapshot {snapshot:?} holds no manifest"),
            }),
        }
    }
}
