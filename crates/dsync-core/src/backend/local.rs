//! Plain local-directory backend
//!
//! File operations against a directory on the same machine. No native
//! snapshots; the executor falls back to rename-based atomicity.

use std::fs;
use std::path::{Path, PathBuf};

use dsync_fs::{SyncPath, io};

use crate::{Error, Result};

use super::Transport;

/// Transport over a plain local directory
#[derive(Debug)]
pub struct LocalDirBackend {
    root: PathBuf,
}

impl LocalDirBackend {
    /// Create a backend rooted at `root`, creating the directory if needed.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|e| dsync_fs::Error::io(&root, e))?;
        Ok(Self { root })
    }

    /// The backend's root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &SyncPath) -> PathBuf {
        path.resolve_under(&self.root)
    }
}

impl Transport for LocalDirBackend {
    fn name(&self) -> &str {
        "local"
    }

    fn file_exists(&self, path: &SyncPath) -> Result<bool> {
        Ok(self.resolve(path).symlink_metadata().is_ok())
    }

    fn read_file(&self, path: &SyncPath) -> Result<Vec<u8>> {
        let native = self.resolve(path);
        if !native.exists() {
            return Err(Error::NotFound { path: path.clone() });
        }
        Ok(io::read_bytes(&native)?)
    }

    fn write_file(&self, path: &SyncPath, bytes: &[u8]) -> Result<()> {
        Ok(io::write_atomic(&self.resolve(path), bytes)?)
    }

    fn delete(&self, path: &SyncPath) -> Result<()> {
        let native = self.resolve(path);
        let meta = native
            .symlink_metadata()
            .map_err(|_| Error::NotFound { path: path.clone() })?;
        if meta.is_dir() {
            fs::remove_dir(&native).map_err(|e| dsync_fs::Error::io(&native, e))?;
        } else {
            fs::remove_file(&native).map_err(|e| dsync_fs::Error::io(&native, e))?;
        }
        Ok(())
    }

    fn create_dir(&self, path: &SyncPath) -> Result<()> {
        let native = self.resolve(path);
        fs::create_dir_all(&native).map_err(|e| dsync_fs::Error::io(&native, e))?;
        Ok(())
    }
}
