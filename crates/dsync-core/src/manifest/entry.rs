//! Manifest entries
//!
//! An entry records what one path held at scan time. Modification times are
//! informational only; content equality is decided by kind plus content hash
//! (files) or link target (symlinks), so a touch-only change never triggers a
//! re-sync.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What kind of filesystem object an entry describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Directory,
    Symlink,
}

/// One path's state within a manifest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    /// Kind of object at this path
    pub kind: EntryKind,

    /// Size in bytes (files only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,

    /// Best-effort modification time. Never participates in content equality
    /// except as the reduced-confidence fallback when hashes are disabled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mtime: Option<DateTime<Utc>>,

    /// Canonical `sha256:<hex>` content hash (files only, absent when the
    /// scan ran with hashing disabled)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_hash: Option<String>,

    /// Symlink target (symlinks only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link_target: Option<String>,

    /// Per-entry scan failure marker. Set instead of aborting the whole scan
    /// when one file cannot be read.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_error: Option<String>,
}

impl Entry {
    /// A plain file entry.
    pub fn file(size: u64, mtime: Option<DateTime<Utc>>, content_hash: Option<String>) -> Self {
        Self {
            kind: EntryKind::File,
            size: Some(size),
            mtime,
            content_hash,
            link_target: None,
            read_error: None,
        }
    }

    /// A directory entry.
    pub fn directory() -> Self {
        Self {
            kind: EntryKind::Directory,
            size: None,
            mtime: None,
            content_hash: None,
            link_target: None,
            read_error: None,
        }
    }

    /// A symlink entry.
    pub fn symlink(target: impl Into<String>) -> Self {
        Self {
            kind: EntryKind::Symlink,
            size: None,
            mtime: None,
            content_hash: None,
            link_target: Some(target.into()),
            read_error: None,
        }
    }

    /// A file that could not be read during scanning.
    pub fn unreadable(message: impl Into<String>) -> Self {
        Self {
            kind: EntryKind::File,
            size: None,
            mtime: None,
            content_hash: None,
            link_target: None,
            read_error: Some(message.into()),
        }
    }

    /// Content equality as the planner sees it.
    ///
    /// Files compare by content hash when both sides carry one; when either
    /// side scanned without hashing, the comparison falls back to
    /// `(size, mtime)`, which is weaker and can misclassify on filesystems
    /// with coarse mtime resolution. Symlinks compare by target, directories
    /// by kind alone.
    pub fn content_equal(&self, other: &Entry) -> bool {
        if self.kind != other.kind {
            return false;
        }
        match self.kind {
            EntryKind::Directory => true,
            EntryKind::Symlink => self.link_target == other.link_target,
            EntryKind::File => match (&self.content_hash, &other.content_hash) {
                (Some(a), Some(b)) => a == b,
                _ => self.size == other.size && self.mtime == other.mtime,
            },
        }
    }

    /// True when this entry is a directory.
    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Directory
    }
}
