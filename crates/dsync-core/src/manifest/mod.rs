//! Manifest data model
//!
//! A manifest is a content-addressed snapshot of a directory tree: an ordered
//! mapping of normalized path → entry, plus chain metadata once committed.
//! Manifests are immutable from the planner's point of view; the planner only
//! reads them and produces a new plan.

mod entry;
mod metadata;

pub use entry::{Entry, EntryKind};
pub use metadata::{Metadata, SnapshotId};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use dsync_fs::SyncPath;
use dsync_fs::checksum::ChecksumBuilder;

use crate::{Error, Result};

/// Key-set difference between two manifests
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyDiff {
    /// Paths present in the other manifest but not in this one
    pub added: Vec<SyncPath>,
    /// Paths present in this manifest but not in the other
    pub removed: Vec<SyncPath>,
    /// Paths present in both
    pub common: Vec<SyncPath>,
}

/// A content-addressed snapshot of a directory tree
///
/// Entries are kept sorted by path, which makes serialization and chain-hash
/// computation deterministic. Scanner-produced manifests carry no metadata;
/// committed and persisted manifests always do.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    /// Chain metadata, present once the manifest has been committed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    metadata: Option<Metadata>,

    /// Ordered mapping of normalized path → entry
    entries: BTreeMap<SyncPath, Entry>,
}

impl Manifest {
    /// Create an empty manifest with no metadata.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a manifest from an entry map.
    pub fn from_entries(entries: BTreeMap<SyncPath, Entry>) -> Self {
        Self {
            metadata: None,
            entries,
        }
    }

    /// Chain metadata, if this manifest has been committed.
    pub fn metadata(&self) -> Option<&Metadata> {
        self.metadata.as_ref()
    }

    /// Attach chain metadata.
    pub fn set_metadata(&mut self, metadata: Metadata) {
        self.metadata = Some(metadata);
    }

    /// All entries, sorted by path.
    pub fn entries(&self) -> &BTreeMap<SyncPath, Entry> {
        &self.entries
    }

    /// Look up one entry.
    pub fn get(&self, path: &SyncPath) -> Option<&Entry> {
        self.entries.get(path)
    }

    /// Insert or replace one entry.
    pub fn insert(&mut self, path: SyncPath, entry: Entry) {
        self.entries.insert(path, entry);
    }

    /// Remove one entry.
    pub fn remove(&mut self, path: &SyncPath) -> Option<Entry> {
        self.entries.remove(path)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when the manifest holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Key-set difference against another manifest.
    ///
    /// `added` holds paths only the other manifest has, `removed` holds paths
    /// only this manifest has, `common` holds the intersection. Pure set
    /// operations; entry contents are not compared.
    pub fn diff_keys(&self, other: &Manifest) -> KeyDiff {
        let mut diff = KeyDiff::default();
        for path in self.entries.keys() {
            if other.entries.contains_key(path) {
                diff.common.push(path.clone());
            } else {
                diff.removed.push(path.clone());
            }
        }
        for path in other.entries.keys() {
            if !self.entries.contains_key(path) {
                diff.added.push(path.clone());
            }
        }
        diff
    }

    /// Manifest equality as the engine defines it: same key set, and every
    /// common key content-equal. Ordering and mtimes are excluded.
    pub fn same_content(&self, other: &Manifest) -> bool {
        if self.entries.len() != other.entries.len() {
            return false;
        }
        self.entries.iter().all(|(path, entry)| {
            other
                .entries
                .get(path)
                .is_some_and(|o| entry.content_equal(o))
        })
    }

    /// Compute the chain hash over the sorted entry set and the predecessor's
    /// hash.
    ///
    /// Covers the entry identity fields (path, kind, size, content hash, link
    /// target). Mtimes and read-error markers are excluded so a rescan of
    /// unchanged content reproduces the stored hash exactly.
    pub fn compute_chain_hash(&self, previous_hash: Option<&str>) -> String {
        let mut builder = ChecksumBuilder::new();
        for (path, entry) in &self.entries {
            builder.update(path.as_str().as_bytes());
            builder.update(b"\0");
            builder.update(match entry.kind {
                EntryKind::File => b"file".as_slice(),
                EntryKind::Directory => b"directory".as_slice(),
                EntryKind::Symlink => b"symlink".as_slice(),
            });
            builder.update(b"\0");
            if let Some(size) = entry.size {
                builder.update(size.to_string().as_bytes());
            }
            builder.update(b"\0");
            if let Some(hash) = &entry.content_hash {
                builder.update(hash.as_bytes());
            }
            builder.update(b"\0");
            if let Some(target) = &entry.link_target {
                builder.update(target.as_bytes());
            }
            builder.update(b"\n");
        }
        builder.update(b"previous:");
        builder.update(previous_hash.unwrap_or("-").as_bytes());
        builder.finish()
    }

    /// Serialize to the persisted JSON document (`metadata` + `entries`).
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Load a manifest from its persisted JSON document.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ManifestParse`] when the document is not valid JSON,
    /// when `entries` is missing or not a mapping, or when any entry lacks a
    /// `kind`.
    pub fn from_json(content: &str) -> Result<Self> {
        let value: serde_json::Value =
            serde_json::from_str(content).map_err(|e| Error::ManifestParse {
                message: e.to_string(),
            })?;

        let entries = value.get("entries").ok_or_else(|| Error::ManifestParse {
            message: "missing required field `entries`".to_string(),
        })?;
        let map = entries.as_object().ok_or_else(|| Error::ManifestParse {
            message: "`entries` is not a mapping".to_string(),
        })?;
        for (path, entry) in map {
            let has_kind = entry
                .as_object()
                .is_some_and(|fields| fields.contains_key("kind"));
            if !has_kind {
                return Err(Error::ManifestParse {
                    message: format!("entry {path:?} lacks a `kind`"),
                });
            }
        }

        serde_json::from_value(value).map_err(|e| Error::ManifestParse {
            message: e.to_string(),
        })
    }
}
