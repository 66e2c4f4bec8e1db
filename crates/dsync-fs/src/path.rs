//! Normalized manifest paths
//!
//! A [`SyncPath`] is the key type for manifest entries: relative, forward-slash
//! separated, and optionally composed to Unicode NFC. Different filesystems may
//! present the same filename in decomposed form; two spellings that differ only
//! by composition form must map to the same manifest key when normalization is
//! enabled.

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::path::{Path, PathBuf};
use unicode_normalization::UnicodeNormalization;

/// A relative manifest path normalized to forward slashes.
///
/// Construction strips `.` and `..` segments, collapses duplicate
/// separators, and drops leading and trailing separators, so equal trees
/// produce equal keys regardless of how the walker spelled them and a key
/// from an untrusted manifest can never resolve outside the tree root.
/// Unicode composition is opt-in via [`SyncPath::nfc`] because callers must
/// be able to observe raw decomposed keys when normalization is disabled.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SyncPath {
    /// Internal representation always uses forward slashes
    inner: String,
}

impl SyncPath {
    /// Create a new SyncPath without Unicode normalization.
    pub fn new(path: impl AsRef<str>) -> Self {
        let mut out = String::with_capacity(path.as_ref().len());
        for segment in path
            .as_ref()
            .replace('\\', "/")
            .split('/')
            .filter(|s| !s.is_empty() && *s != "." && *s != "..")
        {
            if !out.is_empty() {
                out.push('/');
            }
            out.push_str(segment);
        }
        Self { inner: out }
    }

    /// Create a new SyncPath composed to Unicode NFC.
    pub fn nfc(path: impl AsRef<str>) -> Self {
        let composed: String = path.as_ref().nfc().collect();
        Self::new(composed)
    }

    /// The NFD (decomposed) spelling of this path.
    ///
    /// Manifest keys are composed; the file on disk may still carry the
    /// decomposed name it was created with, so local I/O falls back to this
    /// spelling when the composed one does not resolve.
    pub fn decomposed(&self) -> Self {
        let decomposed: String = self.inner.nfd().collect();
        Self { inner: decomposed }
    }

    /// Create a SyncPath from a filesystem path, normalizing to NFC when asked.
    pub fn from_path(path: &Path, normalize: bool) -> Self {
        let raw = path.to_string_lossy();
        if normalize {
            Self::nfc(raw.as_ref())
        } else {
            Self::new(raw.as_ref())
        }
    }

    /// Get the internal normalized string representation.
    pub fn as_str(&self) -> &str {
        &self.inner
    }

    /// True for the empty path (the scan root itself).
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Resolve this relative path under a filesystem root.
    pub fn resolve_under(&self, root: &Path) -> PathBuf {
        root.join(&self.inner)
    }

    /// Get the parent path, if any.
    pub fn parent(&self) -> Option<Self> {
        let idx = self.inner.rfind('/')?;
        Some(Self {
            inner: self.inner[..idx].to_string(),
        })
    }

    /// Get the final path component.
    pub fn file_name(&self) -> &str {
        self.inner.rsplit('/').next().unwrap_or("")
    }

    /// Join this path with a further segment.
    pub fn join(&self, segment: &str) -> Self {
        if self.inner.is_empty() {
            Self::new(segment)
        } else {
            Self::new(format!("{}/{}", self.inner, segment))
        }
    }

    /// Component-wise ancestor test. A path is not its own ancestor.
    pub fn starts_with(&self, ancestor: &SyncPath) -> bool {
        if ancestor.inner.is_empty() {
            return !self.inner.is_empty();
        }
        match self.inner.strip_prefix(&ancestor.inner) {
            Some(rest) => rest.starts_with('/'),
            None => false,
        }
    }

    /// Number of components.
    pub fn depth(&self) -> usize {
        if self.inner.is_empty() {
            0
        } else {
            self.inner.split('/').count()
        }
    }
}

impl fmt::Display for SyncPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.inner)
    }
}

impl From<&str> for SyncPath {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for SyncPath {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl Serialize for SyncPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.inner)
    }
}

impl<'de> Deserialize<'de> for SyncPath {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct PathVisitor;

        impl Visitor<'_> for PathVisitor {
            type Value = SyncPath;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a relative forward-slash path string")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<SyncPath, E> {
                // Persisted keys were normalized at scan time; do not re-compose.
                Ok(SyncPath::new(v))
            }
        }

        deserializer.deserialize_str(PathVisitor)
    }
}
