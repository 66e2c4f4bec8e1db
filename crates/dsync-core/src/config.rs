//! Repository configuration
//!
//! Parsed from `.dsync/config.toml`. The remote table names the backend by
//! kind; transports for kinds this build does not carry (ssh, zfs, xfs) are
//! plugged in externally and rejected here by name.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::backend::{Backend, LocalDirBackend, MemoryBackend};
use crate::{Error, Result};

fn default_true() -> bool {
    true
}

/// The remote of record for a repository
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Backend kind: `local` or `memory` are built in
    pub kind: String,
    /// Backend root (a directory path for `local`)
    #[serde(default)]
    pub path: String,
}

/// Repository configuration, one per control area
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepoConfig {
    /// The remote of record
    pub remote: RemoteConfig,

    /// Rewrite manifest keys to composed Unicode (NFC) form
    #[serde(default = "default_true")]
    pub normalize_paths: bool,

    /// Compute content hashes while scanning. Disabling degrades change
    /// detection to the `(size, mtime)` heuristic.
    #[serde(default = "default_true")]
    pub compute_hashes: bool,

    /// Restrict syncing to these subtrees; empty means the whole tree
    #[serde(default)]
    pub data_dirs: Vec<String>,
}

impl RepoConfig {
    /// A configuration pointing at a plain local-directory remote.
    pub fn local_remote(path: impl Into<String>) -> Self {
        Self {
            remote: RemoteConfig {
                kind: "local".to_string(),
                path: path.into(),
            },
            normalize_paths: true,
            compute_hashes: true,
            data_dirs: Vec::new(),
        }
    }

    /// Parse a configuration from TOML content.
    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Serialize to TOML.
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Construct the backend this configuration names.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownRemoteKind`] for kinds without a built-in
    /// transport.
    pub fn backend(&self) -> Result<Backend> {
        match self.remote.kind.as_str() {
            "local" => Ok(Backend::new(Arc::new(LocalDirBackend::new(
                self.remote.path.clone(),
            )?))),
            "memory" => {
                let memory = Arc::new(MemoryBackend::new());
                Ok(Backend::with_snapshots(memory.clone(), memory))
            }
            other => Err(Error::UnknownRemoteKind {
                kind: other.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parse_fills_defaults() {
        let config = RepoConfig::parse(
            r#"
            [remote]
            kind = "local"
            path = "/srv/backup"
            "#,
        )
        .unwrap();

        assert_eq!(config.remote.kind, "local");
        assert!(config.normalize_paths);
        assert!(config.compute_hashes);
        assert!(config.data_dirs.is_empty());
    }

    #[test]
    fn round_trips_through_toml() {
        let mut config = RepoConfig::local_remote("/srv/backup");
        config.data_dirs = vec!["data".to_string(), "assets".to_string()];
        config.compute_hashes = false;

        let toml = config.to_toml().unwrap();
        let back = RepoConfig::parse(&toml).unwrap();

        assert_eq!(back.remote.path, "/srv/backup");
        assert_eq!(back.data_dirs, config.data_dirs);
        assert!(!back.compute_hashes);
    }

    #[test]
    fn unknown_remote_kind_is_rejected_by_name() {
        let config = RepoConfig {
            remote: RemoteConfig {
                kind: "zfs".to_string(),
                path: "tank/data".to_string(),
            },
            normalize_paths: true,
            compute_hashes: true,
            data_dirs: Vec::new(),
        };

        let err = config.backend().unwrap_err();
        assert!(err.to_string().contains("zfs"));
    }

    #[test]
    fn memory_remote_supports_snapshots() {
        let config = RepoConfig {
            remote: RemoteConfig {
                kind: "memory".to_string(),
                path: String::new(),
            },
            normalize_paths: true,
            compute_hashes: true,
            data_dirs: Vec::new(),
        };

        assert!(config.backend().unwrap().supports_snapshots());
    }
}
