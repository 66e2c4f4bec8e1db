//! Error types for dsync-core

use std::path::PathBuf;

use dsync_fs::SyncPath;

/// Result type for dsync-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in dsync-core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Scan root missing or unreadable. Per-entry read failures are recorded
    /// in the manifest instead of raising this.
    #[error("Scan failed for {path}: {message}")]
    Scan { path: PathBuf, message: String },

    /// Malformed persisted manifest document
    #[error("Manifest parse error: {message}")]
    ManifestParse { message: String },

    /// The plan holds conflicts and no resolution policy was supplied
    #[error("Unresolved conflicts on: {}", .conflicts.join(", "))]
    UnresolvedConflicts { conflicts: Vec<String> },

    /// Staged content does not match the hash the plan promised
    #[error("Integrity failure for {path}: expected {expected}, staged content is {actual}")]
    Integrity {
        path: SyncPath,
        expected: String,
        actual: String,
    },

    /// Another transaction holds the repository lock
    #[error("Repository locked by {owner}@{host} (pid {pid}) since {since}")]
    LockHeld {
        owner: String,
        host: String,
        pid: u32,
        since: String,
    },

    /// A commit operation failed and rollback restored the previous state
    #[error("Transaction failed at {path}, rolled back: {message}")]
    CommitFailed { path: SyncPath, message: String },

    /// Rollback itself failed partway; the repository needs operator attention
    #[error("Incomplete rollback after failure at {path}: {} inverse operation(s) failed: {}", .failures.len(), .failures.join("; "))]
    IncompleteRollback {
        path: SyncPath,
        failures: Vec<String>,
    },

    /// The transaction was cancelled at an operation boundary
    #[error("Transaction cancelled")]
    Cancelled,

    /// Transport-level missing file
    #[error("Not found on backend: {path}")]
    NotFound { path: SyncPath },

    /// Config names a remote kind this build has no transport for
    #[error("Unknown remote kind {kind:?} (built-in kinds: local, memory)")]
    UnknownRemoteKind { kind: String },

    /// Repository control area missing or uninitialized
    #[error("No repository configuration at {path}")]
    ConfigMissing { path: PathBuf },

    /// Backend operation failure with transport context
    #[error("Backend {backend}: {message}")]
    Backend { backend: String, message: String },

    // Transparent wrappers for underlying crate errors
    /// Filesystem error from dsync-fs
    #[error(transparent)]
    Fs(#[from] dsync_fs::Error),

    /// Standard I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// TOML deserialization error
    #[error(transparent)]
    TomlDe(#[from] toml::de::Error),

    /// TOML serialization error
    #[error(transparent)]
    TomlSer(#[from] toml::ser::Error),
}
