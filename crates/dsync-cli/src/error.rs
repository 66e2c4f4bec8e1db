//! Error types for the dsync CLI

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that surface to the user
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The snapshot chain failed validation
    #[error("Snapshot chain is broken: {breaks} break(s) found")]
    ChainBroken { breaks: usize },

    /// Bad command-line value
    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    /// Engine error
    #[error(transparent)]
    Core(#[from] dsync_core::Error),

    /// Standard I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON output error
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
