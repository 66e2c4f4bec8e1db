//! Filesystem substrate for dsync
//!
//! Provides normalized manifest paths, canonical checksums, and safe
//! atomic I/O operations used throughout the workspace.

pub mod checksum;
pub mod error;
pub mod io;
pub mod path;

pub use error::{Error, Result};
pub use path::SyncPath;
