//! SHA-256 checksum utilities
//!
//! Provides a single canonical checksum format (`sha256:<hex>`) used throughout
//! the workspace for content hashes, staging verification, and chain hashes.

use sha2::{Digest, Sha256};
use std::path::Path;

use crate::{Error, Result};

/// Prefix for all checksums produced by this module
const PREFIX: &str = "sha256:";

/// Compute the SHA-256 checksum of a byte slice.
///
/// Returns a string in the canonical format `"sha256:<hex>"`.
pub fn compute_bytes_checksum(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{}{:x}", PREFIX, hasher.finalize())
}

/// Compute the SHA-256 checksum of a file's contents.
///
/// Returns a string in the canonical format `"sha256:<hex>"`.
///
/// # Errors
///
/// Returns an error if the file cannot be read.
pub fn compute_file_checksum(path: &Path) -> Result<String> {
    let content = std::fs::read(path).map_err(|e| Error::io(path, e))?;
    Ok(compute_bytes_checksum(&content))
}

/// Incremental SHA-256 digest with the canonical prefix on finalization.
///
/// Used where a hash covers several fields rather than one buffer.
#[derive(Default)]
pub struct ChecksumBuilder {
    hasher: Sha256,
}

impl ChecksumBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed bytes into the digest.
    pub fn update(&mut self, bytes: &[u8]) {
        self.hasher.update(bytes);
    }

    /// Finalize into the canonical `"sha256:<hex>"` format.
    pub fn finish(self) -> String {
        format!("{}{:x}", PREFIX, self.hasher.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes_checksum_has_prefix() {
        let checksum = compute_bytes_checksum(b"hello world");
        assert!(checksum.starts_with("sha256:"));
    }

    #[test]
    fn bytes_checksum_known_value() {
        let checksum = compute_bytes_checksum(b"hello world");
        assert_eq!(
            checksum,
            "sha256:b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }

    #[test]
    fn different_content_different_checksum() {
        assert_ne!(compute_bytes_checksum(b"aaa"), compute_bytes_checksum(b"bbb"));
    }

    #[test]
    fn file_checksum_matches_bytes_checksum() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.txt");
        std::fs::write(&path, "hello world").unwrap();

        let file_cs = compute_file_checksum(&path).unwrap();
        let bytes_cs = compute_bytes_checksum(b"hello world");
        assert_eq!(file_cs, bytes_cs);
    }

    #[test]
    fn builder_matches_single_shot() {
        let mut builder = ChecksumBuilder::new();
        builder.update(b"hello ");
        builder.update(b"world");
        assert_eq!(builder.finish(), compute_bytes_checksum(b"hello world"));
    }
}
