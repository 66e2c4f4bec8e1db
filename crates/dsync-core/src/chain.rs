//! Snapshot chain validation
//!
//! History is an append-only ledger: each committed manifest names its
//! predecessor and carries a hash chained to the predecessor's hash. The
//! validator walks persisted records, verifies both links, and reports every
//! break it finds — operators need the full picture to judge whether history
//! is salvageable, so it never stops at the first.

use serde::Serialize;

use crate::manifest::{Manifest, SnapshotId};

/// One detected break in the snapshot chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "break", rename_all = "snake_case")]
pub enum ChainBreak {
    /// The first snapshot names a predecessor it cannot have
    UnexpectedPreviousLink {
        snapshot_id: SnapshotId,
        actual: SnapshotId,
    },

    /// A snapshot names the wrong predecessor
    BrokenLink {
        snapshot_id: SnapshotId,
        expected: SnapshotId,
        actual: Option<SnapshotId>,
    },

    /// A snapshot's stored hash does not match its recomputed hash
    HashMismatch { snapshot_id: SnapshotId },

    /// A persisted record carries no chain metadata at all
    MissingMetadata { index: usize },
}

impl std::fmt::Display for ChainBreak {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChainBreak::UnexpectedPreviousLink {
                snapshot_id,
                actual,
            } => write!(
                f,
                "{snapshot_id}: first snapshot names predecessor {actual}"
            ),
            ChainBreak::BrokenLink {
                snapshot_id,
                expected,
                actual,
            } => match actual {
                Some(actual) => write!(
                    f,
                    "{snapshot_id}: predecessor is {actual}, expected {expected}"
                ),
                None => write!(f, "{snapshot_id}: predecessor missing, expected {expected}"),
            },
            ChainBreak::HashMismatch { snapshot_id } => {
                write!(f, "{snapshot_id}: stored hash does not match entry set")
            }
            ChainBreak::MissingMetadata { index } => {
                write!(f, "record {index}: no chain metadata")
            }
        }
    }
}

/// Everything the validator found
#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidationReport {
    /// Every break found, in chain order
    pub breaks: Vec<ChainBreak>,
    /// Number of records examined
    pub snapshots_checked: usize,
}

impl ValidationReport {
    /// True when the chain is intact.
    pub fn is_valid(&self) -> bool {
        self.breaks.is_empty()
    }
}

/// Validate the previous-link chain and the hash chain of persisted history.
///
/// Records are ordered by numeric snapshot id without mutating the input.
/// Each stored hash is recomputed against the *stored* predecessor hash, so
/// one corrupted snapshot reports exactly one mismatch instead of cascading
/// down the rest of the chain.
pub fn validate_chain(manifests: &[Manifest]) -> ValidationReport {
    let mut report = ValidationReport {
        breaks: Vec::new(),
        snapshots_checked: manifests.len(),
    };

    let mut ordered: Vec<&Manifest> = Vec::with_capacity(manifests.len());
    for (index, manifest) in manifests.iter().enumerate() {
        if manifest.metadata().is_some() {
            ordered.push(manifest);
        } else {
            report.breaks.push(ChainBreak::MissingMetadata { index });
        }
    }
    ordered.sort_by_key(|m| m.metadata().map(|meta| meta.snapshot_id));

    let mut previous: Option<&Manifest> = None;
    for manifest in ordered {
        let Some(meta) = manifest.metadata() else {
            continue;
        };

        match (previous.and_then(Manifest::metadata), meta.snapshot_previous) {
            (None, Some(actual)) => report.breaks.push(ChainBreak::UnexpectedPreviousLink {
                snapshot_id: meta.snapshot_id,
                actual,
            }),
            (None, None) => {}
            (Some(prior), actual) => {
                if actual != Some(prior.snapshot_id) {
                    report.breaks.push(ChainBreak::BrokenLink {
                        snapshot_id: meta.snapshot_id,
                        expected: prior.snapshot_id,
                        actual,
                    });
                }
            }
        }

        let prior_hash = previous
            .and_then(Manifest::metadata)
            .map(|m| m.snapshot_hash.as_str());
        let recomputed = manifest.compute_chain_hash(prior_hash);
        if recomputed != meta.snapshot_hash {
            report.breaks.push(ChainBreak::HashMismatch {
                snapshot_id: meta.snapshot_id,
            });
        }

        previous = Some(manifest);
    }

    report
}
