//! Snapshot chain metadata
//!
//! Every committed manifest carries a [`Metadata`] record linking it to its
//! predecessor: the id chain (`snapshot_previous`) and the hash chain
//! (`snapshot_hash`, a digest over the entry set combined with the previous
//! hash). Together they form an append-only, tamper-evident history.

use chrono::{DateTime, Utc};
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Snapshot identifier, rendered as `s<N>`.
///
/// Ordering is numeric, never lexical, so `s10` sorts after `s9`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SnapshotId(u64);

impl SnapshotId {
    /// The first snapshot id in a fresh repository.
    pub fn first() -> Self {
        Self(1)
    }

    /// The id immediately following this one.
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }

    /// The numeric component.
    pub fn index(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SnapshotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s{}", self.0)
    }
}

impl FromStr for SnapshotId {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let digits = s
            .strip_prefix('s')
            .ok_or_else(|| format!("snapshot id {s:?} does not start with 's'"))?;
        let n: u64 = digits
            .parse()
            .map_err(|_| format!("snapshot id {s:?} has a non-numeric index"))?;
        Ok(Self(n))
    }
}

impl Serialize for SnapshotId {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for SnapshotId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct IdVisitor;

        impl Visitor<'_> for IdVisitor {
            type Value = SnapshotId;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a snapshot id of the form \"s<N>\"")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<SnapshotId, E> {
                v.parse().map_err(E::custom)
            }
        }

        deserializer.deserialize_str(IdVisitor)
    }
}

/// Chain metadata of one committed manifest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    /// This snapshot's id
    pub snapshot_id: SnapshotId,

    /// Id of the immediate predecessor; absent for the first snapshot
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot_previous: Option<SnapshotId>,

    /// Free-text message recorded at commit time
    pub snapshot_message: String,

    /// Digest over the sorted entry set combined with the predecessor's hash
    pub snapshot_hash: String,

    /// When the snapshot was committed
    pub created_at: DateTime<Utc>,
}
