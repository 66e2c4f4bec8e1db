//! Manifest reconciliation and transactional sync engine
//!
//! This crate is the core of dsync:
//!
//! - **Manifest model**: content-addressed snapshots of a directory tree with
//!   hash-chained history metadata
//! - **Scanner**: directory tree → manifest, partial-failure tolerant
//! - **Planner**: pure three-way (Local, Cache, Remote) reconciliation into
//!   an ordered sync plan with first-class conflicts
//! - **Executor**: all-or-nothing plan application with staging, hash
//!   verification, inverse-based rollback, and a cooperative repository lock
//! - **Chain validator**: append-only history auditing that reports every
//!   break
//! - **Backends**: a transport capability plus an optional snapshot
//!   capability, composed by construction
//!
//! # Architecture
//!
//! ```text
//!                  CLI
//!                   |
//!               Repository
//!        (scan → plan → execute)
//!           |       |       |
//!        Scanner Planner Executor --- Backend (Transport [+ SnapshotOps])
//!                   |
//!               dsync-fs
//! ```

pub mod backend;
pub mod chain;
pub mod config;
pub mod error;
pub mod manifest;
pub mod plan;
pub mod repo;
pub mod scan;
pub mod txn;

pub use backend::{Backend, LocalDirBackend, MemoryBackend, SnapshotOps, Transport};
pub use chain::{ChainBreak, ValidationReport, validate_chain};
pub use config::{RemoteConfig, RepoConfig};
pub use error::{Error, Result};
pub use manifest::{Entry, EntryKind, KeyDiff, Manifest, Metadata, SnapshotId};
pub use plan::{ConflictPolicy, Operation, SyncPlan, plan};
pub use repo::{CONTROL_DIR, Repository, SyncOutcome};
pub use scan::{ScanOptions, create_entry, scan};
pub use txn::{CancelToken, ExecuteOptions, Transaction, TransactionResult, TxnState};
