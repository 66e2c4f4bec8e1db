//! Transactional plan execution
//!
//! A transaction applies one sync plan against one backend with
//! all-or-nothing semantics: payloads are staged and hash-verified before
//! anything touches a final destination, every applied operation records its
//! inverse, and any failure (or cancellation) unwinds the applied prefix in
//! reverse order. The repository lock guarantees at most one transaction in
//! flight.

mod executor;
mod lock;

pub use executor::{ExecuteOptions, Transaction, TransactionResult};
pub use lock::{LOCK_FILE, LockInfo, RepoLock};

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Transaction state machine
///
/// `Created → Staging → Committing → Committed` on success;
/// `Staging`/`Committing → RollingBack → RolledBack` on failure or
/// cancellation. Terminal states release the repository lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TxnState {
    Created,
    Staging,
    Committing,
    Committed,
    RollingBack,
    RolledBack,
}

/// Cooperative cancellation flag checked at operation boundaries.
///
/// Cancelling mid-commit takes the same rollback path as a failure.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation at the next operation boundary.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_token_is_shared_across_clones() {
        let token = CancelToken::new();
        let observer = token.clone();
        assert!(!observer.is_cancelled());

        token.cancel();
        assert!(observer.is_cancelled());
    }
}
