//! Transaction manager for coordinating commit operations
//!
//! Hands out transaction ids and drives commits of a TransactionContext
//! against a fact store, keeping counters of the outcomes.
//!
//! ## Commit Sequence
//!
//! ```text
//! 1. compile_statements() - register pending attributes, order statements
//! 2. store.transact() - one atomic batch; CAS guards checked by the store
//! 3. resolve provisional ids of created elements
//! 4. clear the context (also on failure)
//! ```
//!
//! A failed commit is never retried here; the caller decides whether to
//! start over.

use std::sync::atomic::{AtomicU64, Ordering};

use factgraph_core::{FactStore, Result};
use tracing::{info, warn};

use crate::context::{CommitOutcome, TransactionContext};

/// Manages transaction lifecycle and commits
///
/// Shared by every transaction of one graph; all methods take `&self`.
#[derive(Debug)]
pub struct TransactionManager {
    /// Next transaction ID
    next_txn_id: AtomicU64,
    commits: AtomicU64,
    aborts: AtomicU64,
}

impl TransactionManager {
    /// Create a new transaction manager
    pub fn new() -> Self {
        TransactionManager {
            next_txn_id: AtomicU64::new(1),
            commits: AtomicU64::new(0),
            aborts: AtomicU64::new(0),
        }
    }

    /// Allocate next transaction ID
    pub fn next_txn_id(&self) -> u64 {
        self.next_txn_id.fetch_add(1, Ordering::SeqCst)
    }

    /// Start a fresh, idle context
    pub fn begin(&self) -> TransactionContext {
        TransactionContext::new(self.next_txn_id())
    }

    /// Commit the context's pending operations as one batch
    ///
    /// # Errors
    ///
    /// `Error::Conflict` when another transaction changed a CAS-guarded value
    /// first; `Error::Store` for any other rejection. The context is cleared
    /// either way.
    pub fn commit(
        &self,
        txn: &mut TransactionContext,
        store: &dyn FactStore,
    ) -> Result<CommitOutcome> {
        let pending = txn.pending_operations();
        match txn.commit(store) {
            Ok(outcome) => {
                if let Some(basis_t) = outcome.basis_t {
                    self.commits.fetch_add(1, Ordering::Relaxed);
                    info!(
                        txn_id = txn.txn_id(),
                        basis_t,
                        creates = pending.creates,
                        modifies = pending.modifies,
                        deletes = pending.deletes,
                        "transaction committed"
                    );
                }
                Ok(outcome)
            }
            Err(err) => {
                self.aborts.fetch_add(1, Ordering::Relaxed);
                warn!(
                    txn_id = txn.txn_id(),
                    conflict = err.is_conflict(),
                    error = %err,
                    "transaction aborted"
                );
                Err(err)
            }
        }
    }

    /// Explicitly discard a transaction's pending operations
    pub fn abort(&self, txn: &mut TransactionContext) {
        if !txn.pending_operations().is_empty() {
            self.aborts.fetch_add(1, Ordering::Relaxed);
        }
        txn.rollback();
    }

    /// Number of commits that wrote a batch
    pub fn commit_count(&self) -> u64 {
        self.commits.load(Ordering::Relaxed)
    }

    /// Number of failed commits and discarded non-empty transactions
    pub fn abort_count(&self) -> u64 {
        self.aborts.load(Ordering::Relaxed)
    }
}

impl Default for TransactionManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SchemaRegistrar;
    use factgraph_core::{ElementIdentity, ElementKind};
    use factgraph_storage::MemoryFactStore;
    use std::collections::BTreeMap;
    use std::sync::Arc;
    use uuid::Uuid;

    fn setup_test_env() -> (TransactionManager, MemoryFactStore) {
        let store = MemoryFactStore::new("manager");
        SchemaRegistrar::install_meta_model(&store).unwrap();
        (TransactionManager::new(), store)
    }

    fn create_in(txn: &mut TransactionContext) {
        let temp = txn.allocate_temp_id();
        let identity = Arc::new(ElementIdentity::provisional(
            Uuid::new_v4(),
            ElementKind::Vertex,
            "vertex".into(),
            temp,
        ));
        txn.record_create(identity, BTreeMap::new(), Vec::new())
            .unwrap();
    }

    #[test]
    fn test_next_txn_id() {
        let manager = TransactionManager::new();
        assert_eq!(manager.next_txn_id(), 1);
        assert_eq!(manager.next_txn_id(), 2);
        assert_eq!(manager.begin().txn_id(), 3);
    }

    #[test]
    fn test_commit_counts() {
        let (manager, store) = setup_test_env();
        let mut txn = manager.begin();
        create_in(&mut txn);
        manager.commit(&mut txn, &store).unwrap();
        assert_eq!(manager.commit_count(), 1);

        // empty commit is not counted
        manager.commit(&mut txn, &store).unwrap();
        assert_eq!(manager.commit_count(), 1);
    }

    #[test]
    fn test_failed_commit_counts_abort() {
        let (manager, store) = setup_test_env();
        let mut txn = manager.begin();
        create_in(&mut txn);
        store.set_available(false);
        assert!(manager.commit(&mut txn, &store).is_err());
        assert_eq!(manager.abort_count(), 1);
        assert_eq!(manager.commit_count(), 0);
    }

    #[test]
    fn test_abort_discards() {
        let (manager, _store) = setup_test_env();
        let mut txn = manager.begin();
        manager.abort(&mut txn);
        assert_eq!(manager.abort_count(), 0);
        create_in(&mut txn);
        manager.abort(&mut txn);
        assert_eq!(manager.abort_count(), 1);
        assert!(txn.pending_operations().is_empty());
    }
}
