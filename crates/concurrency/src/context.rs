//! Transaction context: the mutation buffer
//!
//! This module implements the per-transaction buffer of graph mutations.
//! TransactionContext keeps one ordered operation per element, the attribute
//! declarations its writes need, and a memoized speculative snapshot that
//! lets the transaction read its own writes.
//!
//! # Lifecycle
//!
//! - `Idle` → `Active` on first read or write (the base snapshot is pinned)
//! - `Idle` → `ReadOnly` via `pin_as_of`
//! - any state → `Idle` on commit (success or failure) and rollback
//!
//! A context is owned by exactly one transaction handle and is never shared
//! between threads while in use.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use factgraph_core::{
    AttributeDef, ElementIdentity, Error, FactStore, FactValue, Ident, Result, Snapshot,
    Statement, TempId,
};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::operation::{
    apply_to_fields, merge_change, Modification, OpKind, PendingOperation, PendingStatement,
};
use crate::schema::SchemaRegistrar;

/// Status of a context in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionStatus {
    /// Nothing read or written since the last commit or rollback
    Idle,
    /// Base snapshot pinned, reads and writes allowed
    Active,
    /// Pinned to a historical basis, reads only
    ReadOnly {
        /// Basis point of the pinned snapshot
        basis_t: u64,
    },
}

/// Where an element stands relative to the current transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementState {
    /// No pending operation
    Clean,
    /// Created in this transaction
    PendingCreate,
    /// Committed element with pending attribute changes
    PendingModify,
    /// Removed in this transaction
    Removed,
}

/// Counts of buffered operations, by kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PendingOperations {
    /// Pending creates
    pub creates: usize,
    /// Pending modifications
    pub modifies: usize,
    /// Pending deletes
    pub deletes: usize,
}

impl PendingOperations {
    /// Total number of pending operations
    pub fn total(&self) -> usize {
        self.creates + self.modifies + self.deletes
    }

    /// Check if there are no pending operations
    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

/// Result of a successful commit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommitOutcome {
    /// Basis point of the committed batch; `None` if there was nothing to commit
    pub basis_t: Option<u64>,
    /// Statements sent to the store
    pub statements: usize,
    /// Elements that received a permanent id
    pub resolved: usize,
}

/// Per-transaction mutation buffer
pub struct TransactionContext {
    txn_id: u64,
    status: TransactionStatus,
    /// Operations in first-touched order
    operations: BTreeMap<u64, PendingOperation>,
    /// Element → sequence number in `operations`
    positions: HashMap<Uuid, u64>,
    next_seq: u64,
    /// Elements created and removed again within this transaction
    cancelled: HashSet<Uuid>,
    /// Attribute declarations awaiting registration
    attributes: BTreeMap<Ident, AttributeDef>,
    base: Option<Arc<dyn Snapshot>>,
    speculative: Option<Arc<dyn Snapshot>>,
    next_temp: i64,
}

impl std::fmt::Debug for TransactionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionContext")
            .field("txn_id", &self.txn_id)
            .field("status", &self.status)
            .field("pending", &self.pending_operations())
            .field("base", &self.base.as_ref().map(|s| s.basis_t()))
            .finish()
    }
}

impl TransactionContext {
    /// Create an idle context
    pub fn new(txn_id: u64) -> Self {
        Self {
            txn_id,
            status: TransactionStatus::Idle,
            operations: BTreeMap::new(),
            positions: HashMap::new(),
            next_seq: 0,
            cancelled: HashSet::new(),
            attributes: BTreeMap::new(),
            base: None,
            speculative: None,
            next_temp: 0,
        }
    }

    /// Transaction id
    pub fn txn_id(&self) -> u64 {
        self.txn_id
    }

    /// Current status
    pub fn status(&self) -> TransactionStatus {
        self.status
    }

    /// Whether the context has been used since the last commit or rollback
    pub fn is_open(&self) -> bool {
        self.status != TransactionStatus::Idle
    }

    /// Whether the context is pinned to a historical basis
    pub fn is_read_only(&self) -> bool {
        matches!(self.status, TransactionStatus::ReadOnly { .. })
    }

    fn ensure_writable(&self) -> Result<()> {
        if self.is_read_only() {
            return Err(Error::ReadOnly);
        }
        Ok(())
    }

    fn invalidate(&mut self) {
        self.speculative = None;
    }

    /// Hand out a provisional id unique within this transaction
    pub fn allocate_temp_id(&mut self) -> TempId {
        self.next_temp -= 1;
        TempId(self.next_temp)
    }

    /// Remember an attribute the pending writes depend on
    pub fn observe_attribute(&mut self, def: AttributeDef) {
        self.attributes.entry(def.ident.clone()).or_insert(def);
    }

    // === Recording ===

    /// Buffer the creation of a new element
    ///
    /// `touched` lists the elements the new one depends on; removing any of
    /// them within this transaction cancels this creation too.
    ///
    /// # Errors
    ///
    /// Returns an invariant violation if the element already has a pending
    /// operation or carries no provisional id.
    pub fn record_create(
        &mut self,
        element: Arc<ElementIdentity>,
        fields: BTreeMap<Ident, FactValue>,
        touched: Vec<Uuid>,
    ) -> Result<()> {
        self.ensure_writable()?;
        let uuid = element.uuid();
        if self.positions.contains_key(&uuid) {
            return Err(Error::invariant(format!(
                "element {} already has a pending operation",
                uuid
            )));
        }
        let temp = element
            .provisional_id()
            .ok_or_else(|| Error::invariant(format!("element {} has no provisional id", uuid)))?;

        debug!(txn_id = self.txn_id, kind = %element.kind(), %uuid, "buffered create");
        let seq = self.next_seq;
        self.next_seq += 1;
        self.positions.insert(uuid, seq);
        self.operations.insert(
            seq,
            PendingOperation {
                element,
                statement: PendingStatement::Create { temp, fields },
                touched,
            },
        );
        self.status = self.active_status();
        self.invalidate();
        Ok(())
    }

    /// Buffer an attribute change
    ///
    /// Changes to an element created in this transaction are folded into its
    /// create statement. Changes to a committed element are merged into its
    /// pending modification, which keeps its original position.
    ///
    /// # Errors
    ///
    /// Returns `Error::ElementRemoved` for elements removed in this
    /// transaction and `Error::ElementNotFound` for elements that were never
    /// committed.
    pub fn record_modify(
        &mut self,
        element: &Arc<ElementIdentity>,
        modification: Modification,
    ) -> Result<()> {
        self.ensure_writable()?;
        let uuid = element.uuid();
        if self.cancelled.contains(&uuid) {
            return Err(Error::ElementRemoved {
                kind: element.kind(),
                id: uuid,
            });
        }

        if let Some(seq) = self.positions.get(&uuid).copied() {
            let op = self
                .operations
                .get_mut(&seq)
                .ok_or_else(|| Error::invariant(format!("dangling position for {}", uuid)))?;
            match &mut op.statement {
                PendingStatement::Create { fields, .. } => apply_to_fields(fields, modification),
                PendingStatement::Modify { changes, .. } => {
                    merge_change(changes, modification);
                    if changes.is_empty() {
                        self.operations.remove(&seq);
                        self.positions.remove(&uuid);
                    }
                }
                PendingStatement::Delete { .. } => {
                    return Err(Error::ElementRemoved {
                        kind: element.kind(),
                        id: uuid,
                    })
                }
            }
        } else {
            let entity = element
                .permanent_id()
                .ok_or(Error::ElementNotFound(uuid))?;
            let mut changes = BTreeMap::new();
            merge_change(&mut changes, modification);
            if !changes.is_empty() {
                let seq = self.next_seq;
                self.next_seq += 1;
                self.positions.insert(uuid, seq);
                self.operations.insert(
                    seq,
                    PendingOperation {
                        element: Arc::clone(element),
                        statement: PendingStatement::Modify { entity, changes },
                        touched: Vec::new(),
                    },
                );
            }
        }

        debug!(txn_id = self.txn_id, %uuid, "buffered modification");
        self.status = self.active_status();
        self.invalidate();
        Ok(())
    }

    /// Buffer the removal of an element
    ///
    /// Removing an element created in this transaction drops its creation and
    /// every pending operation that depends on it. Removing an element twice
    /// is a no-op.
    pub fn record_delete(&mut self, element: &Arc<ElementIdentity>) -> Result<()> {
        self.ensure_writable()?;
        let uuid = element.uuid();
        if self.is_removed(uuid) {
            return Ok(());
        }

        if self.is_pending_new(uuid) {
            self.cancel(uuid);
        } else {
            let entity = element
                .permanent_id()
                .ok_or(Error::ElementNotFound(uuid))?;
            let seq = match self.positions.get(&uuid) {
                Some(seq) => *seq,
                None => {
                    let seq = self.next_seq;
                    self.next_seq += 1;
                    self.positions.insert(uuid, seq);
                    seq
                }
            };
            self.operations.insert(
                seq,
                PendingOperation {
                    element: Arc::clone(element),
                    statement: PendingStatement::Delete { entity },
                    touched: Vec::new(),
                },
            );
        }

        debug!(txn_id = self.txn_id, kind = %element.kind(), %uuid, "buffered delete");
        self.status = self.active_status();
        self.invalidate();
        Ok(())
    }

    fn cancel(&mut self, uuid: Uuid) {
        let mut queue = vec![uuid];
        while let Some(gone) = queue.pop() {
            if !self.cancelled.insert(gone) {
                continue;
            }
            let dropped: Vec<u64> = self
                .operations
                .iter()
                .filter(|(_, op)| op.concerns(gone))
                .map(|(seq, _)| *seq)
                .collect();
            for seq in dropped {
                if let Some(op) = self.operations.remove(&seq) {
                    let other = op.element.uuid();
                    self.positions.remove(&other);
                    if other != gone && op.kind() == OpKind::Create {
                        queue.push(other);
                    }
                }
            }
        }
    }

    fn active_status(&self) -> TransactionStatus {
        match self.status {
            TransactionStatus::Idle => TransactionStatus::Active,
            other => other,
        }
    }

    // === Queries ===

    fn op_kind(&self, uuid: Uuid) -> Option<OpKind> {
        self.positions
            .get(&uuid)
            .and_then(|seq| self.operations.get(seq))
            .map(PendingOperation::kind)
    }

    /// Whether the element was created in this transaction
    pub fn is_pending_new(&self, uuid: Uuid) -> bool {
        self.op_kind(uuid) == Some(OpKind::Create)
    }

    /// Whether the committed element has pending attribute changes
    pub fn is_pending_modified(&self, uuid: Uuid) -> bool {
        self.op_kind(uuid) == Some(OpKind::Modify)
    }

    /// Whether the committed element is pending deletion
    pub fn is_pending_delete(&self, uuid: Uuid) -> bool {
        self.op_kind(uuid) == Some(OpKind::Delete)
    }

    /// Whether the element was removed in this transaction
    pub fn is_removed(&self, uuid: Uuid) -> bool {
        self.cancelled.contains(&uuid) || self.is_pending_delete(uuid)
    }

    /// Where the element stands in this transaction
    pub fn element_state(&self, uuid: Uuid) -> ElementState {
        if self.cancelled.contains(&uuid) {
            return ElementState::Removed;
        }
        match self.op_kind(uuid) {
            None => ElementState::Clean,
            Some(OpKind::Create) => ElementState::PendingCreate,
            Some(OpKind::Modify) => ElementState::PendingModify,
            Some(OpKind::Delete) => ElementState::Removed,
        }
    }

    /// Buffered attributes of an element created in this transaction
    pub fn pending_fields(&self, uuid: Uuid) -> Option<&BTreeMap<Ident, FactValue>> {
        let seq = self.positions.get(&uuid)?;
        match &self.operations.get(seq)?.statement {
            PendingStatement::Create { fields, .. } => Some(fields),
            _ => None,
        }
    }

    /// Shared identity of an element created in this transaction
    pub fn provisional_identity(&self, uuid: Uuid) -> Option<Arc<ElementIdentity>> {
        let seq = self.positions.get(&uuid)?;
        let op = self.operations.get(seq)?;
        (op.kind() == OpKind::Create).then(|| Arc::clone(&op.element))
    }

    /// Pending operations in first-touched order
    pub fn operations(&self) -> impl Iterator<Item = &PendingOperation> {
        self.operations.values()
    }

    /// Counts of pending operations
    pub fn pending_operations(&self) -> PendingOperations {
        let mut counts = PendingOperations::default();
        for op in self.operations.values() {
            match op.kind() {
                OpKind::Create => counts.creates += 1,
                OpKind::Modify => counts.modifies += 1,
                OpKind::Delete => counts.deletes += 1,
            }
        }
        counts
    }

    // === Snapshots ===

    /// The committed snapshot this transaction reads from
    ///
    /// Pinned on first use and kept until commit or rollback.
    pub fn base_snapshot(&mut self, store: &dyn FactStore) -> Arc<dyn Snapshot> {
        if let Some(base) = &self.base {
            return Arc::clone(base);
        }
        let base = store.db();
        debug!(txn_id = self.txn_id, basis_t = base.basis_t(), "pinned base snapshot");
        self.base = Some(Arc::clone(&base));
        self.status = self.active_status();
        base
    }

    /// Base snapshot with every pending statement applied speculatively
    ///
    /// Memoized until the next mutation. Registers pending attribute
    /// declarations first, since the speculative batch refers to them.
    pub fn current_snapshot(&mut self, store: &dyn FactStore) -> Result<Arc<dyn Snapshot>> {
        if let Some(snapshot) = &self.speculative {
            return Ok(Arc::clone(snapshot));
        }
        let base = self.base_snapshot(store);
        if self.operations.is_empty() {
            return Ok(base);
        }
        let statements = self.compile_statements(store)?;
        let snapshot = base.with(statements)?.db_after;
        self.speculative = Some(Arc::clone(&snapshot));
        Ok(snapshot)
    }

    /// Register pending attributes, then list the pending statements in order
    ///
    /// Declarations stay pending until the store has accepted them, so a
    /// failed registration is retried by the next read or commit. Each
    /// operation owns a distinct element and a modification holds one change
    /// per attribute, so no statement repeats.
    pub fn compile_statements(&mut self, store: &dyn FactStore) -> Result<Vec<Statement>> {
        if !self.attributes.is_empty() {
            SchemaRegistrar::ensure(store, self.attributes.values().cloned())?;
            self.attributes.clear();
        }
        Ok(self
            .operations
            .values()
            .flat_map(|op| op.statement.to_statements())
            .collect())
    }

    /// Pin the context to a historical basis; it becomes read-only
    ///
    /// # Errors
    ///
    /// Fails when operations are pending or the basis is beyond the log.
    pub fn pin_as_of(&mut self, store: &dyn FactStore, basis_t: u64) -> Result<()> {
        if !self.operations.is_empty() {
            return Err(Error::invariant(
                "cannot read history with pending operations",
            ));
        }
        let snapshot = store.as_of(basis_t)?;
        self.base = Some(snapshot);
        self.speculative = None;
        self.status = TransactionStatus::ReadOnly { basis_t };
        Ok(())
    }

    // === Completion ===

    /// Submit all pending statements as one batch
    ///
    /// On success every element created in this transaction receives its
    /// permanent id. The context returns to `Idle` whatever the outcome;
    /// nothing is retried.
    ///
    /// # Errors
    ///
    /// `Error::Conflict` when a CAS guard fails, `Error::Store` for any other
    /// store failure.
    pub fn commit(&mut self, store: &dyn FactStore) -> Result<CommitOutcome> {
        let result = self.submit(store);
        if let Err(err) = &result {
            warn!(txn_id = self.txn_id, error = %err, "commit failed");
        }
        self.clear();
        result
    }

    fn submit(&mut self, store: &dyn FactStore) -> Result<CommitOutcome> {
        if self.operations.is_empty() {
            return Ok(CommitOutcome {
                basis_t: None,
                statements: 0,
                resolved: 0,
            });
        }
        self.ensure_writable()?;
        let statements = self.compile_statements(store)?;
        let count = statements.len();
        let report = store.transact(statements)?;

        let mut resolved = 0;
        for op in self.operations.values() {
            if let PendingStatement::Create { temp, .. } = &op.statement {
                let id = report.resolve_tempid(*temp).ok_or_else(|| {
                    Error::invariant(format!("no permanent id for {}", op.element.uuid()))
                })?;
                if op.element.resolve(id) {
                    resolved += 1;
                }
            }
        }
        debug!(
            txn_id = self.txn_id,
            basis_t = report.basis_t,
            statements = count,
            resolved,
            "commit applied"
        );
        Ok(CommitOutcome {
            basis_t: Some(report.basis_t),
            statements: count,
            resolved,
        })
    }

    /// Discard all pending operations; calling it again is a no-op
    pub fn rollback(&mut self) {
        if !self.operations.is_empty() {
            debug!(
                txn_id = self.txn_id,
                discarded = self.operations.len(),
                "rolled back"
            );
        }
        self.clear();
    }

    fn clear(&mut self) {
        self.status = TransactionStatus::Idle;
        self.operations.clear();
        self.positions.clear();
        self.cancelled.clear();
        self.attributes.clear();
        self.base = None;
        self.speculative = None;
    }
}
