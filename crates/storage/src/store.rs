//! MemoryFactStore: in-memory, append-only, time-versioned fact store
//!
//! This module implements the FactStore trait using:
//! - an append-only log of transactions, each a list of datoms
//! - a materialized `FactIndex` for the latest basis, swapped atomically
//! - `parking_lot` locks and an `AtomicU64` basis counter
//!
//! # Design Notes
//!
//! - **Single writer**: commits are serialized by a commit lock; CAS guards
//!   are evaluated under it against the latest committed state
//! - **Copy on commit**: a commit applies its batch to a clone of the latest
//!   index; readers holding older snapshots are never disturbed
//! - **History**: `as_of` replays the log up to the requested basis

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, warn};

use factgraph_core::{FactStore, Result, Snapshot, Statement, StoreError, TxReport};

use crate::batch::{self, Datom};
use crate::index::FactIndex;
use crate::schema::SchemaRegistry;
use crate::snapshot::MemorySnapshot;

/// One committed transaction
#[derive(Debug, Clone)]
pub struct TxRecord {
    /// Basis point assigned to the transaction
    pub t: u64,
    /// Facts added and removed
    pub datoms: Vec<Datom>,
    next_entity: u64,
}

/// In-memory fact store
///
/// Thread-safe: share it behind an `Arc` and call from any thread.
#[derive(Debug)]
pub struct MemoryFactStore {
    name: String,
    log: RwLock<Vec<TxRecord>>,
    latest: RwLock<Arc<MemorySnapshot>>,
    schema: SchemaRegistry,
    basis: AtomicU64,
    commit_lock: Mutex<()>,
    available: AtomicBool,
}

impl MemoryFactStore {
    /// Create an empty store
    pub fn new(name: impl Into<String>) -> Self {
        let schema = SchemaRegistry::new();
        Self {
            name: name.into(),
            log: RwLock::new(Vec::new()),
            latest: RwLock::new(Arc::new(MemorySnapshot::new(
                0,
                Arc::new(FactIndex::new()),
                schema.clone(),
            ))),
            schema,
            basis: AtomicU64::new(0),
            commit_lock: Mutex::new(()),
            available: AtomicBool::new(true),
        }
    }

    /// Store name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Attribute registry
    pub fn schema(&self) -> &SchemaRegistry {
        &self.schema
    }

    /// Toggle reachability
    ///
    /// While unavailable every `transact` fails with
    /// `StoreError::Unavailable` and applies nothing. Reads keep working from
    /// the last known snapshot.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Copy of the transaction log
    pub fn log(&self) -> Vec<TxRecord> {
        self.log.read().clone()
    }

    /// Latest snapshot with its concrete type
    pub fn latest(&self) -> Arc<MemorySnapshot> {
        Arc::clone(&self.latest.read())
    }
}

impl Default for MemoryFactStore {
    fn default() -> Self {
        Self::new("mem")
    }
}

impl FactStore for MemoryFactStore {
    fn db(&self) -> Arc<dyn Snapshot> {
        self.latest()
    }

    fn basis_t(&self) -> u64 {
        self.basis.load(Ordering::SeqCst)
    }

    fn transact(&self, statements: Vec<Statement>) -> Result<TxReport> {
        if !self.available.load(Ordering::SeqCst) {
            warn!(store = %self.name, "transact rejected, store unavailable");
            return Err(StoreError::Unavailable(format!("store {} is offline", self.name)).into());
        }

        let _guard = self.commit_lock.lock();
        let base = self.latest();
        let mut index = FactIndex::clone(base.index());
        let applied = batch::apply(&mut index, &self.schema, statements)?;

        let t = base.basis_t() + 1;
        self.schema.install(&applied.installs);
        let snapshot = Arc::new(MemorySnapshot::new(t, Arc::new(index), self.schema.clone()));
        let next_entity = snapshot.index().next_entity();

        debug!(
            store = %self.name,
            t,
            datoms = applied.datoms.len(),
            installs = applied.installs.len(),
            "transaction committed"
        );

        self.log.write().push(TxRecord {
            t,
            datoms: applied.datoms,
            next_entity,
        });
        *self.latest.write() = Arc::clone(&snapshot);
        self.basis.store(t, Ordering::SeqCst);

        Ok(TxReport {
            basis_t: t,
            db_after: snapshot,
            tempids: applied.tempids,
        })
    }

    fn as_of(&self, basis_t: u64) -> Result<Arc<dyn Snapshot>> {
        let latest = self.basis_t();
        if basis_t > latest {
            return Err(StoreError::InvalidBasis {
                requested: basis_t,
                latest,
            }
            .into());
        }
        if basis_t == latest {
            return Ok(self.db());
        }

        let mut index = FactIndex::new();
        for record in self.log.read().iter().take_while(|r| r.t <= basis_t) {
            for datom in &record.datoms {
                let def = self
                    .schema
                    .get(&datom.a)
                    .ok_or_else(|| StoreError::UnknownAttribute(datom.a.clone()))?;
                if datom.added {
                    index.assert(datom.e, &def, datom.v.clone());
                } else {
                    index.retract(datom.e, &def, &datom.v);
                }
            }
            index.reserve(factgraph_core::EntityId(record.next_entity.saturating_sub(1)));
        }
        Ok(Arc::new(MemorySnapshot::new(
            basis_t,
            Arc::new(index),
            self.schema.clone(),
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use factgraph_core::{
        AttributeDef, Error, EntityRef, FactValue, Ident, TempId, Value, ValueType,
    };

    fn store() -> MemoryFactStore {
        let store = MemoryFactStore::new("test");
        store
            .transact(vec![Statement::InstallAttribute(AttributeDef::scalar(
                Ident::new(":name.string.vertex"),
                ValueType::String,
            ))])
            .unwrap();
        store
    }

    fn add_name(temp: i64, name: &str) -> Statement {
        Statement::Add {
            e: EntityRef::Temp(TempId(temp)),
            a: Ident::new(":name.string.vertex"),
            v: FactValue::Scalar(Value::from(name)),
        }
    }

    #[test]
    fn test_basis_increases_per_commit() {
        let store = store();
        assert_eq!(store.basis_t(), 1);
        let report = store.transact(vec![add_name(-1, "a")]).unwrap();
        assert_eq!(report.basis_t, 2);
        assert_eq!(store.basis_t(), 2);
        assert_eq!(store.log().len(), 2);
    }

    #[test]
    fn test_failed_batch_leaves_no_trace() {
        let store = store();
        let before = store.basis_t();
        let err = store
            .transact(vec![
                add_name(-1, "a"),
                Statement::Add {
                    e: EntityRef::Temp(TempId(-2)),
                    a: Ident::new(":unknown.long.vertex"),
                    v: FactValue::Scalar(Value::Long(1)),
                },
            ])
            .unwrap_err();
        assert!(matches!(err, Error::Store(StoreError::UnknownAttribute(_))));
        assert_eq!(store.basis_t(), before);
        assert_eq!(store.latest().entity_count(), 0);
    }

    #[test]
    fn test_unavailable_store() {
        let store = store();
        store.set_available(false);
        let err = store.transact(vec![add_name(-1, "a")]).unwrap_err();
        assert!(matches!(err, Error::Store(StoreError::Unavailable(_))));
        assert!(err.is_transaction_failure());
        store.set_available(true);
        assert!(store.transact(vec![add_name(-1, "a")]).is_ok());
    }

    #[test]
    fn test_as_of_sees_past() {
        let store = store();
        let first = store.transact(vec![add_name(-1, "a")]).unwrap();
        let e = first.resolve_tempid(TempId(-1)).unwrap();
        store
            .transact(vec![Statement::Add {
                e: e.into(),
                a: Ident::new(":name.string.vertex"),
                v: FactValue::Scalar(Value::from("b")),
            }])
            .unwrap();

        let past = store.as_of(first.basis_t).unwrap();
        assert_eq!(
            past.entity(e).unwrap().scalar(":name.string.vertex"),
            Some(&Value::from("a"))
        );
        let now = store.db();
        assert_eq!(
            now.entity(e).unwrap().scalar(":name.string.vertex"),
            Some(&Value::from("b"))
        );
        assert!(store.as_of(0).unwrap().entity(e).is_none());
    }

    #[test]
    fn test_as_of_beyond_log() {
        let store = store();
        assert!(matches!(
            store.as_of(100),
            Err(Error::Store(StoreError::InvalidBasis { .. }))
        ));
    }

    #[test]
    fn test_retracted_entity_id_not_reused() {
        let store = store();
        let report = store.transact(vec![add_name(-1, "a")]).unwrap();
        let e = report.resolve_tempid(TempId(-1)).unwrap();
        store.transact(vec![Statement::RetractEntity(e)]).unwrap();
        let again = store.transact(vec![add_name(-1, "b")]).unwrap();
        assert_ne!(again.resolve_tempid(TempId(-1)), Some(e));
    }
}
