//! Core traits for fact store and snapshot abstraction
//!
//! This module defines the FactStore and Snapshot traits that the graph layer
//! is written against. The store is an immutable, append-only log of facts;
//! a snapshot is a read-only view of it at one basis point.

use crate::error::Result;
use crate::query::{Binding, Query, Rows};
use crate::statement::{AttributeDef, Statement};
use crate::types::{EntityId, FactValue, Ident, TempId};
use crate::value::Value;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

/// All current facts about one entity
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    /// Entity id
    pub id: EntityId,
    /// Current attribute values (cardinality one)
    pub attributes: BTreeMap<Ident, FactValue>,
}

impl Entity {
    /// Value of an attribute
    pub fn get(&self, attr: &str) -> Option<&FactValue> {
        self.attributes.get(&Ident::new(attr))
    }

    /// Scalar value of an attribute
    pub fn scalar(&self, attr: &str) -> Option<&Value> {
        self.get(attr).and_then(FactValue::as_scalar)
    }

    /// Referenced entity of an attribute
    pub fn reference(&self, attr: &str) -> Option<EntityId> {
        self.get(attr).and_then(FactValue::as_entity)
    }
}

/// Outcome of applying a batch
#[derive(Clone)]
pub struct TxReport {
    /// Basis point of the resulting snapshot
    pub basis_t: u64,
    /// Snapshot after the batch
    pub db_after: Arc<dyn Snapshot>,
    /// Permanent ids assigned to provisional ids
    pub tempids: HashMap<TempId, EntityId>,
}

impl TxReport {
    /// Permanent id for a provisional id of this batch
    pub fn resolve_tempid(&self, temp: TempId) -> Option<EntityId> {
        self.tempids.get(&temp).copied()
    }
}

impl fmt::Debug for TxReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TxReport")
            .field("basis_t", &self.basis_t)
            .field("tempids", &self.tempids)
            .finish()
    }
}

/// Read-only, point-in-time view of the store
///
/// Thread safety: snapshots are immutable and shared freely between threads.
pub trait Snapshot: Send + Sync {
    /// Basis point this view was taken at
    fn basis_t(&self) -> u64;

    /// Current facts about an entity, `None` if it has none
    fn entity(&self, id: EntityId) -> Option<Entity>;

    /// Entity identified by a unique-identity attribute value
    fn lookup(&self, attr: &Ident, value: &Value) -> Option<EntityId>;

    /// Entities whose `attr` references `target`
    fn referrers(&self, target: EntityId, attr: &Ident) -> Vec<EntityId>;

    /// Installed attribute definition
    fn attribute(&self, ident: &Ident) -> Option<AttributeDef>;

    /// Evaluate a query, binding `params` to the query inputs in order
    ///
    /// # Errors
    ///
    /// Returns an error if the parameter count does not match the inputs or a
    /// projected variable is never bound.
    fn q(&self, query: &Query, params: &[Binding]) -> Result<Rows>;

    /// Apply a batch speculatively on top of this view
    ///
    /// The result is never committed and is invisible to other readers.
    ///
    /// # Errors
    ///
    /// Fails exactly when `transact` of the same batch on this basis would.
    fn with(&self, statements: Vec<Statement>) -> Result<TxReport>;
}

/// Fact store abstraction
///
/// Thread safety: All methods must be safe to call concurrently from
/// multiple threads (requires Send + Sync).
pub trait FactStore: Send + Sync {
    /// Latest committed snapshot
    fn db(&self) -> Arc<dyn Snapshot>;

    /// Latest committed basis point
    fn basis_t(&self) -> u64;

    /// Atomically commit a batch
    ///
    /// Blocks until the outcome is known.
    ///
    /// # Errors
    ///
    /// Returns `Error::Conflict` when a compare-and-swap guard fails and
    /// `Error::Store` when the batch is invalid or the store cannot be
    /// reached. Nothing is applied in either case.
    fn transact(&self, statements: Vec<Statement>) -> Result<TxReport>;

    /// Snapshot as of an earlier basis point
    ///
    /// # Errors
    ///
    /// Returns `StoreError::InvalidBasis` for points beyond the log.
    fn as_of(&self, basis_t: u64) -> Result<Arc<dyn Snapshot>>;
}
