//! Transaction handle
//!
//! A `Transaction` owns one mutation buffer and is the only way to change the
//! graph. Proxies returned by it share the handle, so reads through any
//! proxy see the transaction's own writes.
//!
//! The handle is reusable: after `commit` or `rollback` it starts over with a
//! fresh base snapshot on next use. Dropping it with pending work rolls back.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use factgraph_concurrency::{
    property_attribute, CommitOutcome, PendingOperations, TransactionContext,
};
use factgraph_core::key::{self, validate_label, validate_property_key, ELEMENT_ID};
use factgraph_core::{
    ElementIdentity, ElementKind, Error, FactStore, FactValue, Ident, Result, Snapshot, Value,
};
use parking_lot::Mutex;
use tracing::warn;
use uuid::Uuid;

use crate::element::{Edge, Vertex};
use crate::graph::Graph;
use crate::helper;
use crate::traversal::Traversal;

/// Outcome of `Transaction::commit`
pub type CommitReport = CommitOutcome;

/// Key of a property passed at element creation
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PropertyKey {
    /// The element id; ids are always generated, so this is rejected
    Id,
    /// A user property
    Name(String),
}

impl From<&str> for PropertyKey {
    fn from(name: &str) -> Self {
        PropertyKey::Name(name.to_string())
    }
}

impl From<String> for PropertyKey {
    fn from(name: String) -> Self {
        PropertyKey::Name(name)
    }
}

/// State shared by a transaction handle and its proxies
pub(crate) struct TxShared {
    graph: Graph,
    ctx: Mutex<TransactionContext>,
}

impl TxShared {
    pub(crate) fn graph(&self) -> &Graph {
        &self.graph
    }

    /// Run `f` with exclusive access to the buffer
    pub(crate) fn with_ctx<R>(
        &self,
        f: impl FnOnce(&mut TransactionContext, &dyn FactStore) -> Result<R>,
    ) -> Result<R> {
        let mut ctx = self.ctx.lock();
        f(&mut ctx, self.graph.store().as_ref())
    }

    /// Inspect the buffer without touching the store
    pub(crate) fn peek<R>(&self, f: impl FnOnce(&TransactionContext) -> R) -> R {
        f(&self.ctx.lock())
    }

    /// Run `f` against the transaction's read view (own writes included)
    pub(crate) fn read<R>(
        &self,
        f: impl FnOnce(&TransactionContext, &dyn Snapshot) -> Result<R>,
    ) -> Result<R> {
        self.with_ctx(|ctx, store| {
            let db = ctx.current_snapshot(store)?;
            f(ctx, db.as_ref())
        })
    }

    /// Buffer a new element and return its identity
    ///
    /// `touched` are the elements the new one refers to. Each must be
    /// committed or created in this transaction; one left over from a rolled
    /// back or failed transaction is `Error::ElementNotFound`.
    pub(crate) fn create_element(
        &self,
        kind: ElementKind,
        label: &str,
        reserved: Vec<(Ident, FactValue)>,
        properties: Vec<(PropertyKey, Value)>,
        touched: &[Arc<ElementIdentity>],
    ) -> Result<Arc<ElementIdentity>> {
        validate_label(label)?;
        let mut named: BTreeMap<String, Value> = BTreeMap::new();
        for (key, value) in properties {
            match key {
                PropertyKey::Id => return Err(Error::UserSuppliedIds),
                PropertyKey::Name(name) => {
                    validate_property_key(&name)?;
                    named.insert(name, value);
                }
            }
        }

        self.with_ctx(|ctx, _| {
            if ctx.is_read_only() {
                return Err(Error::ReadOnly);
            }
            for other in touched {
                let uuid = other.uuid();
                if ctx.is_removed(uuid) {
                    return Err(Error::ElementRemoved {
                        kind: other.kind(),
                        id: uuid,
                    });
                }
                if other.permanent_id().is_none() && !ctx.is_pending_new(uuid) {
                    return Err(Error::ElementNotFound(uuid));
                }
            }

            let uuid = Uuid::new_v4();
            let temp = ctx.allocate_temp_id();
            let identity = Arc::new(ElementIdentity::provisional(
                uuid,
                kind,
                label.to_string(),
                temp,
            ));

            let mut fields: BTreeMap<Ident, FactValue> = BTreeMap::new();
            fields.insert(Ident::new(ELEMENT_ID), Value::Uuid(uuid).into());
            fields.insert(key::label_attribute(kind), Value::from(label).into());
            fields.extend(reserved);
            for (name, value) in named {
                let def = property_attribute(&name, value.value_type(), kind);
                fields.insert(def.ident.clone(), value.into());
                ctx.observe_attribute(def);
            }

            let touched = touched.iter().map(|other| other.uuid()).collect();
            ctx.record_create(Arc::clone(&identity), fields, touched)?;
            Ok(identity)
        })
    }
}

/// Explicit transaction over a graph
pub struct Transaction {
    shared: Arc<TxShared>,
}

impl fmt::Debug for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transaction")
            .field("context", &*self.shared.ctx.lock())
            .finish()
    }
}

fn collect_properties<I, K>(properties: I) -> Vec<(PropertyKey, Value)>
where
    I: IntoIterator<Item = (K, Value)>,
    K: Into<PropertyKey>,
{
    properties.into_iter().map(|(k, v)| (k.into(), v)).collect()
}

impl Transaction {
    pub(crate) fn new(graph: Graph) -> Self {
        let ctx = graph.manager().begin();
        Self {
            shared: Arc::new(TxShared {
                graph,
                ctx: Mutex::new(ctx),
            }),
        }
    }

    pub(crate) fn shared(&self) -> &Arc<TxShared> {
        &self.shared
    }

    /// Graph this transaction belongs to
    pub fn graph(&self) -> &Graph {
        self.shared.graph()
    }

    /// Transaction id
    pub fn txn_id(&self) -> u64 {
        self.shared.peek(TransactionContext::txn_id)
    }

    /// Add a vertex
    ///
    /// Without a label the configured default label is used.
    ///
    /// # Errors
    ///
    /// Validation errors for the label and property keys,
    /// `Error::UserSuppliedIds` for `PropertyKey::Id`.
    pub fn add_vertex<I, K>(&self, label: Option<&str>, properties: I) -> Result<Vertex>
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<PropertyKey>,
    {
        let label = label.unwrap_or(&self.graph().config().default_vertex_label);
        let identity = self.shared.create_element(
            ElementKind::Vertex,
            label,
            Vec::new(),
            collect_properties(properties),
            &[],
        )?;
        Ok(Vertex::bind(identity, Arc::clone(&self.shared)))
    }

    /// Add an edge from `out` to `in_vertex`
    ///
    /// # Errors
    ///
    /// Validation errors as for `add_vertex`; `Error::ElementRemoved` if an
    /// endpoint was removed in this transaction; `Error::ElementNotFound` if
    /// an endpoint never reached the store.
    pub fn add_edge<I, K>(
        &self,
        label: &str,
        out: &Vertex,
        in_vertex: &Vertex,
        properties: I,
    ) -> Result<Edge>
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<PropertyKey>,
    {
        out.add_edge(label, in_vertex, properties)
    }

    /// Vertices by external id; all vertices when `ids` is empty
    ///
    /// Unknown ids are skipped.
    pub fn vertices(&self, ids: &[Uuid]) -> Result<Vec<Vertex>> {
        Ok(self
            .elements(ElementKind::Vertex, ids)?
            .into_iter()
            .map(|identity| Vertex::bind(identity, Arc::clone(&self.shared)))
            .collect())
    }

    /// Edges by external id; all edges when `ids` is empty
    pub fn edges(&self, ids: &[Uuid]) -> Result<Vec<Edge>> {
        Ok(self
            .elements(ElementKind::Edge, ids)?
            .into_iter()
            .map(|identity| Edge::bind(identity, Arc::clone(&self.shared)))
            .collect())
    }

    /// One vertex by external id
    pub fn vertex(&self, id: Uuid) -> Result<Option<Vertex>> {
        Ok(self.vertices(&[id])?.into_iter().next())
    }

    /// One edge by external id
    pub fn edge(&self, id: Uuid) -> Result<Option<Edge>> {
        Ok(self.edges(&[id])?.into_iter().next())
    }

    pub(crate) fn elements(
        &self,
        kind: ElementKind,
        ids: &[Uuid],
    ) -> Result<Vec<Arc<ElementIdentity>>> {
        self.shared.read(|ctx, db| {
            let entities = if ids.is_empty() {
                helper::scan(db, kind)?
            } else {
                ids.iter()
                    .filter_map(|uuid| helper::id_from_uuid(db, *uuid))
                    .collect()
            };
            Ok(entities
                .into_iter()
                .filter_map(|id| db.entity(id))
                .filter_map(|entity| helper::identity_of(ctx, &entity))
                .filter(|identity| identity.kind() == kind)
                .collect())
        })
    }

    /// Start a traversal over this transaction's view
    pub fn traversal(&self) -> TraversalSource<'_> {
        TraversalSource { tx: self }
    }

    /// Commit all pending operations as one batch
    ///
    /// # Errors
    ///
    /// `Error::Conflict` if a CAS-guarded property changed since it was read,
    /// `Error::Store` for other store failures. Pending work is discarded
    /// either way.
    pub fn commit(&self) -> Result<CommitReport> {
        let graph = self.shared.graph();
        self.shared
            .with_ctx(|ctx, store| graph.manager().commit(ctx, store))
    }

    /// Discard all pending operations
    pub fn rollback(&self) {
        let mut ctx = self.shared.ctx.lock();
        self.shared.graph().manager().abort(&mut ctx);
    }

    /// Read the graph as of an earlier basis point
    ///
    /// The transaction turns read-only until `rollback` or `commit`.
    ///
    /// # Errors
    ///
    /// Fails with pending work or when `basis_t` is beyond the log.
    pub fn as_of(&self, basis_t: u64) -> Result<()> {
        self.shared
            .with_ctx(|ctx, store| ctx.pin_as_of(store, basis_t))
    }

    /// Whether the transaction has been used since its last commit or rollback
    pub fn is_open(&self) -> bool {
        self.shared.peek(TransactionContext::is_open)
    }

    /// Whether the transaction reads a historical snapshot
    pub fn is_read_only(&self) -> bool {
        self.shared.peek(TransactionContext::is_read_only)
    }

    /// Counts of pending operations
    pub fn pending(&self) -> PendingOperations {
        self.shared.peek(TransactionContext::pending_operations)
    }

    /// Basis point of the snapshot this transaction reads from
    pub fn basis_t(&self) -> u64 {
        self.shared
            .with_ctx(|ctx, store| Ok(ctx.base_snapshot(store).basis_t()))
            .unwrap_or_default()
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        let mut ctx = self.shared.ctx.lock();
        let pending = ctx.pending_operations();
        if !pending.is_empty() {
            warn!(
                txn_id = ctx.txn_id(),
                pending = pending.total(),
                "transaction dropped with pending operations, rolling back"
            );
            self.shared.graph().manager().abort(&mut ctx);
        } else {
            ctx.rollback();
        }
    }
}

/// Entry point for traversals bound to a transaction
#[derive(Debug, Clone, Copy)]
pub struct TraversalSource<'a> {
    tx: &'a Transaction,
}

impl<'a> TraversalSource<'a> {
    /// Traversal starting at vertices (all when `ids` is empty)
    pub fn v(&self, ids: &[Uuid]) -> BoundTraversal<'a> {
        BoundTraversal {
            tx: self.tx,
            traversal: Traversal::v(ids),
        }
    }

    /// Traversal starting at edges (all when `ids` is empty)
    pub fn e(&self, ids: &[Uuid]) -> BoundTraversal<'a> {
        BoundTraversal {
            tx: self.tx,
            traversal: Traversal::e(ids),
        }
    }
}

/// A traversal paired with the transaction it will run in
#[derive(Debug)]
pub struct BoundTraversal<'a> {
    tx: &'a Transaction,
    traversal: Traversal,
}

impl<'a> BoundTraversal<'a> {
    /// Extend the traversal
    pub fn then(self, f: impl FnOnce(Traversal) -> Traversal) -> Self {
        Self {
            tx: self.tx,
            traversal: f(self.traversal),
        }
    }

    /// The unbound traversal
    pub fn into_inner(self) -> Traversal {
        self.traversal
    }

    /// Run it
    pub fn to_list(self) -> Result<Vec<crate::element::Element>> {
        self.traversal.to_list(self.tx)
    }
}
