//! Element proxies
//!
//! `Vertex` and `Edge` are thin views bound to a transaction. They hold the
//! element's shared identity and nothing else; every read and write asks the
//! transaction where the element stands (`ElementState`) and dispatches on it:
//!
//! | State           | Reads from                   | Writes                        |
//! |-----------------|------------------------------|-------------------------------|
//! | `Clean`         | transaction snapshot         | new pending modification      |
//! | `PendingCreate` | buffered create fields       | folded into the create        |
//! | `PendingModify` | speculative snapshot         | merged into the modification  |
//! | `Removed`       | nothing                      | `Error::ElementRemoved`       |

use std::collections::BTreeSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use factgraph_concurrency::{property_attribute, ElementState, Modification, TransactionContext};
use factgraph_core::key::{validate_property_key, EDGE_IN_VERTEX, EDGE_OUT_VERTEX};
use factgraph_core::{
    Direction, ElementIdentity, ElementKind, EntityId, Error, FactStore, FactValue, Ident,
    Result, Snapshot, Value,
};
use uuid::Uuid;

use crate::helper::{self, UserProperty};
use crate::transaction::{PropertyKey, TxShared};

/// Identity plus owning transaction; the part both proxy kinds share
#[derive(Clone)]
struct Proxy {
    identity: Arc<ElementIdentity>,
    tx: Arc<TxShared>,
}

impl Proxy {
    fn uuid(&self) -> Uuid {
        self.identity.uuid()
    }

    fn removed(&self) -> Error {
        Error::ElementRemoved {
            kind: self.identity.kind(),
            id: self.uuid(),
        }
    }

    fn state(&self) -> ElementState {
        self.tx.peek(|ctx| ctx.element_state(self.uuid()))
    }

    /// Entity id of this element in `db`
    fn locate(&self, db: &dyn Snapshot) -> Option<EntityId> {
        self.identity
            .permanent_id()
            .or_else(|| helper::id_from_uuid(db, self.uuid()))
    }

    fn current_properties(
        &self,
        ctx: &mut TransactionContext,
        store: &dyn FactStore,
    ) -> Result<Vec<UserProperty>> {
        let kind = self.identity.kind();
        match ctx.element_state(self.uuid()) {
            ElementState::Removed => Ok(Vec::new()),
            ElementState::PendingCreate => Ok(ctx
                .pending_fields(self.uuid())
                .map(|fields| helper::user_properties(fields, kind))
                .unwrap_or_default()),
            ElementState::Clean | ElementState::PendingModify => {
                let db = ctx.current_snapshot(store)?;
                Ok(self
                    .locate(db.as_ref())
                    .and_then(|id| db.entity(id))
                    .map(|entity| helper::user_properties(&entity.attributes, kind))
                    .unwrap_or_default())
            }
        }
    }

    fn properties(&self) -> Result<Vec<UserProperty>> {
        self.tx
            .with_ctx(|ctx, store| self.current_properties(ctx, store))
    }

    fn value(&self, key: &str) -> Result<Option<Value>> {
        Ok(self
            .properties()?
            .into_iter()
            .find(|(name, _, _)| name == key)
            .map(|(_, _, value)| value))
    }

    /// Committed value of `attr`, as the base snapshot has it
    fn committed(
        &self,
        ctx: &mut TransactionContext,
        store: &dyn FactStore,
        attr: &Ident,
    ) -> Option<FactValue> {
        let id = self.identity.permanent_id()?;
        ctx.base_snapshot(store)
            .entity(id)
            .and_then(|entity| entity.attributes.get(attr).cloned())
    }

    fn writable(&self, ctx: &TransactionContext) -> Result<ElementState> {
        if ctx.is_read_only() {
            return Err(Error::ReadOnly);
        }
        match ctx.element_state(self.uuid()) {
            ElementState::Removed => Err(self.removed()),
            state => Ok(state),
        }
    }

    fn set_property(&self, key: &str, value: Value) -> Result<()> {
        validate_property_key(key)?;
        let kind = self.identity.kind();
        let guarded = self.tx.graph().config().is_cas_guarded(key);

        self.tx.with_ctx(|ctx, store| {
            let state = self.writable(ctx)?;
            let def = property_attribute(key, value.value_type(), kind);

            // one value per name: drop the same name stored under another type
            let stale: Vec<Ident> = self
                .current_properties(ctx, store)?
                .into_iter()
                .filter(|(name, ident, _)| name == key && *ident != def.ident)
                .map(|(_, ident, _)| ident)
                .collect();
            for attr in stale {
                let committed = self.committed(ctx, store, &attr);
                ctx.record_modify(&self.identity, Modification::Retract { attr, committed })?;
            }

            let modification = if guarded && state != ElementState::PendingCreate {
                let expected = self
                    .committed(ctx, store, &def.ident)
                    .and_then(|v| v.as_scalar().cloned());
                Modification::Cas {
                    attr: def.ident.clone(),
                    expected,
                    new: value,
                }
            } else {
                Modification::Set {
                    attr: def.ident.clone(),
                    value: value.into(),
                }
            };
            ctx.observe_attribute(def);
            ctx.record_modify(&self.identity, modification)
        })
    }

    fn remove_property(&self, key: &str) -> Result<()> {
        validate_property_key(key)?;
        self.tx.with_ctx(|ctx, store| {
            self.writable(ctx)?;
            let present: Vec<Ident> = self
                .current_properties(ctx, store)?
                .into_iter()
                .filter(|(name, _, _)| name == key)
                .map(|(_, ident, _)| ident)
                .collect();
            for attr in present {
                let committed = self.committed(ctx, store, &attr);
                ctx.record_modify(&self.identity, Modification::Retract { attr, committed })?;
            }
            Ok(())
        })
    }

    fn keys(&self) -> Result<BTreeSet<String>> {
        Ok(self
            .properties()?
            .into_iter()
            .map(|(name, _, _)| name)
            .collect())
    }

    fn property(&self, key: &str, element: Element) -> Result<Property> {
        Ok(Property {
            key: key.to_string(),
            value: self.value(key)?,
            element,
        })
    }

    fn property_list(&self, keys: &[&str], element: Element) -> Result<Vec<Property>> {
        Ok(self
            .properties()?
            .into_iter()
            .filter(|(name, _, _)| keys.is_empty() || keys.contains(&name.as_str()))
            .map(|(key, _, value)| Property {
                key,
                value: Some(value),
                element: element.clone(),
            })
            .collect())
    }
}

/// A vertex seen through a transaction
#[derive(Clone)]
pub struct Vertex {
    proxy: Proxy,
}

/// An edge seen through a transaction
#[derive(Clone)]
pub struct Edge {
    proxy: Proxy,
}

impl Vertex {
    pub(crate) fn bind(identity: Arc<ElementIdentity>, tx: Arc<TxShared>) -> Self {
        Self {
            proxy: Proxy { identity, tx },
        }
    }

    /// External id
    pub fn id(&self) -> Uuid {
        self.proxy.uuid()
    }

    /// Label
    pub fn label(&self) -> &str {
        self.proxy.identity.label()
    }

    /// Store id, once the vertex is committed
    pub fn entity_id(&self) -> Option<EntityId> {
        self.proxy.identity.permanent_id()
    }

    /// Where the vertex stands in its transaction
    pub fn state(&self) -> ElementState {
        self.proxy.state()
    }

    /// A property; empty when the vertex has no value for `key`
    pub fn property(&self, key: &str) -> Result<Property> {
        self.proxy.property(key, Element::from(self.clone()))
    }

    /// Value of a property
    pub fn value(&self, key: &str) -> Result<Option<Value>> {
        self.proxy.value(key)
    }

    /// Present properties, restricted to `keys` unless empty
    pub fn properties(&self, keys: &[&str]) -> Result<Vec<Property>> {
        self.proxy.property_list(keys, Element::from(self.clone()))
    }

    /// Names of present properties
    pub fn keys(&self) -> Result<BTreeSet<String>> {
        self.proxy.keys()
    }

    /// Set a property, replacing any value of another type
    pub fn set_property(&self, key: &str, value: impl Into<Value>) -> Result<Property> {
        let value = value.into();
        self.proxy.set_property(key, value.clone())?;
        Ok(Property {
            key: key.to_string(),
            value: Some(value),
            element: Element::from(self.clone()),
        })
    }

    /// Remove a property; a no-op when absent
    pub fn remove_property(&self, key: &str) -> Result<()> {
        self.proxy.remove_property(key)
    }

    /// Add an edge from this vertex to `in_vertex`
    ///
    /// # Errors
    ///
    /// Validation errors for the label and keys; `Error::ElementRemoved` if
    /// either vertex was removed; `Error::ElementNotFound` if either was
    /// created by a transaction that rolled back; an invariant violation if
    /// the vertices belong to different transactions.
    pub fn add_edge<I, K>(&self, label: &str, in_vertex: &Vertex, properties: I) -> Result<Edge>
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<PropertyKey>,
    {
        if !Arc::ptr_eq(&self.proxy.tx, &in_vertex.proxy.tx) {
            return Err(Error::invariant(
                "edge endpoints belong to different transactions",
            ));
        }
        let endpoint = |v: &Vertex| {
            v.proxy
                .identity
                .entity_ref()
                .map(FactValue::Ref)
                .ok_or_else(|| Error::invariant(format!("vertex {} has no id", v.id())))
        };
        let reserved = vec![
            (Ident::new(EDGE_OUT_VERTEX), endpoint(self)?),
            (Ident::new(EDGE_IN_VERTEX), endpoint(in_vertex)?),
        ];
        let identity = self.proxy.tx.create_element(
            ElementKind::Edge,
            label,
            reserved,
            properties.into_iter().map(|(k, v)| (k.into(), v)).collect(),
            &[
                Arc::clone(&self.proxy.identity),
                Arc::clone(&in_vertex.proxy.identity),
            ],
        )?;
        Ok(Edge::bind(identity, Arc::clone(&self.proxy.tx)))
    }

    /// Incident edges, filtered by label unless `labels` is empty
    pub fn edges(&self, direction: Direction, labels: &[&str]) -> Result<Vec<Edge>> {
        let tx = &self.proxy.tx;
        tx.read(|ctx, db| {
            if ctx.is_removed(self.id()) {
                return Ok(Vec::new());
            }
            let Some(id) = self.proxy.locate(db) else {
                return Ok(Vec::new());
            };
            let mut edges = Vec::new();
            for edge in helper::incident_edges(db, id, direction) {
                let entity = helper::require_entity(db, edge)?;
                let Some(identity) = helper::identity_of(ctx, &entity) else {
                    continue;
                };
                if labels.is_empty() || labels.contains(&identity.label()) {
                    edges.push(Edge::bind(identity, Arc::clone(tx)));
                }
            }
            Ok(edges)
        })
    }

    /// Adjacent vertices across edges with the given labels
    pub fn vertices(&self, direction: Direction, labels: &[&str]) -> Result<Vec<Vertex>> {
        let tx = &self.proxy.tx;
        tx.read(|ctx, db| {
            if ctx.is_removed(self.id()) {
                return Ok(Vec::new());
            }
            let Some(id) = self.proxy.locate(db) else {
                return Ok(Vec::new());
            };
            let mut sides = Vec::new();
            if matches!(direction, Direction::Out | Direction::Both) {
                sides.push(Direction::Out);
            }
            if matches!(direction, Direction::In | Direction::Both) {
                sides.push(Direction::In);
            }

            let mut vertices = Vec::new();
            for side in sides {
                for edge in helper::incident_edges(db, id, side) {
                    let entity = helper::require_entity(db, edge)?;
                    let label = helper::kind_and_label(&entity).map(|(_, l)| l);
                    if !labels.is_empty()
                        && !label.as_deref().map_or(false, |l| labels.contains(&l))
                    {
                        continue;
                    }
                    let other = helper::endpoint(&entity, side.opposite())?;
                    let other = helper::require_entity(db, other)?;
                    if let Some(identity) = helper::identity_of(ctx, &other) {
                        vertices.push(Vertex::bind(identity, Arc::clone(tx)));
                    }
                }
            }
            Ok(vertices)
        })
    }

    /// Remove this vertex and its incident edges; a no-op when already removed
    pub fn remove(&self) -> Result<()> {
        let edges = self.edges(Direction::Both, &[])?;
        self.proxy.tx.with_ctx(|ctx, _| {
            if ctx.is_removed(self.id()) {
                return Ok(());
            }
            for edge in &edges {
                ctx.record_delete(&edge.proxy.identity)?;
            }
            ctx.record_delete(&self.proxy.identity)
        })
    }
}

impl Edge {
    pub(crate) fn bind(identity: Arc<ElementIdentity>, tx: Arc<TxShared>) -> Self {
        Self {
            proxy: Proxy { identity, tx },
        }
    }

    /// External id
    pub fn id(&self) -> Uuid {
        self.proxy.uuid()
    }

    /// Label
    pub fn label(&self) -> &str {
        self.proxy.identity.label()
    }

    /// Store id, once the edge is committed
    pub fn entity_id(&self) -> Option<EntityId> {
        self.proxy.identity.permanent_id()
    }

    /// Where the edge stands in its transaction
    pub fn state(&self) -> ElementState {
        self.proxy.state()
    }

    /// A property; empty when the edge has no value for `key`
    pub fn property(&self, key: &str) -> Result<Property> {
        self.proxy.property(key, Element::from(self.clone()))
    }

    /// Value of a property
    pub fn value(&self, key: &str) -> Result<Option<Value>> {
        self.proxy.value(key)
    }

    /// Present properties, restricted to `keys` unless empty
    pub fn properties(&self, keys: &[&str]) -> Result<Vec<Property>> {
        self.proxy.property_list(keys, Element::from(self.clone()))
    }

    /// Names of present properties
    pub fn keys(&self) -> Result<BTreeSet<String>> {
        self.proxy.keys()
    }

    /// Set a property, replacing any value of another type
    pub fn set_property(&self, key: &str, value: impl Into<Value>) -> Result<Property> {
        let value = value.into();
        self.proxy.set_property(key, value.clone())?;
        Ok(Property {
            key: key.to_string(),
            value: Some(value),
            element: Element::from(self.clone()),
        })
    }

    /// Remove a property; a no-op when absent
    pub fn remove_property(&self, key: &str) -> Result<()> {
        self.proxy.remove_property(key)
    }

    /// Endpoints: `Out` the tail, `In` the head, `Both` tail then head
    pub fn vertices(&self, direction: Direction) -> Result<Vec<Vertex>> {
        let tx = &self.proxy.tx;
        tx.read(|ctx, db| {
            if ctx.is_removed(self.id()) {
                return Err(self.proxy.removed());
            }
            let id = self
                .proxy
                .locate(db)
                .ok_or(Error::ElementNotFound(self.id()))?;
            let edge = helper::require_entity(db, id)?;
            let sides = match direction {
                Direction::Both => vec![Direction::Out, Direction::In],
                side => vec![side],
            };
            let mut vertices = Vec::new();
            for side in sides {
                let vertex = helper::require_entity(db, helper::endpoint(&edge, side)?)?;
                let identity = helper::identity_of(ctx, &vertex).ok_or_else(|| {
                    Error::invariant(format!("endpoint {} of edge {} is no vertex", vertex.id, id))
                })?;
                vertices.push(Vertex::bind(identity, Arc::clone(tx)));
            }
            Ok(vertices)
        })
    }

    /// Tail vertex
    pub fn out_vertex(&self) -> Result<Vertex> {
        self.endpoint(Direction::Out)
    }

    /// Head vertex
    pub fn in_vertex(&self) -> Result<Vertex> {
        self.endpoint(Direction::In)
    }

    fn endpoint(&self, direction: Direction) -> Result<Vertex> {
        self.vertices(direction)?
            .into_iter()
            .next()
            .ok_or(Error::ElementNotFound(self.id()))
    }

    /// Remove this edge; a no-op when already removed
    pub fn remove(&self) -> Result<()> {
        self.proxy
            .tx
            .with_ctx(|ctx, _| ctx.record_delete(&self.proxy.identity))
    }
}

macro_rules! identity_traits {
    ($ty:ident) => {
        impl PartialEq for $ty {
            fn eq(&self, other: &Self) -> bool {
                self.id() == other.id()
            }
        }

        impl Eq for $ty {}

        impl Hash for $ty {
            fn hash<H: Hasher>(&self, state: &mut H) {
                self.id().hash(state);
            }
        }

        impl fmt::Debug for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.debug_struct(stringify!($ty))
                    .field("id", &self.id())
                    .field("label", &self.label())
                    .field("entity_id", &self.entity_id())
                    .finish()
            }
        }
    };
}

identity_traits!(Vertex);
identity_traits!(Edge);

/// A property of a vertex or an edge
///
/// `value` is `None` when the element has no value for the key; an absent
/// property is not an error.
#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    key: String,
    value: Option<Value>,
    element: Element,
}

impl Property {
    /// Key
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Value, if present
    pub fn value(&self) -> Option<&Value> {
        self.value.as_ref()
    }

    /// Whether the property has a value
    pub fn is_present(&self) -> bool {
        self.value.is_some()
    }

    /// Owning element
    pub fn element(&self) -> &Element {
        &self.element
    }

    /// Remove this property from its element
    pub fn remove(&self) -> Result<()> {
        self.element.remove_property(&self.key)
    }
}

/// Either kind of element
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Element {
    /// A vertex
    Vertex(Vertex),
    /// An edge
    Edge(Edge),
}

impl Element {
    /// External id
    pub fn id(&self) -> Uuid {
        match self {
            Element::Vertex(v) => v.id(),
            Element::Edge(e) => e.id(),
        }
    }

    /// Label
    pub fn label(&self) -> &str {
        match self {
            Element::Vertex(v) => v.label(),
            Element::Edge(e) => e.label(),
        }
    }

    /// Vertex or edge
    pub fn kind(&self) -> ElementKind {
        match self {
            Element::Vertex(_) => ElementKind::Vertex,
            Element::Edge(_) => ElementKind::Edge,
        }
    }

    /// Value of a property
    pub fn value(&self, key: &str) -> Result<Option<Value>> {
        match self {
            Element::Vertex(v) => v.value(key),
            Element::Edge(e) => e.value(key),
        }
    }

    /// A property; empty when absent
    pub fn property(&self, key: &str) -> Result<Property> {
        match self {
            Element::Vertex(v) => v.property(key),
            Element::Edge(e) => e.property(key),
        }
    }

    /// Names of present properties
    pub fn keys(&self) -> Result<BTreeSet<String>> {
        match self {
            Element::Vertex(v) => v.keys(),
            Element::Edge(e) => e.keys(),
        }
    }

    /// Set a property
    pub fn set_property(&self, key: &str, value: impl Into<Value>) -> Result<Property> {
        match self {
            Element::Vertex(v) => v.set_property(key, value),
            Element::Edge(e) => e.set_property(key, value),
        }
    }

    /// Remove a property; a no-op when absent
    pub fn remove_property(&self, key: &str) -> Result<()> {
        match self {
            Element::Vertex(v) => v.remove_property(key),
            Element::Edge(e) => e.remove_property(key),
        }
    }

    /// Remove the element
    pub fn remove(&self) -> Result<()> {
        match self {
            Element::Vertex(v) => v.remove(),
            Element::Edge(e) => e.remove(),
        }
    }

    /// The vertex, if this is one
    pub fn as_vertex(&self) -> Option<&Vertex> {
        match self {
            Element::Vertex(v) => Some(v),
            Element::Edge(_) => None,
        }
    }

    /// The edge, if this is one
    pub fn as_edge(&self) -> Option<&Edge> {
        match self {
            Element::Edge(e) => Some(e),
            Element::Vertex(_) => None,
        }
    }
}

impl From<Vertex> for Element {
    fn from(v: Vertex) -> Self {
        Element::Vertex(v)
    }
}

impl From<Edge> for Element {
    fn from(e: Edge) -> Self {
        Element::Edge(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GraphConfig;
    use crate::graph::Graph;

    fn no_props() -> Vec<(&'static str, Value)> {
        Vec::new()
    }

    #[test]
    fn test_state_transitions() {
        let g = Graph::open_in_memory().unwrap();
        let tx = g.tx();
        let v = tx.add_vertex(Some("person"), no_props()).unwrap();
        assert_eq!(v.state(), ElementState::PendingCreate);
        tx.commit().unwrap();
        assert_eq!(v.state(), ElementState::Clean);
        assert!(v.entity_id().is_some());

        v.set_property("name", "marko").unwrap();
        assert_eq!(v.state(), ElementState::PendingModify);
        v.remove().unwrap();
        assert_eq!(v.state(), ElementState::Removed);
        assert!(matches!(
            v.set_property("name", "x"),
            Err(Error::ElementRemoved { .. })
        ));
        assert!(v.value("name").unwrap().is_none());
    }

    #[test]
    fn test_type_change_replaces_value() {
        let g = Graph::open_in_memory().unwrap();
        let tx = g.tx();
        let v = tx
            .add_vertex(Some("person"), [("age", Value::from(29i64))])
            .unwrap();
        tx.commit().unwrap();

        v.set_property("age", "twenty-nine").unwrap();
        assert_eq!(v.value("age").unwrap(), Some(Value::from("twenty-nine")));
        assert_eq!(v.properties(&[]).unwrap().len(), 1);
        tx.commit().unwrap();

        let fresh = g.tx();
        let v = fresh.vertex(v.id()).unwrap().unwrap();
        assert_eq!(v.value("age").unwrap(), Some(Value::from("twenty-nine")));
        assert_eq!(v.keys().unwrap().len(), 1);
    }

    #[test]
    fn test_type_change_on_pending_create() {
        let g = Graph::open_in_memory().unwrap();
        let tx = g.tx();
        let v = tx
            .add_vertex(Some("person"), [("age", Value::from(29i64))])
            .unwrap();
        v.set_property("age", 29.5f64).unwrap();
        assert_eq!(v.value("age").unwrap(), Some(Value::Double(29.5)));
        assert_eq!(tx.pending().total(), 1);
    }

    #[test]
    fn test_remove_absent_property_is_noop() {
        let g = Graph::open_in_memory().unwrap();
        let tx = g.tx();
        let v = tx.add_vertex(Some("person"), no_props()).unwrap();
        tx.commit().unwrap();
        v.remove_property("missing").unwrap();
        v.remove_property("missing").unwrap();
        assert!(tx.pending().is_empty());
        assert!(!v.property("missing").unwrap().is_present());
    }

    #[test]
    fn test_property_remove_through_property() {
        let g = Graph::open_in_memory().unwrap();
        let tx = g.tx();
        let v = tx
            .add_vertex(Some("person"), [("name", Value::from("marko"))])
            .unwrap();
        tx.commit().unwrap();
        let p = v.property("name").unwrap();
        assert_eq!(p.value(), Some(&Value::from("marko")));
        assert_eq!(p.element(), &Element::from(v.clone()));
        p.remove().unwrap();
        assert!(v.value("name").unwrap().is_none());
        tx.commit().unwrap();
        assert!(g.tx().vertex(v.id()).unwrap().unwrap().keys().unwrap().is_empty());
    }

    #[test]
    fn test_guarded_write_becomes_cas() {
        let g = Graph::open_in_memory().unwrap();
        let tx = g.tx();
        let v = tx
            .add_vertex(Some("doc"), [("_version", Value::from(1i64))])
            .unwrap();
        tx.commit().unwrap();

        v.set_property("_version", 2i64).unwrap();
        let statements = tx
            .shared()
            .with_ctx(|ctx, store| ctx.compile_statements(store))
            .unwrap();
        assert!(matches!(
            &statements[..],
            [factgraph_core::Statement::Cas { expected: Some(Value::Long(1)), .. }]
        ));
    }

    #[test]
    fn test_unguarded_key_is_plain_set() {
        let config = GraphConfig {
            cas_guarded_keys: Vec::new(),
            ..GraphConfig::default()
        };
        let g = Graph::open(config).unwrap();
        let tx = g.tx();
        let v = tx
            .add_vertex(Some("doc"), [("_version", Value::from(1i64))])
            .unwrap();
        tx.commit().unwrap();
        v.set_property("_version", 2i64).unwrap();
        let statements = tx
            .shared()
            .with_ctx(|ctx, store| ctx.compile_statements(store))
            .unwrap();
        assert!(matches!(&statements[..], [factgraph_core::Statement::Add { .. }]));
    }

    #[test]
    fn test_edge_endpoints_and_adjacency() {
        let g = Graph::open_in_memory().unwrap();
        let tx = g.tx();
        let marko = tx.add_vertex(Some("person"), no_props()).unwrap();
        let vadas = tx.add_vertex(Some("person"), no_props()).unwrap();
        let lop = tx.add_vertex(Some("software"), no_props()).unwrap();
        let knows = marko
            .add_edge("knows", &vadas, [("weight", Value::from(0.5f64))])
            .unwrap();
        marko.add_edge("created", &lop, no_props()).unwrap();

        assert_eq!(knows.out_vertex().unwrap(), marko);
        assert_eq!(knows.in_vertex().unwrap(), vadas);
        assert_eq!(knows.vertices(Direction::Both).unwrap(), vec![marko.clone(), vadas.clone()]);
        assert_eq!(knows.value("weight").unwrap(), Some(Value::Double(0.5)));

        assert_eq!(marko.edges(Direction::Out, &[]).unwrap().len(), 2);
        assert_eq!(marko.edges(Direction::Out, &["knows"]).unwrap(), vec![knows.clone()]);
        assert!(marko.edges(Direction::In, &[]).unwrap().is_empty());
        assert_eq!(vadas.vertices(Direction::In, &[]).unwrap(), vec![marko.clone()]);
        assert_eq!(
            marko.vertices(Direction::Both, &["created"]).unwrap(),
            vec![lop.clone()]
        );
    }

    #[test]
    fn test_remove_vertex_removes_edges() {
        let g = Graph::open_in_memory().unwrap();
        let tx = g.tx();
        let a = tx.add_vertex(Some("person"), no_props()).unwrap();
        let b = tx.add_vertex(Some("person"), no_props()).unwrap();
        let e = a.add_edge("knows", &b, no_props()).unwrap();
        tx.commit().unwrap();

        a.remove().unwrap();
        assert_eq!(e.state(), ElementState::Removed);
        assert!(b.edges(Direction::Both, &[]).unwrap().is_empty());
        tx.commit().unwrap();

        let fresh = g.tx();
        assert!(fresh.edges(&[]).unwrap().is_empty());
        assert_eq!(fresh.vertices(&[]).unwrap(), vec![b]);
    }

    #[test]
    fn test_edge_to_removed_vertex_rejected() {
        let g = Graph::open_in_memory().unwrap();
        let tx = g.tx();
        let a = tx.add_vertex(Some("person"), no_props()).unwrap();
        let b = tx.add_vertex(Some("person"), no_props()).unwrap();
        b.remove().unwrap();
        assert!(matches!(
            a.add_edge("knows", &b, no_props()),
            Err(Error::ElementRemoved { .. })
        ));
    }

    #[test]
    fn test_endpoints_from_different_transactions_rejected() {
        let g = Graph::open_in_memory().unwrap();
        let t1 = g.tx();
        let t2 = g.tx();
        let a = t1.add_vertex(Some("person"), no_props()).unwrap();
        let b = t2.add_vertex(Some("person"), no_props()).unwrap();
        assert!(matches!(
            a.add_edge("knows", &b, no_props()),
            Err(Error::Invariant(_))
        ));
    }
}
