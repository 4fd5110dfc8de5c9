//! Snapshot queries shared by the transaction, the proxies and the traversal
//!
//! Everything here reads one snapshot; none of it writes. Scans go through
//! the store's query interface, point lookups through the unique and
//! reference indexes.

use std::sync::Arc;

use factgraph_concurrency::TransactionContext;
use factgraph_core::key::{self, EDGE_IN_VERTEX, EDGE_OUT_VERTEX, ELEMENT_ID};
use factgraph_core::query::{var, Binding, Query};
use factgraph_core::{
    Direction, ElementIdentity, ElementKind, Entity, EntityId, Error, FactValue, Ident, Result,
    Snapshot, Value,
};
use uuid::Uuid;

/// A decoded user property: name, typed attribute, value
pub(crate) type UserProperty = (String, Ident, Value);

/// Kind and label of an entity, if it is a graph element
pub(crate) fn kind_and_label(entity: &Entity) -> Option<(ElementKind, String)> {
    for kind in [ElementKind::Vertex, ElementKind::Edge] {
        if let Some(label) = entity
            .scalar(key::label_attribute(kind).as_str())
            .and_then(Value::as_str)
        {
            return Some((kind, label.to_string()));
        }
    }
    None
}

/// Identity of the element stored as `entity`
///
/// Elements created in the current transaction keep their provisional
/// identity, so writes through any proxy land in the same pending operation.
pub(crate) fn identity_of(
    ctx: &TransactionContext,
    entity: &Entity,
) -> Option<Arc<ElementIdentity>> {
    let uuid = entity.scalar(ELEMENT_ID).and_then(Value::as_uuid)?;
    if let Some(identity) = ctx.provisional_identity(uuid) {
        return Some(identity);
    }
    let (kind, label) = kind_and_label(entity)?;
    Some(Arc::new(ElementIdentity::committed(
        uuid, kind, label, entity.id,
    )))
}

/// Entity id for an external id
pub(crate) fn id_from_uuid(db: &dyn Snapshot, uuid: Uuid) -> Option<EntityId> {
    db.lookup(&Ident::new(ELEMENT_ID), &Value::Uuid(uuid))
}

/// Entity that the caller knows exists
///
/// # Errors
///
/// An invariant violation if the entity has no facts.
pub(crate) fn require_entity(db: &dyn Snapshot, id: EntityId) -> Result<Entity> {
    db.entity(id)
        .ok_or_else(|| Error::invariant(format!("entity {} expected in basis {}", id, db.basis_t())))
}

fn entity_ids(db: &dyn Snapshot, query: &Query, params: &[Binding]) -> Result<Vec<EntityId>> {
    let mut ids: Vec<EntityId> = db
        .q(query, params)?
        .iter()
        .filter_map(|row| row.first().and_then(Binding::as_entity))
        .collect();
    ids.sort();
    ids.dedup();
    Ok(ids)
}

/// All elements of one kind, in creation order
pub(crate) fn scan(db: &dyn Snapshot, kind: ElementKind) -> Result<Vec<EntityId>> {
    let query = Query::new().find(["?e"]).clause(
        var("?e"),
        key::label_attribute(kind).as_str(),
        var("?label"),
    );
    entity_ids(db, &query, &[])
}

/// Elements of one kind carrying `label`, in creation order
pub(crate) fn scan_by_label(db: &dyn Snapshot, kind: ElementKind, label: &str) -> Result<Vec<EntityId>> {
    let query = Query::new().find(["?e"]).input("?label").clause(
        var("?e"),
        key::label_attribute(kind).as_str(),
        var("?label"),
    );
    entity_ids(db, &query, &[Binding::from(Value::from(label))])
}

/// Edges attached to a vertex
///
/// `Out` yields edges leaving the vertex, `In` edges arriving at it, `Both`
/// the outgoing ones followed by the incoming ones.
pub(crate) fn incident_edges(
    db: &dyn Snapshot,
    vertex: EntityId,
    direction: Direction,
) -> Vec<EntityId> {
    let mut edges = Vec::new();
    if matches!(direction, Direction::Out | Direction::Both) {
        let mut out = db.referrers(vertex, &Ident::new(EDGE_OUT_VERTEX));
        out.sort();
        edges.extend(out);
    }
    if matches!(direction, Direction::In | Direction::Both) {
        let mut incoming = db.referrers(vertex, &Ident::new(EDGE_IN_VERTEX));
        incoming.sort();
        edges.extend(incoming);
    }
    edges
}

/// Endpoint of an edge: `Out` is the tail, `In` the head
///
/// # Errors
///
/// An invariant violation if the edge lacks the endpoint.
pub(crate) fn endpoint(edge: &Entity, direction: Direction) -> Result<EntityId> {
    let attr = match direction {
        Direction::Out => EDGE_OUT_VERTEX,
        Direction::In => EDGE_IN_VERTEX,
        Direction::Both => {
            return Err(Error::invariant("an edge endpoint is either out or in"));
        }
    };
    edge.reference(attr)
        .ok_or_else(|| Error::invariant(format!("edge {} has no {}", edge.id, attr)))
}

/// User properties of an element, decoded from its attributes
pub(crate) fn user_properties<'a, I>(attributes: I, kind: ElementKind) -> Vec<UserProperty>
where
    I: IntoIterator<Item = (&'a Ident, &'a FactValue)>,
{
    attributes
        .into_iter()
        .filter_map(|(ident, value)| {
            let (name, _, owner) = key::parse(ident)?;
            let value = value.as_scalar()?;
            (owner == kind).then(|| (name, ident.clone(), value.clone()))
        })
        .collect()
}
