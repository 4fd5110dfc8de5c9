//! Identifier types
//!
//! - EntityId / TempId / EntityRef: permanent and provisional store ids
//! - Ident: attribute identifier
//! - ElementKind / Direction: graph element discriminants
//! - ElementIdentity: the shared identity behind every element proxy
//! - FactValue: a value position in a fact (scalar or reference)

use crate::value::Value;
use once_cell::sync::OnceCell;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Permanent, store-assigned entity id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(pub u64);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Provisional id, unique within one batch of statements
///
/// Always negative so it cannot be mistaken for a permanent id in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TempId(pub i64);

impl fmt::Display for TempId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#tmp{}", self.0)
    }
}

/// Either kind of entity id, as used in statements
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityRef {
    /// Committed entity
    Id(EntityId),
    /// Entity created by the same batch
    Temp(TempId),
}

impl From<EntityId> for EntityRef {
    fn from(id: EntityId) -> Self {
        EntityRef::Id(id)
    }
}

impl From<TempId> for EntityRef {
    fn from(id: TempId) -> Self {
        EntityRef::Temp(id)
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityRef::Id(id) => id.fmt(f),
            EntityRef::Temp(t) => t.fmt(f),
        }
    }
}

/// Attribute identifier, e.g. `:graph.element/id` or `:name.string.vertex`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Ident(Arc<str>);

impl Ident {
    /// Create an ident from its textual form
    pub fn new(s: impl AsRef<str>) -> Self {
        Ident(Arc::from(s.as_ref()))
    }

    /// Textual form
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Ident {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Ident {
    fn from(s: &str) -> Self {
        Ident::new(s)
    }
}

/// Vertex or edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ElementKind {
    /// Graph vertex
    Vertex,
    /// Graph edge
    Edge,
}

impl ElementKind {
    /// Lowercase name, also the last segment of encoded attribute idents
    pub fn as_str(&self) -> &'static str {
        match self {
            ElementKind::Vertex => "vertex",
            ElementKind::Edge => "edge",
        }
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Edge direction relative to a vertex
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Edges whose out-vertex is the vertex
    Out,
    /// Edges whose in-vertex is the vertex
    In,
    /// Both
    Both,
}

impl Direction {
    /// The reverse direction (`Both` stays `Both`)
    pub fn opposite(&self) -> Direction {
        match self {
            Direction::Out => Direction::In,
            Direction::In => Direction::Out,
            Direction::Both => Direction::Both,
        }
    }
}

/// Value position of a fact
#[derive(Debug, Clone, PartialEq)]
pub enum FactValue {
    /// Plain value
    Scalar(Value),
    /// Reference to another entity
    Ref(EntityRef),
}

impl FactValue {
    /// The scalar, if this is one
    pub fn as_scalar(&self) -> Option<&Value> {
        match self {
            FactValue::Scalar(v) => Some(v),
            FactValue::Ref(_) => None,
        }
    }

    /// The referenced permanent id, if this is a resolved reference
    pub fn as_entity(&self) -> Option<EntityId> {
        match self {
            FactValue::Ref(EntityRef::Id(id)) => Some(*id),
            _ => None,
        }
    }
}

impl From<Value> for FactValue {
    fn from(v: Value) -> Self {
        FactValue::Scalar(v)
    }
}

impl From<EntityId> for FactValue {
    fn from(id: EntityId) -> Self {
        FactValue::Ref(EntityRef::Id(id))
    }
}

impl From<EntityRef> for FactValue {
    fn from(r: EntityRef) -> Self {
        FactValue::Ref(r)
    }
}

impl fmt::Display for FactValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FactValue::Scalar(v) => v.fmt(f),
            FactValue::Ref(r) => write!(f, "ref {}", r),
        }
    }
}

/// Identity shared by all proxies of one graph element
///
/// The external id never changes. The internal id starts provisional for
/// elements created in a transaction and becomes permanent exactly once,
/// when that transaction commits.
#[derive(Debug)]
pub struct ElementIdentity {
    uuid: Uuid,
    kind: ElementKind,
    label: String,
    provisional: Option<TempId>,
    permanent: OnceCell<EntityId>,
}

impl ElementIdentity {
    /// Identity of an element created in the current transaction
    pub fn provisional(uuid: Uuid, kind: ElementKind, label: String, temp: TempId) -> Self {
        Self {
            uuid,
            kind,
            label,
            provisional: Some(temp),
            permanent: OnceCell::new(),
        }
    }

    /// Identity of an element read back from a committed snapshot
    pub fn committed(uuid: Uuid, kind: ElementKind, label: String, id: EntityId) -> Self {
        Self {
            uuid,
            kind,
            label,
            provisional: None,
            permanent: OnceCell::with_value(id),
        }
    }

    /// External id
    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    /// Vertex or edge
    pub fn kind(&self) -> ElementKind {
        self.kind
    }

    /// Label
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Permanent id, once known
    pub fn permanent_id(&self) -> Option<EntityId> {
        self.permanent.get().copied()
    }

    /// Provisional id assigned at creation, if any
    pub fn provisional_id(&self) -> Option<TempId> {
        self.provisional
    }

    /// The id to use in statements: permanent if known, else provisional
    pub fn entity_ref(&self) -> Option<EntityRef> {
        self.permanent_id()
            .map(EntityRef::Id)
            .or(self.provisional.map(EntityRef::Temp))
    }

    /// Record the permanent id
    ///
    /// Returns `false` if a permanent id was already set; the first one wins.
    pub fn resolve(&self, id: EntityId) -> bool {
        self.permanent.set(id).is_ok()
    }
}

impl PartialEq for ElementIdentity {
    fn eq(&self, other: &Self) -> bool {
        self.uuid == other.uuid
    }
}

impl Eq for ElementIdentity {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provisional_identity_resolves_once() {
        let identity = ElementIdentity::provisional(
            Uuid::new_v4(),
            ElementKind::Vertex,
            "person".into(),
            TempId(-1),
        );
        assert_eq!(identity.permanent_id(), None);
        assert_eq!(identity.entity_ref(), Some(EntityRef::Temp(TempId(-1))));

        assert!(identity.resolve(EntityId(10)));
        assert!(!identity.resolve(EntityId(11)));
        assert_eq!(identity.permanent_id(), Some(EntityId(10)));
        assert_eq!(identity.entity_ref(), Some(EntityRef::Id(EntityId(10))));
    }

    #[test]
    fn test_committed_identity() {
        let id = Uuid::new_v4();
        let identity =
            ElementIdentity::committed(id, ElementKind::Edge, "knows".into(), EntityId(7));
        assert_eq!(identity.uuid(), id);
        assert_eq!(identity.kind(), ElementKind::Edge);
        assert_eq!(identity.label(), "knows");
        assert_eq!(identity.provisional_id(), None);
        assert!(!identity.resolve(EntityId(8)));
    }

    #[test]
    fn test_identity_equality_by_uuid() {
        let id = Uuid::new_v4();
        let a = ElementIdentity::committed(id, ElementKind::Vertex, "a".into(), EntityId(1));
        let b = ElementIdentity::provisional(id, ElementKind::Vertex, "b".into(), TempId(-3));
        assert_eq!(a, b);
    }

    #[test]
    fn test_direction_opposite() {
        assert_eq!(Direction::Out.opposite(), Direction::In);
        assert_eq!(Direction::In.opposite(), Direction::Out);
        assert_eq!(Direction::Both.opposite(), Direction::Both);
    }

    #[test]
    fn test_ident_display() {
        assert_eq!(Ident::new(":graph.element/id").to_string(), ":graph.element/id");
    }
}
