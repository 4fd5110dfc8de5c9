//! Traversal steps

use std::collections::BTreeSet;
use std::fmt;

use factgraph_core::{Direction, ElementKind, Result, Value};
use uuid::Uuid;

use super::graph_step::FactGraphStep;
use super::predicate::P;
use crate::element::Element;

/// What a `HasContainer` looks at
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HasKey {
    /// The external id
    Id,
    /// The label
    Label,
    /// The property names; holds if any name satisfies the predicate
    Key,
    /// One named property
    Property(String),
}

impl fmt::Display for HasKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HasKey::Id => f.write_str("~id"),
            HasKey::Label => f.write_str("~label"),
            HasKey::Key => f.write_str("~key"),
            HasKey::Property(name) => f.write_str(name),
        }
    }
}

/// A key and the predicate it must satisfy
#[derive(Debug, Clone, PartialEq)]
pub struct HasContainer {
    /// Tested key
    pub key: HasKey,
    /// Predicate
    pub predicate: P,
}

impl HasContainer {
    /// Container over `key`
    pub fn new(key: HasKey, predicate: P) -> Self {
        Self { key, predicate }
    }

    /// Whether `element` passes; a missing property never does
    pub fn test(&self, element: &Element) -> Result<bool> {
        Ok(match &self.key {
            HasKey::Id => self.predicate.test(&Value::Uuid(element.id())),
            HasKey::Label => self.predicate.test(&Value::from(element.label())),
            HasKey::Key => element
                .keys()?
                .into_iter()
                .any(|name| self.predicate.test(&Value::from(name))),
            HasKey::Property(name) => element
                .value(name)?
                .map_or(false, |value| self.predicate.test(&value)),
        })
    }

    /// The single label this container pins, if any
    pub(crate) fn exact_label(&self) -> Option<&str> {
        match self.key {
            HasKey::Label => self.predicate.as_eq().and_then(Value::as_str),
            _ => None,
        }
    }
}

impl fmt::Display for HasContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.key, self.predicate)
    }
}

/// Start step as written by the user: `V(ids)` or `E(ids)`
#[derive(Debug, Clone, PartialEq)]
pub struct GraphStep {
    /// Vertices or edges
    pub kind: ElementKind,
    /// Requested ids; all elements when empty
    pub ids: Vec<Uuid>,
    /// Step labels (`as`)
    pub labels: BTreeSet<String>,
}

/// Filter on one or more containers
#[derive(Debug, Clone, PartialEq)]
pub struct HasStep {
    /// All must hold
    pub containers: Vec<HasContainer>,
    /// Step labels (`as`)
    pub labels: BTreeSet<String>,
}

/// Collects every incoming element before passing them on
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BarrierStep {
    /// Step labels (`as`)
    pub labels: BTreeSet<String>,
}

/// Moves from vertices to adjacent vertices or incident edges
#[derive(Debug, Clone, PartialEq)]
pub struct VertexStep {
    /// Direction to walk
    pub direction: Direction,
    /// Edge labels to follow; any when empty
    pub edge_labels: Vec<String>,
    /// `Vertex` for `out`/`in`/`both`, `Edge` for `outE`/`inE`/`bothE`
    pub returns: ElementKind,
    /// Step labels (`as`)
    pub labels: BTreeSet<String>,
}

/// Moves from edges to their endpoints
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeVertexStep {
    /// `Out` for the tail, `In` for the head
    pub direction: Direction,
    /// Step labels (`as`)
    pub labels: BTreeSet<String>,
}

/// One step of a traversal
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// Unoptimized start step
    Graph(GraphStep),
    /// Start step with fused filters
    FactGraph(FactGraphStep),
    /// Filter
    Has(HasStep),
    /// Barrier
    Barrier(BarrierStep),
    /// Adjacency
    Vertex(VertexStep),
    /// Edge endpoints
    EdgeVertex(EdgeVertexStep),
    /// Drop repeated elements
    Dedup(BTreeSet<String>),
    /// Pass through
    Identity(BTreeSet<String>),
}

impl Step {
    /// Step labels
    pub fn labels(&self) -> &BTreeSet<String> {
        match self {
            Step::Graph(s) => &s.labels,
            Step::FactGraph(s) => &s.labels,
            Step::Has(s) => &s.labels,
            Step::Barrier(s) => &s.labels,
            Step::Vertex(s) => &s.labels,
            Step::EdgeVertex(s) => &s.labels,
            Step::Dedup(labels) | Step::Identity(labels) => labels,
        }
    }

    /// Mutable step labels
    pub fn labels_mut(&mut self) -> &mut BTreeSet<String> {
        match self {
            Step::Graph(s) => &mut s.labels,
            Step::FactGraph(s) => &mut s.labels,
            Step::Has(s) => &mut s.labels,
            Step::Barrier(s) => &mut s.labels,
            Step::Vertex(s) => &mut s.labels,
            Step::EdgeVertex(s) => &mut s.labels,
            Step::Dedup(labels) | Step::Identity(labels) => labels,
        }
    }

    /// Short name, as shown in plans
    pub fn name(&self) -> &'static str {
        match self {
            Step::Graph(_) => "GraphStep",
            Step::FactGraph(_) => "FactGraphStep",
            Step::Has(_) => "HasStep",
            Step::Barrier(_) => "BarrierStep",
            Step::Vertex(_) => "VertexStep",
            Step::EdgeVertex(_) => "EdgeVertexStep",
            Step::Dedup(_) => "DedupStep",
            Step::Identity(_) => "IdentityStep",
        }
    }

    /// Whether this step starts a traversal
    pub fn is_start(&self) -> bool {
        matches!(self, Step::Graph(_) | Step::FactGraph(_))
    }
}
