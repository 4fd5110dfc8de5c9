//! Triple-pattern queries
//!
//! A query is a conjunction of `[e a v]` clauses over one snapshot. Positions
//! hold constants or `?variables`; variables shared between clauses join.
//! Inputs bind variables from parameters before the clauses run.
//!
//! ```
//! use factgraph_core::query::{var, Query};
//! use factgraph_core::key::{ELEMENT_ID, VERTEX_LABEL};
//!
//! let q = Query::new()
//!     .find(["?v", "?id"])
//!     .input("?label")
//!     .clause(var("?v"), ELEMENT_ID, var("?id"))
//!     .clause(var("?v"), VERTEX_LABEL, var("?label"));
//! assert_eq!(q.clauses.len(), 2);
//! ```

use crate::types::{EntityId, FactValue, Ident};
use crate::value::Value;
use std::fmt;

/// Entity or value position of a clause
#[derive(Debug, Clone, PartialEq)]
pub enum Term {
    /// Variable
    Var(String),
    /// Constant
    Const(FactValue),
}

/// Attribute position of a clause
#[derive(Debug, Clone, PartialEq)]
pub enum AttrTerm {
    /// Variable, binds to an ident
    Var(String),
    /// Constant attribute
    Const(Ident),
}

/// Variable term
pub fn var(name: &str) -> Term {
    Term::Var(name.to_string())
}

impl From<Value> for Term {
    fn from(v: Value) -> Self {
        Term::Const(FactValue::Scalar(v))
    }
}

impl From<EntityId> for Term {
    fn from(id: EntityId) -> Self {
        Term::Const(FactValue::from(id))
    }
}

impl From<&str> for AttrTerm {
    fn from(s: &str) -> Self {
        if s.starts_with('?') {
            AttrTerm::Var(s.to_string())
        } else {
            AttrTerm::Const(Ident::new(s))
        }
    }
}

impl From<Ident> for AttrTerm {
    fn from(ident: Ident) -> Self {
        AttrTerm::Const(ident)
    }
}

/// One `[e a v]` pattern
#[derive(Debug, Clone, PartialEq)]
pub struct Clause {
    /// Entity position
    pub e: Term,
    /// Attribute position
    pub a: AttrTerm,
    /// Value position
    pub v: Term,
}

/// What a variable is bound to
#[derive(Debug, Clone, PartialEq)]
pub enum Binding {
    /// Entity or value
    Value(FactValue),
    /// Attribute
    Attr(Ident),
}

impl Binding {
    /// Bound entity id (a resolved reference)
    pub fn as_entity(&self) -> Option<EntityId> {
        match self {
            Binding::Value(v) => v.as_entity(),
            Binding::Attr(_) => None,
        }
    }

    /// Bound scalar
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Binding::Value(v) => v.as_scalar(),
            Binding::Attr(_) => None,
        }
    }

    /// Bound attribute
    pub fn as_attr(&self) -> Option<&Ident> {
        match self {
            Binding::Attr(a) => Some(a),
            Binding::Value(_) => None,
        }
    }
}

impl From<Value> for Binding {
    fn from(v: Value) -> Self {
        Binding::Value(FactValue::Scalar(v))
    }
}

impl From<EntityId> for Binding {
    fn from(id: EntityId) -> Self {
        Binding::Value(FactValue::from(id))
    }
}

impl From<Ident> for Binding {
    fn from(ident: Ident) -> Self {
        Binding::Attr(ident)
    }
}

impl fmt::Display for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Binding::Value(v) => v.fmt(f),
            Binding::Attr(a) => a.fmt(f),
        }
    }
}

/// Result rows, one binding per `find` variable
pub type Rows = Vec<Vec<Binding>>;

/// A conjunctive query
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    /// Projected variables
    pub find: Vec<String>,
    /// Variables bound from parameters, in order
    pub inputs: Vec<String>,
    /// Patterns, evaluated left to right
    pub clauses: Vec<Clause>,
}

impl Query {
    /// Empty query
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the projected variables
    pub fn find<I, S>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.find = vars.into_iter().map(Into::into).collect();
        self
    }

    /// Add an input variable
    pub fn input(mut self, name: &str) -> Self {
        self.inputs.push(name.to_string());
        self
    }

    /// Add a clause
    pub fn clause(mut self, e: Term, a: impl Into<AttrTerm>, v: impl Into<Term>) -> Self {
        self.clauses.push(Clause {
            e,
            a: a.into(),
            v: v.into(),
        });
        self
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[:find {}", self.find.join(" "))?;
        if !self.inputs.is_empty() {
            write!(f, " :in $ {}", self.inputs.join(" "))?;
        }
        f.write_str(" :where")?;
        for c in &self.clauses {
            let term = |t: &Term| match t {
                Term::Var(v) => v.clone(),
                Term::Const(c) => c.to_string(),
            };
            let attr = match &c.a {
                AttrTerm::Var(v) => v.clone(),
                AttrTerm::Const(a) => a.to_string(),
            };
            write!(f, " [{} {} {}]", term(&c.e), attr, term(&c.v))?;
        }
        f.write_str("]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attr_term_from_str() {
        assert_eq!(AttrTerm::from("?a"), AttrTerm::Var("?a".to_string()));
        assert_eq!(
            AttrTerm::from(":graph.element/id"),
            AttrTerm::Const(Ident::new(":graph.element/id"))
        );
    }

    #[test]
    fn test_query_display() {
        let q = Query::new()
            .find(["?v"])
            .input("?label")
            .clause(var("?v"), ":graph.vertex/label", var("?label"));
        assert_eq!(
            q.to_string(),
            "[:find ?v :in $ ?label :where [?v :graph.vertex/label ?label]]"
        );
    }

    #[test]
    fn test_binding_accessors() {
        let b = Binding::from(EntityId(3));
        assert_eq!(b.as_entity(), Some(EntityId(3)));
        assert_eq!(b.as_value(), None);
        let b = Binding::from(Value::Long(3));
        assert_eq!(b.as_value(), Some(&Value::Long(3)));
        assert_eq!(Binding::from(Ident::new(":a")).as_attr(), Some(&Ident::new(":a")));
    }
}
