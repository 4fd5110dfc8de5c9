//! MemorySnapshot: immutable point-in-time view
//!
//! A snapshot owns an `Arc` of the index as it stood at its basis point.
//! Speculative application (`with`) clones that index, applies the batch and
//! wraps the result in a new snapshot that nobody else can see.
//!
//! # Design Notes
//!
//! - **Deep clone on `with`**: simple and correct; cost grows with the store
//! - **Shared schema**: attribute definitions come from the live registry

use std::collections::HashMap;
use std::sync::Arc;

use factgraph_core::query::{AttrTerm, Binding, Clause, Query, Rows, Term};
use factgraph_core::{
    AttributeDef, Entity, EntityId, Error, FactValue, Ident, Result, Snapshot, Statement,
    TxReport, Value,
};

use crate::batch;
use crate::index::FactIndex;
use crate::schema::SchemaRegistry;

/// Immutable view of the store at one basis point
#[derive(Debug, Clone)]
pub struct MemorySnapshot {
    basis_t: u64,
    index: Arc<FactIndex>,
    schema: SchemaRegistry,
}

impl MemorySnapshot {
    pub(crate) fn new(basis_t: u64, index: Arc<FactIndex>, schema: SchemaRegistry) -> Self {
        Self {
            basis_t,
            index,
            schema,
        }
    }

    pub(crate) fn index(&self) -> &Arc<FactIndex> {
        &self.index
    }

    /// Number of entities with at least one fact
    pub fn entity_count(&self) -> usize {
        self.index.entities().count()
    }

    fn matches(&self, clause: &Clause, binding: &HashMap<String, Binding>) -> Vec<HashMap<String, Binding>> {
        let e = match &clause.e {
            Term::Var(name) => match binding.get(name) {
                Some(bound) => match bound.as_entity() {
                    Some(id) => Some(id),
                    None => return Vec::new(),
                },
                None => None,
            },
            Term::Const(value) => match value.as_entity() {
                Some(id) => Some(id),
                None => return Vec::new(),
            },
        };
        let a = match &clause.a {
            AttrTerm::Var(name) => match binding.get(name) {
                Some(bound) => match bound.as_attr() {
                    Some(ident) => Some(ident.clone()),
                    None => return Vec::new(),
                },
                None => None,
            },
            AttrTerm::Const(ident) => Some(ident.clone()),
        };
        let v: Option<FactValue> = match &clause.v {
            Term::Var(name) => match binding.get(name) {
                Some(Binding::Value(value)) => Some(value.clone()),
                Some(Binding::Attr(_)) => return Vec::new(),
                None => None,
            },
            Term::Const(value) => Some(value.clone()),
        };

        let candidates: Vec<EntityId> = match (&e, &a, &v) {
            (Some(id), _, _) => vec![*id],
            (None, Some(attr), Some(FactValue::Scalar(value))) => {
                match self.schema.get(attr) {
                    Some(def) if def.unique_identity => {
                        self.index.lookup_unique(attr, value).into_iter().collect()
                    }
                    _ => self.index.entities_with(attr).collect(),
                }
            }
            (None, Some(attr), Some(FactValue::Ref(_))) => match v.as_ref().and_then(FactValue::as_entity) {
                Some(target) => self
                    .index
                    .referencing(target)
                    .filter(|(a, _)| a == attr)
                    .map(|(_, source)| *source)
                    .collect(),
                None => Vec::new(),
            },
            (None, Some(attr), None) => self.index.entities_with(attr).collect(),
            (None, None, _) => self.index.entities().collect(),
        };

        let mut out = Vec::new();
        for entity in candidates {
            let Some(attrs) = self.index.attributes(entity) else {
                continue;
            };
            for (attr, value) in attrs {
                if a.as_ref().map_or(false, |wanted| wanted != attr) {
                    continue;
                }
                if v.as_ref().map_or(false, |wanted| wanted != value) {
                    continue;
                }
                let mut extended = binding.clone();
                if let Term::Var(name) = &clause.e {
                    extended
                        .entry(name.clone())
                        .or_insert_with(|| Binding::from(entity));
                }
                if let AttrTerm::Var(name) = &clause.a {
                    extended
                        .entry(name.clone())
                        .or_insert_with(|| Binding::Attr(attr.clone()));
                }
                if let Term::Var(name) = &clause.v {
                    extended
                        .entry(name.clone())
                        .or_insert_with(|| Binding::Value(value.clone()));
                }
                out.push(extended);
            }
        }
        out
    }
}

impl Snapshot for MemorySnapshot {
    fn basis_t(&self) -> u64 {
        self.basis_t
    }

    fn entity(&self, id: EntityId) -> Option<Entity> {
        self.index.attributes(id).map(|attrs| Entity {
            id,
            attributes: attrs.clone(),
        })
    }

    fn lookup(&self, attr: &Ident, value: &Value) -> Option<EntityId> {
        self.index.lookup_unique(attr, value)
    }

    fn referrers(&self, target: EntityId, attr: &Ident) -> Vec<EntityId> {
        self.index
            .referencing(target)
            .filter(|(a, _)| a == attr)
            .map(|(_, source)| *source)
            .collect()
    }

    fn attribute(&self, ident: &Ident) -> Option<AttributeDef> {
        self.schema.get(ident)
    }

    fn q(&self, query: &Query, params: &[Binding]) -> Result<Rows> {
        if params.len() != query.inputs.len() {
            return Err(Error::invariant(format!(
                "query expects {} inputs, got {}",
                query.inputs.len(),
                params.len()
            )));
        }
        let initial: HashMap<String, Binding> = query
            .inputs
            .iter()
            .cloned()
            .zip(params.iter().cloned())
            .collect();

        let mut bindings = vec![initial];
        for clause in &query.clauses {
            bindings = bindings
                .iter()
                .flat_map(|binding| self.matches(clause, binding))
                .collect();
            if bindings.is_empty() {
                break;
            }
        }

        bindings
            .into_iter()
            .map(|binding| {
                query
                    .find
                    .iter()
                    .map(|name| {
                        binding.get(name).cloned().ok_or_else(|| {
                            Error::invariant(format!("variable {} is never bound", name))
                        })
                    })
                    .collect()
            })
            .collect()
    }

    fn with(&self, statements: Vec<Statement>) -> Result<TxReport> {
        let mut index = FactIndex::clone(&self.index);
        let applied = batch::apply(&mut index, &self.schema, statements)?;
        let basis_t = self.basis_t + 1;
        Ok(TxReport {
            basis_t,
            db_after: Arc::new(MemorySnapshot::new(
                basis_t,
                Arc::new(index),
                self.schema.clone(),
            )),
            tempids: applied.tempids,
        })
    }
}
