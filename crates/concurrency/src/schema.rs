//! Attribute schema registration
//!
//! Property attributes are declared lazily: the first write of a property
//! name with a given value type on a given element kind introduces a new
//! attribute. Declarations are committed in their own batch ahead of the data
//! that uses them, and they are never removed, even if that data is rolled
//! back.

use factgraph_core::key::{EDGE_IN_VERTEX, EDGE_LABEL, EDGE_OUT_VERTEX, ELEMENT_ID, VERTEX_LABEL};
use factgraph_core::{
    AttributeDef, ElementKind, FactStore, Ident, Result, Statement, TxReport, ValueType,
};
use tracing::debug;

/// Definition of a property attribute
pub fn property_attribute(name: &str, value_type: ValueType, kind: ElementKind) -> AttributeDef {
    AttributeDef::scalar(factgraph_core::key::encode(name, value_type, kind), value_type)
}

/// The reserved attributes every graph relies on
pub fn graph_meta_model() -> Vec<AttributeDef> {
    vec![
        AttributeDef::scalar(Ident::new(ELEMENT_ID), ValueType::Uuid).unique(),
        AttributeDef::scalar(Ident::new(VERTEX_LABEL), ValueType::String),
        AttributeDef::scalar(Ident::new(EDGE_LABEL), ValueType::String),
        AttributeDef::reference(Ident::new(EDGE_OUT_VERTEX)),
        AttributeDef::reference(Ident::new(EDGE_IN_VERTEX)),
    ]
}

/// Ensures attributes exist before data referring to them is written
pub struct SchemaRegistrar;

impl SchemaRegistrar {
    /// Install every definition not yet known to the store
    ///
    /// Returns the report of the installing batch, or `None` when nothing was
    /// missing.
    ///
    /// # Errors
    ///
    /// Propagates the store's error; an attribute already installed with a
    /// different type surfaces as `StoreError::SchemaConflict`.
    pub fn ensure<I>(store: &dyn FactStore, defs: I) -> Result<Option<TxReport>>
    where
        I: IntoIterator<Item = AttributeDef>,
    {
        let db = store.db();
        let mut missing: Vec<AttributeDef> = Vec::new();
        for def in defs {
            if db.attribute(&def.ident).is_none() && !missing.iter().any(|m| m.ident == def.ident) {
                missing.push(def);
            }
        }
        if missing.is_empty() {
            return Ok(None);
        }

        debug!(
            count = missing.len(),
            idents = ?missing.iter().map(|d| d.ident.as_str()).collect::<Vec<_>>(),
            "installing attributes"
        );
        let report = store.transact(
            missing
                .into_iter()
                .map(Statement::InstallAttribute)
                .collect(),
        )?;
        Ok(Some(report))
    }

    /// Install the graph meta model when missing; idempotent
    pub fn install_meta_model(store: &dyn FactStore) -> Result<Option<TxReport>> {
        Self::ensure(store, graph_meta_model())
    }
}
