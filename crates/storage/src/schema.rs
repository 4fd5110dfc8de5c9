//! Installed attributes
//!
//! The registry is shared by the store and every snapshot it hands out.
//! Attributes are only ever added, so a snapshot built on an older basis can
//! validate against the latest definitions.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use parking_lot::RwLock;

use factgraph_core::{AttributeDef, Ident, StoreError};

/// Shared, append-only attribute registry
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    inner: Arc<RwLock<HashMap<Ident, AttributeDef>>>,
}

impl SchemaRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Definition of an installed attribute
    pub fn get(&self, ident: &Ident) -> Option<AttributeDef> {
        self.inner.read().get(ident).cloned()
    }

    /// Number of installed attributes
    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    /// Whether nothing is installed
    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    /// Install definitions; re-installing an identical definition is a no-op
    pub(crate) fn install(&self, defs: &[AttributeDef]) {
        let mut inner = self.inner.write();
        for def in defs {
            inner.entry(def.ident.clone()).or_insert_with(|| def.clone());
        }
    }
}

/// Registry plus the attributes installed by the batch being applied
pub(crate) struct SchemaView<'a> {
    registry: &'a SchemaRegistry,
    pending: BTreeMap<Ident, AttributeDef>,
}

impl<'a> SchemaView<'a> {
    pub(crate) fn new(registry: &'a SchemaRegistry) -> Self {
        Self {
            registry,
            pending: BTreeMap::new(),
        }
    }

    /// Stage a definition; conflicting redefinitions are rejected
    ///
    /// Returns `true` when the definition is new.
    pub(crate) fn stage(&mut self, def: AttributeDef) -> Result<bool, StoreError> {
        if let Some(existing) = self.get(&def.ident) {
            if existing != def {
                return Err(StoreError::SchemaConflict(def.ident));
            }
            return Ok(false);
        }
        self.pending.insert(def.ident.clone(), def);
        Ok(true)
    }

    pub(crate) fn get(&self, ident: &Ident) -> Option<AttributeDef> {
        self.pending
            .get(ident)
            .cloned()
            .or_else(|| self.registry.get(ident))
    }

    pub(crate) fn require(&self, ident: &Ident) -> Result<AttributeDef, StoreError> {
        self.get(ident)
            .ok_or_else(|| StoreError::UnknownAttribute(ident.clone()))
    }

    pub(crate) fn into_staged(self) -> Vec<AttributeDef> {
        self.pending.into_values().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use factgraph_core::ValueType;

    #[test]
    fn test_stage_and_install() {
        let registry = SchemaRegistry::new();
        let def = AttributeDef::scalar(Ident::new(":age.long.vertex"), ValueType::Long);

        let mut view = SchemaView::new(&registry);
        assert!(view.stage(def.clone()).unwrap());
        assert!(view.get(&def.ident).is_some());
        assert!(registry.get(&def.ident).is_none());

        registry.install(&view.into_staged());
        assert_eq!(registry.get(&def.ident), Some(def.clone()));

        let mut view = SchemaView::new(&registry);
        assert!(!view.stage(def).unwrap());
    }

    #[test]
    fn test_conflicting_redefinition() {
        let registry = SchemaRegistry::new();
        let ident = Ident::new(":age.long.vertex");
        registry.install(&[AttributeDef::scalar(ident.clone(), ValueType::Long)]);

        let mut view = SchemaView::new(&registry);
        let err = view
            .stage(AttributeDef::scalar(ident.clone(), ValueType::String))
            .unwrap_err();
        assert_eq!(err, StoreError::SchemaConflict(ident));
    }

    #[test]
    fn test_require_unknown() {
        let registry = SchemaRegistry::new();
        let view = SchemaView::new(&registry);
        assert!(matches!(
            view.require(&Ident::new(":nope.long.vertex")),
            Err(StoreError::UnknownAttribute(_))
        ));
    }
}
