//! Materialized indexes over the current facts
//!
//! - `eav`: entity → attribute → value (cardinality one)
//! - `aev`: attribute → entities holding it
//! - `unique`: (attribute, value) → entity for unique-identity attributes
//! - `refs`: target entity → (attribute, source) for reference attributes
//!
//! A `FactIndex` is a plain value; snapshots share one behind an `Arc` and
//! speculative application works on a clone.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use factgraph_core::{AttributeDef, AttributeType, EntityId, FactValue, Ident, Value};

/// Key of the unique-identity index; the type tag keeps `1` and `1.0` apart
pub(crate) fn unique_key(value: &Value) -> String {
    format!("{}:{}", value.value_type().suffix(), value)
}

/// Current facts with secondary indexes
#[derive(Debug, Clone, Default)]
pub struct FactIndex {
    eav: BTreeMap<EntityId, BTreeMap<Ident, FactValue>>,
    aev: HashMap<Ident, BTreeSet<EntityId>>,
    unique: HashMap<(Ident, String), EntityId>,
    refs: HashMap<EntityId, BTreeSet<(Ident, EntityId)>>,
    next_entity: u64,
}

impl FactIndex {
    /// Empty index; the first allocated entity id is 1
    pub fn new() -> Self {
        Self {
            next_entity: 1,
            ..Default::default()
        }
    }

    /// Allocate a fresh entity id
    pub fn allocate(&mut self) -> EntityId {
        let id = EntityId(self.next_entity);
        self.next_entity += 1;
        id
    }

    /// Next id `allocate` would hand out
    pub fn next_entity(&self) -> u64 {
        self.next_entity
    }

    /// Bump the allocator so it never hands out `id` again
    pub fn reserve(&mut self, id: EntityId) {
        if id.0 >= self.next_entity {
            self.next_entity = id.0 + 1;
        }
    }

    /// Whether the entity has at least one fact
    pub fn contains(&self, e: EntityId) -> bool {
        self.eav.contains_key(&e)
    }

    /// Current value of one attribute
    pub fn current(&self, e: EntityId, a: &Ident) -> Option<&FactValue> {
        self.eav.get(&e).and_then(|attrs| attrs.get(a))
    }

    /// All current attributes of an entity
    pub fn attributes(&self, e: EntityId) -> Option<&BTreeMap<Ident, FactValue>> {
        self.eav.get(&e)
    }

    /// Entities holding an attribute
    pub fn entities_with(&self, a: &Ident) -> impl Iterator<Item = EntityId> + '_ {
        self.aev.get(a).into_iter().flat_map(|s| s.iter().copied())
    }

    /// All entities
    pub fn entities(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.eav.keys().copied()
    }

    /// Entity owning a unique-identity value
    pub fn lookup_unique(&self, a: &Ident, v: &Value) -> Option<EntityId> {
        self.unique.get(&(a.clone(), unique_key(v))).copied()
    }

    /// (attribute, source) pairs referencing `target`
    pub fn referencing(&self, target: EntityId) -> impl Iterator<Item = &(Ident, EntityId)> + '_ {
        self.refs.get(&target).into_iter().flat_map(|s| s.iter())
    }

    /// Set `a` of `e` to `v`, returning the value it replaces
    pub fn assert(
        &mut self,
        e: EntityId,
        def: &AttributeDef,
        v: FactValue,
    ) -> Option<FactValue> {
        let previous = self.remove_value(e, def);
        self.reserve(e);
        if def.unique_identity {
            if let FactValue::Scalar(value) = &v {
                self.unique.insert((def.ident.clone(), unique_key(value)), e);
            }
        }
        if def.value_type == AttributeType::Ref {
            if let Some(target) = v.as_entity() {
                self.refs
                    .entry(target)
                    .or_default()
                    .insert((def.ident.clone(), e));
            }
        }
        self.aev.entry(def.ident.clone()).or_default().insert(e);
        self.eav.entry(e).or_default().insert(def.ident.clone(), v);
        previous
    }

    /// Remove `a` of `e` if its value is `v`; returns whether anything changed
    pub fn retract(&mut self, e: EntityId, def: &AttributeDef, v: &FactValue) -> bool {
        if self.current(e, &def.ident) != Some(v) {
            return false;
        }
        self.remove_value(e, def);
        true
    }

    fn remove_value(&mut self, e: EntityId, def: &AttributeDef) -> Option<FactValue> {
        let attrs = self.eav.get_mut(&e)?;
        let old = attrs.remove(&def.ident)?;
        if attrs.is_empty() {
            self.eav.remove(&e);
        }
        if let Some(set) = self.aev.get_mut(&def.ident) {
            set.remove(&e);
            if set.is_empty() {
                self.aev.remove(&def.ident);
            }
        }
        if def.unique_identity {
            if let FactValue::Scalar(value) = &old {
                self.unique.remove(&(def.ident.clone(), unique_key(value)));
            }
        }
        if let Some(target) = old.as_entity() {
            if let Some(set) = self.refs.get_mut(&target) {
                set.remove(&(def.ident.clone(), e));
                if set.is_empty() {
                    self.refs.remove(&target);
                }
            }
        }
        Some(old)
    }
}
