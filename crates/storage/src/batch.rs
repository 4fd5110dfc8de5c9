//! Batch application
//!
//! Turns a list of statements into datoms against a `FactIndex`. The same
//! routine backs committed transactions and speculative `with`; callers hand
//! in a private copy of the index so a rejected batch leaves nothing behind.
//!
//! Order of work:
//! 1. stage attribute installs
//! 2. allocate permanent ids for provisional ids
//! 3. validate attributes, value types, entity references, CAS guards
//! 4. reject contradictory facts
//! 5. apply retractions, then assertions

use std::collections::HashMap;

use factgraph_core::{
    AttributeDef, AttributeType, CasConflict, EntityId, EntityRef, Error, FactValue, Ident,
    Result, Statement, StoreError, TempId, Value,
};

use crate::index::FactIndex;
use crate::schema::{SchemaRegistry, SchemaView};

/// One fact added to or removed from the store
#[derive(Debug, Clone, PartialEq)]
pub struct Datom {
    /// Entity
    pub e: EntityId,
    /// Attribute
    pub a: Ident,
    /// Value
    pub v: FactValue,
    /// Assertion (`true`) or retraction
    pub added: bool,
}

/// Result of applying a batch to an index
#[derive(Debug, Default)]
pub(crate) struct Applied {
    pub(crate) datoms: Vec<Datom>,
    pub(crate) tempids: HashMap<TempId, EntityId>,
    pub(crate) installs: Vec<AttributeDef>,
}

enum Op {
    Assert {
        e: EntityId,
        def: AttributeDef,
        v: FactValue,
    },
    Retract {
        e: EntityId,
        def: AttributeDef,
        v: FactValue,
    },
    RetractEntity(EntityId),
}

struct Resolver<'a> {
    index: &'a FactIndex,
    tempids: HashMap<TempId, EntityId>,
}

impl Resolver<'_> {
    fn entity(&self, r: EntityRef) -> Result<EntityId> {
        match r {
            EntityRef::Id(id) => Ok(id),
            EntityRef::Temp(t) => self
                .tempids
                .get(&t)
                .copied()
                .ok_or(Error::Store(StoreError::UnresolvedTempId(t.0))),
        }
    }

    fn is_new(&self, id: EntityId) -> bool {
        self.tempids.values().any(|n| *n == id)
    }

    /// Entity that receives an assertion must exist or be new in this batch
    fn existing(&self, r: EntityRef) -> Result<EntityId> {
        let id = self.entity(r)?;
        if self.index.contains(id) || self.is_new(id) {
            Ok(id)
        } else {
            Err(StoreError::UnknownEntity(id).into())
        }
    }

    fn value(&self, v: FactValue) -> Result<FactValue> {
        match v {
            FactValue::Ref(r) => Ok(FactValue::Ref(EntityRef::Id(self.existing(r)?))),
            scalar => Ok(scalar),
        }
    }
}

fn typed(view: &SchemaView<'_>, a: &Ident, v: &FactValue) -> Result<AttributeDef> {
    let def = view.require(a)?;
    if !def.value_type.admits(v) {
        return Err(StoreError::TypeMismatch {
            attribute: a.clone(),
            expected: def.value_type.token(),
            actual: AttributeType::describe(v),
        }
        .into());
    }
    Ok(def)
}

/// Apply `statements` to `index`
///
/// On error the index may be partially modified and must be discarded.
pub(crate) fn apply(
    index: &mut FactIndex,
    registry: &SchemaRegistry,
    statements: Vec<Statement>,
) -> Result<Applied> {
    let mut view = SchemaView::new(registry);
    for statement in &statements {
        if let Statement::InstallAttribute(def) = statement {
            view.stage(def.clone())?;
        }
    }

    let mut tempids = HashMap::new();
    for statement in &statements {
        let target = match statement {
            Statement::Entity { id, .. } => Some(*id),
            Statement::Add { e, .. } => Some(*e),
            _ => None,
        };
        if let Some(EntityRef::Temp(t)) = target {
            if !tempids.contains_key(&t) {
                tempids.insert(t, index.allocate());
            }
        }
    }

    let ops = {
        let resolver = Resolver {
            index,
            tempids: tempids.clone(),
        };
        let mut ops = Vec::new();
        for statement in statements {
            match statement {
                Statement::InstallAttribute(_) => {}
                Statement::Entity { id, fields } => {
                    let e = resolver.existing(id)?;
                    for (a, v) in fields {
                        let v = resolver.value(v)?;
                        let def = typed(&view, &a, &v)?;
                        ops.push(Op::Assert { e, def, v });
                    }
                }
                Statement::Add { e, a, v } => {
                    let e = resolver.existing(e)?;
                    let v = resolver.value(v)?;
                    let def = typed(&view, &a, &v)?;
                    ops.push(Op::Assert { e, def, v });
                }
                Statement::Retract { e, a, v } => {
                    let e = resolver.entity(e)?;
                    let v = match v {
                        FactValue::Ref(r) => FactValue::Ref(EntityRef::Id(resolver.entity(r)?)),
                        scalar => scalar,
                    };
                    let def = typed(&view, &a, &v)?;
                    ops.push(Op::Retract { e, def, v });
                }
                Statement::Cas { e, a, expected, new } => {
                    let e = resolver.existing(EntityRef::Id(e))?;
                    let v = FactValue::Scalar(new);
                    let def = typed(&view, &a, &v)?;
                    let actual = index.current(e, &a).and_then(FactValue::as_scalar).cloned();
                    if !same(&expected, &actual) {
                        return Err(Error::Conflict(CasConflict {
                            entity: e,
                            attribute: a,
                            expected,
                            actual,
                        }));
                    }
                    ops.push(Op::Assert { e, def, v });
                }
                Statement::RetractEntity(e) => ops.push(Op::RetractEntity(e)),
            }
        }
        ops
    };

    check_contradictions(&ops)?;

    let mut datoms = Vec::new();
    for op in ops.iter() {
        match op {
            Op::Retract { e, def, v } => {
                if index.retract(*e, def, v) {
                    datoms.push(datom(*e, &def.ident, v.clone(), false));
                }
            }
            Op::RetractEntity(e) => {
                let own: Vec<(Ident, FactValue)> = index
                    .attributes(*e)
                    .map(|attrs| attrs.iter().map(|(a, v)| (a.clone(), v.clone())).collect())
                    .unwrap_or_default();
                let incoming: Vec<(Ident, EntityId)> = index.referencing(*e).cloned().collect();
                for (a, v) in own {
                    let def = view.require(&a)?;
                    if index.retract(*e, &def, &v) {
                        datoms.push(datom(*e, &a, v, false));
                    }
                }
                for (a, source) in incoming {
                    let def = view.require(&a)?;
                    let v = FactValue::from(*e);
                    if index.retract(source, &def, &v) {
                        datoms.push(datom(source, &a, v, false));
                    }
                }
            }
            Op::Assert { .. } => {}
        }
    }
    for op in ops {
        if let Op::Assert { e, def, v } = op {
            if index.current(e, &def.ident) == Some(&v) {
                continue;
            }
            if def.unique_identity {
                if let FactValue::Scalar(value) = &v {
                    if let Some(owner) = index.lookup_unique(&def.ident, value) {
                        if owner != e {
                            return Err(StoreError::UniqueViolation {
                                attribute: def.ident.clone(),
                                value: value.to_string(),
                                owner,
                            }
                            .into());
                        }
                    }
                }
            }
            if let Some(previous) = index.assert(e, &def, v.clone()) {
                datoms.push(datom(e, &def.ident, previous, false));
            }
            datoms.push(datom(e, &def.ident, v, true));
        }
    }

    Ok(Applied {
        datoms,
        tempids,
        installs: view.into_staged(),
    })
}

fn same(expected: &Option<Value>, actual: &Option<Value>) -> bool {
    match (expected, actual) {
        (None, None) => true,
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

fn datom(e: EntityId, a: &Ident, v: FactValue, added: bool) -> Datom {
    Datom {
        e,
        a: a.clone(),
        v,
        added,
    }
}

/// A batch may not assert and retract the same fact, nor assert two values
/// for one single-cardinality attribute.
fn check_contradictions(ops: &[Op]) -> Result<()> {
    let mut seen: HashMap<(EntityId, Ident), Vec<(&FactValue, bool)>> = HashMap::new();
    for op in ops {
        let (e, def, v, added) = match op {
            Op::Assert { e, def, v } => (*e, def, v, true),
            Op::Retract { e, def, v } => (*e, def, v, false),
            Op::RetractEntity(_) => continue,
        };
        let entry = seen.entry((e, def.ident.clone())).or_default();
        let clash = entry.iter().any(|(other, other_added)| {
            if *other_added == added {
                added && *other != v
            } else {
                *other == v
            }
        });
        if clash {
            return Err(StoreError::Contradiction {
                entity: e,
                attribute: def.ident.clone(),
            }
            .into());
        }
        entry.push((v, added));
    }
    Ok(())
}
