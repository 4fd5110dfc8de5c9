//! Pending graph operations
//!
//! A transaction buffers at most one operation per element. Later writes to
//! the same element amend that operation in place instead of appending new
//! statements, which keeps the compiled batch free of contradictions.

use std::collections::BTreeMap;
use std::sync::Arc;

use factgraph_core::{
    ElementIdentity, EntityId, EntityRef, FactValue, Ident, Statement, TempId, Value,
};
use uuid::Uuid;

/// Kind of a pending operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpKind {
    /// Element created in this transaction
    Create,
    /// Committed element with changed attributes
    Modify,
    /// Committed element removed
    Delete,
}

/// Buffered change to one attribute of a committed element
#[derive(Debug, Clone, PartialEq)]
pub enum FieldChange {
    /// Unconditional assert
    Set(FactValue),
    /// Retract the committed value
    Retract(FactValue),
    /// Assert guarded by the committed value
    Cas {
        /// Value the transaction saw (`None` = absent)
        expected: Option<Value>,
        /// New value
        new: Value,
    },
}

/// A requested attribute change, before merging
#[derive(Debug, Clone, PartialEq)]
pub enum Modification {
    /// Set an attribute
    Set {
        /// Attribute
        attr: Ident,
        /// Value
        value: FactValue,
    },
    /// Set an attribute if the committed value is still `expected`
    Cas {
        /// Attribute
        attr: Ident,
        /// Value observed in the base snapshot
        expected: Option<Value>,
        /// New value
        new: Value,
    },
    /// Remove an attribute
    Retract {
        /// Attribute
        attr: Ident,
        /// Committed value, if the element has one
        committed: Option<FactValue>,
    },
}

impl Modification {
    /// Attribute this modification targets
    pub fn attr(&self) -> &Ident {
        match self {
            Modification::Set { attr, .. }
            | Modification::Cas { attr, .. }
            | Modification::Retract { attr, .. } => attr,
        }
    }
}

/// Statement payload of a pending operation
#[derive(Debug, Clone, PartialEq)]
pub enum PendingStatement {
    /// Map-form assert of a new entity
    Create {
        /// Provisional id
        temp: TempId,
        /// All attributes, reserved graph attributes included
        fields: BTreeMap<Ident, FactValue>,
    },
    /// Attribute changes of a committed entity
    Modify {
        /// Entity
        entity: EntityId,
        /// One change per attribute
        changes: BTreeMap<Ident, FieldChange>,
    },
    /// Removal of a committed entity
    Delete {
        /// Entity
        entity: EntityId,
    },
}

impl PendingStatement {
    /// Kind of operation this payload belongs to
    pub fn kind(&self) -> OpKind {
        match self {
            PendingStatement::Create { .. } => OpKind::Create,
            PendingStatement::Modify { .. } => OpKind::Modify,
            PendingStatement::Delete { .. } => OpKind::Delete,
        }
    }

    /// Store statements for this payload
    pub fn to_statements(&self) -> Vec<Statement> {
        match self {
            PendingStatement::Create { temp, fields } => vec![Statement::Entity {
                id: EntityRef::Temp(*temp),
                fields: fields.clone(),
            }],
            PendingStatement::Modify { entity, changes } => changes
                .iter()
                .map(|(attr, change)| match change {
                    FieldChange::Set(v) => Statement::Add {
                        e: EntityRef::Id(*entity),
                        a: attr.clone(),
                        v: v.clone(),
                    },
                    FieldChange::Retract(v) => Statement::Retract {
                        e: EntityRef::Id(*entity),
                        a: attr.clone(),
                        v: v.clone(),
                    },
                    FieldChange::Cas { expected, new } => Statement::Cas {
                        e: *entity,
                        a: attr.clone(),
                        expected: expected.clone(),
                        new: new.clone(),
                    },
                })
                .collect(),
            PendingStatement::Delete { entity } => vec![Statement::RetractEntity(*entity)],
        }
    }
}

/// One buffered operation
#[derive(Debug, Clone)]
pub struct PendingOperation {
    /// Element the operation belongs to
    pub element: Arc<ElementIdentity>,
    /// Payload
    pub statement: PendingStatement,
    /// Other elements this operation depends on (an edge's endpoints)
    pub touched: Vec<Uuid>,
}

impl PendingOperation {
    /// Kind of the operation
    pub fn kind(&self) -> OpKind {
        self.statement.kind()
    }

    /// Whether the operation is about, or depends on, `uuid`
    pub fn concerns(&self, uuid: Uuid) -> bool {
        self.element.uuid() == uuid || self.touched.contains(&uuid)
    }
}

/// Apply a modification to the attributes of an uncommitted entity
pub(crate) fn apply_to_fields(fields: &mut BTreeMap<Ident, FactValue>, m: Modification) {
    match m {
        Modification::Set { attr, value } => {
            fields.insert(attr, value);
        }
        Modification::Cas { attr, new, .. } => {
            fields.insert(attr, FactValue::Scalar(new));
        }
        Modification::Retract { attr, .. } => {
            fields.remove(&attr);
        }
    }
}

/// Merge a modification into the changes of a committed entity
///
/// Last write wins per attribute, except that a CAS keeps the guard the
/// transaction first observed.
pub(crate) fn merge_change(changes: &mut BTreeMap<Ident, FieldChange>, m: Modification) {
    match m {
        Modification::Set { attr, value } => {
            changes.insert(attr, FieldChange::Set(value));
        }
        Modification::Cas {
            attr,
            expected,
            new,
        } => {
            let merged = match changes.remove(&attr) {
                Some(FieldChange::Cas { expected, .. }) => FieldChange::Cas { expected, new },
                Some(FieldChange::Retract(FactValue::Scalar(committed))) => FieldChange::Cas {
                    expected: Some(committed),
                    new,
                },
                Some(FieldChange::Set(_)) | Some(FieldChange::Retract(_)) => {
                    FieldChange::Set(FactValue::Scalar(new))
                }
                None => FieldChange::Cas { expected, new },
            };
            changes.insert(attr, merged);
        }
        Modification::Retract { attr, committed } => match committed {
            Some(v) => {
                changes.insert(attr, FieldChange::Retract(v));
            }
            None => {
                changes.remove(&attr);
            }
        },
    }
}
