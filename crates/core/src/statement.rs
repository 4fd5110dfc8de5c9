//! Store statements
//!
//! The vocabulary a batch handed to the fact store is written in. A batch is
//! applied atomically or not at all.

use crate::types::{EntityId, EntityRef, FactValue, Ident};
use crate::value::{Value, ValueType};
use std::collections::BTreeMap;
use std::fmt;

/// Declared type of an attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeType {
    /// Holds scalar values of one type
    Scalar(ValueType),
    /// Holds references to other entities
    Ref,
}

impl AttributeType {
    /// Native store type token
    pub fn token(&self) -> String {
        match self {
            AttributeType::Scalar(t) => t.token(),
            AttributeType::Ref => ":db.type/ref".to_string(),
        }
    }

    /// Whether `value` may be stored under this type
    pub fn admits(&self, value: &FactValue) -> bool {
        match (self, value) {
            (AttributeType::Scalar(t), FactValue::Scalar(v)) => v.value_type() == *t,
            (AttributeType::Ref, FactValue::Ref(_)) => true,
            _ => false,
        }
    }

    /// Human readable name of the type a value carries
    pub fn describe(value: &FactValue) -> String {
        match value {
            FactValue::Scalar(v) => v.value_type().token(),
            FactValue::Ref(_) => ":db.type/ref".to_string(),
        }
    }
}

/// Attribute definition (cardinality is always one)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeDef {
    /// Ident
    pub ident: Ident,
    /// Value type
    pub value_type: AttributeType,
    /// Values identify their entity (at most one entity per value)
    pub unique_identity: bool,
    /// Maintain a value index
    pub indexed: bool,
}

impl AttributeDef {
    /// An indexed, non-unique scalar attribute
    pub fn scalar(ident: Ident, value_type: ValueType) -> Self {
        Self {
            ident,
            value_type: AttributeType::Scalar(value_type),
            unique_identity: false,
            indexed: true,
        }
    }

    /// A reference attribute
    pub fn reference(ident: Ident) -> Self {
        Self {
            ident,
            value_type: AttributeType::Ref,
            unique_identity: false,
            indexed: true,
        }
    }

    /// Mark values as identifying their entity
    pub fn unique(mut self) -> Self {
        self.unique_identity = true;
        self
    }
}

/// A single statement of a batch
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    /// Assert several attributes of one entity at once
    Entity {
        /// Entity, usually provisional
        id: EntityRef,
        /// Attribute values
        fields: BTreeMap<Ident, FactValue>,
    },
    /// Assert one fact
    Add {
        /// Entity
        e: EntityRef,
        /// Attribute
        a: Ident,
        /// Value
        v: FactValue,
    },
    /// Retract one fact
    Retract {
        /// Entity
        e: EntityRef,
        /// Attribute
        a: Ident,
        /// Value
        v: FactValue,
    },
    /// Replace a value only if the committed value is `expected`
    Cas {
        /// Entity
        e: EntityId,
        /// Attribute
        a: Ident,
        /// Expected committed value, `None` for absent
        expected: Option<Value>,
        /// New value
        new: Value,
    },
    /// Retract every fact about an entity and every reference to it
    RetractEntity(EntityId),
    /// Install an attribute
    InstallAttribute(AttributeDef),
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Statement::Entity { id, fields } => {
                write!(f, "{{:db/id {}", id)?;
                for (a, v) in fields {
                    write!(f, " {} {}", a, v)?;
                }
                f.write_str("}")
            }
            Statement::Add { e, a, v } => write!(f, "[:db/add {} {} {}]", e, a, v),
            Statement::Retract { e, a, v } => write!(f, "[:db/retract {} {} {}]", e, a, v),
            Statement::Cas { e, a, expected, new } => {
                let expected = expected
                    .as_ref()
                    .map(|v| v.to_string())
                    .unwrap_or_else(|| "nil".to_string());
                write!(f, "[:db.fn/cas {} {} {} {}]", e, a, expected, new)
            }
            Statement::RetractEntity(e) => write!(f, "[:db.fn/retractEntity {}]", e),
            Statement::InstallAttribute(def) => write!(
                f,
                "{{:db/ident {} :db/valueType {} :db/cardinality :db.cardinality/one}}",
                def.ident,
                def.value_type.token()
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TempId;

    #[test]
    fn test_attribute_type_admits() {
        let long = AttributeType::Scalar(ValueType::Long);
        assert!(long.admits(&FactValue::Scalar(Value::Long(1))));
        assert!(!long.admits(&FactValue::Scalar(Value::from("1"))));
        assert!(!long.admits(&FactValue::Ref(EntityRef::Id(EntityId(1)))));
        assert!(AttributeType::Ref.admits(&FactValue::Ref(EntityRef::Temp(TempId(-1)))));
    }

    #[test]
    fn test_statement_display() {
        let cas = Statement::Cas {
            e: EntityId(5),
            a: Ident::new(":$version.long.vertex"),
            expected: None,
            new: Value::Long(1),
        };
        assert_eq!(
            cas.to_string(),
            "[:db.fn/cas 5 :$version.long.vertex nil 1]"
        );
        assert_eq!(
            Statement::RetractEntity(EntityId(9)).to_string(),
            "[:db.fn/retractEntity 9]"
        );
    }

    #[test]
    fn test_attribute_def_builders() {
        let def = AttributeDef::scalar(Ident::new(":graph.element/id"), ValueType::Uuid).unique();
        assert!(def.unique_identity);
        assert!(def.indexed);
        assert_eq!(def.value_type.token(), ":db.type/uuid");
        assert_eq!(
            AttributeDef::reference(Ident::new(":graph.edge/inVertex"))
                .value_type
                .token(),
            ":db.type/ref"
        );
    }
}
