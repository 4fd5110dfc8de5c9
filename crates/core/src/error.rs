//! Error types for the graph layer
//!
//! This module defines all error types used throughout the system.
//! We use `thiserror` for automatic `Display` and `Error` trait implementations.
//!
//! Errors fall into four families:
//! - validation: raised synchronously by the write that caused them
//! - concurrency: a compare-and-swap guard failed at commit
//! - store: the fact store rejected or could not process a batch
//! - invariant: internal state that must never occur

use crate::types::{ElementKind, EntityId, Ident};
use crate::value::Value;
use thiserror::Error;
use uuid::Uuid;

/// Result type alias for graph operations
pub type Result<T> = std::result::Result<T, Error>;

/// A failed compare-and-swap guard
#[derive(Debug, Clone, PartialEq)]
pub struct CasConflict {
    /// Entity whose attribute was guarded
    pub entity: EntityId,
    /// Guarded attribute
    pub attribute: Ident,
    /// Value the transaction expected (`None` = absent)
    pub expected: Option<Value>,
    /// Value actually committed (`None` = absent)
    pub actual: Option<Value>,
}

impl std::fmt::Display for CasConflict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let show = |v: &Option<Value>| match v {
            Some(v) => v.to_string(),
            None => "nil".to_string(),
        };
        write!(
            f,
            "compare-and-swap failed on {} of entity {}: expected {}, found {}",
            self.attribute,
            self.entity,
            show(&self.expected),
            show(&self.actual)
        )
    }
}

/// Failures reported by the fact store
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StoreError {
    /// Attribute used before being installed
    #[error("attribute {0} is not installed")]
    UnknownAttribute(Ident),

    /// Value does not match the declared attribute type
    #[error("attribute {attribute} expects {expected}, got {actual}")]
    TypeMismatch {
        /// Attribute written
        attribute: Ident,
        /// Declared type
        expected: String,
        /// Type supplied
        actual: String,
    },

    /// Reference to an entity the store does not know
    #[error("unknown entity {0}")]
    UnknownEntity(EntityId),

    /// Provisional id used without being resolvable
    #[error("provisional id {0} cannot be resolved")]
    UnresolvedTempId(i64),

    /// The same fact asserted and retracted in one batch
    #[error("contradictory statements for [{entity} {attribute}]")]
    Contradiction {
        /// Entity
        entity: EntityId,
        /// Attribute
        attribute: Ident,
    },

    /// A unique-identity value already belongs to another entity
    #[error("{attribute} {value} already identifies entity {owner}")]
    UniqueViolation {
        /// Unique attribute
        attribute: Ident,
        /// Value, rendered
        value: String,
        /// Entity currently holding it
        owner: EntityId,
    },

    /// Attribute installed twice with different definitions
    #[error("attribute {0} already installed with a different definition")]
    SchemaConflict(Ident),

    /// Store unreachable
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// Requested point in time lies beyond the log
    #[error("basis {requested} is beyond the latest basis {latest}")]
    InvalidBasis {
        /// Requested basis
        requested: u64,
        /// Latest committed basis
        latest: u64,
    },
}

/// Error types for the graph layer
#[derive(Debug, Error)]
pub enum Error {
    /// Property key outside the allowed charset or in the reserved namespace
    #[error("illegal property key: {0:?}")]
    IllegalPropertyKey(String),

    /// Label outside the allowed charset
    #[error("illegal label: {0:?}")]
    IllegalLabel(String),

    /// Property value type not in the supported set
    #[error("unsupported property value type: {0}")]
    UnsupportedValueType(String),

    /// Caller tried to choose the element id
    #[error("user supplied ids are not supported")]
    UserSuppliedIds,

    /// Operation on an element already removed
    #[error("{kind} {id} has been removed")]
    ElementRemoved {
        /// Vertex or edge
        kind: ElementKind,
        /// External id
        id: Uuid,
    },

    /// Write attempted on a read-only (historical) transaction
    #[error("transaction is read-only")]
    ReadOnly,

    /// Compare-and-swap guard failed at commit
    #[error("concurrency conflict: {0}")]
    Conflict(CasConflict),

    /// Fact store failure
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Element expected to exist was not found
    #[error("element {0} not found")]
    ElementNotFound(Uuid),

    /// Broken internal invariant
    #[error("invariant violated: {0}")]
    Invariant(String),

    /// Configuration could not be read or parsed
    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Whether this error is a compare-and-swap conflict
    pub fn is_conflict(&self) -> bool {
        matches!(self, Error::Conflict(_))
    }

    /// Whether this error means a commit was rejected as a whole
    ///
    /// Conflicts and store failures both count; validation errors never
    /// reach commit.
    pub fn is_transaction_failure(&self) -> bool {
        matches!(self, Error::Conflict(_) | Error::Store(_))
    }

    /// Whether this error was raised by input validation
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Error::IllegalPropertyKey(_)
                | Error::IllegalLabel(_)
                | Error::UnsupportedValueType(_)
                | Error::UserSuppliedIds
                | Error::ElementRemoved { .. }
                | Error::ReadOnly
        )
    }

    /// Shorthand for an invariant violation
    pub fn invariant(msg: impl Into<String>) -> Self {
        Error::Invariant(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_conflict() {
        let err = Error::Conflict(CasConflict {
            entity: EntityId(42),
            attribute: Ident::new(":$version.long.vertex"),
            expected: Some(Value::Long(1)),
            actual: Some(Value::Long(2)),
        });
        let msg = err.to_string();
        assert!(msg.contains("concurrency conflict"));
        assert!(msg.contains("42"));
        assert!(msg.contains(":$version.long.vertex"));
    }

    #[test]
    fn test_conflict_display_absent_values() {
        let conflict = CasConflict {
            entity: EntityId(1),
            attribute: Ident::new(":a.long.vertex"),
            expected: None,
            actual: Some(Value::Long(1)),
        };
        assert!(conflict.to_string().contains("expected nil"));
    }

    #[test]
    fn test_store_error_converts() {
        let err: Error = StoreError::Unavailable("connection reset".into()).into();
        assert!(matches!(err, Error::Store(StoreError::Unavailable(_))));
        assert!(err.to_string().contains("connection reset"));
    }

    #[test]
    fn test_classification() {
        let conflict = Error::Conflict(CasConflict {
            entity: EntityId(1),
            attribute: Ident::new(":a.long.vertex"),
            expected: None,
            actual: None,
        });
        assert!(conflict.is_conflict());
        assert!(conflict.is_transaction_failure());

        let store: Error = StoreError::Unavailable("down".into()).into();
        assert!(!store.is_conflict());
        assert!(store.is_transaction_failure());

        let invalid = Error::IllegalLabel("a b".into());
        assert!(invalid.is_validation());
        assert!(!invalid.is_transaction_failure());
    }
}
