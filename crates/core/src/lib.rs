//! Core types and traits for factgraph
//!
//! This crate defines the foundational types used throughout the system:
//! - Value / ValueType: the closed set of property value types
//! - EntityId, TempId, EntityRef, Ident: store identifiers
//! - ElementIdentity: identity shared by element proxies
//! - Statement / AttributeDef: the batch vocabulary of the fact store
//! - Query: conjunctive triple patterns
//! - key: property name to attribute encoding
//! - Error: error type hierarchy
//! - Traits: FactStore and Snapshot

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod key;
pub mod query;
pub mod statement;
pub mod traits;
pub mod types;
pub mod value;

pub use error::{CasConflict, Error, Result, StoreError};
pub use query::{var, AttrTerm, Binding, Clause, Query, Rows, Term};
pub use statement::{AttributeDef, AttributeType, Statement};
pub use traits::{Entity, FactStore, Snapshot, TxReport};
pub use types::{
    Direction, ElementIdentity, ElementKind, EntityId, EntityRef, FactValue, Ident, TempId,
};
pub use value::{Value, ValueType};
