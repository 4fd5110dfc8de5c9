//! Storage layer for factgraph
//!
//! This crate implements an in-memory fact store with:
//! - MemoryFactStore: append-only transaction log with a commit lock
//! - MemorySnapshot: immutable point-in-time views and speculative `with`
//! - FactIndex: entity, attribute, unique-identity and reverse-reference indexes
//! - SchemaRegistry: shared, append-only attribute definitions
//! - Triple-pattern query evaluation

#![warn(missing_docs)]
#![warn(clippy::all)]

mod batch;
pub mod index;
pub mod schema;
pub mod snapshot;
pub mod store;

pub use batch::Datom;
pub use index::FactIndex;
pub use schema::SchemaRegistry;
pub use snapshot::MemorySnapshot;
pub use store::{MemoryFactStore, TxRecord};
