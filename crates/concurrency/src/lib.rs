//! Transaction layer for factgraph
//!
//! This crate buffers graph mutations per transaction and commits them to a
//! fact store in one batch:
//! - TransactionContext: the mutation buffer, one operation per element
//! - Snapshot isolation: reads come from a base snapshot pinned at first use
//! - Read-your-writes: pending statements applied speculatively with `with`
//! - Compare-and-swap guards, checked by the store at commit
//! - SchemaRegistrar: lazy attribute declaration ahead of the data

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod context;
pub mod manager;
pub mod operation;
pub mod schema;

pub use context::{
    CommitOutcome, ElementState, PendingOperations, TransactionContext, TransactionStatus,
};
pub use manager::TransactionManager;
pub use operation::{FieldChange, Modification, OpKind, PendingOperation, PendingStatement};
pub use schema::{graph_meta_model, property_attribute, SchemaRegistrar};
