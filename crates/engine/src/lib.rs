//! Property graph engine over a fact store
//!
//! This crate is what applications use:
//! - Graph: opens a store, installs the graph attributes, hands out transactions
//! - Transaction: buffers mutations and commits them as one batch
//! - Vertex and Edge: proxies that read through their transaction
//! - Traversal: linear traversals with filter pushdown into the start step
//! - GraphConfig: per-graph policy from `factgraph.toml`
//!
//! The engine knows nothing about how facts are stored; it talks to the
//! store through `factgraph_core::FactStore` only.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod element;
pub mod graph;
mod helper;
pub mod transaction;
pub mod traversal;

pub use config::{GraphConfig, CONFIG_FILE_NAME};
pub use factgraph_concurrency::{ElementState, PendingOperations};
pub use element::{Edge, Element, Property, Vertex};
pub use graph::Graph;
pub use transaction::{BoundTraversal, CommitReport, PropertyKey, Transaction, TraversalSource};
pub use traversal::{
    GraphStepStrategy, HasContainer, HasKey, ScanPlan, Step, Traversal, TraversalStrategies,
    TraversalStrategy, P,
};
