//! factgraph - transactional property graph over a time-versioned fact store
//!
//! Vertices, edges and their properties are stored as facts in an
//! append-only store. Each transaction reads one snapshot, sees its own
//! pending writes, and commits them as a single atomic batch.
//!
//! # Quick Start
//!
//! ```ignore
//! use factgraph::{Graph, Value, Direction};
//!
//! let graph = Graph::open_in_memory()?;
//! let tx = graph.tx();
//! let marko = tx.add_vertex(Some("person"), [("name", Value::from("marko"))])?;
//! let vadas = tx.add_vertex(Some("person"), [("name", Value::from("vadas"))])?;
//! marko.add_edge("knows", &vadas, Vec::<(&str, Value)>::new())?;
//! tx.commit()?;
//!
//! let knows = graph.tx().traversal().v(&[]).then(|t| t.has("name", "marko").out(&["knows"])).to_list()?;
//! ```
//!
//! # Architecture
//!
//! - `factgraph-core`: values, errors, attribute keys, statements, store traits
//! - `factgraph-storage`: in-memory fact store
//! - `factgraph-concurrency`: mutation buffer, schema registration, commits
//! - `factgraph-engine`: graph, transactions, element proxies, traversals

pub use factgraph_core::{
    CasConflict, Direction, ElementKind, Error, FactStore, Result, Snapshot, Value, ValueType,
};
pub use factgraph_engine::*;
pub use factgraph_storage::MemoryFactStore;
