//! Graph facade
//!
//! A `Graph` binds a fact store, a configuration and a transaction manager.
//! It is cheap to clone and safe to share between threads; all mutation goes
//! through `Transaction` handles obtained from `Graph::tx`.
//!
//! ```text
//! let graph = Graph::open_in_memory()?;
//! let mut tx = graph.tx();
//! let marko = tx.add_vertex(Some("person"), [("name", "marko".into())])?;
//! tx.commit()?;
//! ```

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use factgraph_concurrency::{SchemaRegistrar, TransactionManager};
use factgraph_core::{FactStore, Result};
use factgraph_storage::MemoryFactStore;
use tracing::info;

use crate::config::GraphConfig;
use crate::transaction::Transaction;
use crate::traversal::TraversalStrategies;

struct GraphInner {
    store: Arc<dyn FactStore>,
    config: GraphConfig,
    manager: TransactionManager,
    strategies: TraversalStrategies,
}

/// Property graph over a fact store
#[derive(Clone)]
pub struct Graph {
    inner: Arc<GraphInner>,
}

impl fmt::Debug for Graph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Graph")
            .field("basis_t", &self.inner.store.basis_t())
            .field("config", &self.inner.config)
            .field("strategies", &self.inner.strategies)
            .finish()
    }
}

impl Graph {
    /// Open a graph over a fresh in-memory store
    ///
    /// # Errors
    ///
    /// Fails if the configuration is invalid.
    pub fn open(config: GraphConfig) -> Result<Self> {
        let store = Arc::new(MemoryFactStore::new(config.store_name.clone()));
        Self::with_store(store, config)
    }

    /// Open an in-memory graph with the default configuration
    pub fn open_in_memory() -> Result<Self> {
        Self::open(GraphConfig::default())
    }

    /// Open an in-memory graph configured from a TOML file
    ///
    /// The file is created with default content when missing.
    pub fn open_with_config_file(path: &Path) -> Result<Self> {
        GraphConfig::write_default_if_missing(path)?;
        Self::open(GraphConfig::from_file(path)?)
    }

    /// Open a graph over an existing store
    ///
    /// Installs the reserved graph attributes when the store lacks them.
    ///
    /// # Errors
    ///
    /// Fails if the configuration is invalid or the store rejects the meta
    /// model.
    pub fn with_store(store: Arc<dyn FactStore>, config: GraphConfig) -> Result<Self> {
        config.validate()?;
        let installed = SchemaRegistrar::install_meta_model(store.as_ref())?;
        let strategies = TraversalStrategies::for_config(&config);
        info!(
            basis_t = store.basis_t(),
            bootstrapped = installed.is_some(),
            pushdown = config.pushdown,
            guarded = ?config.cas_guarded_keys,
            "graph opened"
        );
        Ok(Self {
            inner: Arc::new(GraphInner {
                store,
                config,
                manager: TransactionManager::new(),
                strategies,
            }),
        })
    }

    /// Start a transaction handle
    ///
    /// The handle is idle until first used; its base snapshot is taken then.
    pub fn tx(&self) -> Transaction {
        Transaction::new(self.clone())
    }

    /// Backing store
    pub fn store(&self) -> &Arc<dyn FactStore> {
        &self.inner.store
    }

    /// Configuration
    pub fn config(&self) -> &GraphConfig {
        &self.inner.config
    }

    /// Transaction manager (commit and abort counters)
    pub fn manager(&self) -> &TransactionManager {
        &self.inner.manager
    }

    /// Strategies applied to every traversal
    pub fn strategies(&self) -> &TraversalStrategies {
        &self.inner.strategies
    }
}
