//! Graph configuration via `factgraph.toml`
//!
//! A small TOML file controls per-graph policy. Every field has a default, so
//! an empty file is a valid configuration.

use serde::{Deserialize, Serialize};
use std::path::Path;

use factgraph_core::key::{validate_label, validate_property_key};
use factgraph_core::{Error, Result};

/// Config file name
pub const CONFIG_FILE_NAME: &str = "factgraph.toml";

/// Graph configuration loaded from `factgraph.toml`.
///
/// # Example
///
/// ```toml
/// store_name = "factgraph"
/// default_vertex_label = "vertex"
/// cas_guarded_keys = ["_version"]
/// pushdown = true
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GraphConfig {
    /// Name of the in-memory store created by `Graph::open`.
    #[serde(default = "default_store_name")]
    pub store_name: String,
    /// Label given to vertices added without one.
    #[serde(default = "default_vertex_label")]
    pub default_vertex_label: String,
    /// Property keys whose writes to committed elements are compare-and-swap
    /// guarded.
    #[serde(default = "default_cas_guarded_keys")]
    pub cas_guarded_keys: Vec<String>,
    /// Fuse filters into the start step of traversals.
    #[serde(default = "default_pushdown")]
    pub pushdown: bool,
}

fn default_store_name() -> String {
    "factgraph".to_string()
}

fn default_vertex_label() -> String {
    "vertex".to_string()
}

fn default_cas_guarded_keys() -> Vec<String> {
    vec!["_version".to_string()]
}

fn default_pushdown() -> bool {
    true
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            store_name: default_store_name(),
            default_vertex_label: default_vertex_label(),
            cas_guarded_keys: default_cas_guarded_keys(),
            pushdown: default_pushdown(),
        }
    }
}

impl GraphConfig {
    /// Whether writes to `key` on committed elements are CAS guarded
    pub fn is_cas_guarded(&self, key: &str) -> bool {
        self.cas_guarded_keys.iter().any(|k| k == key)
    }

    /// Check labels and keys against the allowed charset.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` naming the offending entry.
    pub fn validate(&self) -> Result<()> {
        validate_label(&self.default_vertex_label).map_err(|e| {
            Error::Config(format!("default_vertex_label: {}", e))
        })?;
        for key in &self.cas_guarded_keys {
            validate_property_key(key)
                .map_err(|e| Error::Config(format!("cas_guarded_keys: {}", e)))?;
        }
        Ok(())
    }

    /// Returns the default config file content with comments.
    pub fn default_toml() -> &'static str {
        r#"# factgraph configuration
#
# Name of the in-memory fact store
store_name = "factgraph"

# Label given to vertices added without one
default_vertex_label = "vertex"

# Property keys guarded by compare-and-swap on committed elements.
# Concurrent commits writing one of these keys conflict; all other
# writes are last-commit-wins.
cas_guarded_keys = ["_version"]

# Fuse id, label and property filters into the traversal start step
pushdown = true
"#
    }

    /// Parse and validate config from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the text cannot be parsed or fails validation.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: GraphConfig = toml::from_str(content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse config from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!(
                "failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml_str(&content)
    }

    /// Write the default config file if it does not already exist.
    ///
    /// Returns `Ok(())` whether the file was created or already existed.
    pub fn write_default_if_missing(path: &Path) -> Result<()> {
        if !path.exists() {
            std::fs::write(path, Self::default_toml()).map_err(|e| {
                Error::Config(format!(
                    "failed to write default config file '{}': {}",
                    path.display(),
                    e
                ))
            })?;
        }
        Ok(())
    }

    /// Serialize this config to TOML and write it to the given path.
    pub fn write_to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("failed to serialize config: {}", e)))?;
        std::fs::write(path, content).map_err(|e| {
            Error::Config(format!(
                "failed to write config file '{}': {}",
                path.display(),
                e
            ))
        })
    }
}
