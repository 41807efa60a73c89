//! # JSON Node File
//!
//! Persists the node list as a pretty-printed JSON array.
//!
//! Missing `attr`, `config` and `status` maps are backfilled on load by the
//! serde defaults of the node type.

use crate::domain::errors::PersistenceError;
use shared_types::entities::Node;
use std::fs;
use std::path::Path;
use std::sync::Arc;

/// Read a node list.
pub fn read_nodes(path: &Path) -> Result<Vec<Node>, PersistenceError> {
    let text = fs::read_to_string(path).map_err(|source| PersistenceError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| PersistenceError::Json {
        path: path.to_path_buf(),
        source,
    })
}

/// Write a node list, replacing the file.
pub fn write_nodes(path: &Path, nodes: &[Arc<Node>]) -> Result<(), PersistenceError> {
    let nodes: Vec<&Node> = nodes.iter().map(AsRef::as_ref).collect();
    let text = serde_json::to_string_pretty(&nodes).map_err(|source| PersistenceError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    fs::write(path, text).map_err(|source| PersistenceError::Io {
        path: path.to_path_buf(),
        source,
    })
}
