//! Error types for node persistence.

use std::path::PathBuf;
use thiserror::Error;

/// Errors loading or saving the node list.
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// Reading or writing the file failed.
    #[error("Node file '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file does not hold a valid JSON node list.
    #[error("Node file '{path}' is not a valid node list: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}
