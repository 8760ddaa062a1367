//! Error types for the object store

use crate::error::Error as CrateError;
use std::io;
use thiserror::Error;

/// Error type for object store operations
#[derive(Debug, Error)]
pub enum StorageError {
    /// The backing store could not be read or written
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// The key is not a valid object key
    #[error("Invalid object key: {0}")]
    InvalidKey(String),

    /// The object exists but is not a valid document
    #[error("Malformed object {key}: {source}")]
    Malformed {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

impl StorageError {
    /// Whether the error means the store itself is unusable, as opposed to one bad object
    pub fn is_fatal(&self) -> bool {
        !matches!(self, StorageError::Malformed { .. })
    }
}

impl From<StorageError> for CrateError {
    fn from(err: StorageError) -> Self {
        CrateError::Storage(err.to_string())
    }
}
