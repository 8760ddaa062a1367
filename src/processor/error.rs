//! Error types for the processor module

use crate::error::Error as CrateError;
use crate::index::DbError;
use crate::storage::StorageError;
use thiserror::Error;

/// Error type for processor operations
#[derive(Debug, Error)]
pub enum ProcessError {
    /// The page payload could not be parsed
    #[error("Parse error: {0}")]
    Parse(String),

    /// Chunking configuration is unusable
    #[error("Chunking error: {0}")]
    Chunking(String),

    /// Object store failure
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Document store failure
    #[error("Database error: {0}")]
    Database(#[from] DbError),
}

impl ProcessError {
    /// Whether the error aborts the batch rather than skipping one page
    pub fn is_fatal(&self) -> bool {
        match self {
            ProcessError::Storage(e) => e.is_fatal(),
            ProcessError::Database(_) | ProcessError::Chunking(_) => true,
            ProcessError::Parse(_) => false,
        }
    }
}

impl From<ProcessError> for CrateError {
    fn from(err: ProcessError) -> Self {
        match err {
            ProcessError::Storage(e) => e.into(),
            ProcessError::Database(e) => e.into(),
            ProcessError::Parse(_) | ProcessError::Chunking(_) => CrateError::Process(err.to_string()),
        }
    }
}
