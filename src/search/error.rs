//! # Search Error Types Module
//!
//! Failures while retrieving passages for a question. Only database failures
//! reach the caller of a keyword search; embedding and vector index failures
//! are handled by falling back to keyword retrieval.

use thiserror::Error;

use crate::error::Error as CrateError;
use crate::index::DbError;

/// Errors that can occur during search operations
#[derive(Debug, Error)]
pub enum SearchError {
    /// Error occurred during database operations
    #[error("Database error: {0}")]
    Database(#[from] DbError),

    /// Error occurred during embedding generation
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// Invalid search parameters
    #[error("Invalid search parameters: {0}")]
    InvalidParameters(String),
}

impl From<SearchError> for CrateError {
    fn from(err: SearchError) -> Self {
        match err {
            SearchError::Database(e) => e.into(),
            _ => CrateError::Search(err.to_string()),
        }
    }
}
