//! Error types for the crawler module

use crate::error::Error as CrateError;
use crate::storage::StorageError;
use thiserror::Error;

/// Error type for crawler operations
#[derive(Debug, Error)]
pub enum CrawlError {
    /// The start URL could not be parsed
    #[error("URL parsing error: {0}")]
    UrlParse(#[from] url::ParseError),

    /// The start URL has no host to restrict the crawl to
    #[error("URL has no host: {0}")]
    MissingHost(String),

    /// Writing a page to the object store failed
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Other errors
    #[error("{0}")]
    Other(String),
}

impl From<CrawlError> for CrateError {
    fn from(err: CrawlError) -> Self {
        match err {
            CrawlError::Storage(e) => e.into(),
            _ => CrateError::Crawl(err.to_string()),
        }
    }
}
