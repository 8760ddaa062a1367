//! Error types for the sitechat crate

use thiserror::Error;

/// Result type for sitechat operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for sitechat operations
#[derive(Debug, Error)]
pub enum Error {
    /// Missing or invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Object store error
    #[error("Storage error: {0}")]
    Storage(String),

    /// Web crawling error
    #[error("Crawl error: {0}")]
    Crawl(String),

    /// Content processing error
    #[error("Process error: {0}")]
    Process(String),

    /// Document store error
    #[error("Database error: {0}")]
    Database(String),

    /// Retrieval error
    #[error("Search error: {0}")]
    Search(String),

    /// Chatbot error
    #[error("Chat error: {0}")]
    Chat(String),
}
