use thiserror::Error;

/// Errors raised by the chat interface
#[derive(Debug, Error)]
pub enum Error {
    /// Terminal setup, drawing or restore failed
    #[error("Terminal error: {0}")]
    Io(#[from] std::io::Error),

    /// The event channel was closed
    #[error("Event error: {0}")]
    Event(String),
}

pub type Result<T> = std::result::Result<T, Error>;
