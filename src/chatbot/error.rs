//! Error types for the chatbot module

use thiserror::Error;

use crate::error::Error as CrateError;
use crate::search::SearchError;

/// Errors that end a chatbot request without producing a turn
///
/// LLM failures are not errors here: they come back as a turn marked
/// `AnswerKind::Failed` so the conversation can go on.
#[derive(Debug, Error)]
pub enum ChatError {
    /// Retrieval failed, usually because the document store is unreachable
    #[error("Retrieval failed: {0}")]
    Search(#[from] SearchError),

    /// The question was empty
    #[error("Question is empty")]
    EmptyQuestion,
}

impl From<ChatError> for CrateError {
    fn from(err: ChatError) -> Self {
        match err {
            ChatError::Search(e) => e.into(),
            ChatError::EmptyQuestion => CrateError::Chat(err.to_string()),
        }
    }
}
