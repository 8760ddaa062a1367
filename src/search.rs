//! # Retrieval Module
//!
//! Finds the passages of a site that are relevant to a question and formats
//! them as prompt context. This is the "retrieval" half of the chatbot.
//!
//! ## Key Components
//!
//! - `SearchSystem`: retrieval over one document store with one model client
//! - `SearchOptions`: how many passages to return and how to find them
//! - `SearchResult`: a retrieved passage with its relevance score
//!
//! ## Retrieval Modes
//!
//! - `Keyword` (default): term overlap between the question and each passage,
//!   with common words ignored. Needs nothing beyond the stored passages.
//! - `Vector`: the question is embedded and matched against passage embeddings
//!   through libsql's vector index. Requires an embedding run; any failure
//!   falls back to keyword retrieval.

mod error;
mod search_impl;

use std::fmt;
use std::str::FromStr;

pub use error::SearchError;
pub use search_impl::{
    keyword_search, prepare_rag_context, rank_passages, search_index, vector_search,
};

use crate::index::Database;
use crate::model::Client;
use crate::processor::PassageRecord;

/// How passages are matched against a question
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RetrievalMode {
    #[default]
    Keyword,
    Vector,
}

impl FromStr for RetrievalMode {
    type Err = SearchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "keyword" => Ok(RetrievalMode::Keyword),
            "vector" => Ok(RetrievalMode::Vector),
            other => Err(SearchError::InvalidParameters(format!(
                "unknown retrieval mode '{}', expected 'keyword' or 'vector'",
                other
            ))),
        }
    }
}

impl fmt::Display for RetrievalMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetrievalMode::Keyword => write!(f, "keyword"),
            RetrievalMode::Vector => write!(f, "vector"),
        }
    }
}

/// Options for search queries
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchOptions {
    /// Maximum number of results to return
    pub limit: usize,

    /// Retrieval method
    pub mode: RetrievalMode,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            limit: 6,
            mode: RetrievalMode::default(),
        }
    }
}

/// A retrieved passage
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    /// The passage
    pub passage: PassageRecord,

    /// Relevance score, higher is better
    pub score: f64,
}

/// Search system over one document store
pub struct SearchSystem<C, E>
where
    C: rig::completion::CompletionModel,
    E: rig::embeddings::EmbeddingModel,
{
    db: Database,
    client: Client<C, E>,
}

impl<C, E> SearchSystem<C, E>
where
    C: rig::completion::CompletionModel,
    E: rig::embeddings::EmbeddingModel,
{
    /// Create a new search system with the given database
    pub fn new(db: Database, client: Client<C, E>) -> Self {
        Self { db, client }
    }

    /// Search a collection with the given query and options
    pub async fn search(
        &self,
        collection: &str,
        query: &str,
        options: &SearchOptions,
    ) -> Result<Vec<SearchResult>, SearchError> {
        search_index(&self.db, &self.client, collection, query, options).await
    }
}
