//! Document store module
//!
//! Persists passage records in libsql, grouped into one collection per site,
//! together with optional embeddings used for vector retrieval. The database
//! can be a local file or a remote libsql server.

mod database;
pub mod error;
mod schema;

pub use database::{Database, EmbedProgress};
pub use error::DbError;
pub use schema::EMBEDDING_DIMS;

use crate::processor::PassageRecord;

/// A passage together with its row id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexedPassage {
    /// ID of the passage row
    pub id: i64,

    /// The stored passage
    pub passage: PassageRecord,
}

/// A passage returned by a nearest-neighbour query
#[derive(Debug, Clone, PartialEq)]
pub struct VectorMatch {
    /// The matching passage
    pub passage: PassageRecord,

    /// Cosine distance to the query, smaller is closer
    pub distance: f64,
}
