//! # Database Schema Module
//!
//! Creates the document store tables on first use.
//!
//! ## Schema Design
//!
//! 1. `passages` - one row per passage, addressed by `(collection, source_url,
//!    chunk_index)`. A collection holds the passages of one site.
//! 2. `passage_embeddings` - optional vector for a passage, keyed by the
//!    passage id and indexed for nearest-neighbour search.
//!
//! Embeddings live in their own table so a passage can exist before (or
//! without) an embedding model ever being configured.

use crate::index::error::DbError;
use libsql::{Connection, params};
use tracing::warn;

/// Dimensionality of stored embeddings
pub const EMBEDDING_DIMS: usize = 768;

/// Name of the vector index used by `vector_top_k`
pub const VECTOR_INDEX: &str = "passage_embeddings_idx";

/// Initialize the database schema
pub async fn initialize_schema(conn: &Connection) -> Result<(), DbError> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS passages (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            collection TEXT NOT NULL,
            source_url TEXT NOT NULL,
            chunk_index INTEGER NOT NULL,
            text TEXT NOT NULL,
            title TEXT,
            description TEXT,
            processed_at INTEGER NOT NULL,
            UNIQUE (collection, source_url, chunk_index)
        )",
        params![],
    )
    .await
    .map_err(|e| DbError::Schema(format!("Failed to create passages table: {}", e)))?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_passages_source ON passages(collection, source_url)",
        params![],
    )
    .await
    .map_err(|e| DbError::Schema(format!("Failed to create index on passages: {}", e)))?;

    conn.execute(
        &format!(
            "CREATE TABLE IF NOT EXISTS passage_embeddings (
                passage_id INTEGER PRIMARY KEY,
                embedding F32_BLOB({}) NOT NULL
            )",
            EMBEDDING_DIMS
        ),
        params![],
    )
    .await
    .map_err(|e| DbError::Schema(format!("Failed to create passage_embeddings table: {}", e)))?;

    // Keyword retrieval still works without the vector extension
    let vector_index_result = conn
        .execute(
            &format!(
                "CREATE INDEX IF NOT EXISTS {} ON passage_embeddings (libsql_vector_idx(embedding))",
                VECTOR_INDEX
            ),
            params![],
        )
        .await;

    if let Err(e) = vector_index_result {
        warn!(
            "Failed to create vector index: {}. Vector search will not be available.",
            e
        );
    }

    Ok(())
}
