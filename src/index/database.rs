//! Database operations for the index module

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future;
use libsql::{Connection, Row, params};
use rig::completion::CompletionModel;
use rig::embeddings::{Embedding, EmbeddingModel};
use tokio::sync::{Semaphore, mpsc};
use tracing::{debug, info, instrument, warn};

use crate::config::DocumentStoreConfig;
use crate::index::error::DbError;
use crate::index::schema::{self, VECTOR_INDEX};
use crate::index::{IndexedPassage, VectorMatch};
use crate::model::{Client, EmbeddingConversion};
use crate::processor::PassageRecord;

const PASSAGE_COLUMNS: &str = "source_url, text, chunk_index, processed_at, title, description";

/// Progress message sent for every passage that received an embedding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbedProgress {
    /// ID of the embedded passage
    pub passage_id: i64,

    /// URL the passage came from
    pub source_url: String,
}

/// Database manager for the document store
#[derive(Clone)]
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Create a new database manager
    #[instrument(skip(conn))]
    pub async fn new(conn: Connection) -> Result<Self, DbError> {
        schema::initialize_schema(&conn).await?;

        Ok(Self { conn })
    }

    /// Create a new database manager from a path
    pub async fn new_from_path(path: &str) -> Result<Self, DbError> {
        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DbError::Connection(format!("Failed to open database: {}", e)))?;

        let conn = db
            .connect()
            .map_err(|e| DbError::Connection(format!("Failed to connect to database: {}", e)))?;

        Self::new(conn).await
    }

    /// Open the configured document store, local or remote
    pub async fn connect(config: &DocumentStoreConfig) -> Result<Self, DbError> {
        if !config.is_remote() {
            return Self::new_from_path(&config.url).await;
        }

        let token = config.auth_token.clone().unwrap_or_default();
        let db = libsql::Builder::new_remote(config.url.clone(), token)
            .build()
            .await
            .map_err(|e| DbError::Connection(format!("Failed to open {}: {}", config.url, e)))?;

        let conn = db
            .connect()
            .map_err(|e| DbError::Connection(format!("Failed to connect to database: {}", e)))?;

        Self::new(conn).await
    }

    /// Replace every passage of `source_url` in `collection` with `passages`
    ///
    /// The delete and the inserts run in one transaction, so readers see either
    /// the old passages or the new ones. Embeddings of the old passages are
    /// removed with them.
    #[instrument(skip(self, passages), fields(count = passages.len()))]
    pub async fn replace_passages(
        &self,
        collection: &str,
        source_url: &str,
        passages: &[PassageRecord],
    ) -> Result<usize, DbError> {
        if let Some(other) = passages.iter().find(|p| p.source_url != source_url) {
            return Err(DbError::Data(format!(
                "Passage from {} cannot replace passages of {}",
                other.source_url, source_url
            )));
        }

        let tx = self
            .conn
            .transaction()
            .await
            .map_err(|e| DbError::Transaction(format!("Failed to start transaction: {}", e)))?;

        tx.execute(
            "DELETE FROM passage_embeddings WHERE passage_id IN
                (SELECT id FROM passages WHERE collection = ? AND source_url = ?)",
            params![collection, source_url],
        )
        .await
        .map_err(|e| DbError::Query(format!("Failed to delete embeddings: {}", e)))?;

        let removed = tx
            .execute(
                "DELETE FROM passages WHERE collection = ? AND source_url = ?",
                params![collection, source_url],
            )
            .await
            .map_err(|e| DbError::Query(format!("Failed to delete passages: {}", e)))?;

        for passage in passages {
            tx.execute(
                "INSERT INTO passages (collection, source_url, chunk_index, text, title, description, processed_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?)",
                params![
                    collection,
                    passage.source_url.as_str(),
                    i64::from(passage.chunk_index),
                    passage.text.as_str(),
                    passage.title.clone(),
                    passage.description.clone(),
                    passage.processed_at.timestamp_millis(),
                ],
            )
            .await
            .map_err(|e| DbError::Query(format!("Failed to add passage: {}", e)))?;
        }

        tx.commit()
            .await
            .map_err(|e| DbError::Transaction(format!("Failed to commit transaction: {}", e)))?;

        debug!("Replaced {} passages with {}", removed, passages.len());
        Ok(passages.len())
    }

    /// Passages of one page, in chunk order
    pub async fn passages_for_source(
        &self,
        collection: &str,
        source_url: &str,
    ) -> Result<Vec<PassageRecord>, DbError> {
        let mut rows = self
            .conn
            .query(
                &format!(
                    "SELECT {PASSAGE_COLUMNS} FROM passages
                     WHERE collection = ? AND source_url = ?
                     ORDER BY chunk_index"
                ),
                params![collection, source_url],
            )
            .await
            .map_err(|e| DbError::Query(format!("Failed to get passages: {}", e)))?;

        let mut passages = Vec::new();
        while let Some(row) = rows.next().await? {
            passages.push(row_to_passage(&row, 0)?);
        }
        Ok(passages)
    }

    /// Every passage of a collection, ordered by source URL then chunk index
    #[instrument(skip(self))]
    pub async fn all_passages(&self, collection: &str) -> Result<Vec<PassageRecord>, DbError> {
        let mut rows = self
            .conn
            .query(
                &format!(
                    "SELECT {PASSAGE_COLUMNS} FROM passages
                     WHERE collection = ?
                     ORDER BY source_url, chunk_index"
                ),
                params![collection],
            )
            .await
            .map_err(|e| DbError::Query(format!("Failed to get passages: {}", e)))?;

        let mut passages = Vec::new();
        while let Some(row) = rows.next().await? {
            passages.push(row_to_passage(&row, 0)?);
        }
        Ok(passages)
    }

    /// Delete every passage of a collection, returning how many were removed
    #[instrument(skip(self))]
    pub async fn drop_collection(&self, collection: &str) -> Result<usize, DbError> {
        let tx = self
            .conn
            .transaction()
            .await
            .map_err(|e| DbError::Transaction(format!("Failed to start transaction: {}", e)))?;

        tx.execute(
            "DELETE FROM passage_embeddings WHERE passage_id IN
                (SELECT id FROM passages WHERE collection = ?)",
            params![collection],
        )
        .await
        .map_err(|e| DbError::Query(format!("Failed to delete embeddings: {}", e)))?;

        let removed = tx
            .execute("DELETE FROM passages WHERE collection = ?", params![collection])
            .await
            .map_err(|e| DbError::Query(format!("Failed to delete passages: {}", e)))?;

        tx.commit()
            .await
            .map_err(|e| DbError::Transaction(format!("Failed to commit transaction: {}", e)))?;

        Ok(removed as usize)
    }

    /// When the passages of a page were last written, if it has any
    pub async fn source_processed_at(
        &self,
        collection: &str,
        source_url: &str,
    ) -> Result<Option<DateTime<Utc>>, DbError> {
        let mut rows = self
            .conn
            .query(
                "SELECT MAX(processed_at) FROM passages WHERE collection = ? AND source_url = ?",
                params![collection, source_url],
            )
            .await
            .map_err(|e| DbError::Query(format!("Failed to get processed_at: {}", e)))?;

        let Some(row) = rows.next().await? else {
            return Ok(None);
        };
        let millis: Option<i64> = row
            .get(0)
            .map_err(|e| DbError::Data(format!("Failed to get processed_at: {}", e)))?;
        millis.map(timestamp_from_millis).transpose()
    }

    /// Number of passages in a collection
    pub async fn count_passages(&self, collection: &str) -> Result<usize, DbError> {
        let mut rows = self
            .conn
            .query(
                "SELECT COUNT(*) FROM passages WHERE collection = ?",
                params![collection],
            )
            .await
            .map_err(|e| DbError::Query(format!("Failed to count passages: {}", e)))?;

        let count: i64 = match rows.next().await? {
            Some(row) => row
                .get(0)
                .map_err(|e| DbError::Data(format!("Failed to get count: {}", e)))?,
            None => 0,
        };
        Ok(count as usize)
    }

    /// Passages of a collection that have no embedding yet
    pub async fn passages_missing_embeddings(
        &self,
        collection: &str,
    ) -> Result<Vec<IndexedPassage>, DbError> {
        let mut rows = self
            .conn
            .query(
                "SELECT p.id, p.source_url, p.text, p.chunk_index, p.processed_at, p.title, p.description
                 FROM passages p
                 LEFT JOIN passage_embeddings e ON e.passage_id = p.id
                 WHERE p.collection = ? AND e.passage_id IS NULL
                 ORDER BY p.source_url, p.chunk_index",
                params![collection],
            )
            .await
            .map_err(|e| DbError::Query(format!("Failed to get passages: {}", e)))?;

        let mut passages = Vec::new();
        while let Some(row) = rows.next().await? {
            passages.push(IndexedPassage {
                id: row
                    .get(0)
                    .map_err(|e| DbError::Data(format!("Failed to get id: {}", e)))?,
                passage: row_to_passage(&row, 1)?,
            });
        }
        Ok(passages)
    }

    /// Store (or overwrite) the embedding of a passage
    pub async fn store_embedding(&self, passage_id: i64, embedding: &Embedding) -> Result<(), DbError> {
        let embedding_blob = embedding.to_binary();

        self.conn
            .execute(
                "INSERT INTO passage_embeddings (passage_id, embedding) VALUES (?, ?)
                 ON CONFLICT(passage_id) DO UPDATE SET embedding = excluded.embedding",
                params![passage_id, libsql::Value::Blob(embedding_blob)],
            )
            .await
            .map_err(|e| DbError::Query(format!("Failed to store embedding: {}", e)))?;

        Ok(())
    }

    /// Embed every passage of `collection` that has no embedding yet
    ///
    /// # Arguments
    ///
    /// * `client` - Client whose embedding model produces the vectors
    /// * `collection` - Collection to embed
    /// * `concurrency` - Maximum number of concurrent embedding requests
    /// * `progress_sender` - Optional channel receiving one message per embedded passage
    ///
    /// # Returns
    ///
    /// The number of passages embedded. A passage the model fails to embed is
    /// logged and left for the next run; a failed database write aborts.
    pub async fn embed_passages<C, E>(
        &self,
        client: &Client<C, E>,
        collection: &str,
        concurrency: usize,
        progress_sender: Option<mpsc::Sender<EmbedProgress>>,
    ) -> Result<usize, DbError>
    where
        C: CompletionModel + Clone + Send + Sync + 'static,
        E: EmbeddingModel + Clone + Send + Sync + 'static,
    {
        let passages = self.passages_missing_embeddings(collection).await?;
        info!("Found {} passages to embed", passages.len());

        let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
        let mut tasks = Vec::new();

        for indexed in passages {
            let permit = semaphore.clone().acquire_owned();
            let client = client.clone();
            let db = self.clone();
            let progress_sender = progress_sender.clone();

            let task = tokio::spawn(async move {
                let _permit = permit
                    .await
                    .map_err(|e| DbError::Other(format!("Failed to acquire semaphore: {}", e)))?;

                let IndexedPassage { id, passage } = indexed;
                debug!("Embedding passage {} from {}", id, passage.source_url);

                let embedding = match client.embedding().embed_texts(vec![passage.text]).await {
                    Ok(mut embeddings) if !embeddings.is_empty() => embeddings.swap_remove(0),
                    Ok(_) => {
                        warn!("No embedding returned for passage {}", id);
                        return Ok(None);
                    }
                    Err(e) => {
                        warn!("Failed to embed passage {}: {}", id, e);
                        return Ok(None);
                    }
                };

                db.store_embedding(id, &embedding).await?;

                if let Some(sender) = progress_sender {
                    // The receiver may have gone away; progress is best effort
                    let _ = sender
                        .send(EmbedProgress {
                            passage_id: id,
                            source_url: passage.source_url,
                        })
                        .await;
                }

                Ok::<Option<i64>, DbError>(Some(id))
            });

            tasks.push(task);
        }

        let task_count = tasks.len();
        let results = future::join_all(tasks).await;

        let mut success_count = 0;
        let mut first_error = None;
        for result in results {
            match result {
                Ok(Ok(Some(_))) => success_count += 1,
                Ok(Ok(None)) => {}
                Ok(Err(e)) => {
                    warn!("Failed to store embedding: {}", e);
                    first_error.get_or_insert(e);
                }
                Err(e) => {
                    first_error.get_or_insert(DbError::Other(format!("Task failed: {}", e)));
                }
            }
        }

        if let Some(e) = first_error {
            return Err(e);
        }

        info!("Embedded {}/{} passages", success_count, task_count);
        Ok(success_count)
    }

    /// Nearest passages of `collection` to `query`, closest first
    #[instrument(skip(self, query))]
    pub async fn vector_search(
        &self,
        collection: &str,
        query: &Embedding,
        limit: usize,
    ) -> Result<Vec<VectorMatch>, DbError> {
        let query_blob = query.to_binary();
        // The index spans all collections, so over-fetch before filtering
        let candidates = (limit.max(1) * 4) as i64;

        let sql = format!(
            "SELECT p.source_url, p.text, p.chunk_index, p.processed_at, p.title, p.description,
                    vector_distance_cos(e.embedding, ?1) AS distance
             FROM vector_top_k('{VECTOR_INDEX}', ?1, ?2) AS v
             JOIN passage_embeddings e ON e.rowid = v.id
             JOIN passages p ON p.id = e.passage_id
             WHERE p.collection = ?3
             ORDER BY distance ASC, p.source_url ASC, p.chunk_index ASC
             LIMIT ?4"
        );

        let mut rows = self
            .conn
            .query(
                &sql,
                params![
                    libsql::Value::Blob(query_blob),
                    candidates,
                    collection,
                    limit as i64
                ],
            )
            .await
            .map_err(|e| DbError::Query(format!("Failed to run vector search: {}", e)))?;

        let mut matches = Vec::new();
        while let Some(row) = rows.next().await? {
            matches.push(VectorMatch {
                passage: row_to_passage(&row, 0)?,
                distance: row
                    .get(6)
                    .map_err(|e| DbError::Data(format!("Failed to get distance: {}", e)))?,
            });
        }
        Ok(matches)
    }
}

/// Convert the passage columns of a row, starting at column `offset`
fn row_to_passage(row: &Row, offset: i32) -> Result<PassageRecord, DbError> {
    let chunk_index: i64 = row
        .get(offset + 2)
        .map_err(|e| DbError::Data(format!("Failed to get chunk_index: {}", e)))?;
    let processed_at: i64 = row
        .get(offset + 3)
        .map_err(|e| DbError::Data(format!("Failed to get processed_at: {}", e)))?;

    Ok(PassageRecord {
        source_url: row
            .get(offset)
            .map_err(|e| DbError::Data(format!("Failed to get source_url: {}", e)))?,
        text: row
            .get(offset + 1)
            .map_err(|e| DbError::Data(format!("Failed to get text: {}", e)))?,
        chunk_index: u32::try_from(chunk_index)
            .map_err(|e| DbError::Data(format!("Invalid chunk_index {}: {}", chunk_index, e)))?,
        processed_at: timestamp_from_millis(processed_at)?,
        title: row
            .get(offset + 4)
            .map_err(|e| DbError::Data(format!("Failed to get title: {}", e)))?,
        description: row
            .get(offset + 5)
            .map_err(|e| DbError::Data(format!("Failed to get description: {}", e)))?,
    })
}

fn timestamp_from_millis(millis: i64) -> Result<DateTime<Utc>, DbError> {
    DateTime::from_timestamp_millis(millis)
        .ok_or_else(|| DbError::Data(format!("Invalid timestamp {}", millis)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::mock_model::{MockCompletionModel, MockEmbeddingModel};
    use tempfile::tempdir;

    async fn setup_test_db() -> Result<(Database, tempfile::TempDir), DbError> {
        let temp_dir = tempdir().unwrap();
        let db_path = temp_dir
            .path()
            .join("test.db")
            .to_string_lossy()
            .to_string();

        let db = Database::new_from_path(&db_path).await?;

        Ok((db, temp_dir))
    }

    fn passage(url: &str, index: u32, text: &str) -> PassageRecord {
        PassageRecord {
            source_url: url.to_string(),
            text: text.to_string(),
            chunk_index: index,
            processed_at: DateTime::from_timestamp_millis(1_700_000_000_123).unwrap(),
            title: Some("Title".to_string()),
            description: None,
        }
    }

    #[tokio::test]
    async fn test_database_initialization() {
        let (db, _temp_dir) = setup_test_db().await.unwrap();

        let mut result = db
            .conn
            .query(
                "SELECT name FROM sqlite_master WHERE type='table'
                 AND name IN ('passages', 'passage_embeddings')",
                params![],
            )
            .await
            .unwrap();

        let mut tables = Vec::new();
        while let Ok(Some(row)) = result.next().await {
            let table_name: String = row.get(0).unwrap();
            tables.push(table_name);
        }

        assert_eq!(tables.len(), 2);
        assert!(tables.contains(&"passages".to_string()));
        assert!(tables.contains(&"passage_embeddings".to_string()));
    }

    #[tokio::test]
    async fn test_replace_and_read_passages() {
        let (db, _temp_dir) = setup_test_db().await.unwrap();
        let url = "https://ex.com/about";
        let records = vec![passage(url, 0, "first"), passage(url, 1, "second")];

        assert_eq!(db.replace_passages("ex", url, &records).await.unwrap(), 2);

        let stored = db.passages_for_source("ex", url).await.unwrap();
        assert_eq!(stored, records);
        assert_eq!(db.count_passages("ex").await.unwrap(), 2);
        assert_eq!(db.count_passages("other").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_replace_leaves_no_stale_chunks() {
        let (db, _temp_dir) = setup_test_db().await.unwrap();
        let url = "https://ex.com/about";

        let old: Vec<_> = (0..3).map(|i| passage(url, i, "old")).collect();
        db.replace_passages("ex", url, &old).await.unwrap();
        db.replace_passages("ex", url, &[passage(url, 0, "new")]).await.unwrap();

        let stored = db.passages_for_source("ex", url).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].chunk_index, 0);
        assert_eq!(stored[0].text, "new");

        db.replace_passages("ex", url, &[]).await.unwrap();
        assert!(db.passages_for_source("ex", url).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_replace_rejects_foreign_passages() {
        let (db, _temp_dir) = setup_test_db().await.unwrap();
        let result = db
            .replace_passages("ex", "https://ex.com/a", &[passage("https://ex.com/b", 0, "x")])
            .await;
        assert!(matches!(result, Err(DbError::Data(_))));
    }

    #[tokio::test]
    async fn test_drop_collection_is_scoped() {
        let (db, _temp_dir) = setup_test_db().await.unwrap();
        db.replace_passages("a", "https://a.com/", &[passage("https://a.com/", 0, "a")])
            .await
            .unwrap();
        db.replace_passages("b", "https://b.com/", &[passage("https://b.com/", 0, "b")])
            .await
            .unwrap();

        assert_eq!(db.drop_collection("a").await.unwrap(), 1);
        assert!(db.all_passages("a").await.unwrap().is_empty());
        assert_eq!(db.all_passages("b").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_all_passages_order() {
        let (db, _temp_dir) = setup_test_db().await.unwrap();
        db.replace_passages("ex", "https://ex.com/b", &[passage("https://ex.com/b", 0, "b0")])
            .await
            .unwrap();
        db.replace_passages(
            "ex",
            "https://ex.com/a",
            &[passage("https://ex.com/a", 0, "a0"), passage("https://ex.com/a", 1, "a1")],
        )
        .await
        .unwrap();

        let texts: Vec<_> = db
            .all_passages("ex")
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.text)
            .collect();
        assert_eq!(texts, vec!["a0", "a1", "b0"]);
    }

    #[tokio::test]
    async fn test_source_processed_at() {
        let (db, _temp_dir) = setup_test_db().await.unwrap();
        let url = "https://ex.com/";
        assert!(db.source_processed_at("ex", url).await.unwrap().is_none());

        db.replace_passages("ex", url, &[passage(url, 0, "x")]).await.unwrap();
        assert_eq!(
            db.source_processed_at("ex", url).await.unwrap(),
            DateTime::from_timestamp_millis(1_700_000_000_123)
        );
    }

    #[tokio::test]
    async fn test_embed_passages() {
        let (db, _temp_dir) = setup_test_db().await.unwrap();
        let url = "https://ex.com/";
        db.replace_passages("ex", url, &[passage(url, 0, "design"), passage(url, 1, "pricing")])
            .await
            .unwrap();
        assert_eq!(db.passages_missing_embeddings("ex").await.unwrap().len(), 2);

        let client = Client::new(MockCompletionModel::new(), MockEmbeddingModel::new());
        let (tx, mut rx) = mpsc::channel(8);
        let embedded = db.embed_passages(&client, "ex", 2, Some(tx)).await.unwrap();

        assert_eq!(embedded, 2);
        assert!(db.passages_missing_embeddings("ex").await.unwrap().is_empty());
        let mut progress = Vec::new();
        while let Some(message) = rx.recv().await {
            progress.push(message.source_url);
        }
        assert_eq!(progress, vec![url.to_string(), url.to_string()]);

        // New passages for the page need new embeddings
        db.replace_passages("ex", url, &[passage(url, 0, "updated")]).await.unwrap();
        assert_eq!(db.passages_missing_embeddings("ex").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_embedding_failures_are_skipped() {
        let (db, _temp_dir) = setup_test_db().await.unwrap();
        let url = "https://ex.com/";
        db.replace_passages("ex", url, &[passage(url, 0, "design")]).await.unwrap();

        let client = Client::new(MockCompletionModel::new(), MockEmbeddingModel::failing());
        let embedded = db.embed_passages(&client, "ex", 1, None).await.unwrap();

        assert_eq!(embedded, 0);
        assert_eq!(db.passages_missing_embeddings("ex").await.unwrap().len(), 1);
    }
}
