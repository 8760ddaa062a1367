//! Retrieval implementations and RAG context assembly

use std::collections::BTreeSet;

use rig::completion::CompletionModel;
use rig::embeddings::EmbeddingModel;
use tracing::{debug, instrument, warn};

use super::error::SearchError;
use super::{RetrievalMode, SearchOptions, SearchResult};
use crate::index::{Database, VectorMatch};
use crate::model::Client;
use crate::processor::PassageRecord;

/// Words too common to say anything about relevance
const STOP_WORDS: &[&str] = &[
    "a", "about", "an", "and", "are", "as", "at", "be", "but", "by", "can", "could", "did",
    "do", "does", "for", "from", "has", "have", "how", "i", "if", "in", "into", "is", "it",
    "its", "me", "my", "of", "on", "or", "our", "so", "than", "that", "the", "their", "them",
    "there", "these", "they", "this", "to", "us", "was", "we", "were", "what", "when",
    "where", "which", "who", "why", "will", "with", "would", "you", "your",
];

/// Cosine distance beyond which a passage is not related to the query
pub const MAX_VECTOR_DISTANCE: f64 = 0.6;

/// Lowercased content words of `text`
fn terms(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .map(str::to_lowercase)
        .filter(|word| !STOP_WORDS.contains(&word.as_str()))
}

/// Score passages against a query by term overlap and keep the best `limit`
///
/// Each distinct query term found in a passage (text or page title)
/// contributes `1 + ln(occurrences)`, normalised by the number of query terms.
/// Passages without any query term are dropped. Equal scores are ordered by
/// source URL and chunk index, so the ranking is deterministic.
pub fn rank_passages(passages: Vec<PassageRecord>, query: &str, limit: usize) -> Vec<SearchResult> {
    let query_terms: BTreeSet<String> = terms(query).collect();
    if query_terms.is_empty() || limit == 0 {
        return Vec::new();
    }

    let mut results: Vec<SearchResult> = passages
        .into_iter()
        .filter_map(|passage| {
            let title = passage.title.as_deref().unwrap_or_default();
            let passage_terms: Vec<String> = terms(&passage.text).chain(terms(title)).collect();

            let score: f64 = query_terms
                .iter()
                .map(|term| passage_terms.iter().filter(|t| *t == term).count())
                .filter(|&count| count > 0)
                .map(|count| 1.0 + (count as f64).ln())
                .sum();

            (score > 0.0).then(|| SearchResult {
                passage,
                score: score / query_terms.len() as f64,
            })
        })
        .collect();

    results.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.passage.source_url.cmp(&b.passage.source_url))
            .then_with(|| a.passage.chunk_index.cmp(&b.passage.chunk_index))
    });
    results.truncate(limit);
    results
}

/// Keyword retrieval over every passage of a collection
#[instrument(skip(db))]
pub async fn keyword_search(
    db: &Database,
    collection: &str,
    query: &str,
    limit: usize,
) -> Result<Vec<SearchResult>, SearchError> {
    let passages = db.all_passages(collection).await?;
    let results = rank_passages(passages, query, limit);
    debug!("Keyword search matched {} passages", results.len());
    Ok(results)
}

/// Vector retrieval: embed the query and ask the vector index for neighbours
#[instrument(skip(db, client))]
pub async fn vector_search<C, E>(
    db: &Database,
    client: &Client<C, E>,
    collection: &str,
    query: &str,
    limit: usize,
) -> Result<Vec<SearchResult>, SearchError>
where
    C: CompletionModel,
    E: EmbeddingModel,
{
    let query_embedding = client
        .embedding()
        .embed_texts(vec![query.to_string()])
        .await
        .map_err(|e| SearchError::Embedding(format!("Failed to generate embedding: {}", e)))?
        .into_iter()
        .next()
        .ok_or_else(|| SearchError::Embedding("No embedding returned for query".to_string()))?;

    let matches = db
        .vector_search(collection, &query_embedding, limit)
        .await?;

    Ok(close_matches(matches))
}

/// Keep matches within `MAX_VECTOR_DISTANCE`, scored by cosine similarity
fn close_matches(matches: Vec<VectorMatch>) -> Vec<SearchResult> {
    matches
        .into_iter()
        .filter(|m| m.distance <= MAX_VECTOR_DISTANCE)
        .map(|m| SearchResult {
            passage: m.passage,
            score: 1.0 - m.distance,
        })
        .collect()
}

/// Search the index with the given query and options
///
/// Vector retrieval that fails for any reason (no embeddings, no vector
/// index, embedding error) falls back to keyword retrieval.
pub async fn search_index<C, E>(
    db: &Database,
    client: &Client<C, E>,
    collection: &str,
    query: &str,
    options: &SearchOptions,
) -> Result<Vec<SearchResult>, SearchError>
where
    C: CompletionModel,
    E: EmbeddingModel,
{
    if options.limit == 0 {
        return Err(SearchError::InvalidParameters("limit must be greater than 0".to_string()));
    }

    match options.mode {
        RetrievalMode::Keyword => keyword_search(db, collection, query, options.limit).await,
        RetrievalMode::Vector => {
            match vector_search(db, client, collection, query, options.limit).await {
                Ok(results) if !results.is_empty() => Ok(results),
                Ok(_) => {
                    debug!("Vector search found nothing, trying keywords");
                    keyword_search(db, collection, query, options.limit).await
                }
                Err(e) => {
                    warn!("Vector search failed, falling back to keywords: {}", e);
                    keyword_search(db, collection, query, options.limit).await
                }
            }
        }
    }
}

/// Format retrieved passages as the context block of a prompt
pub fn prepare_rag_context(results: &[SearchResult]) -> String {
    results
        .iter()
        .map(|result| {
            let passage = &result.passage;
            let mut block = format!("Source: {}\n", passage.source_url);
            if let Some(title) = &passage.title {
                block.push_str(&format!("Title: {}\n", title));
            }
            if let Some(description) = &passage.description {
                block.push_str(&format!("Description: {}\n", description));
            }
            block.push_str(&format!("Content: {}", passage.text));
            block
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;

    fn vector_match(url: &str, distance: f64) -> VectorMatch {
        VectorMatch {
            passage: PassageRecord {
                source_url: url.to_string(),
                text: "text".to_string(),
                chunk_index: 0,
                processed_at: DateTime::from_timestamp(0, 0).unwrap(),
                title: None,
                description: None,
            },
            distance,
        }
    }

    #[test]
    fn test_close_matches_drops_distant_passages() {
        let results = close_matches(vec![
            vector_match("https://ex.com/a", 0.1),
            vector_match("https://ex.com/b", MAX_VECTOR_DISTANCE),
            vector_match("https://ex.com/c", 0.9),
        ]);

        let urls: Vec<&str> = results.iter().map(|r| r.passage.source_url.as_str()).collect();
        assert_eq!(urls, vec!["https://ex.com/a", "https://ex.com/b"]);
        assert!((results[0].score - 0.9).abs() < 1e-9);
    }

    #[test]
    fn test_close_matches_all_distant_is_empty() {
        let results = close_matches(vec![vector_match("https://ex.com/a", 1.2)]);
        assert!(results.is_empty());
    }
}
