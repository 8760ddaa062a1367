//! # Mock Models for Testing
//!
//! `MockCompletionModel` returns a predefined response or error, and
//! `MockEmbeddingModel` turns text into deterministic bag-of-words vectors,
//! so tests exercise the chatbot and the indexer without network calls.

use rig::{
    completion::{
        AssistantContent, CompletionError, CompletionModel, CompletionRequest, CompletionResponse,
    },
    embeddings::{Embedding, EmbeddingError, EmbeddingModel},
    one_or_many::OneOrMany,
};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Mutex;

use crate::index::EMBEDDING_DIMS;

/// A mock completion model for testing purposes.
/// It returns a predefined response or error when `completion` is called.
#[derive(Debug, Clone)]
pub struct MockCompletionModel {
    /// The predefined response to return. Arc<Mutex<>> allows modification after creation if needed.
    response: Arc<Mutex<Option<Result<OneOrMany<AssistantContent>, String>>>>,

    /// Number of completion calls made so far
    calls: Arc<AtomicUsize>,
}

impl MockCompletionModel {
    /// Creates a new mock model that will return a default empty success response.
    pub fn new() -> Self {
        Self {
            response: Arc::new(Mutex::new(None)),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Sets the response that the mock model should return.
    pub async fn set_response(&self, response: OneOrMany<AssistantContent>) {
        let mut guard = self.response.lock().await;
        *guard = Some(Ok(response));
    }

    /// Helper to create a simple text response.
    pub async fn set_text_response(&self, text: &str) {
        let response = OneOrMany::one(AssistantContent::text(text));
        self.set_response(response).await;
    }

    /// Make every following call fail with a provider error.
    pub async fn set_error(&self, message: &str) {
        let mut guard = self.response.lock().await;
        *guard = Some(Err(message.to_string()));
    }

    /// How many times `completion` was called.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Default for MockCompletionModel {
    fn default() -> Self {
        Self::new()
    }
}

impl CompletionModel for MockCompletionModel {
    type Response = String;

    async fn completion(
        &self,
        _completion_request: CompletionRequest,
    ) -> Result<CompletionResponse<Self::Response>, CompletionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let response = {
            let guard = self.response.lock().await;
            guard.clone()
        };
        match response {
            Some(Ok(result)) => Ok(CompletionResponse {
                choice: result,
                raw_response: "".to_string(),
            }),
            Some(Err(message)) => Err(CompletionError::ProviderError(message)),
            None => Ok(CompletionResponse {
                choice: OneOrMany::one(AssistantContent::text("")),
                raw_response: "".to_string(),
            }),
        }
    }
}

/// A mock embedding model hashing each word into one of `EMBEDDING_DIMS` buckets.
/// Texts sharing words get similar vectors.
#[derive(Debug, Clone, Default)]
pub struct MockEmbeddingModel {
    fail: bool,
}

impl MockEmbeddingModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// A model whose every request fails.
    pub fn failing() -> Self {
        Self { fail: true }
    }

    /// The vector produced for `text`.
    pub fn vector(text: &str) -> Vec<f64> {
        let mut vec = vec![0.0; EMBEDDING_DIMS];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|word| !word.is_empty())
        {
            let mut hasher = DefaultHasher::new();
            word.to_lowercase().hash(&mut hasher);
            vec[(hasher.finish() % EMBEDDING_DIMS as u64) as usize] += 1.0;
        }
        let norm = vec.iter().map(|v| v * v).sum::<f64>().sqrt();
        if norm > 0.0 {
            vec.iter_mut().for_each(|v| *v /= norm);
        } else {
            vec[0] = 1.0;
        }
        vec
    }
}

impl EmbeddingModel for MockEmbeddingModel {
    const MAX_DOCUMENTS: usize = 100;

    fn ndims(&self) -> usize {
        EMBEDDING_DIMS
    }

    async fn embed_texts(
        &self,
        texts: impl IntoIterator<Item = String> + Send,
    ) -> Result<Vec<Embedding>, EmbeddingError> {
        let texts: Vec<String> = texts.into_iter().collect();
        if self.fail {
            return Err(EmbeddingError::ProviderError("mock embedding failure".to_string()));
        }
        Ok(texts
            .into_iter()
            .map(|document| Embedding {
                vec: Self::vector(&document),
                document,
            })
            .collect())
    }
}
