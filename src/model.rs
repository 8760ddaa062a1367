//! # LLM Client Module
//!
//! A client pairing a completion model with an embedding model, both wrapped
//! in rate limiters so a burst of chat questions or an embedding run stays
//! within the provider quota.
//!
//! ## Key Components
//!
//! - `Client`: the completion and embedding models used by the chatbot and the indexer
//! - `RateLimitedCompletionModel`: adds rate limiting to any completion model
//! - `RateLimitedEmbeddingModel`: adds rate limiting to any embedding model
//! - `EmbeddingConversion`: conversion of `rig` embeddings to `f32` blobs

use std::num::NonZeroU32;

use governor::{Quota, RateLimiter};
use ratelimited_completion::RateLimitedCompletionModel;
use ratelimited_embedding::RateLimitedEmbeddingModel;
use rig::{completion::CompletionModel, embeddings::EmbeddingModel, providers::gemini};

use crate::config::LlmConfig;
use crate::error::Result;

pub mod embedding;
#[cfg(test)]
pub mod mock_model;
pub mod ratelimited_completion;
pub mod ratelimited_embedding;

pub use embedding::EmbeddingConversion;

/// Embedding requests allowed per minute
const EMBEDDING_REQUESTS_PER_MINUTE: u32 = 1000;

#[derive(Debug, Clone)]
pub struct Client<C, E>
where
    C: CompletionModel,
    E: EmbeddingModel,
{
    completion_model: C,
    embedding_model: E,
}

pub struct RateLimitResponse<T> {
    #[allow(dead_code)]
    response: T,
}

/// The Gemini-backed client used by the binary
pub type GeminiClient = Client<
    RateLimitedCompletionModel<gemini::completion::CompletionModel>,
    RateLimitedEmbeddingModel<gemini::embedding::EmbeddingModel>,
>;

impl GeminiClient {
    /// Build a Gemini client from the LLM settings
    ///
    /// Fails with a configuration error when no API key is set.
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        let gemini_client = gemini::Client::new(config.require_api_key()?);
        Ok(Self::new_gemini(
            gemini_client,
            &config.model,
            config.requests_per_minute,
        ))
    }

    pub fn new_gemini(gemini_client: gemini::Client, model: &str, requests_per_minute: u32) -> Self {
        let completion_limiter = RateLimiter::direct(Quota::per_minute(
            NonZeroU32::new(requests_per_minute).unwrap_or(NonZeroU32::MIN),
        ));
        let embedding_limiter = RateLimiter::direct(Quota::per_minute(
            NonZeroU32::new(EMBEDDING_REQUESTS_PER_MINUTE).unwrap_or(NonZeroU32::MIN),
        ));
        let completion_model = RateLimitedCompletionModel::new(
            gemini_client.completion_model(model),
            completion_limiter,
        );
        let embedding_model = RateLimitedEmbeddingModel::new(
            gemini_client.embedding_model(gemini::embedding::EMBEDDING_004),
            embedding_limiter,
        );
        Self::new(completion_model, embedding_model)
    }
}

impl<C, E> Client<C, E>
where
    C: CompletionModel,
    E: EmbeddingModel,
{
    pub fn new(completion_model: C, embedding_model: E) -> Self {
        Self {
            completion_model,
            embedding_model,
        }
    }

    pub fn completion(&self) -> &C {
        &self.completion_model
    }

    pub fn embedding(&self) -> &E {
        &self.embedding_model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LlmConfig;
    use crate::error::Error;

    #[test]
    fn test_from_config_requires_api_key() {
        let result = GeminiClient::from_config(&LlmConfig::default());
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_from_config_with_key() {
        let config = LlmConfig {
            api_key: Some("test-key".to_string()),
            requests_per_minute: 0,
            ..LlmConfig::default()
        };
        assert!(GeminiClient::from_config(&config).is_ok());
    }
}
