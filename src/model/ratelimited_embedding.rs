//! Embedding model wrapper that waits for a rate limiter before each batch.

use std::sync::Arc;

use governor::DefaultDirectRateLimiter;
use rig::embeddings::{Embedding, EmbeddingError, EmbeddingModel};
use tracing::{Instrument, debug_span, info_span};

#[derive(Clone)]
pub struct RateLimitedEmbeddingModel<M: EmbeddingModel> {
    model: M,
    limiter: Arc<DefaultDirectRateLimiter>,
}

impl<M> RateLimitedEmbeddingModel<M>
where
    M: EmbeddingModel,
{
    pub fn new(model: M, limiter: DefaultDirectRateLimiter) -> Self {
        Self {
            model,
            limiter: Arc::new(limiter),
        }
    }
}

impl<M: EmbeddingModel> EmbeddingModel for RateLimitedEmbeddingModel<M> {
    const MAX_DOCUMENTS: usize = M::MAX_DOCUMENTS;

    fn ndims(&self) -> usize {
        self.model.ndims()
    }

    async fn embed_texts(
        &self,
        texts: impl IntoIterator<Item = String> + Send,
    ) -> Result<Vec<Embedding>, EmbeddingError> {
        self.limiter.until_ready().instrument(debug_span!("limiter")).await;
        self.model
            .embed_texts(texts)
            .instrument(info_span!("embed_texts"))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::EMBEDDING_DIMS;
    use crate::model::mock_model::MockEmbeddingModel;
    use governor::{Quota, RateLimiter};
    use std::num::NonZeroU32;

    #[tokio::test]
    async fn test_embeds_through_limiter() {
        let limiter = RateLimiter::direct(Quota::per_minute(NonZeroU32::new(600).unwrap()));
        let model = RateLimitedEmbeddingModel::new(MockEmbeddingModel::new(), limiter);

        let embeddings = model
            .embed_texts(vec!["design subscription".to_string()])
            .await
            .unwrap();
        assert_eq!(model.ndims(), EMBEDDING_DIMS);
        assert_eq!(embeddings.len(), 1);
        assert_eq!(embeddings[0].vec, MockEmbeddingModel::vector("design subscription"));
    }
}
