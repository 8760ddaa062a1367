//! Completion model wrapper that waits for a rate limiter before each request.

use std::sync::Arc;

use governor::DefaultDirectRateLimiter;
use rig::completion::{self, CompletionError, CompletionModel, CompletionRequest, CompletionResponse};
use tracing::{Instrument, debug_span, info_span};

use super::RateLimitResponse;

#[derive(Clone)]
pub struct RateLimitedCompletionModel<M: CompletionModel> {
    model: M,
    limiter: Arc<DefaultDirectRateLimiter>,
}

impl<M> RateLimitedCompletionModel<M>
where
    M: CompletionModel,
{
    pub fn new(model: M, limiter: DefaultDirectRateLimiter) -> Self {
        Self {
            model,
            limiter: Arc::new(limiter),
        }
    }
}

impl<M: CompletionModel> CompletionModel for RateLimitedCompletionModel<M> {
    type Response = RateLimitResponse<M::Response>;

    async fn completion(
        &self,
        completion_request: CompletionRequest,
    ) -> Result<completion::CompletionResponse<Self::Response>, CompletionError> {
        self.limiter.until_ready().instrument(debug_span!("limiter")).await;
        let response = self
            .model
            .completion(completion_request)
            .instrument(info_span!("completion"))
            .await?;
        Ok(CompletionResponse {
            choice: response.choice,
            raw_response: RateLimitResponse {
                response: response.raw_response,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::mock_model::MockCompletionModel;
    use governor::{Quota, RateLimiter};
    use rig::agent::AgentBuilder;
    use rig::completion::Prompt;
    use std::num::NonZeroU32;

    fn limiter() -> DefaultDirectRateLimiter {
        RateLimiter::direct(Quota::per_minute(NonZeroU32::new(600).unwrap()))
    }

    #[tokio::test]
    async fn test_passes_response_through() {
        let mock = MockCompletionModel::new();
        mock.set_text_response("Hello there").await;
        let agent = AgentBuilder::new(RateLimitedCompletionModel::new(mock.clone(), limiter())).build();

        let answer = agent.prompt("Hi").await.unwrap();
        assert_eq!(answer, "Hello there");
        assert_eq!(mock.calls(), 1);
    }

    #[tokio::test]
    async fn test_passes_errors_through() {
        let mock = MockCompletionModel::new();
        mock.set_error("quota exceeded").await;
        let agent = AgentBuilder::new(RateLimitedCompletionModel::new(mock, limiter())).build();

        let error = agent.prompt("Hi").await.unwrap_err();
        assert!(error.to_string().contains("quota exceeded"));
    }
}
