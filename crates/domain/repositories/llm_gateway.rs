use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;

use crate::domain::value_objects::chat::{ChatCompletionRequest, ChatStream, ModelSummary};

#[automock]
#[async_trait]
pub trait LlmGateway {
    async fn list_models(&self) -> Result<Vec<ModelSummary>>;

    async fn stream_chat_completion(&self, request: ChatCompletionRequest) -> Result<ChatStream>;

    /// Total cost the provider reports for a finished generation. `None`
    /// when the provider has no usage record for it yet.
    async fn generation_cost(&self, generation_id: &str) -> Result<Option<f64>>;
}
