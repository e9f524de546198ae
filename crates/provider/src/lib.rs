pub mod openai;

use async_trait::async_trait;
use graxy_core::error::ProxyError;
use graxy_core::types::openai::{ChatCompletionRequest, ChatCompletionResponse};

/// Reply used when the upstream returns no usable choice.
pub const FALLBACK_REPLY: &str = "sorry, i could not produce a response.";

/// An upstream chat-completion API.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Short name used in logs.
    fn identifier(&self) -> &str;

    /// Run one non-streaming completion with the given credential. No retries.
    async fn complete(
        &self,
        api_key: &str,
        request: &ChatCompletionRequest,
    ) -> Result<ChatCompletionResponse, ProxyError>;
}

/// The trimmed content of the first choice, or [`FALLBACK_REPLY`] when absent.
pub fn extract_reply(response: &ChatCompletionResponse) -> String {
    response
        .choices
        .first()
        .and_then(|c| c.message.content.as_deref())
        .map(|text| text.trim().to_string())
        .unwrap_or_else(|| FALLBACK_REPLY.to_string())
}
