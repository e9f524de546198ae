use crate::CompletionBackend;
use async_trait::async_trait;
use graxy_core::config::Config;
use graxy_core::error::ProxyError;
use graxy_core::types::openai::{ChatCompletionRequest, ChatCompletionResponse};

/// OpenAI-compatible `/v1/chat/completions` backend.
pub struct OpenAIBackend {
    client: reqwest::Client,
    base_url: String,
}

impl OpenAIBackend {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self { client, base_url }
    }

    pub fn from_config(config: &Config) -> Result<Self, ProxyError> {
        let client = graxy_core::proxy::build_http_client(config)
            .map_err(|e| ProxyError::Internal(format!("failed to build HTTP client: {e}")))?;
        Ok(Self::new(client, config.openai_base_url.clone()))
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/chat/completions", self.base_url)
    }
}

#[async_trait]
impl CompletionBackend for OpenAIBackend {
    fn identifier(&self) -> &str {
        "openai"
    }

    async fn complete(
        &self,
        api_key: &str,
        request: &ChatCompletionRequest,
    ) -> Result<ChatCompletionResponse, ProxyError> {
        let resp = self
            .client
            .post(self.endpoint())
            .bearer_auth(api_key)
            .json(request)
            .send()
            .await?;

        let status = resp.status().as_u16();
        let body = resp.bytes().await?;

        if status >= 400 {
            tracing::warn!(status, "Upstream returned an error");
            return Err(ProxyError::Upstream {
                status,
                body: String::from_utf8_lossy(&body).to_string(),
            });
        }

        serde_json::from_slice(&body)
            .map_err(|e| ProxyError::Internal(format!("invalid upstream response: {e}")))
    }
}
