use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

/// Unified error type for the chat proxy.
///
/// The variants keep the precise cause for logging. At the HTTP boundary they
/// collapse onto five client-facing kinds: method not allowed, server
/// misconfigured, invalid input, not implemented and proxy failed.
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("Method not allowed")]
    MethodNotAllowed,

    #[error("OPENAI_API_KEY not configured")]
    Misconfigured,

    #[error("{0}")]
    InvalidInput(String),

    #[error("{0}")]
    NotImplemented(String),

    #[error("upstream error (status {status}): {body}")]
    Upstream { status: u16, body: String },

    #[error("network error: {0}")]
    Network(String),

    #[error("upload error: {0}")]
    Upload(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ProxyError {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Self::InvalidInput(_) | Self::NotImplemented(_) => StatusCode::BAD_REQUEST,
            Self::Misconfigured
            | Self::Upstream { .. }
            | Self::Network(_)
            | Self::Upload(_)
            | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Whether this error is reported to clients as a generic proxy failure.
    pub fn is_proxy_failure(&self) -> bool {
        matches!(
            self,
            Self::Upstream { .. } | Self::Network(_) | Self::Upload(_) | Self::Internal(_)
        )
    }

    /// The JSON body sent to the client.
    pub fn body(&self) -> serde_json::Value {
        if self.is_proxy_failure() {
            json!({ "error": "Proxy failed", "detail": self.to_string() })
        } else {
            json!({ "error": self.to_string() })
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        if self.is_proxy_failure() {
            tracing::error!(error = %self, "Proxy error");
        }

        (
            self.status_code(),
            [("content-type", "application/json")],
            self.body().to_string(),
        )
            .into_response()
    }
}

impl From<reqwest::Error> for ProxyError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Network(format!("request timed out: {e}"))
        } else if e.is_connect() {
            Self::Network(format!("connection failed: {e}"))
        } else {
            Self::Network(e.to_string())
        }
    }
}
