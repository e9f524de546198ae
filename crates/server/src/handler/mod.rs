pub mod chat;
pub mod health;

use axum::Json;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use graxy_core::error::ProxyError;

/// Fallback for any non-POST method on the chat route.
pub async fn method_not_allowed() -> ProxyError {
    ProxyError::MethodNotAllowed
}

pub async fn not_found() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({ "error": "Not found" })),
    )
}
