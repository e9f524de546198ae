use axum::{extract::Request, middleware::Next, response::Response};
use graxy_core::context::RequestContext;

/// Logs request arrival and completion with the request context's id.
pub async fn request_logging_middleware(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let ctx = request.extensions().get::<RequestContext>().cloned();

    let request_id = ctx
        .as_ref()
        .map(|c| c.request_id.as_str())
        .unwrap_or("-")
        .to_string();
    let client_ip = ctx
        .as_ref()
        .and_then(|c| c.client_ip.as_deref())
        .unwrap_or("-")
        .to_string();

    tracing::info!(
        request_id = %request_id,
        client_ip = %client_ip,
        method = %method,
        path = %path,
        "Request received"
    );

    let response = next.run(request).await;

    let elapsed_ms = ctx.as_ref().map(|c| c.elapsed_ms()).unwrap_or(0);
    let status = response.status().as_u16();
    if response.status().is_server_error() {
        tracing::warn!(request_id = %request_id, status, elapsed_ms, "Request failed");
    } else {
        tracing::info!(request_id = %request_id, status, elapsed_ms, "Request completed");
    }

    response
}
