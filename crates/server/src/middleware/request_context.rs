use axum::http::HeaderValue;
use axum::{extract::Request, middleware::Next, response::Response};
use graxy_core::context::RequestContext;

/// Injects a `RequestContext` extension and echoes its id as `x-request-id`.
pub async fn request_context_middleware(mut request: Request, next: Next) -> Response {
    let ctx = RequestContext::from_headers(request.headers());
    let request_id = HeaderValue::from_str(&ctx.request_id).ok();
    request.extensions_mut().insert(ctx);

    let mut response = next.run(request).await;
    if let Some(id) = request_id {
        response.headers_mut().insert("x-request-id", id);
    }
    response
}
