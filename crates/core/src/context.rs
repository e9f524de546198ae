use axum::http::HeaderMap;
use std::time::Instant;

/// Per-request metadata used for logging. Inserted as an axum extension by
/// the request context middleware.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// UUID v4, also echoed back in the `x-request-id` response header.
    pub request_id: String,
    pub start_time: Instant,
    pub client_ip: Option<String>,
}

impl RequestContext {
    pub fn new(client_ip: Option<String>) -> Self {
        Self {
            request_id: uuid::Uuid::new_v4().to_string(),
            start_time: Instant::now(),
            client_ip,
        }
    }

    /// Build a context using the first `x-forwarded-for` hop, then `x-real-ip`.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        Self::new(client_ip(headers))
    }

    pub fn elapsed_ms(&self) -> u128 {
        self.start_time.elapsed().as_millis()
    }
}

fn client_ip(headers: &HeaderMap) -> Option<String> {
    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());

    header("x-forwarded-for")
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .or_else(|| header("x-real-ip").map(str::trim))
        .map(str::to_string)
}
