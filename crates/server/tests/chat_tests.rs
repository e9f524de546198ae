use arc_swap::ArcSwap;
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use graxy_core::config::Config;
use graxy_core::error::ProxyError;
use graxy_core::metrics::Metrics;
use graxy_core::prompt::SYSTEM_PROMPT;
use graxy_core::types::openai::{ChatCompletionRequest, ChatCompletionResponse};
use graxy_provider::{CompletionBackend, FALLBACK_REPLY};
use graxy_server::{AppState, build_router};
use serde_json::{Value, json};
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

// ---------------------------------------------------------------------------
// Helpers: a recording backend and a router built around it
// ---------------------------------------------------------------------------

struct MockBackend {
    reply: Result<Value, (u16, String)>,
    calls: Mutex<Vec<(String, ChatCompletionRequest)>>,
}

impl MockBackend {
    fn replying(content: Value) -> Self {
        Self {
            reply: Ok(json!({
                "id": "chatcmpl-test",
                "choices": [{"index": 0, "message": {"role": "assistant", "content": content}}]
            })),
            calls: Mutex::new(Vec::new()),
        }
    }

    fn failing(status: u16, body: &str) -> Self {
        Self {
            reply: Err((status, body.to_string())),
            calls: Mutex::new(Vec::new()),
        }
    }

    fn calls(&self) -> Vec<(String, ChatCompletionRequest)> {
        self.calls.lock().unwrap().clone()
    }

    fn single_call(&self) -> ChatCompletionRequest {
        let calls = self.calls();
        assert_eq!(calls.len(), 1, "expected exactly one upstream call");
        calls[0].1.clone()
    }
}

#[async_trait]
impl CompletionBackend for MockBackend {
    fn identifier(&self) -> &str {
        "mock"
    }

    async fn complete(
        &self,
        api_key: &str,
        request: &ChatCompletionRequest,
    ) -> Result<ChatCompletionResponse, ProxyError> {
        self.calls
            .lock()
            .unwrap()
            .push((api_key.to_string(), request.clone()));
        match &self.reply {
            Ok(value) => Ok(serde_json::from_value(value.clone()).unwrap()),
            Err((status, body)) => Err(ProxyError::Upstream {
                status: *status,
                body: body.clone(),
            }),
        }
    }
}

struct TestHarness {
    state: AppState,
    backend: Arc<MockBackend>,
}

fn harness_with(config: Config, backend: MockBackend) -> TestHarness {
    let backend = Arc::new(backend);
    let state = AppState {
        config: Arc::new(ArcSwap::from_pointee(config)),
        backend: backend.clone(),
        metrics: Arc::new(Metrics::new()),
    };
    TestHarness { state, backend }
}

fn configured() -> Config {
    Config {
        openai_api_key: Some("sk-test".into()),
        ..Config::default()
    }
}

fn create_test_harness() -> TestHarness {
    harness_with(configured(), MockBackend::replying(json!("  hello there \n")))
}

/// Send a request and return (status, headers, body as Value).
async fn send(
    harness: &TestHarness,
    request: Request<Body>,
) -> (StatusCode, header::HeaderMap, Value) {
    let router = build_router(harness.state.clone());
    let response = router.oneshot(request).await.expect("request failed");
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("failed to read body");
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(json!({}))
    };
    (status, headers, value)
}

fn json_post(body: Value) -> Request<Body> {
    raw_post("application/json", body.to_string())
}

fn raw_post(content_type: &str, body: impl Into<Body>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/chat")
        .header("content-type", content_type)
        .body(body.into())
        .unwrap()
}

const BOUNDARY: &str = "graxyTestBoundary7MA4YWxk";

enum Part<'a> {
    Text(&'a str, &'a str),
    File {
        name: &'a str,
        file_name: &'a str,
        content_type: Option<&'a str>,
        data: &'a [u8],
    },
}

fn multipart_post(parts: &[Part<'_>]) -> Request<Body> {
    let mut body: Vec<u8> = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match part {
            Part::Text(name, value) => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
                );
                body.extend_from_slice(value.as_bytes());
            }
            Part::File {
                name,
                file_name,
                content_type,
                data,
            } => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\n"
                    )
                    .as_bytes(),
                );
                if let Some(ct) = content_type {
                    body.extend_from_slice(format!("Content-Type: {ct}\r\n").as_bytes());
                }
                body.extend_from_slice(b"\r\n");
                body.extend_from_slice(data);
            }
        }
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    raw_post(&format!("multipart/form-data; boundary={BOUNDARY}"), body)
}

fn assert_cors(headers: &header::HeaderMap) {
    assert_eq!(headers["access-control-allow-origin"], "*");
    assert_eq!(headers["access-control-allow-methods"], "POST, OPTIONS");
    assert_eq!(
        headers["access-control-allow-headers"],
        "Content-Type, Authorization"
    );
}

// ===========================================================================
// Preflight, method gate, configuration gate
// ===========================================================================

#[tokio::test]
async fn test_options_returns_204_with_cors() {
    let harness = create_test_harness();
    for uri in ["/api/chat", "/health", "/nowhere"] {
        let req = Request::builder()
            .method("OPTIONS")
            .uri(uri)
            .body(Body::from("ignored body"))
            .unwrap();
        let (status, headers, body) = send(&harness, req).await;
        assert_eq!(status, StatusCode::NO_CONTENT, "OPTIONS {uri}");
        assert_eq!(body, Value::Null);
        assert_cors(&headers);
    }
    assert!(harness.backend.calls().is_empty());
}

#[tokio::test]
async fn test_non_post_methods_are_rejected() {
    let harness = create_test_harness();
    for method in ["GET", "PUT", "DELETE", "PATCH"] {
        let req = Request::builder()
            .method(method)
            .uri("/api/chat")
            .body(Body::empty())
            .unwrap();
        let (status, headers, body) = send(&harness, req).await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED, "{method}");
        assert_eq!(body, json!({"error": "Method not allowed"}));
        assert_cors(&headers);
    }
}

#[tokio::test]
async fn test_missing_credential_short_circuits() {
    let harness = harness_with(Config::default(), MockBackend::replying(json!("x")));

    let requests = [
        json_post(json!({"messages": [{"role": "user", "content": "hi"}]})),
        raw_post("application/json", "{broken"),
        multipart_post(&[Part::Text("messages", "not json")]),
    ];
    for req in requests {
        let (status, headers, body) = send(&harness, req).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, json!({"error": "OPENAI_API_KEY not configured"}));
        assert_cors(&headers);
    }
    assert!(harness.backend.calls().is_empty());
}

// ===========================================================================
// JSON body
// ===========================================================================

#[tokio::test]
async fn test_json_chat_prepends_system_prompt() {
    let harness = create_test_harness();
    let (status, headers, body) = send(
        &harness,
        json_post(json!({"messages": [{"role": "user", "content": "hi"}]})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"reply": "hello there"}));
    assert_cors(&headers);
    assert!(headers.contains_key("x-request-id"));

    let calls = harness.backend.calls();
    assert_eq!(calls.len(), 1);
    let (api_key, request) = &calls[0];
    assert_eq!(api_key, "sk-test");
    assert_eq!(request.model, "gpt-4.1-mini");
    assert_eq!(request.temperature, 0.7);

    let messages = serde_json::to_value(&request.messages).unwrap();
    assert_eq!(
        messages,
        json!([
            {"role": "system", "content": SYSTEM_PROMPT},
            {"role": "user", "content": "hi"}
        ])
    );
}

#[tokio::test]
async fn test_json_chat_preserves_order() {
    let harness = create_test_harness();
    let history = json!([
        {"role": "user", "content": "a"},
        {"role": "assistant", "content": "b"},
        {"role": "system", "content": "c"},
        {"role": "user", "content": "a"}
    ]);
    let (status, _, _) = send(&harness, json_post(json!({"messages": history.clone()}))).await;
    assert_eq!(status, StatusCode::OK);

    let sent = serde_json::to_value(&harness.backend.single_call().messages).unwrap();
    assert_eq!(sent.as_array().unwrap().len(), 5);
    assert_eq!(sent[0]["content"], SYSTEM_PROMPT);
    assert_eq!(Value::Array(sent.as_array().unwrap()[1..].to_vec()), history);
}

#[tokio::test]
async fn test_json_streaming_rejected() {
    let harness = create_test_harness();
    let (status, headers, body) = send(
        &harness,
        json_post(json!({"messages": [{"role": "user", "content": "hi"}], "stream": true})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({"error": "Streaming not enabled yet"}));
    assert_cors(&headers);
    assert!(harness.backend.calls().is_empty());
}

#[tokio::test]
async fn test_json_invalid_body() {
    let harness = create_test_harness();

    let (status, _, body) = send(&harness, raw_post("text/plain", "{nope")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({"error": "Invalid JSON in request body"}));

    let (status, _, body) = send(&harness, json_post(json!({"msgs": []}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({"error": "Invalid body: messages[] required"}));

    let (status, _, body) = send(&harness, raw_post("application/json", "")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({"error": "Invalid body: messages[] required"}));

    assert!(harness.backend.calls().is_empty());
}

#[tokio::test]
async fn test_json_raw_string_body_without_content_type() {
    let harness = create_test_harness();
    let req = Request::builder()
        .method("POST")
        .uri("/api/chat")
        .body(Body::from(
            json!({"messages": [{"role": "user", "content": "hi"}]}).to_string(),
        ))
        .unwrap();
    let (status, _, body) = send(&harness, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["reply"], "hello there");
}

#[tokio::test]
async fn test_json_image_url_merged_into_user_turn() {
    let harness = create_test_harness();
    let (status, _, _) = send(
        &harness,
        json_post(json!({
            "messages": [{"role": "user", "content": "describe this"}],
            "imageUrl": "https://x/y.png"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let sent = serde_json::to_value(&harness.backend.single_call().messages).unwrap();
    assert_eq!(
        sent[1],
        json!({
            "role": "user",
            "content": [
                {"type": "text", "text": "describe this"},
                {"type": "image_url", "image_url": {"url": "https://x/y.png"}}
            ]
        })
    );
}

#[tokio::test]
async fn test_json_image_without_user_message_appends_one() {
    let harness = create_test_harness();
    let (status, _, _) = send(
        &harness,
        json_post(json!({
            "messages": [{"role": "assistant", "content": "how can i help?"}],
            "imageUrl": "data:image/png;base64,AAAA"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let sent = serde_json::to_value(&harness.backend.single_call().messages).unwrap();
    assert_eq!(sent.as_array().unwrap().len(), 3);
    assert_eq!(
        sent[2],
        json!({
            "role": "user",
            "content": [{"type": "image_url", "image_url": {"url": "data:image/png;base64,AAAA"}}]
        })
    );
}

// ===========================================================================
// Multipart form
// ===========================================================================

#[tokio::test]
async fn test_multipart_chat_with_image_upload() {
    let harness = create_test_harness();
    let png = [0x89u8, 0x50, 0x4E, 0x47];
    let req = multipart_post(&[
        Part::Text("messages", r#"[{"role":"user","content":"what is this"}]"#),
        Part::Text("stream", "false"),
        Part::File {
            name: "image",
            file_name: "photo.png",
            content_type: Some("image/png"),
            data: &png,
        },
    ]);

    let (status, headers, body) = send(&harness, req).await;
    assert_eq!(status, StatusCode::OK, "body: {body}");
    assert_eq!(body, json!({"reply": "hello there"}));
    assert_cors(&headers);

    let sent = serde_json::to_value(&harness.backend.single_call().messages).unwrap();
    assert_eq!(
        sent[1]["content"],
        json!([
            {"type": "text", "text": "what is this"},
            {"type": "image_url", "image_url": {"url": "data:image/png;base64,iVBORw=="}}
        ])
    );
}

#[tokio::test]
async fn test_multipart_file_alias_and_mime_inference() {
    let harness = create_test_harness();
    let req = multipart_post(&[
        Part::File {
            name: "file",
            file_name: "Cat.JPEG",
            content_type: None,
            data: b"abc",
        },
        Part::Text("messages", r#"[{"role":"user","content":[{"type":"text","text":"cat?"}]}]"#),
    ]);

    let (status, _, _) = send(&harness, req).await;
    assert_eq!(status, StatusCode::OK);

    let sent = serde_json::to_value(&harness.backend.single_call().messages).unwrap();
    assert_eq!(
        sent[1]["content"],
        json!([
            {"type": "text", "text": "cat?"},
            {"type": "image_url", "image_url": {"url": "data:image/jpeg;base64,YWJj"}}
        ])
    );
}

#[tokio::test]
async fn test_multipart_image_field_wins_over_file() {
    let harness = create_test_harness();
    let req = multipart_post(&[
        Part::Text("messages", r#"[{"role":"user","content":"hi"}]"#),
        Part::File {
            name: "file",
            file_name: "a.png",
            content_type: Some("image/png"),
            data: b"file",
        },
        Part::File {
            name: "image",
            file_name: "b.png",
            content_type: Some("image/png"),
            data: b"image",
        },
    ]);

    let (status, _, _) = send(&harness, req).await;
    assert_eq!(status, StatusCode::OK);

    let sent = serde_json::to_value(&harness.backend.single_call().messages).unwrap();
    let parts = sent[1]["content"].as_array().unwrap();
    assert_eq!(parts.len(), 2);
    assert_eq!(parts[1]["image_url"]["url"], "data:image/png;base64,aW1hZ2U=");
}

#[tokio::test]
async fn test_multipart_invalid_messages_json() {
    let harness = create_test_harness();
    let (status, _, body) =
        send(&harness, multipart_post(&[Part::Text("messages", "[{oops")])).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({"error": "Invalid JSON in messages"}));
    assert!(harness.backend.calls().is_empty());
}

#[tokio::test]
async fn test_multipart_missing_messages_field() {
    let harness = create_test_harness();
    let (status, _, body) = send(&harness, multipart_post(&[Part::Text("stream", "false")])).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({"error": "Missing \"messages\" field"}));
}

#[tokio::test]
async fn test_multipart_stream_flag_exact_match() {
    let harness = create_test_harness();

    let (status, _, body) = send(
        &harness,
        multipart_post(&[
            Part::Text("messages", r#"[{"role":"user","content":"hi"}]"#),
            Part::Text("stream", "true"),
        ]),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({"error": "Streaming not enabled yet"}));

    let (status, _, _) = send(
        &harness,
        multipart_post(&[
            Part::Text("messages", r#"[{"role":"user","content":"hi"}]"#),
            Part::Text("stream", "TRUE"),
        ]),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(harness.backend.calls().len(), 1);
}

#[tokio::test]
async fn test_multipart_empty_file_part_is_ignored() {
    let harness = create_test_harness();
    let req = multipart_post(&[
        Part::Text("messages", r#"[{"role":"user","content":"hi"}]"#),
        Part::File {
            name: "image",
            file_name: "",
            content_type: Some("application/octet-stream"),
            data: b"",
        },
    ]);

    let (status, _, _) = send(&harness, req).await;
    assert_eq!(status, StatusCode::OK);
    let sent = serde_json::to_value(&harness.backend.single_call().messages).unwrap();
    assert_eq!(sent[1], json!({"role": "user", "content": "hi"}));
}

#[tokio::test]
async fn test_multipart_upload_too_large() {
    let config = Config {
        max_upload_mb: 1,
        ..configured()
    };
    let harness = harness_with(config, MockBackend::replying(json!("x")));
    let big = vec![0u8; 1024 * 1024 + 1];
    let req = multipart_post(&[
        Part::Text("messages", r#"[{"role":"user","content":"hi"}]"#),
        Part::File {
            name: "image",
            file_name: "big.png",
            content_type: Some("image/png"),
            data: &big,
        },
    ]);

    let (status, headers, body) = send(&harness, req).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Proxy failed");
    assert!(body["detail"].as_str().unwrap().contains("big.png"));
    assert_cors(&headers);
    assert!(harness.backend.calls().is_empty());
}

fn oversized_image_body(limit_mb: usize) -> String {
    let data = "A".repeat(limit_mb * 1024 * 1024 + 1);
    json!({
        "messages": [{"role": "user", "content": "what is this"}],
        "imageUrl": format!("data:image/png;base64,{data}"),
    })
    .to_string()
}

#[tokio::test]
async fn test_oversized_body_without_credential_is_misconfigured() {
    let config = Config {
        body_limit_mb: 1,
        ..Config::default()
    };
    let harness = harness_with(config, MockBackend::replying(json!("x")));

    let (status, headers, body) =
        send(&harness, raw_post("application/json", oversized_image_body(1))).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({"error": "OPENAI_API_KEY not configured"}));
    assert_cors(&headers);
    assert!(harness.backend.calls().is_empty());
}

#[tokio::test]
async fn test_oversized_json_body_reported_as_proxy_failed() {
    let config = Config {
        body_limit_mb: 1,
        ..configured()
    };
    let harness = harness_with(config, MockBackend::replying(json!("x")));

    let (status, headers, body) =
        send(&harness, raw_post("application/json", oversized_image_body(1))).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Proxy failed");
    assert!(body["detail"].is_string());
    assert_cors(&headers);
    assert!(harness.backend.calls().is_empty());
}

#[tokio::test]
async fn test_oversized_multipart_body_reported_as_proxy_failed() {
    let config = Config {
        body_limit_mb: 1,
        ..configured()
    };
    let harness = harness_with(config, MockBackend::replying(json!("x")));
    let padding = "x".repeat(1024 * 1024 + 1);
    let req = multipart_post(&[
        Part::Text("messages", r#"[{"role":"user","content":"hi"}]"#),
        Part::Text("notes", &padding),
    ]);

    let (status, headers, body) = send(&harness, req).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Proxy failed");
    assert_cors(&headers);
    assert!(harness.backend.calls().is_empty());
}

// ===========================================================================
// Upstream results
// ===========================================================================

#[tokio::test]
async fn test_upstream_failure_reported_as_proxy_failed() {
    let harness = harness_with(
        configured(),
        MockBackend::failing(429, r#"{"error":{"message":"slow down"}}"#),
    );
    let (status, headers, body) = send(
        &harness,
        json_post(json!({"messages": [{"role": "user", "content": "hi"}]})),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Proxy failed");
    assert!(body["detail"].as_str().unwrap().contains("slow down"));
    assert_cors(&headers);
    assert_eq!(harness.backend.calls().len(), 1);
}

#[tokio::test]
async fn test_missing_reply_uses_fallback() {
    let harness = harness_with(configured(), MockBackend::replying(Value::Null));
    let (status, _, body) = send(
        &harness,
        json_post(json!({"messages": [{"role": "user", "content": "hi"}]})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"reply": FALLBACK_REPLY}));
}

#[tokio::test]
async fn test_configured_cors_origin() {
    let config = Config {
        cors: graxy_core::config::CorsConfig {
            allow_origin: "https://app.example.com".into(),
        },
        ..configured()
    };
    let harness = harness_with(config, MockBackend::replying(json!("x")));
    let req = Request::builder()
        .method("GET")
        .uri("/api/chat")
        .body(Body::empty())
        .unwrap();
    let (_, headers, _) = send(&harness, req).await;
    assert_eq!(
        headers["access-control-allow-origin"],
        "https://app.example.com"
    );
}

// ===========================================================================
// Ambient endpoints
// ===========================================================================

#[tokio::test]
async fn test_health_and_metrics() {
    let harness = create_test_harness();
    send(
        &harness,
        json_post(json!({"messages": [{"role": "user", "content": "hi"}]})),
    )
    .await;
    send(&harness, raw_post("application/json", "{bad")).await;

    let req = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .unwrap();
    let (status, headers, body) = send(&harness, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["credential_configured"], true);
    assert_cors(&headers);

    let req = Request::builder()
        .uri("/metrics")
        .body(Body::empty())
        .unwrap();
    let (status, _, body) = send(&harness, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["chat_requests"], 2);
    assert_eq!(body["errors"], 1);
    assert_eq!(body["upstream_calls"], 1);
}
