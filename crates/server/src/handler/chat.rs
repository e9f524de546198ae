use crate::AppState;
use axum::Json;
use axum::extract::{Request, State};
use graxy_core::envelope::ImageSource;
use graxy_core::error::ProxyError;
use graxy_core::prompt::with_system_prompt;
use graxy_core::types::openai::{ChatCompletionRequest, ChatReply};
use graxy_provider::extract_reply;
use std::time::Instant;

/// `POST /api/chat`: normalize the JSON or multipart body, inject the system
/// prompt, and relay one completion.
pub async fn chat(
    State(state): State<AppState>,
    request: Request,
) -> Result<Json<ChatReply>, ProxyError> {
    state.metrics.record_request();

    let result = relay(&state, request).await;
    if result.is_err() {
        state.metrics.record_error();
    }
    result.map(Json)
}

async fn relay(state: &AppState, request: Request) -> Result<ChatReply, ProxyError> {
    let config = state.config.load_full();

    // Checked before the body is read so a doomed upstream call never happens.
    let api_key = config.api_key().ok_or(ProxyError::Misconfigured)?;

    let envelope = crate::extract::read_envelope(request, &config).await?;
    match &envelope.image {
        Some(ImageSource::Upload { bytes, .. }) => state.metrics.record_image(bytes.len()),
        Some(ImageSource::Url(_)) => state.metrics.record_image(0),
        None => {}
    }

    let messages = envelope.into_outbound()?;
    let request = ChatCompletionRequest {
        model: config.model.clone(),
        messages: with_system_prompt(messages),
        temperature: config.temperature,
        stream: None,
    };

    tracing::debug!(
        backend = state.backend.identifier(),
        model = %request.model,
        messages = request.messages.len(),
        "Forwarding chat completion"
    );

    let start = Instant::now();
    let result = state.backend.complete(api_key, &request).await;
    state
        .metrics
        .record_upstream_latency_ms(start.elapsed().as_millis());

    let response = result?;
    Ok(ChatReply {
        reply: extract_reply(&response),
    })
}
