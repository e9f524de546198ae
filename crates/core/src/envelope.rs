//! Normalized inbound request: the caller's messages, the streaming flag, and
//! an optional image to merge into the latest user turn.

use crate::error::ProxyError;
use crate::types::openai::{ChatMessage, ContentPart, MessageContent, Role};
use base64::Engine as _;
use bytes::Bytes;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq)]
pub enum ImageSource {
    /// Remote http(s) URL or an inline data URI, passed through untouched.
    Url(String),
    /// Uploaded file bytes, sent upstream as a base64 data URI.
    Upload { bytes: Bytes, mime: String },
}

impl ImageSource {
    pub fn to_url(&self) -> String {
        match self {
            Self::Url(url) => url.clone(),
            Self::Upload { bytes, mime } => data_uri(mime, bytes),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestEnvelope {
    pub messages: Vec<ChatMessage>,
    pub stream: bool,
    pub image: Option<ImageSource>,
}

impl RequestEnvelope {
    /// Decode a JSON request body: `{ messages, stream?, imageUrl? }`.
    pub fn from_json_body(body: &[u8]) -> Result<Self, ProxyError> {
        let value: Value = if body.iter().all(u8::is_ascii_whitespace) {
            Value::Object(Default::default())
        } else {
            serde_json::from_slice(body)
                .map_err(|_| ProxyError::invalid_input("Invalid JSON in request body"))?
        };

        let raw_messages = value
            .get("messages")
            .and_then(Value::as_array)
            .ok_or_else(|| ProxyError::invalid_input("Invalid body: messages[] required"))?;

        let messages = raw_messages
            .iter()
            .enumerate()
            .map(|(i, m)| {
                serde_json::from_value(m.clone()).map_err(|e| {
                    ProxyError::invalid_input(format!("Invalid body: messages[{i}]: {e}"))
                })
            })
            .collect::<Result<Vec<ChatMessage>, _>>()?;

        let stream = value.get("stream").is_some_and(is_truthy);

        let image = value
            .get("imageUrl")
            .and_then(Value::as_str)
            .filter(|url| !url.is_empty())
            .map(|url| ImageSource::Url(url.to_string()));

        Ok(Self {
            messages,
            stream,
            image,
        })
    }

    /// Produce the caller's part of the outbound conversation: merge the image,
    /// refuse streaming, and check that no message ended up with empty content.
    pub fn into_outbound(self) -> Result<Vec<ChatMessage>, ProxyError> {
        let Self {
            mut messages,
            stream,
            image,
        } = self;

        if let Some(image) = image {
            attach_image(&mut messages, image.to_url());
        }

        if stream {
            return Err(ProxyError::NotImplemented(
                "Streaming not enabled yet".to_string(),
            ));
        }

        if let Some(i) = messages.iter().position(|m| m.content.is_empty()) {
            return Err(ProxyError::invalid_input(format!(
                "Invalid body: messages[{i}] has empty content"
            )));
        }

        Ok(messages)
    }
}

/// Decode the multipart `messages` field.
pub fn parse_messages_field(text: &str) -> Result<Vec<ChatMessage>, ProxyError> {
    serde_json::from_str(text).map_err(|_| ProxyError::invalid_input("Invalid JSON in messages"))
}

/// Attach an image reference to the last user message, or append a new
/// image-only user message when there is none.
pub fn attach_image(messages: &mut Vec<ChatMessage>, url: String) {
    let part = ContentPart::image(url);

    let Some(idx) = messages.iter().rposition(|m| m.role == Role::User) else {
        messages.push(ChatMessage::new(Role::User, vec![part]));
        return;
    };

    let target = &mut messages[idx];
    match &mut target.content {
        MessageContent::Text(text) => {
            let text = std::mem::take(text);
            target.content = MessageContent::Parts(vec![ContentPart::text(text), part]);
        }
        MessageContent::Parts(parts) => parts.push(part),
    }
}

/// Infer a MIME type from an uploaded file's name.
pub fn mime_from_filename(name: &str) -> &'static str {
    let name = name.to_ascii_lowercase();
    if name.ends_with(".jpg") || name.ends_with(".jpeg") {
        "image/jpeg"
    } else if name.ends_with(".png") {
        "image/png"
    } else {
        "application/octet-stream"
    }
}

pub fn data_uri(mime: &str, bytes: &[u8]) -> String {
    let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
    format!("data:{mime};base64,{encoded}")
}

/// JSON truthiness for loosely typed flags.
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
