//! Inbound body normalization: multipart form uploads and JSON bodies both
//! become a [`RequestEnvelope`].

use axum::extract::multipart::{Field, MultipartError};
use axum::extract::{FromRequest, Multipart, Request};
use axum::http::header::CONTENT_TYPE;
use bytes::{Bytes, BytesMut};
use graxy_core::config::Config;
use graxy_core::envelope::{ImageSource, RequestEnvelope, mime_from_filename, parse_messages_field};
use graxy_core::error::ProxyError;

pub async fn read_envelope(request: Request, config: &Config) -> Result<RequestEnvelope, ProxyError> {
    let is_multipart = request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.contains("multipart/form-data"));

    let body_limit = config.body_limit_bytes();
    if is_multipart {
        // Multipart reads honor the route's DefaultBodyLimit.
        let multipart = Multipart::from_request(request, &())
            .await
            .map_err(|e| ProxyError::Upload(e.body_text()))?;
        read_multipart(multipart, config.max_upload_bytes()).await
    } else {
        let body = axum::body::to_bytes(request.into_body(), body_limit)
            .await
            .map_err(|e| {
                ProxyError::Upload(format!(
                    "request body exceeds {body_limit} bytes or could not be read: {e}"
                ))
            })?;
        RequestEnvelope::from_json_body(&body)
    }
}

struct UploadedFile {
    file_name: String,
    content_type: Option<String>,
    bytes: Bytes,
}

impl UploadedFile {
    fn into_image(self) -> ImageSource {
        let mime = self
            .content_type
            .unwrap_or_else(|| mime_from_filename(&self.file_name).to_string());
        ImageSource::Upload {
            bytes: self.bytes,
            mime,
        }
    }
}

/// Fields: `messages` (required JSON), `stream` (`"true"` enables), and a file
/// under `image` or `file`, `image` taking precedence. Repeated fields keep
/// their first occurrence.
async fn read_multipart(
    mut multipart: Multipart,
    max_file_bytes: usize,
) -> Result<RequestEnvelope, ProxyError> {
    let mut raw_messages: Option<String> = None;
    let mut raw_stream: Option<String> = None;
    let mut image: Option<UploadedFile> = None;
    let mut file: Option<UploadedFile> = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "messages" if raw_messages.is_none() => {
                raw_messages = Some(field.text().await.map_err(multipart_error)?);
            }
            "stream" if raw_stream.is_none() => {
                raw_stream = Some(field.text().await.map_err(multipart_error)?);
            }
            "image" | "file" if field.file_name().is_some() => {
                let upload = read_file(field, max_file_bytes).await?;
                let slot = if name == "image" { &mut image } else { &mut file };
                if slot.is_none() {
                    *slot = upload;
                }
            }
            _ => {}
        }
    }

    let raw_messages =
        raw_messages.ok_or_else(|| ProxyError::invalid_input("Missing \"messages\" field"))?;
    let messages = parse_messages_field(&raw_messages)?;

    Ok(RequestEnvelope {
        messages,
        stream: raw_stream.as_deref() == Some("true"),
        image: image.or(file).map(UploadedFile::into_image),
    })
}

/// Read a file part into memory, failing once it grows past `max_bytes`.
/// An empty part with an empty filename (no file chosen) yields `None`.
async fn read_file(
    mut field: Field<'_>,
    max_bytes: usize,
) -> Result<Option<UploadedFile>, ProxyError> {
    let file_name = field.file_name().unwrap_or_default().to_string();
    let content_type = field
        .content_type()
        .filter(|ct| !ct.is_empty())
        .map(str::to_string);

    let mut buf = BytesMut::new();
    while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
        if buf.len() + chunk.len() > max_bytes {
            return Err(ProxyError::Upload(format!(
                "file '{file_name}' exceeds the maximum upload size of {max_bytes} bytes"
            )));
        }
        buf.extend_from_slice(&chunk);
    }

    if buf.is_empty() && file_name.is_empty() {
        return Ok(None);
    }

    Ok(Some(UploadedFile {
        file_name,
        content_type,
        bytes: buf.freeze(),
    }))
}

fn multipart_error(e: MultipartError) -> ProxyError {
    ProxyError::Upload(e.body_text())
}
