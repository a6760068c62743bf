//! Middleware for logging requests and responses.

use axum::{
    body::{Body, Bytes},
    extract::Request,
    http::{HeaderMap, StatusCode, header::CONTENT_TYPE},
    middleware::Next,
    response::{IntoResponse, Response},
};

/// Form fields whose values never reach the logs.
const REDACTED_FIELDS: [&str; 2] = ["password", "confirm_password"];

const LOG_BODY_LENGTH_LIMIT: usize = 64;

/// Log the request and response for each request.
///
/// Both the request and response are logged at the `info` level.
/// If the body is longer than [LOG_BODY_LENGTH_LIMIT] bytes, it is truncated
/// and the full body is logged at the `debug` level. Passwords in URL encoded
/// forms are redacted and binary bodies (uploads, images, spreadsheets) are
/// summarised by their size.
pub async fn logging_middleware(request: Request, next: Next) -> Response {
    let (parts, body) = request.into_parts();
    let body_bytes = match axum::body::to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(error) => {
            tracing::error!("Could not read request body: {error}");
            return StatusCode::BAD_REQUEST.into_response();
        }
    };

    let body_text = describe_body(&parts.headers, &body_bytes);
    let body_text = if is_url_encoded_form(&parts.headers) {
        REDACTED_FIELDS
            .iter()
            .fold(body_text, |text, field| redact_field(&text, field))
    } else {
        body_text
    };
    log_body(
        &format!("Received request: {} {}", parts.method, parts.uri),
        &body_text,
    );

    let response = next
        .run(Request::from_parts(parts, Body::from(body_bytes)))
        .await;

    let (parts, body) = response.into_parts();
    let body_bytes = match axum::body::to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(error) => {
            tracing::error!("Could not read response body: {error}");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    log_body(
        &format!("Sending response: {}", parts.status),
        &describe_body(&parts.headers, &body_bytes),
    );

    Response::from_parts(parts, Body::from(body_bytes))
}

fn is_url_encoded_form(headers: &HeaderMap) -> bool {
    content_type(headers).starts_with("application/x-www-form-urlencoded")
}

fn content_type(headers: &HeaderMap) -> &str {
    headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
}

/// The body as text, or a size summary for content that is not text.
fn describe_body(headers: &HeaderMap, body: &Bytes) -> String {
    let content_type = content_type(headers);
    let is_text = content_type.is_empty()
        || content_type.starts_with("text/")
        || content_type.starts_with("application/json")
        || content_type.starts_with("application/x-www-form-urlencoded");

    if is_text {
        String::from_utf8_lossy(body).into_owned()
    } else {
        format!("<{} bytes of {content_type}>", body.len())
    }
}

fn redact_field(form_text: &str, field_name: &str) -> String {
    form_text
        .split('&')
        .map(|pair| match pair.split_once('=') {
            Some((name, _)) if name == field_name => format!("{field_name}=********"),
            _ => pair.to_owned(),
        })
        .collect::<Vec<_>>()
        .join("&")
}

/// The longest prefix of `text` that fits in `limit` bytes without splitting a character.
fn truncate(text: &str, limit: usize) -> &str {
    if text.len() <= limit {
        return text;
    }

    let mut end = limit;
    while !text.is_char_boundary(end) {
        end -= 1;
    }

    &text[..end]
}

fn log_body(summary: &str, body: &str) {
    if body.len() > LOG_BODY_LENGTH_LIMIT {
        tracing::info!(
            "{summary}\nbody: {}...",
            truncate(body, LOG_BODY_LENGTH_LIMIT)
        );
        tracing::debug!("Full body: {body:?}");
    } else {
        tracing::info!("{summary}\nbody: {body:?}");
    }
}
