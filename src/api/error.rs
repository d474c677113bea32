//! API error types for the portal client

use thiserror::Error;

/// Longest error body we are willing to surface verbatim. Anything bigger
/// (or binary) gets cut so it cannot flood a terminal.
const MAX_ERROR_BODY_LEN: usize = 512;

/// Errors that can occur when talking to the portal API
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    /// Transport-level failure (connection refused, timeout, DNS)
    #[error("Network error - {message}")]
    Network { message: String },
    /// Non-success HTTP status with a best-effort message
    #[error("HTTP {status} - {message}")]
    Http { status: u16, message: String },
    /// Success status but the body did not deserialize
    #[error("Malformed response - {message}")]
    Parse { message: String },
}

impl ApiError {
    /// Create a network error
    pub fn network(message: impl Into<String>) -> Self {
        ApiError::Network {
            message: message.into(),
        }
    }

    /// Create an HTTP error for a non-success status
    pub fn http(status: u16, message: impl Into<String>) -> Self {
        ApiError::Http {
            status,
            message: message.into(),
        }
    }

    /// Create a parse error for a malformed success body
    pub fn parse(message: impl Into<String>) -> Self {
        ApiError::Parse {
            message: message.into(),
        }
    }

    /// Get the HTTP status code, if this error carries one
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Check if this is a 404 response
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    /// Get the human-readable message for this error
    pub fn message(&self) -> &str {
        match self {
            ApiError::Network { message }
            | ApiError::Http { message, .. }
            | ApiError::Parse { message } => message,
        }
    }
}

/// Derive the message for a non-success response body.
///
/// Preference order: the `detail` field when the body is JSON, then the raw
/// body capped at [`MAX_ERROR_BODY_LEN`], then a generic fallback naming the
/// status.
pub(crate) fn error_message(status: u16, body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        match value.get("detail") {
            Some(serde_json::Value::String(detail)) => return detail.clone(),
            // FastAPI validation errors carry a structured detail
            Some(detail) => return detail.to_string(),
            None => {}
        }
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        format!("request failed: {}", status)
    } else {
        truncate_body(trimmed)
    }
}

fn truncate_body(body: &str) -> String {
    if body.len() <= MAX_ERROR_BODY_LEN {
        return body.to_string();
    }
    let mut end = MAX_ERROR_BODY_LEN;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}…", &body[..end])
}
