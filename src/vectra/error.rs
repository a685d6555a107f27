use serde::Serialize;
use thiserror::Error;

/// Error categories reported back to MCP clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorKind {
    ValidationError,
    AuthError,
    RateLimitError,
    UpstreamError,
    ClientRequestError,
    TransientError,
    InternalError,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::ValidationError => "ValidationError",
            ErrorKind::AuthError => "AuthError",
            ErrorKind::RateLimitError => "RateLimitError",
            ErrorKind::UpstreamError => "UpstreamError",
            ErrorKind::ClientRequestError => "ClientRequestError",
            ErrorKind::TransientError => "TransientError",
            ErrorKind::InternalError => "InternalError",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug)]
pub enum VectraApiError {
    #[error("Failed to create HTTP client: {0}")]
    HttpClientCreationError(reqwest::Error),

    #[error("Authentication failed ({status}): {message}")]
    AuthenticationError { status: u16, message: String },

    #[error("Vectra API rate limit exceeded after {attempts} attempts")]
    RateLimited { attempts: u32 },

    #[error("Vectra API error ({status}) after {attempts} attempts: {message}")]
    ServerError {
        status: u16,
        attempts: u32,
        message: String,
    },

    #[error("Vectra API rejected the request ({status}): {message}")]
    RequestRejected { status: u16, message: String },

    #[error("Network error after {attempts} attempts: {message}")]
    Network { attempts: u32, message: String },

    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Unexpected response from Vectra API: {0}")]
    InvalidResponse(String),
}

impl VectraApiError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            VectraApiError::HttpClientCreationError(_) => ErrorKind::InternalError,
            VectraApiError::AuthenticationError { .. } => ErrorKind::AuthError,
            VectraApiError::RateLimited { .. } => ErrorKind::RateLimitError,
            VectraApiError::ServerError { .. }
            | VectraApiError::JsonError(_)
            | VectraApiError::InvalidResponse(_) => ErrorKind::UpstreamError,
            VectraApiError::RequestRejected { .. } => ErrorKind::ClientRequestError,
            VectraApiError::Network { .. } => ErrorKind::TransientError,
        }
    }

    /// HTTP status reported by the upstream, when there was one.
    pub fn status(&self) -> Option<u16> {
        match self {
            VectraApiError::AuthenticationError { status, .. }
            | VectraApiError::ServerError { status, .. }
            | VectraApiError::RequestRejected { status, .. } => Some(*status),
            VectraApiError::RateLimited { .. } => Some(429),
            _ => None,
        }
    }
}

/// Pulls a human readable message out of an upstream error body.
pub(crate) fn upstream_message(body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        for key in ["detail", "message", "error", "errors"] {
            match value.get(key) {
                Some(serde_json::Value::String(s)) if !s.is_empty() => return s.clone(),
                Some(serde_json::Value::Null) | None => {}
                Some(other) => return other.to_string(),
            }
        }
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        "no response body".to_string()
    } else {
        trimmed.chars().take(500).collect()
    }
}
