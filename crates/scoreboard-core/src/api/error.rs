use thiserror::Error;

/// Message shown when the service cannot be reached or rejects the request.
pub const CONNECTION_ERROR_MESSAGE: &str = "Ошибка соединения с сервером";

/// Message used when the service reports a failure without saying why.
pub const DEFAULT_API_ERROR: &str = "Unknown API error";

#[derive(Error, Debug)]
pub enum ApiError {
    /// The server answered with a non-2xx status.
    #[error("HTTP {status}: {status_text}")]
    Http { status: u16, status_text: String },

    /// The server ran the action but reported a logical failure.
    #[error("{0}")]
    Api(String),

    /// No response: connection refused, DNS failure, timeout.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

/// Maximum length for response bodies quoted in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

impl ApiError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            let mut end = MAX_ERROR_BODY_LENGTH;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
        }
    }

    pub fn from_status(status: reqwest::StatusCode) -> Self {
        ApiError::Http {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or("Unknown Status").to_string(),
        }
    }

    /// Logical failure with the server-supplied message, or the generic default.
    pub fn from_server_message(message: Option<&str>) -> Self {
        match message {
            Some(msg) if !msg.trim().is_empty() => ApiError::Api(msg.to_string()),
            _ => ApiError::Api(DEFAULT_API_ERROR.to_string()),
        }
    }

    pub fn unparseable(reason: impl std::fmt::Display, body: &str) -> Self {
        ApiError::InvalidResponse(format!("{}: {}", reason, Self::truncate_body(body)))
    }

    /// Transport-level failure (bad status or no response at all).
    pub fn is_connectivity(&self) -> bool {
        matches!(self, ApiError::Http { .. } | ApiError::Network(_))
    }

    /// Text for the user: server messages verbatim, a generic notice otherwise.
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Api(msg) => msg.clone(),
            ApiError::InvalidRequest(msg) => msg.clone(),
            ApiError::Http { .. } | ApiError::Network(_) | ApiError::InvalidResponse(_) => {
                CONNECTION_ERROR_MESSAGE.to_string()
            }
        }
    }
}
