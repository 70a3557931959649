//! API error classification

use std::fmt;

use super::resilience::RetryableError;

/// Failure of a single HTTP exchange with Google APIs
#[derive(Debug)]
pub enum ApiError {
    /// Connection, timeout, or body decoding failure
    Transport(reqwest::Error),
    /// Non-success status code with the response body
    Status { status: u16, body: String },
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport(err) => write!(f, "transport error: {}", err),
            Self::Status { status, body } => {
                let body = body.trim();
                if body.is_empty() {
                    write!(f, "HTTP {}", status)
                } else {
                    write!(f, "HTTP {}: {}", status, body)
                }
            }
        }
    }
}

impl std::error::Error for ApiError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Transport(err) => Some(err),
            Self::Status { .. } => None,
        }
    }
}

impl RetryableError for ApiError {
    fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(err) => err.is_timeout() || err.is_connect(),
            Self::Status { status, .. } => is_transient_status(*status),
        }
    }
}

impl ApiError {
    /// The server never applied the request, so sending it again cannot
    /// duplicate its effect
    pub fn is_rejected(&self) -> bool {
        match self {
            Self::Transport(err) => err.is_connect(),
            Self::Status { status, .. } => matches!(status, 429 | 503),
        }
    }
}

/// Rate limiting and server-side failures are worth another attempt
pub fn is_transient_status(status: u16) -> bool {
    status == 408 || status == 429 || (500..=599).contains(&status)
}
