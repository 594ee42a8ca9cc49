//! Uniform gateway error kinds and error value helpers.
//!
//! ```rust
//! use rgateway::{GatewayError, GatewayErrorKind};
//!
//! let auth = GatewayError::authentication("bad key");
//! assert_eq!(auth.kind, GatewayErrorKind::Authentication);
//! assert!(!auth.retryable);
//!
//! let upstream = GatewayError::from_status(503, "overloaded")
//!     .with_error_type("server_error")
//!     .with_code("unavailable");
//! assert_eq!(upstream.kind, GatewayErrorKind::Unavailable);
//! assert_eq!(upstream.status, Some(503));
//! ```

use std::error::Error;
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayErrorKind {
    Authentication,
    RateLimited,
    InvalidRequest,
    Timeout,
    Transport,
    Unavailable,
    Cancelled,
    Protocol,
    Other,
}

impl GatewayErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Authentication => "authentication",
            Self::RateLimited => "rate_limited",
            Self::InvalidRequest => "invalid_request",
            Self::Timeout => "timeout",
            Self::Transport => "transport",
            Self::Unavailable => "unavailable",
            Self::Cancelled => "cancelled",
            Self::Protocol => "protocol",
            Self::Other => "other",
        }
    }
}

/// Error surfaced by the gateway client. Never retried by this crate; `retryable` is a
/// hint for callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayError {
    pub kind: GatewayErrorKind,
    pub message: String,
    /// Upstream `error.type`, when the provider sent a parseable error body.
    pub error_type: Option<String>,
    /// Upstream `error.code`, when present.
    pub code: Option<String>,
    pub status: Option<u16>,
    pub retryable: bool,
}

impl GatewayError {
    pub fn new(kind: GatewayErrorKind, message: impl Into<String>, retryable: bool) -> Self {
        Self {
            kind,
            message: message.into(),
            error_type: None,
            code: None,
            status: None,
            retryable,
        }
    }

    pub fn authentication(message: impl Into<String>) -> Self {
        Self::new(GatewayErrorKind::Authentication, message, false)
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(GatewayErrorKind::RateLimited, message, true)
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(GatewayErrorKind::InvalidRequest, message, false)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(GatewayErrorKind::Timeout, message, true)
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(GatewayErrorKind::Transport, message, true)
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(GatewayErrorKind::Unavailable, message, true)
    }

    pub fn cancelled(message: impl Into<String>) -> Self {
        Self::new(GatewayErrorKind::Cancelled, message, false)
    }

    pub fn protocol(message: impl Into<String>) -> Self {
        Self::new(GatewayErrorKind::Protocol, message, false)
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::new(GatewayErrorKind::Other, message, false)
    }

    /// Maps an upstream HTTP status onto an error kind.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let error = match status {
            401 | 403 => Self::authentication(message),
            429 => Self::rate_limited(message),
            408 | 504 => Self::timeout(message),
            400 | 404 | 413 | 422 => Self::invalid_request(message),
            502 | 503 => Self::unavailable(message),
            _ => Self::new(GatewayErrorKind::Other, message, status >= 500),
        };

        Self {
            status: Some(status),
            ..error
        }
    }

    pub fn with_error_type(mut self, error_type: impl Into<String>) -> Self {
        self.error_type = Some(error_type.into());
        self
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn is_cancelled(&self) -> bool {
        self.kind == GatewayErrorKind::Cancelled
    }
}

impl Display for GatewayError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind.as_str(), self.message)?;

        match (&self.error_type, &self.code) {
            (Some(error_type), Some(code)) => write!(f, " (type: {error_type}, code: {code})"),
            (Some(error_type), None) => write!(f, " (type: {error_type})"),
            (None, Some(code)) => write!(f, " (code: {code})"),
            (None, None) => Ok(()),
        }
    }
}

impl Error for GatewayError {}
