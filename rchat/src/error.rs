//! Chat-layer errors and classification.

use std::error::Error;
use std::fmt::{Display, Formatter};

use rgateway::{GatewayError, GatewayErrorKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatErrorKind {
    InvalidRequest,
    AttachmentRead,
    Gateway,
    NoResponse,
    InsufficientQuota,
    RateLimited,
    Persistence,
    Cancelled,
}

impl ChatErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InvalidRequest => "invalid_request",
            Self::AttachmentRead => "attachment_read",
            Self::Gateway => "gateway",
            Self::NoResponse => "no_response",
            Self::InsufficientQuota => "insufficient_quota",
            Self::RateLimited => "rate_limited",
            Self::Persistence => "persistence",
            Self::Cancelled => "cancelled",
        }
    }
}

/// Where in the turn the failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatErrorPhase {
    Admission,
    Assembly,
    Upstream,
    Persistence,
    Accounting,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatError {
    pub kind: ChatErrorKind,
    pub message: String,
    pub phase: Option<ChatErrorPhase>,
    /// Upstream failure this error wraps, for `Gateway` and upstream `Cancelled` errors.
    pub source: Option<GatewayError>,
}

impl ChatError {
    pub fn new(kind: ChatErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            phase: None,
            source: None,
        }
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(ChatErrorKind::InvalidRequest, message).with_phase(ChatErrorPhase::Admission)
    }

    /// The message names the attachment that could not be read.
    pub fn attachment_read(filename: &str, reason: impl Display) -> Self {
        Self::new(
            ChatErrorKind::AttachmentRead,
            format!("failed to read attachment '{filename}': {reason}"),
        )
        .with_phase(ChatErrorPhase::Assembly)
    }

    pub fn no_response() -> Self {
        Self::new(ChatErrorKind::NoResponse, "no response from upstream model")
            .with_phase(ChatErrorPhase::Upstream)
    }

    pub fn insufficient_quota(message: impl Into<String>) -> Self {
        Self::new(ChatErrorKind::InsufficientQuota, message).with_phase(ChatErrorPhase::Accounting)
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(ChatErrorKind::RateLimited, message).with_phase(ChatErrorPhase::Admission)
    }

    pub fn persistence(message: impl Into<String>) -> Self {
        Self::new(ChatErrorKind::Persistence, message).with_phase(ChatErrorPhase::Persistence)
    }

    pub fn cancelled(message: impl Into<String>) -> Self {
        Self::new(ChatErrorKind::Cancelled, message)
    }

    pub fn with_phase(mut self, phase: ChatErrorPhase) -> Self {
        self.phase = Some(phase);
        self
    }

    /// Failures the caller can fix by changing the request or waiting.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self.kind,
            ChatErrorKind::InvalidRequest
                | ChatErrorKind::AttachmentRead
                | ChatErrorKind::InsufficientQuota
                | ChatErrorKind::RateLimited
        )
    }
}

impl Display for ChatError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind.as_str(), self.message)
    }
}

impl Error for ChatError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.source.as_ref().map(|error| error as &(dyn Error + 'static))
    }
}

impl From<GatewayError> for ChatError {
    fn from(value: GatewayError) -> Self {
        let kind = if value.kind == GatewayErrorKind::Cancelled {
            ChatErrorKind::Cancelled
        } else {
            ChatErrorKind::Gateway
        };

        Self {
            kind,
            message: value.to_string(),
            phase: Some(ChatErrorPhase::Upstream),
            source: Some(value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gateway_errors_keep_their_source() {
        let error = ChatError::from(GatewayError::rate_limited("slow down"));

        assert_eq!(error.kind, ChatErrorKind::Gateway);
        assert_eq!(error.phase, Some(ChatErrorPhase::Upstream));
        assert!(error.source().is_some());
        assert!(!error.is_user_error());
    }

    #[test]
    fn upstream_cancellation_maps_to_cancelled() {
        let error = ChatError::from(GatewayError::cancelled("stream cancelled"));
        assert_eq!(error.kind, ChatErrorKind::Cancelled);
    }

    #[test]
    fn attachment_errors_name_the_file() {
        let error = ChatError::attachment_read("report.pdf", "No such file or directory");

        assert_eq!(error.kind, ChatErrorKind::AttachmentRead);
        assert!(error.message.contains("'report.pdf'"));
        assert!(error.is_user_error());
        assert_eq!(
            error.to_string(),
            "attachment_read: failed to read attachment 'report.pdf': No such file or directory"
        );
    }
}
