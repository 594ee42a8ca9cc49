//! Errors raised while assembling a relay runtime.

use std::error::Error;
use std::fmt::{Display, Formatter};

use rchat::ChatError;
use rgateway::GatewayError;
use rmemory::MemoryError;

use crate::ConfigError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayErrorKind {
    Configuration,
    Gateway,
    Storage,
    Chat,
    Telemetry,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayError {
    pub kind: RelayErrorKind,
    pub message: String,
}

impl RelayError {
    pub fn new(kind: RelayErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn telemetry(message: impl Into<String>) -> Self {
        Self::new(RelayErrorKind::Telemetry, message)
    }
}

impl Display for RelayError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

impl Error for RelayError {}

impl From<ConfigError> for RelayError {
    fn from(error: ConfigError) -> Self {
        Self::new(RelayErrorKind::Configuration, error.to_string())
    }
}

impl From<GatewayError> for RelayError {
    fn from(error: GatewayError) -> Self {
        Self::new(RelayErrorKind::Gateway, error.to_string())
    }
}

impl From<MemoryError> for RelayError {
    fn from(error: MemoryError) -> Self {
        Self::new(RelayErrorKind::Storage, error.to_string())
    }
}

impl From<ChatError> for RelayError {
    fn from(error: ChatError) -> Self {
        Self::new(RelayErrorKind::Chat, error.to_string())
    }
}
