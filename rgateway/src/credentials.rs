//! Redacted holder for the gateway API key.
//!
//! ```rust
//! use rgateway::SecretString;
//!
//! let key = SecretString::new("sk-live-123");
//! assert_eq!(key.expose(), "sk-live-123");
//! assert_eq!(format!("{key:?}"), "[REDACTED]");
//! ```

use crate::GatewayError;

#[derive(Clone, PartialEq, Eq)]
pub struct SecretString {
    value: String,
}

impl SecretString {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
        }
    }

    /// Rejects blank keys up front so that misconfiguration fails before any request.
    pub fn non_empty(value: impl Into<String>) -> Result<Self, GatewayError> {
        let secret = Self::new(value);
        if secret.value.trim().is_empty() {
            return Err(GatewayError::authentication("api key must not be empty"));
        }
        Ok(secret)
    }

    pub fn expose(&self) -> &str {
        self.value.as_str()
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }
}

impl std::fmt::Debug for SecretString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl Drop for SecretString {
    fn drop(&mut self) {
        // SAFETY: zero bytes are valid UTF-8.
        unsafe {
            self.value.as_mut_vec().fill(0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::GatewayErrorKind;

    #[test]
    fn blank_keys_are_rejected() {
        let err = SecretString::non_empty("   ").expect_err("blank key must fail");
        assert_eq!(err.kind, GatewayErrorKind::Authentication);
        assert!(SecretString::non_empty("k").is_ok());
    }
}
