//! Process-wide `tracing` subscriber setup.

use tracing_subscriber::EnvFilter;

use crate::RelayError;

/// Installs a formatting subscriber. `RUST_LOG` wins over `default_filter` when set.
///
/// Fails when the filter does not parse or a global subscriber is already installed.
pub fn init_tracing(default_filter: &str) -> Result<(), RelayError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(default_filter).map_err(|error| {
            RelayError::telemetry(format!("invalid log filter {default_filter:?}: {error}"))
        })?,
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .map_err(|error| RelayError::telemetry(format!("failed to install subscriber: {error}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RelayErrorKind;

    #[test]
    fn second_installation_is_reported() {
        let _ = init_tracing("chatrelay=debug,rchat=debug");
        let error = init_tracing("info").expect_err("global subscriber is already set");
        assert_eq!(error.kind, RelayErrorKind::Telemetry);
    }
}
