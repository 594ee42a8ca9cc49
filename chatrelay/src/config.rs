//! Relay configuration loaded from the process environment.
//!
//! Every variable except `AI_API_KEY` is optional. Values that are present but do not parse
//! are reported as errors instead of falling back to the default.
//!
//! ```rust
//! use std::collections::HashMap;
//!
//! use chatrelay::RelayConfig;
//!
//! let vars = HashMap::from([
//!     ("AI_API_KEY", "sk-test"),
//!     ("AI_TEMPERATURE", "0.2"),
//! ]);
//! let config = RelayConfig::from_lookup(|key| vars.get(key).map(|value| value.to_string()))
//!     .expect("valid configuration");
//! assert_eq!(config.policy.options.temperature, Some(0.2));
//! ```

use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use rchat::{ChatPolicy, DEFAULT_HISTORY_WINDOW, DEFAULT_MODEL};
use rcommon::GenerationOptions;

pub const DEFAULT_BASE_URL: &str = "https://ai-gateway.vercel.sh";
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_CHAT_TOKENS_PER_USER: u32 = 10;
pub const DEFAULT_SEARCH_TOKENS_PER_USER: u32 = 100;
pub const DEFAULT_RATE_LIMIT_PER_MINUTE: u32 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigErrorKind {
    Missing,
    Invalid,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigError {
    pub kind: ConfigErrorKind,
    pub variable: String,
    pub message: String,
}

impl ConfigError {
    pub fn missing(variable: impl Into<String>) -> Self {
        let variable = variable.into();
        Self {
            kind: ConfigErrorKind::Missing,
            message: format!("{variable} must be set"),
            variable,
        }
    }

    pub fn invalid(variable: impl Into<String>, value: &str, reason: impl Display) -> Self {
        let variable = variable.into();
        Self {
            kind: ConfigErrorKind::Invalid,
            message: format!("{variable}={value:?} is invalid: {reason}"),
            variable,
        }
    }
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl Error for ConfigError {}

/// Upstream connection settings.
#[derive(Clone, PartialEq)]
pub struct GatewaySettings {
    pub api_key: String,
    pub base_url: String,
    pub timeout: Duration,
}

impl std::fmt::Debug for GatewaySettings {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewaySettings")
            .field("api_key", &"[REDACTED]")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Per-user allowances seeded when a user is provisioned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaSettings {
    pub chat_per_user: u32,
    pub search_per_user: u32,
}

impl Default for QuotaSettings {
    fn default() -> Self {
        Self {
            chat_per_user: DEFAULT_CHAT_TOKENS_PER_USER,
            search_per_user: DEFAULT_SEARCH_TOKENS_PER_USER,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RelayConfig {
    pub gateway: GatewaySettings,
    pub policy: ChatPolicy,
    pub quota: QuotaSettings,
    /// Requests per user per minute; `0` disables rate limiting.
    pub rate_limit_per_minute: u32,
    /// SQLite file for history, quota and search log; in-memory stores when `None`.
    pub database_path: Option<PathBuf>,
}

impl RelayConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            gateway: GatewaySettings {
                api_key: api_key.into(),
                base_url: DEFAULT_BASE_URL.to_string(),
                timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            },
            policy: ChatPolicy::default(),
            quota: QuotaSettings::default(),
            rate_limit_per_minute: DEFAULT_RATE_LIMIT_PER_MINUTE,
            database_path: None,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.gateway.base_url = base_url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.gateway.timeout = timeout;
        self
    }

    pub fn with_policy(mut self, policy: ChatPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_quota(mut self, quota: QuotaSettings) -> Self {
        self.quota = quota;
        self
    }

    pub fn with_rate_limit_per_minute(mut self, requests: u32) -> Self {
        self.rate_limit_per_minute = requests;
        self
    }

    pub fn with_database_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.database_path = Some(path.into());
        self
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars { lookup };

        let api_key = vars
            .text("AI_API_KEY")
            .ok_or_else(|| ConfigError::missing("AI_API_KEY"))?;

        let mut options = GenerationOptions::default()
            .with_temperature(vars.parse_or("AI_TEMPERATURE", 0.7)?)
            .with_max_tokens(vars.parse_or("AI_MAX_TOKENS", 4096)?)
            .with_top_p(vars.parse_or("AI_TOP_P", 1.0)?)
            .with_frequency_penalty(vars.parse_or("AI_FREQUENCY_PENALTY", 0.0)?)
            .with_presence_penalty(vars.parse_or("AI_PRESENCE_PENALTY", 0.0)?);
        if let Some(stop) = vars.text("AI_STOP_SEQUENCES") {
            options = options.with_stop(
                stop.split(',')
                    .map(str::trim)
                    .filter(|sequence| !sequence.is_empty())
                    .map(str::to_string)
                    .collect::<Vec<_>>(),
            );
        }

        let history_window: usize = vars.parse_or("CHAT_HISTORY_WINDOW", DEFAULT_HISTORY_WINDOW)?;
        let mut policy = ChatPolicy::default()
            .with_model(vars.text("AI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()))
            .with_options(options)
            .with_history_window(history_window);
        if let Some(prompt) = vars.text("AI_SYSTEM_PROMPT") {
            policy = policy.with_system_prompt(prompt);
        }

        let timeout_secs: u64 = vars.parse_or("AI_TIMEOUT", DEFAULT_TIMEOUT_SECS)?;
        if timeout_secs == 0 {
            return Err(ConfigError::invalid(
                "AI_TIMEOUT",
                "0",
                "timeout must be at least one second",
            ));
        }

        Ok(Self {
            gateway: GatewaySettings {
                api_key,
                base_url: vars
                    .text("AI_BASE_URL")
                    .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
                timeout: Duration::from_secs(timeout_secs),
            },
            policy,
            quota: QuotaSettings {
                chat_per_user: vars
                    .parse_or("CHAT_TOKENS_PER_USER", DEFAULT_CHAT_TOKENS_PER_USER)?,
                search_per_user: vars
                    .parse_or("SEARCH_TOKENS_PER_USER", DEFAULT_SEARCH_TOKENS_PER_USER)?,
            },
            rate_limit_per_minute: vars
                .parse_or("RATE_LIMIT_PER_MINUTE", DEFAULT_RATE_LIMIT_PER_MINUTE)?,
            database_path: vars.text("RELAY_DATABASE_PATH").map(PathBuf::from),
        })
    }
}

struct Vars<F> {
    lookup: F,
}

impl<F> Vars<F>
where
    F: Fn(&str) -> Option<String>,
{
    /// Trimmed value; blank counts as unset.
    fn text(&self, key: &str) -> Option<String> {
        (self.lookup)(key)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }

    fn parse_or<T>(&self, key: &str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: Display,
    {
        match self.text(key) {
            Some(raw) => raw
                .parse()
                .map_err(|error| ConfigError::invalid(key, &raw, error)),
            None => Ok(default),
        }
    }
}
