//! Runtime wiring: stores, tools, limiter, quota gate and observability around one gateway.

use std::path::Path;
use std::sync::Arc;

use rchat::{
    ChatError, ChatHooks, ChatService, HistoryStore, InMemoryHistoryStore, InMemoryQuotaStore,
    InMemorySearchLog, QuotaGate, QuotaStore, RateLimiter, SearchLog, TokenBucketRateLimiter,
    UnlimitedRateLimiter,
};
use rcommon::UserId;
use rgateway::{GatewayClient, GatewayHooks};
use rmemory::SqliteStores;
use robserve::{
    CompositeHooks, MetricsObservabilityHooks, SafeChatHooks, SafeGatewayHooks, SafeToolHooks,
    TracingObservabilityHooks,
};
use rtooling::{ToolExecutor, ToolRuntimeHooks, builtin_registry};

use crate::{QuotaSettings, RelayConfig, RelayError, RelayErrorKind};

/// A wired chat service plus the stores an operator needs next to it.
#[derive(Clone)]
pub struct RelayRuntime {
    pub chat: ChatService,
    pub quota: Arc<dyn QuotaStore>,
    pub search_log: Arc<dyn SearchLog>,
    quota_settings: QuotaSettings,
}

impl RelayRuntime {
    /// Seeds `user_id` with the configured per-user allowances, replacing existing counters.
    pub async fn provision_user(&self, user_id: &UserId) -> Result<(), ChatError> {
        self.quota
            .provision(
                user_id,
                self.quota_settings.chat_per_user,
                self.quota_settings.search_per_user,
            )
            .await?;
        tracing::info!(
            phase = "relay",
            event = "user_provisioned",
            user_id = %user_id,
            chat = self.quota_settings.chat_per_user,
            search = self.quota_settings.search_per_user
        );
        Ok(())
    }
}

struct Stores {
    history: Arc<dyn HistoryStore>,
    quota: Arc<dyn QuotaStore>,
    search_log: Arc<dyn SearchLog>,
}

fn open_stores(path: Option<&Path>) -> Result<Stores, RelayError> {
    match path {
        Some(path) => {
            let stores = SqliteStores::open(path)?;
            tracing::info!(
                phase = "relay",
                event = "stores_opened",
                backend = "sqlite",
                path = %path.display()
            );
            Ok(Stores {
                history: stores.history,
                quota: stores.quota,
                search_log: stores.search_log,
            })
        }
        None => {
            tracing::info!(phase = "relay", event = "stores_opened", backend = "memory");
            Ok(Stores {
                history: Arc::new(InMemoryHistoryStore::new()),
                quota: Arc::new(InMemoryQuotaStore::new()),
                search_log: Arc::new(InMemorySearchLog::new()),
            })
        }
    }
}

fn rate_limiter(requests_per_minute: u32) -> Arc<dyn RateLimiter> {
    if requests_per_minute == 0 {
        Arc::new(UnlimitedRateLimiter)
    } else {
        Arc::new(TokenBucketRateLimiter::per_minute(requests_per_minute))
    }
}

type ObservabilityHooks = CompositeHooks<TracingObservabilityHooks, MetricsObservabilityHooks>;

fn observability() -> ObservabilityHooks {
    CompositeHooks::new(TracingObservabilityHooks, MetricsObservabilityHooks)
}

pub fn gateway_hooks() -> Arc<dyn GatewayHooks> {
    Arc::new(SafeGatewayHooks::new(observability()))
}

pub fn tool_hooks() -> Arc<dyn ToolRuntimeHooks> {
    Arc::new(SafeToolHooks::new(observability()))
}

pub fn chat_hooks() -> Arc<dyn ChatHooks> {
    Arc::new(SafeChatHooks::new(observability()))
}

/// Wires a runtime around an already constructed gateway.
pub fn build_runtime_with_gateway(
    config: &RelayConfig,
    gateway: Arc<dyn GatewayClient>,
) -> Result<RelayRuntime, RelayError> {
    let stores = open_stores(config.database_path.as_deref())?;
    let registry = builtin_registry().map_err(|error| {
        RelayError::new(
            RelayErrorKind::Configuration,
            format!("failed to register built-in tools: {error}"),
        )
    })?;
    let tools = ToolExecutor::new(Arc::new(registry)).with_hooks(tool_hooks());

    let chat = ChatService::builder(gateway)
        .history_store(stores.history)
        .tools(Arc::new(tools))
        .quota(QuotaGate::new(Arc::clone(&stores.quota)))
        .rate_limiter(rate_limiter(config.rate_limit_per_minute))
        .search_log(Arc::clone(&stores.search_log))
        .hooks(chat_hooks())
        .policy(config.policy.clone())
        .build()?;

    Ok(RelayRuntime {
        chat,
        quota: stores.quota,
        search_log: stores.search_log,
        quota_settings: config.quota,
    })
}

#[cfg(feature = "gateway-http")]
pub fn build_gateway(config: &RelayConfig) -> Result<rgateway::HttpGatewayClient, RelayError> {
    let api_key = rgateway::SecretString::non_empty(config.gateway.api_key.clone())?;
    let gateway_config = rgateway::HttpGatewayConfig::new(api_key)
        .with_base_url(config.gateway.base_url.clone())
        .with_timeout(config.gateway.timeout);
    Ok(rgateway::HttpGatewayClient::new(gateway_config)?.with_hooks(gateway_hooks()))
}

#[cfg(feature = "gateway-http")]
pub fn build_runtime(config: &RelayConfig) -> Result<RelayRuntime, RelayError> {
    let gateway = build_gateway(config)?;
    build_runtime_with_gateway(config, Arc::new(gateway))
}

/// Loads [`RelayConfig`] from the environment and wires the HTTP runtime.
#[cfg(feature = "gateway-http")]
pub fn build_runtime_from_env() -> Result<RelayRuntime, RelayError> {
    let config = RelayConfig::from_env()?;
    build_runtime(&config)
}
