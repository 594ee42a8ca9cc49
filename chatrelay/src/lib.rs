//! Unified facade over the chatrelay workspace crates.
//!
//! This crate is the single dependency for most applications. It re-exports the workspace
//! crates, loads [`RelayConfig`] from the environment, and wires a [`RelayRuntime`]: the
//! HTTP gateway, SQLite or in-memory stores, the built-in tools, the per-user rate limiter
//! and quota gate, and tracing plus metrics hooks.
//!
//! ```rust,no_run
//! use chatrelay::prelude::*;
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! init_tracing("info")?;
//! let runtime = build_runtime_from_env()?;
//! runtime.provision_user(&UserId::from("u1")).await?;
//!
//! let reply = runtime
//!     .chat
//!     .run_turn(ChatTurnRequest::new("session-1", "u1", "What is (2+3)*4?"))
//!     .await?;
//! println!("{}", reply.text);
//! # Ok(())
//! # }
//! ```

mod config;
mod error;

pub mod prelude;
pub mod runtime;
pub mod telemetry;

pub use rchat;
pub use rcommon;
pub use rgateway;
pub use rmemory;
pub use robserve;
pub use rtooling;

pub use config::{
    ConfigError, ConfigErrorKind, DEFAULT_CHAT_TOKENS_PER_USER, DEFAULT_RATE_LIMIT_PER_MINUTE,
    DEFAULT_SEARCH_TOKENS_PER_USER, DEFAULT_TIMEOUT_SECS, GatewaySettings, QuotaSettings,
    RelayConfig,
};
pub use error::{RelayError, RelayErrorKind};

pub use rchat::{
    Attachment, AttachmentSource, ChatError, ChatErrorKind, ChatErrorPhase, ChatEvent,
    ChatEventStream, ChatHooks, ChatOperation, ChatPolicy, ChatReply, ChatService,
    ChatServiceBuilder, ChatTurnRequest, ChatTurnResult, HistoryStore, InMemoryHistoryStore,
    InMemoryQuotaStore, InMemorySearchLog, QuotaGate, QuotaKind, QuotaPolicy, QuotaStore,
    RateLimiter, SearchLog, SearchOutcome, SearchRequest, TokenBucketRateLimiter, Turn,
};
pub use rcommon::{BoxFuture, GenerationOptions, SessionId, TraceId, UserId};
pub use rgateway::{
    CancellationToken, ContentPart, GatewayClient, GatewayError, GatewayErrorKind, GatewayHooks,
    Message, MessageContent, ModelRequest, ModelResponse, Role, StreamEvent, TokenUsage,
    ToolDeclaration, ToolInvocation,
};
#[cfg(feature = "gateway-http")]
pub use rgateway::{HttpGatewayClient, HttpGatewayConfig, SecretString};
pub use rmemory::{MemoryError, MemoryErrorKind, SqliteDatabase, SqliteStores};
pub use robserve::{
    CompositeHooks, MetricsObservabilityHooks, SafeChatHooks, SafeGatewayHooks, SafeToolHooks,
    TracingObservabilityHooks,
};
pub use rtooling::{
    Calculator, Tool, ToolError, ToolErrorKind, ToolExecutor, ToolRegistry, ToolRuntime, ToolSet,
    builtin_registry,
};

pub use runtime::{
    RelayRuntime, build_runtime_with_gateway, chat_hooks, gateway_hooks, tool_hooks,
};
#[cfg(feature = "gateway-http")]
pub use runtime::{build_gateway, build_runtime, build_runtime_from_env};
pub use telemetry::init_tracing;
