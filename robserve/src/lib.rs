//! Production-friendly observability hooks for gateway, tool, and chat phases.
//!
//! ```rust
//! use robserve::{
//!     CompositeHooks, MetricsObservabilityHooks, SafeChatHooks, SafeGatewayHooks,
//!     TracingObservabilityHooks,
//! };
//!
//! let _gateway_hooks = SafeGatewayHooks::new(TracingObservabilityHooks);
//! let _chat_hooks = SafeChatHooks::new(CompositeHooks::new(
//!     TracingObservabilityHooks,
//!     MetricsObservabilityHooks,
//! ));
//! ```

mod metrics_hooks;
mod safe_hooks;
mod tracing_hooks;

pub use metrics_hooks::MetricsObservabilityHooks;
pub use safe_hooks::{CompositeHooks, SafeChatHooks, SafeGatewayHooks, SafeToolHooks};
pub use tracing_hooks::TracingObservabilityHooks;

pub mod prelude {
    pub use crate::{
        CompositeHooks, MetricsObservabilityHooks, SafeChatHooks, SafeGatewayHooks,
        SafeToolHooks, TracingObservabilityHooks,
    };
}

#[cfg(test)]
mod tests;
