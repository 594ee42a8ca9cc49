//! Tracing-based observability hooks for gateway, tool runtime and chat phases.
//!
//! ```rust
//! use rchat::ChatHooks;
//! use robserve::TracingObservabilityHooks;
//!
//! fn accepts_chat_hooks(_hooks: &dyn ChatHooks) {}
//!
//! let hooks = TracingObservabilityHooks;
//! accepts_chat_hooks(&hooks);
//! ```

use std::time::Duration;

use rchat::{ChatError, ChatHooks, ChatOperation};
use rcommon::UserId;
use rgateway::{GatewayError, GatewayHooks, GatewayOperation, ToolInvocation};
use rtooling::{ToolError, ToolExecutionContext, ToolExecutionResult, ToolRuntimeHooks};

#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObservabilityHooks;

impl GatewayHooks for TracingObservabilityHooks {
    fn on_request_start(&self, operation: GatewayOperation, model: &str) {
        tracing::info!(
            phase = "gateway",
            event = "request_start",
            operation = operation.as_str(),
            model
        );
    }

    fn on_request_success(&self, operation: GatewayOperation, model: &str, elapsed: Duration) {
        tracing::info!(
            phase = "gateway",
            event = "request_success",
            operation = operation.as_str(),
            model,
            elapsed_ms = elapsed.as_millis() as u64
        );
    }

    fn on_request_failure(
        &self,
        operation: GatewayOperation,
        model: &str,
        elapsed: Duration,
        error: &GatewayError,
    ) {
        tracing::error!(
            phase = "gateway",
            event = "request_failure",
            operation = operation.as_str(),
            model,
            elapsed_ms = elapsed.as_millis() as u64,
            error_kind = ?error.kind,
            status = error.status,
            retryable = error.retryable,
            error = %error
        );
    }
}

impl ToolRuntimeHooks for TracingObservabilityHooks {
    fn on_execution_start(&self, invocation: &ToolInvocation, context: &ToolExecutionContext) {
        tracing::info!(
            phase = "tool",
            event = "execution_start",
            tool_name = %invocation.name,
            tool_call_id = %invocation.id,
            session_id = %context.session_id,
            trace_id = context.trace_id.as_ref().map(|id| id.as_str())
        );
    }

    fn on_execution_success(
        &self,
        invocation: &ToolInvocation,
        context: &ToolExecutionContext,
        result: &ToolExecutionResult,
        elapsed: Duration,
    ) {
        tracing::info!(
            phase = "tool",
            event = "execution_success",
            tool_name = %invocation.name,
            tool_call_id = %invocation.id,
            session_id = %context.session_id,
            trace_id = context.trace_id.as_ref().map(|id| id.as_str()),
            output_bytes = result.output.len(),
            elapsed_ms = elapsed.as_millis() as u64
        );
    }

    fn on_execution_failure(
        &self,
        invocation: &ToolInvocation,
        context: &ToolExecutionContext,
        error: &ToolError,
        elapsed: Duration,
    ) {
        tracing::error!(
            phase = "tool",
            event = "execution_failure",
            tool_name = %invocation.name,
            tool_call_id = %invocation.id,
            session_id = %context.session_id,
            trace_id = context.trace_id.as_ref().map(|id| id.as_str()),
            elapsed_ms = elapsed.as_millis() as u64,
            error_kind = ?error.kind,
            error = %error
        );
    }
}

impl ChatHooks for TracingObservabilityHooks {
    fn on_turn_start(&self, operation: ChatOperation, user_id: &UserId) {
        tracing::info!(
            phase = "chat",
            event = "turn_start",
            operation = operation.as_str(),
            user_id = %user_id
        );
    }

    fn on_fragment(&self, user_id: &UserId, bytes: usize) {
        tracing::trace!(
            phase = "chat",
            event = "fragment",
            user_id = %user_id,
            bytes
        );
    }

    fn on_tool_calls(&self, operation: ChatOperation, user_id: &UserId, count: usize) {
        tracing::info!(
            phase = "chat",
            event = "tool_calls",
            operation = operation.as_str(),
            user_id = %user_id,
            count
        );
    }

    fn on_turn_complete(
        &self,
        operation: ChatOperation,
        user_id: &UserId,
        token_cost: u32,
        elapsed: Duration,
    ) {
        tracing::info!(
            phase = "chat",
            event = "turn_complete",
            operation = operation.as_str(),
            user_id = %user_id,
            token_cost,
            elapsed_ms = elapsed.as_millis() as u64
        );
    }

    fn on_turn_failure(
        &self,
        operation: ChatOperation,
        user_id: &UserId,
        error: &ChatError,
        elapsed: Duration,
    ) {
        if error.is_user_error() {
            tracing::warn!(
                phase = "chat",
                event = "turn_rejected",
                operation = operation.as_str(),
                user_id = %user_id,
                elapsed_ms = elapsed.as_millis() as u64,
                error_kind = error.kind.as_str(),
                error = %error
            );
        } else {
            tracing::error!(
                phase = "chat",
                event = "turn_failure",
                operation = operation.as_str(),
                user_id = %user_id,
                elapsed_ms = elapsed.as_millis() as u64,
                error_kind = error.kind.as_str(),
                error = %error
            );
        }
    }
}
