//! Metrics-based observability hooks for gateway, tool runtime and chat phases.
//!
//! ```rust
//! use rgateway::GatewayHooks;
//! use robserve::MetricsObservabilityHooks;
//!
//! fn accepts_gateway_hooks(_hooks: &dyn GatewayHooks) {}
//!
//! let hooks = MetricsObservabilityHooks;
//! accepts_gateway_hooks(&hooks);
//! ```

use std::time::Duration;

use rchat::{ChatError, ChatHooks, ChatOperation};
use rcommon::UserId;
use rgateway::{GatewayError, GatewayHooks, GatewayOperation, ToolInvocation};
use rtooling::{ToolError, ToolExecutionContext, ToolExecutionResult, ToolRuntimeHooks};

#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsObservabilityHooks;

impl GatewayHooks for MetricsObservabilityHooks {
    fn on_request_start(&self, operation: GatewayOperation, model: &str) {
        metrics::counter!(
            "chatrelay_gateway_request_start_total",
            "operation" => operation.as_str(),
            "model" => model.to_string()
        )
        .increment(1);
    }

    fn on_request_success(&self, operation: GatewayOperation, model: &str, elapsed: Duration) {
        metrics::counter!(
            "chatrelay_gateway_request_success_total",
            "operation" => operation.as_str(),
            "model" => model.to_string()
        )
        .increment(1);
        metrics::histogram!(
            "chatrelay_gateway_request_duration_seconds",
            "operation" => operation.as_str(),
            "status" => "success"
        )
        .record(elapsed.as_secs_f64());
    }

    fn on_request_failure(
        &self,
        operation: GatewayOperation,
        model: &str,
        elapsed: Duration,
        error: &GatewayError,
    ) {
        metrics::counter!(
            "chatrelay_gateway_request_failure_total",
            "operation" => operation.as_str(),
            "model" => model.to_string(),
            "error_kind" => error.kind.as_str()
        )
        .increment(1);
        metrics::histogram!(
            "chatrelay_gateway_request_duration_seconds",
            "operation" => operation.as_str(),
            "status" => "failure"
        )
        .record(elapsed.as_secs_f64());
    }
}

impl ToolRuntimeHooks for MetricsObservabilityHooks {
    fn on_execution_start(&self, invocation: &ToolInvocation, _context: &ToolExecutionContext) {
        metrics::counter!(
            "chatrelay_tool_execution_start_total",
            "tool_name" => invocation.name.clone()
        )
        .increment(1);
    }

    fn on_execution_success(
        &self,
        invocation: &ToolInvocation,
        _context: &ToolExecutionContext,
        _result: &ToolExecutionResult,
        elapsed: Duration,
    ) {
        metrics::counter!(
            "chatrelay_tool_execution_success_total",
            "tool_name" => invocation.name.clone()
        )
        .increment(1);
        metrics::histogram!(
            "chatrelay_tool_execution_duration_seconds",
            "tool_name" => invocation.name.clone(),
            "status" => "success"
        )
        .record(elapsed.as_secs_f64());
    }

    fn on_execution_failure(
        &self,
        invocation: &ToolInvocation,
        _context: &ToolExecutionContext,
        error: &ToolError,
        elapsed: Duration,
    ) {
        metrics::counter!(
            "chatrelay_tool_execution_failure_total",
            "tool_name" => invocation.name.clone(),
            "error_kind" => format!("{:?}", error.kind)
        )
        .increment(1);
        metrics::histogram!(
            "chatrelay_tool_execution_duration_seconds",
            "tool_name" => invocation.name.clone(),
            "status" => "failure"
        )
        .record(elapsed.as_secs_f64());
    }
}

impl ChatHooks for MetricsObservabilityHooks {
    fn on_turn_start(&self, operation: ChatOperation, _user_id: &UserId) {
        metrics::counter!("chatrelay_chat_turn_start_total", "operation" => operation.as_str())
            .increment(1);
    }

    fn on_fragment(&self, _user_id: &UserId, bytes: usize) {
        metrics::counter!("chatrelay_chat_stream_fragments_total").increment(1);
        metrics::counter!("chatrelay_chat_stream_bytes_total").increment(bytes as u64);
    }

    fn on_tool_calls(&self, operation: ChatOperation, _user_id: &UserId, count: usize) {
        metrics::counter!("chatrelay_chat_tool_calls_total", "operation" => operation.as_str())
            .increment(count as u64);
    }

    fn on_turn_complete(
        &self,
        operation: ChatOperation,
        _user_id: &UserId,
        token_cost: u32,
        elapsed: Duration,
    ) {
        metrics::counter!(
            "chatrelay_chat_turn_success_total",
            "operation" => operation.as_str()
        )
        .increment(1);
        metrics::counter!(
            "chatrelay_chat_tokens_total",
            "operation" => operation.as_str()
        )
        .increment(u64::from(token_cost));
        metrics::histogram!(
            "chatrelay_chat_turn_duration_seconds",
            "operation" => operation.as_str(),
            "status" => "success"
        )
        .record(elapsed.as_secs_f64());
    }

    fn on_turn_failure(
        &self,
        operation: ChatOperation,
        _user_id: &UserId,
        error: &ChatError,
        elapsed: Duration,
    ) {
        metrics::counter!(
            "chatrelay_chat_turn_failure_total",
            "operation" => operation.as_str(),
            "error_kind" => error.kind.as_str()
        )
        .increment(1);
        metrics::histogram!(
            "chatrelay_chat_turn_duration_seconds",
            "operation" => operation.as_str(),
            "status" => "failure"
        )
        .record(elapsed.as_secs_f64());
    }
}
