use std::sync::{Arc, Mutex};
use std::time::Duration;

use rchat::{ChatError, ChatHooks, ChatOperation};
use rcommon::UserId;
use rgateway::{GatewayError, GatewayHooks, GatewayOperation, ToolInvocation};
use rtooling::{ToolError, ToolExecutionContext, ToolExecutionResult, ToolRuntimeHooks};

use crate::{
    CompositeHooks, MetricsObservabilityHooks, SafeChatHooks, SafeGatewayHooks, SafeToolHooks,
    TracingObservabilityHooks,
};

const MODEL: &str = "anthropic/claude-sonnet-4";

fn sample_invocation() -> ToolInvocation {
    ToolInvocation::new("call-1", "calculator", r#"{"expression":"2+2"}"#)
}

fn sample_tool_context() -> ToolExecutionContext {
    ToolExecutionContext::new("session-1").with_trace_id("trace-1")
}

fn sample_user() -> UserId {
    UserId::from("user-1")
}

fn exercise_gateway(hooks: &dyn GatewayHooks) {
    let error = GatewayError::timeout("gateway timeout");
    hooks.on_request_start(GatewayOperation::Stream, MODEL);
    hooks.on_request_success(GatewayOperation::Stream, MODEL, Duration::from_millis(10));
    hooks.on_request_failure(
        GatewayOperation::Complete,
        MODEL,
        Duration::from_millis(10),
        &error,
    );
}

fn exercise_tools(hooks: &dyn ToolRuntimeHooks) {
    let invocation = sample_invocation();
    let context = sample_tool_context();
    hooks.on_execution_start(&invocation, &context);
    hooks.on_execution_success(
        &invocation,
        &context,
        &ToolExecutionResult::from_invocation(&invocation, "Calculation: 2+2 = 4"),
        Duration::from_millis(20),
    );
    hooks.on_execution_failure(
        &invocation,
        &context,
        &ToolError::execution("tool failed"),
        Duration::from_millis(20),
    );
}

fn exercise_chat(hooks: &dyn ChatHooks) {
    let user = sample_user();
    hooks.on_turn_start(ChatOperation::StreamTurn, &user);
    hooks.on_fragment(&user, 12);
    hooks.on_tool_calls(ChatOperation::StreamTurn, &user, 2);
    hooks.on_turn_complete(
        ChatOperation::StreamTurn,
        &user,
        42,
        Duration::from_millis(30),
    );
    hooks.on_turn_failure(
        ChatOperation::Turn,
        &user,
        &ChatError::persistence("disk full"),
        Duration::from_millis(30),
    );
    hooks.on_turn_failure(
        ChatOperation::Search,
        &user,
        &ChatError::insufficient_quota("no searches left"),
        Duration::from_millis(1),
    );
}

#[test]
fn tracing_hooks_smoke_test_all_callbacks() {
    let hooks = TracingObservabilityHooks;
    exercise_gateway(&hooks);
    exercise_tools(&hooks);
    exercise_chat(&hooks);
}

#[test]
fn metrics_hooks_smoke_test_all_callbacks() {
    let hooks = MetricsObservabilityHooks;
    exercise_gateway(&hooks);
    exercise_tools(&hooks);
    exercise_chat(&hooks);
}

#[derive(Default, Clone)]
struct RecordingHooks {
    events: Arc<Mutex<Vec<&'static str>>>,
}

impl RecordingHooks {
    fn push(&self, event: &'static str) {
        self.events.lock().expect("events lock").push(event);
    }

    fn recorded(&self) -> Vec<&'static str> {
        self.events.lock().expect("events lock").clone()
    }
}

impl GatewayHooks for RecordingHooks {
    fn on_request_start(&self, _operation: GatewayOperation, _model: &str) {
        self.push("request_start");
    }

    fn on_request_success(&self, _operation: GatewayOperation, _model: &str, _elapsed: Duration) {
        self.push("request_success");
    }

    fn on_request_failure(
        &self,
        _operation: GatewayOperation,
        _model: &str,
        _elapsed: Duration,
        _error: &GatewayError,
    ) {
        self.push("request_failure");
    }
}

impl ToolRuntimeHooks for RecordingHooks {
    fn on_execution_start(&self, _invocation: &ToolInvocation, _context: &ToolExecutionContext) {
        self.push("execution_start");
    }

    fn on_execution_success(
        &self,
        _invocation: &ToolInvocation,
        _context: &ToolExecutionContext,
        _result: &ToolExecutionResult,
        _elapsed: Duration,
    ) {
        self.push("execution_success");
    }

    fn on_execution_failure(
        &self,
        _invocation: &ToolInvocation,
        _context: &ToolExecutionContext,
        _error: &ToolError,
        _elapsed: Duration,
    ) {
        self.push("execution_failure");
    }
}

impl ChatHooks for RecordingHooks {
    fn on_turn_start(&self, _operation: ChatOperation, _user_id: &UserId) {
        self.push("turn_start");
    }

    fn on_fragment(&self, _user_id: &UserId, _bytes: usize) {
        self.push("fragment");
    }

    fn on_tool_calls(&self, _operation: ChatOperation, _user_id: &UserId, _count: usize) {
        self.push("tool_calls");
    }

    fn on_turn_complete(
        &self,
        _operation: ChatOperation,
        _user_id: &UserId,
        _token_cost: u32,
        _elapsed: Duration,
    ) {
        self.push("turn_complete");
    }

    fn on_turn_failure(
        &self,
        _operation: ChatOperation,
        _user_id: &UserId,
        _error: &ChatError,
        _elapsed: Duration,
    ) {
        self.push("turn_failure");
    }
}

struct PanicHooks;

impl GatewayHooks for PanicHooks {
    fn on_request_start(&self, _operation: GatewayOperation, _model: &str) {
        panic!("request_start panic");
    }

    fn on_request_success(&self, _operation: GatewayOperation, _model: &str, _elapsed: Duration) {
        panic!("request_success panic");
    }

    fn on_request_failure(
        &self,
        _operation: GatewayOperation,
        _model: &str,
        _elapsed: Duration,
        _error: &GatewayError,
    ) {
        panic!("request_failure panic");
    }
}

impl ToolRuntimeHooks for PanicHooks {
    fn on_execution_start(&self, _invocation: &ToolInvocation, _context: &ToolExecutionContext) {
        panic!("start panic");
    }

    fn on_execution_success(
        &self,
        _invocation: &ToolInvocation,
        _context: &ToolExecutionContext,
        _result: &ToolExecutionResult,
        _elapsed: Duration,
    ) {
        panic!("success panic");
    }

    fn on_execution_failure(
        &self,
        _invocation: &ToolInvocation,
        _context: &ToolExecutionContext,
        _error: &ToolError,
        _elapsed: Duration,
    ) {
        panic!("failure panic");
    }
}

impl ChatHooks for PanicHooks {
    fn on_turn_start(&self, _operation: ChatOperation, _user_id: &UserId) {
        panic!("turn_start panic");
    }

    fn on_fragment(&self, _user_id: &UserId, _bytes: usize) {
        panic!("fragment panic");
    }

    fn on_tool_calls(&self, _operation: ChatOperation, _user_id: &UserId, _count: usize) {
        panic!("tool_calls panic");
    }

    fn on_turn_complete(
        &self,
        _operation: ChatOperation,
        _user_id: &UserId,
        _token_cost: u32,
        _elapsed: Duration,
    ) {
        panic!("turn_complete panic");
    }

    fn on_turn_failure(
        &self,
        _operation: ChatOperation,
        _user_id: &UserId,
        _error: &ChatError,
        _elapsed: Duration,
    ) {
        panic!("turn_failure panic");
    }
}

#[test]
fn safe_gateway_hooks_delegate_when_inner_succeeds() {
    let inner = RecordingHooks::default();
    let hooks = SafeGatewayHooks::new(inner.clone());

    exercise_gateway(&hooks);

    assert_eq!(
        inner.recorded(),
        vec!["request_start", "request_success", "request_failure"]
    );
}

#[test]
fn safe_tool_hooks_delegate_when_inner_succeeds() {
    let inner = RecordingHooks::default();
    let hooks = SafeToolHooks::new(inner.clone());

    exercise_tools(&hooks);

    assert_eq!(
        inner.recorded(),
        vec!["execution_start", "execution_success", "execution_failure"]
    );
}

#[test]
fn safe_chat_hooks_delegate_when_inner_succeeds() {
    let inner = RecordingHooks::default();
    let hooks = SafeChatHooks::new(inner.clone());

    exercise_chat(&hooks);

    assert_eq!(
        inner.recorded(),
        vec![
            "turn_start",
            "fragment",
            "tool_calls",
            "turn_complete",
            "turn_failure",
            "turn_failure"
        ]
    );
}

#[test]
fn safe_hooks_swallow_panics() {
    exercise_gateway(&SafeGatewayHooks::new(PanicHooks));
    exercise_tools(&SafeToolHooks::new(PanicHooks));
    exercise_chat(&SafeChatHooks::new(PanicHooks));
}

#[test]
fn composite_hooks_call_both_sides_in_order() {
    let first = RecordingHooks::default();
    let second = RecordingHooks::default();
    let hooks = CompositeHooks::new(first.clone(), second.clone());

    exercise_gateway(&hooks);
    exercise_chat(&hooks);

    assert_eq!(first.recorded(), second.recorded());
    assert_eq!(first.recorded().len(), 9);
}

#[test]
fn composite_of_safe_hooks_keeps_the_healthy_side_running() {
    let healthy = RecordingHooks::default();
    let hooks = CompositeHooks::new(SafeChatHooks::new(PanicHooks), healthy.clone());

    exercise_chat(&hooks);

    assert_eq!(healthy.recorded().len(), 6);
}
