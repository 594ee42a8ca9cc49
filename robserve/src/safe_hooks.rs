use std::panic::{AssertUnwindSafe, catch_unwind};
use std::time::Duration;

use rchat::{ChatError, ChatHooks, ChatOperation};
use rcommon::UserId;
use rgateway::{GatewayError, GatewayHooks, GatewayOperation, ToolInvocation};
use rtooling::{ToolError, ToolExecutionContext, ToolExecutionResult, ToolRuntimeHooks};

/// Swallows panics raised by an inner [`GatewayHooks`] so a faulty observer never breaks a
/// request.
pub struct SafeGatewayHooks<H> {
    inner: H,
}

impl<H> SafeGatewayHooks<H> {
    pub fn new(inner: H) -> Self {
        Self { inner }
    }
}

impl<H> GatewayHooks for SafeGatewayHooks<H>
where
    H: GatewayHooks,
{
    fn on_request_start(&self, operation: GatewayOperation, model: &str) {
        let _ = catch_unwind(AssertUnwindSafe(|| {
            self.inner.on_request_start(operation, model)
        }));
    }

    fn on_request_success(&self, operation: GatewayOperation, model: &str, elapsed: Duration) {
        let _ = catch_unwind(AssertUnwindSafe(|| {
            self.inner.on_request_success(operation, model, elapsed)
        }));
    }

    fn on_request_failure(
        &self,
        operation: GatewayOperation,
        model: &str,
        elapsed: Duration,
        error: &GatewayError,
    ) {
        let _ = catch_unwind(AssertUnwindSafe(|| {
            self.inner
                .on_request_failure(operation, model, elapsed, error)
        }));
    }
}

pub struct SafeToolHooks<H> {
    inner: H,
}

impl<H> SafeToolHooks<H> {
    pub fn new(inner: H) -> Self {
        Self { inner }
    }
}

impl<H> ToolRuntimeHooks for SafeToolHooks<H>
where
    H: ToolRuntimeHooks,
{
    fn on_execution_start(&self, invocation: &ToolInvocation, context: &ToolExecutionContext) {
        let _ = catch_unwind(AssertUnwindSafe(|| {
            self.inner.on_execution_start(invocation, context)
        }));
    }

    fn on_execution_success(
        &self,
        invocation: &ToolInvocation,
        context: &ToolExecutionContext,
        result: &ToolExecutionResult,
        elapsed: Duration,
    ) {
        let _ = catch_unwind(AssertUnwindSafe(|| {
            self.inner
                .on_execution_success(invocation, context, result, elapsed)
        }));
    }

    fn on_execution_failure(
        &self,
        invocation: &ToolInvocation,
        context: &ToolExecutionContext,
        error: &ToolError,
        elapsed: Duration,
    ) {
        let _ = catch_unwind(AssertUnwindSafe(|| {
            self.inner
                .on_execution_failure(invocation, context, error, elapsed)
        }));
    }
}

pub struct SafeChatHooks<H> {
    inner: H,
}

impl<H> SafeChatHooks<H> {
    pub fn new(inner: H) -> Self {
        Self { inner }
    }
}

impl<H> ChatHooks for SafeChatHooks<H>
where
    H: ChatHooks,
{
    fn on_turn_start(&self, operation: ChatOperation, user_id: &UserId) {
        let _ = catch_unwind(AssertUnwindSafe(|| {
            self.inner.on_turn_start(operation, user_id)
        }));
    }

    fn on_fragment(&self, user_id: &UserId, bytes: usize) {
        let _ = catch_unwind(AssertUnwindSafe(|| self.inner.on_fragment(user_id, bytes)));
    }

    fn on_tool_calls(&self, operation: ChatOperation, user_id: &UserId, count: usize) {
        let _ = catch_unwind(AssertUnwindSafe(|| {
            self.inner.on_tool_calls(operation, user_id, count)
        }));
    }

    fn on_turn_complete(
        &self,
        operation: ChatOperation,
        user_id: &UserId,
        token_cost: u32,
        elapsed: Duration,
    ) {
        let _ = catch_unwind(AssertUnwindSafe(|| {
            self.inner
                .on_turn_complete(operation, user_id, token_cost, elapsed)
        }));
    }

    fn on_turn_failure(
        &self,
        operation: ChatOperation,
        user_id: &UserId,
        error: &ChatError,
        elapsed: Duration,
    ) {
        let _ = catch_unwind(AssertUnwindSafe(|| {
            self.inner
                .on_turn_failure(operation, user_id, error, elapsed)
        }));
    }
}

/// Fans every callback out to two hook sets, in order.
pub struct CompositeHooks<A, B> {
    first: A,
    second: B,
}

impl<A, B> CompositeHooks<A, B> {
    pub fn new(first: A, second: B) -> Self {
        Self { first, second }
    }
}

impl<A, B> GatewayHooks for CompositeHooks<A, B>
where
    A: GatewayHooks,
    B: GatewayHooks,
{
    fn on_request_start(&self, operation: GatewayOperation, model: &str) {
        self.first.on_request_start(operation, model);
        self.second.on_request_start(operation, model);
    }

    fn on_request_success(&self, operation: GatewayOperation, model: &str, elapsed: Duration) {
        self.first.on_request_success(operation, model, elapsed);
        self.second.on_request_success(operation, model, elapsed);
    }

    fn on_request_failure(
        &self,
        operation: GatewayOperation,
        model: &str,
        elapsed: Duration,
        error: &GatewayError,
    ) {
        self.first
            .on_request_failure(operation, model, elapsed, error);
        self.second
            .on_request_failure(operation, model, elapsed, error);
    }
}

impl<A, B> ToolRuntimeHooks for CompositeHooks<A, B>
where
    A: ToolRuntimeHooks,
    B: ToolRuntimeHooks,
{
    fn on_execution_start(&self, invocation: &ToolInvocation, context: &ToolExecutionContext) {
        self.first.on_execution_start(invocation, context);
        self.second.on_execution_start(invocation, context);
    }

    fn on_execution_success(
        &self,
        invocation: &ToolInvocation,
        context: &ToolExecutionContext,
        result: &ToolExecutionResult,
        elapsed: Duration,
    ) {
        self.first
            .on_execution_success(invocation, context, result, elapsed);
        self.second
            .on_execution_success(invocation, context, result, elapsed);
    }

    fn on_execution_failure(
        &self,
        invocation: &ToolInvocation,
        context: &ToolExecutionContext,
        error: &ToolError,
        elapsed: Duration,
    ) {
        self.first
            .on_execution_failure(invocation, context, error, elapsed);
        self.second
            .on_execution_failure(invocation, context, error, elapsed);
    }
}

impl<A, B> ChatHooks for CompositeHooks<A, B>
where
    A: ChatHooks,
    B: ChatHooks,
{
    fn on_turn_start(&self, operation: ChatOperation, user_id: &UserId) {
        self.first.on_turn_start(operation, user_id);
        self.second.on_turn_start(operation, user_id);
    }

    fn on_fragment(&self, user_id: &UserId, bytes: usize) {
        self.first.on_fragment(user_id, bytes);
        self.second.on_fragment(user_id, bytes);
    }

    fn on_tool_calls(&self, operation: ChatOperation, user_id: &UserId, count: usize) {
        self.first.on_tool_calls(operation, user_id, count);
        self.second.on_tool_calls(operation, user_id, count);
    }

    fn on_turn_complete(
        &self,
        operation: ChatOperation,
        user_id: &UserId,
        token_cost: u32,
        elapsed: Duration,
    ) {
        self.first
            .on_turn_complete(operation, user_id, token_cost, elapsed);
        self.second
            .on_turn_complete(operation, user_id, token_cost, elapsed);
    }

    fn on_turn_failure(
        &self,
        operation: ChatOperation,
        user_id: &UserId,
        error: &ChatError,
        elapsed: Duration,
    ) {
        self.first
            .on_turn_failure(operation, user_id, error, elapsed);
        self.second
            .on_turn_failure(operation, user_id, error, elapsed);
    }
}
