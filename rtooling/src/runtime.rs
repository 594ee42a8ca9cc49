//! Tool runtime trait and default registry-backed executor.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_timer::Delay;
use futures_util::future::{Either, select};
use rgateway::ToolInvocation;

use crate::{
    NoopToolRuntimeHooks, ToolError, ToolExecutionContext, ToolExecutionResult, ToolFuture,
    ToolOutcome, ToolRegistry, ToolRuntimeHooks, parse_arguments,
};

/// Upper bound on a single tool invocation.
pub const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(30);

pub trait ToolRuntime: Send + Sync {
    fn execute<'a>(
        &'a self,
        invocation: ToolInvocation,
        context: ToolExecutionContext,
    ) -> ToolFuture<'a, ToolOutcome>;

    /// Runs invocations one after another in the given order. A failure does not stop the
    /// remaining invocations.
    fn execute_all<'a>(
        &'a self,
        invocations: Vec<ToolInvocation>,
        context: ToolExecutionContext,
    ) -> ToolFuture<'a, Vec<ToolOutcome>> {
        Box::pin(async move {
            let mut outcomes = Vec::with_capacity(invocations.len());
            for invocation in invocations {
                outcomes.push(self.execute(invocation, context.clone()).await);
            }
            outcomes
        })
    }
}

#[derive(Clone)]
pub struct ToolExecutor {
    registry: Arc<ToolRegistry>,
    hooks: Arc<dyn ToolRuntimeHooks>,
    timeout: Duration,
}

impl ToolExecutor {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self {
            registry,
            hooks: Arc::new(NoopToolRuntimeHooks),
            timeout: DEFAULT_TOOL_TIMEOUT,
        }
    }

    pub fn with_hooks(mut self, hooks: Arc<dyn ToolRuntimeHooks>) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn registry(&self) -> Arc<ToolRegistry> {
        Arc::clone(&self.registry)
    }

    async fn run(
        &self,
        invocation: &ToolInvocation,
        context: &ToolExecutionContext,
    ) -> Result<String, ToolError> {
        let tool = self
            .registry
            .get(&invocation.name)
            .ok_or_else(|| ToolError::unknown_tool(invocation.name.clone()))?;
        let args = parse_arguments(&invocation.arguments)?;

        match select(tool.invoke(&args, context), Delay::new(self.timeout)).await {
            Either::Left((output, _)) => output,
            Either::Right(_) => Err(ToolError::timeout(format!(
                "tool did not finish within {}s",
                self.timeout.as_secs_f64()
            ))),
        }
    }
}

impl ToolRuntime for ToolExecutor {
    fn execute<'a>(
        &'a self,
        invocation: ToolInvocation,
        context: ToolExecutionContext,
    ) -> ToolFuture<'a, ToolOutcome> {
        Box::pin(async move {
            let started = Instant::now();
            self.hooks.on_execution_start(&invocation, &context);

            match self.run(&invocation, &context).await {
                Ok(output) => {
                    let result = ToolExecutionResult::from_invocation(&invocation, output);
                    self.hooks.on_execution_success(
                        &invocation,
                        &context,
                        &result,
                        started.elapsed(),
                    );
                    Ok(result)
                }
                Err(error) => {
                    let error = error
                        .with_tool_name(invocation.name.clone())
                        .with_tool_call_id(invocation.id.clone());
                    self.hooks
                        .on_execution_failure(&invocation, &context, &error, started.elapsed());
                    Err(error)
                }
            }
        })
    }
}
