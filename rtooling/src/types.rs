//! Tool runtime context and execution result types.

use rcommon::{SessionId, TraceId, UserId};
use rgateway::ToolInvocation;

use crate::ToolError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolExecutionContext {
    pub session_id: SessionId,
    pub user_id: Option<UserId>,
    /// Correlates tool executions with the turn or search that requested them.
    pub trace_id: Option<TraceId>,
}

impl ToolExecutionContext {
    pub fn new(session_id: impl Into<SessionId>) -> Self {
        Self {
            session_id: session_id.into(),
            user_id: None,
            trace_id: None,
        }
    }

    pub fn with_user_id(mut self, user_id: impl Into<UserId>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_trace_id(mut self, trace_id: impl Into<TraceId>) -> Self {
        self.trace_id = Some(trace_id.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolExecutionResult {
    pub tool_call_id: String,
    pub tool_name: String,
    pub output: String,
}

impl ToolExecutionResult {
    pub fn from_invocation(invocation: &ToolInvocation, output: impl Into<String>) -> Self {
        Self {
            tool_call_id: invocation.id.clone(),
            tool_name: invocation.name.clone(),
            output: output.into(),
        }
    }
}

pub type ToolOutcome = Result<ToolExecutionResult, ToolError>;

/// Renders executed invocations as assistant text: one block per invocation in execution
/// order, separated by a blank line. Failures become a readable line instead of aborting.
pub fn render_outcomes(outcomes: &[ToolOutcome]) -> String {
    outcomes
        .iter()
        .map(|outcome| match outcome {
            Ok(result) => result.output.clone(),
            Err(error) => format!(
                "Tool {} failed: {}",
                error.tool_name.as_deref().unwrap_or("unknown"),
                error.message
            ),
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}
