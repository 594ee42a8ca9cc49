//! Tool execution errors and classifications.

use std::error::Error;
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolErrorKind {
    UnknownTool,
    MissingArgument,
    InvalidArguments,
    DivisionByZero,
    InvalidExpression,
    Execution,
    Timeout,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolError {
    pub kind: ToolErrorKind,
    pub message: String,
    pub tool_name: Option<String>,
    pub tool_call_id: Option<String>,
    /// Name of the offending argument for `MissingArgument`/`InvalidArguments`.
    pub argument: Option<String>,
}

impl ToolError {
    pub fn new(kind: ToolErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            tool_name: None,
            tool_call_id: None,
            argument: None,
        }
    }

    pub fn unknown_tool(name: impl Into<String>) -> Self {
        let name = name.into();
        Self::new(ToolErrorKind::UnknownTool, format!("unknown tool: {name}")).with_tool_name(name)
    }

    pub fn missing_argument(argument: impl Into<String>) -> Self {
        let argument = argument.into();
        Self {
            argument: Some(argument.clone()),
            ..Self::new(
                ToolErrorKind::MissingArgument,
                format!("{argument} parameter is required"),
            )
        }
    }

    pub fn invalid_arguments(message: impl Into<String>) -> Self {
        Self::new(ToolErrorKind::InvalidArguments, message)
    }

    pub fn division_by_zero() -> Self {
        Self::new(ToolErrorKind::DivisionByZero, "division by zero")
    }

    pub fn invalid_expression(message: impl Into<String>) -> Self {
        Self::new(ToolErrorKind::InvalidExpression, message)
    }

    pub fn execution(message: impl Into<String>) -> Self {
        Self::new(ToolErrorKind::Execution, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ToolErrorKind::Timeout, message)
    }

    pub fn with_tool_name(mut self, tool_name: impl Into<String>) -> Self {
        self.tool_name = Some(tool_name.into());
        self
    }

    pub fn with_tool_call_id(mut self, tool_call_id: impl Into<String>) -> Self {
        self.tool_call_id = Some(tool_call_id.into());
        self
    }

    pub fn with_argument(mut self, argument: impl Into<String>) -> Self {
        self.argument = Some(argument.into());
        self
    }

    /// Errors caused by what the model asked for rather than by the tool itself.
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self.kind,
            ToolErrorKind::UnknownTool
                | ToolErrorKind::MissingArgument
                | ToolErrorKind::InvalidArguments
                | ToolErrorKind::DivisionByZero
                | ToolErrorKind::InvalidExpression
        )
    }
}

impl Display for ToolError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match (&self.tool_name, &self.tool_call_id) {
            (Some(tool_name), Some(tool_call_id)) => write!(
                f,
                "{:?} [tool={}, call_id={}]: {}",
                self.kind, tool_name, tool_call_id, self.message
            ),
            (Some(tool_name), None) => {
                write!(f, "{:?} [tool={}]: {}", self.kind, tool_name, self.message)
            }
            _ => write!(f, "{:?}: {}", self.kind, self.message),
        }
    }
}

impl Error for ToolError {}
