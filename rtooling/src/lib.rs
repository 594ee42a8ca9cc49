//! Capability layer for declaring, registering and executing tools.

mod args;
mod builtin;
mod calculator;
mod error;
mod hooks;
mod registry;
mod runtime;
mod tool;
mod types;

pub mod prelude {
    pub use crate::{
        NoopToolRuntimeHooks, Tool, ToolError, ToolErrorKind, ToolExecutionContext,
        ToolExecutionResult, ToolExecutor, ToolFuture, ToolOutcome, ToolRegistry, ToolRuntime,
        ToolRuntimeHooks, ToolSet, builtin_registry, render_outcomes,
    };
}

pub use args::{Arguments, optional_count, optional_string, parse_arguments, required_string};
pub use builtin::{
    ANALYZE_DOCUMENT, ANALYZE_IMAGE, CALCULATE, EXTRACT_TEXT, FORMAT_DATA, GENERATE_CODE,
    GET_CURRENT_TIME, GET_WEATHER, TRANSLATE_TEXT, ToolSet, VALIDATE_JSON, WEB_SEARCH,
    builtin_registry,
};
pub use calculator::{Calculator, format_general};
pub use error::{ToolError, ToolErrorKind};
pub use hooks::{NoopToolRuntimeHooks, ToolRuntimeHooks};
pub use registry::ToolRegistry;
pub use runtime::{DEFAULT_TOOL_TIMEOUT, ToolExecutor, ToolRuntime};
pub use tool::{FunctionTool, Tool, ToolFuture};
pub use types::{ToolExecutionContext, ToolExecutionResult, ToolOutcome, render_outcomes};
