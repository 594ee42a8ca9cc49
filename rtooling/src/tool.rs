//! Tool trait contract for registry-managed capabilities.
//!
//! ```rust
//! use rgateway::ToolDeclaration;
//! use rtooling::{FunctionTool, Tool};
//!
//! let tool = FunctionTool::new(
//!     ToolDeclaration::new(
//!         "echo",
//!         "Echoes input",
//!         serde_json::json!({"type": "object", "properties": {}}),
//!     ),
//!     |args, _ctx| async move { Ok(serde_json::Value::Object(args).to_string()) },
//! );
//!
//! assert_eq!(tool.declaration().name, "echo");
//! ```

use std::future::Future;
use std::sync::Arc;

use rcommon::BoxFuture;
use rgateway::ToolDeclaration;

use crate::{Arguments, ToolError, ToolExecutionContext};

pub type ToolFuture<'a, T> = BoxFuture<'a, T>;

/// A named capability the model may invoke. Arguments arrive already parsed into a JSON
/// object; validating individual fields is the tool's job.
pub trait Tool: Send + Sync {
    fn declaration(&self) -> ToolDeclaration;

    fn invoke<'a>(
        &'a self,
        args: &'a Arguments,
        context: &'a ToolExecutionContext,
    ) -> ToolFuture<'a, Result<String, ToolError>>;
}

type ToolHandler = dyn Fn(Arguments, ToolExecutionContext) -> ToolFuture<'static, Result<String, ToolError>>
    + Send
    + Sync;

pub struct FunctionTool {
    declaration: ToolDeclaration,
    handler: Arc<ToolHandler>,
}

impl FunctionTool {
    pub fn new<F, Fut>(declaration: ToolDeclaration, handler: F) -> Self
    where
        F: Fn(Arguments, ToolExecutionContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<String, ToolError>> + Send + 'static,
    {
        let handler: Arc<ToolHandler> =
            Arc::new(move |args, context| Box::pin(handler(args, context)));

        Self {
            declaration,
            handler,
        }
    }
}

impl Tool for FunctionTool {
    fn declaration(&self) -> ToolDeclaration {
        self.declaration.clone()
    }

    fn invoke<'a>(
        &'a self,
        args: &'a Arguments,
        context: &'a ToolExecutionContext,
    ) -> ToolFuture<'a, Result<String, ToolError>> {
        (self.handler)(args.clone(), context.clone())
    }
}
