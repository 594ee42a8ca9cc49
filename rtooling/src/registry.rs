//! Tool registry for lookup by declared tool name.

use std::future::Future;
use std::sync::Arc;

use rcommon::Registry;
use rgateway::ToolDeclaration;

use crate::{Arguments, FunctionTool, Tool, ToolError, ToolExecutionContext};

#[derive(Default)]
pub struct ToolRegistry {
    tools: Registry<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<T>(&mut self, tool: T)
    where
        T: Tool + 'static,
    {
        let name = tool.declaration().name;
        self.tools.insert(name, Arc::new(tool));
    }

    pub fn register_fn<F, Fut>(&mut self, declaration: ToolDeclaration, handler: F)
    where
        F: Fn(Arguments, ToolExecutionContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<String, ToolError>> + Send + 'static,
    {
        self.register(FunctionTool::new(declaration, handler));
    }

    pub fn register_sync_fn<F>(&mut self, declaration: ToolDeclaration, handler: F)
    where
        F: Fn(Arguments, ToolExecutionContext) -> Result<String, ToolError> + Send + Sync + 'static,
    {
        self.register_fn(declaration, move |args, context| {
            let output = handler(args, context);
            async move { output }
        });
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.remove(name)
    }

    /// Declarations of every registered tool, in registration order.
    pub fn declarations(&self) -> Vec<ToolDeclaration> {
        self.tools.values().map(|tool| tool.declaration()).collect()
    }

    /// Declarations for the named subset, skipping names that are not registered.
    pub fn declarations_for(&self, names: &[&str]) -> Vec<ToolDeclaration> {
        names
            .iter()
            .filter_map(|name| self.get(name))
            .map(|tool| tool.declaration())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}
