//! Common `rgateway` imports for downstream crates.

pub use crate::{
    CancellationToken, ContentPart, GatewayClient, GatewayError, GatewayErrorKind, GatewayFuture,
    GatewayHooks, Message, MessageContent, ModelRequest, ModelResponse, Role, StreamEvent,
    StreamHandle, TokenUsage, ToolDeclaration, ToolInvocation,
};
pub use rcommon::{BoxFuture, GenerationOptions};
