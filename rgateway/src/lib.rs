//! Upstream gateway client for OpenAI-compatible chat-completions endpoints.
//!
//! The crate owns the transport-neutral message model ([`Message`], [`MessageContent`],
//! [`ContentPart`]), the request/response shapes, the [`GatewayClient`] contract, and the
//! SSE relay that turns a streaming response body into a pair of channels.
//!
//! ```rust
//! use rgateway::{ContentPart, Message, MessageContent, ModelRequest};
//!
//! let request = ModelRequest::new(
//!     "openai/gpt-4o-mini",
//!     vec![Message::user(MessageContent::Multimodal(vec![
//!         ContentPart::text("what is this?"),
//!         ContentPart::image(vec![0xff, 0xd8], "image/jpeg"),
//!     ]))],
//! );
//! assert!(request.validate().is_ok());
//! ```

mod client;
mod credentials;
mod error;
mod model;
mod stream;
mod wire;

#[cfg(feature = "gateway-http")]
mod http;

pub mod prelude;

pub use client::{GatewayClient, GatewayFuture, GatewayHooks, GatewayOperation, NoopGatewayHooks};
pub use credentials::SecretString;
pub use error::{GatewayError, GatewayErrorKind};
pub use model::{
    Choice, ContentPart, FinishReason, Message, MessageContent, ModelRequest, ModelRequestBuilder,
    ModelResponse, Role, TokenUsage, ToolChoice, ToolDeclaration, ToolInvocation,
};
pub use stream::{
    EVENT_BUFFER, SseLine, SseLineDecoder, StreamEvent, StreamHandle, classify_line, relay_sse,
    spawn_sse_relay, spawn_stream_task,
};
pub use wire::encode_request;

#[cfg(feature = "gateway-http")]
pub use http::{DEFAULT_BASE_URL, DEFAULT_TIMEOUT, HttpGatewayClient, HttpGatewayConfig};

pub use tokio_util::sync::CancellationToken;
