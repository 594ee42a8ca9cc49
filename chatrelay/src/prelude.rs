//! Common imports for most chatrelay applications.

pub use crate::{
    Attachment, CancellationToken, ChatError, ChatErrorKind, ChatEvent, ChatEventStream,
    ChatPolicy, ChatReply, ChatService, ChatTurnRequest, ChatTurnResult, QuotaKind, RelayConfig,
    RelayError, RelayRuntime, SearchOutcome, SearchRequest, SessionId, ToolSet, UserId,
    build_runtime_with_gateway, init_tracing,
};
#[cfg(feature = "gateway-http")]
pub use crate::{build_runtime, build_runtime_from_env};
