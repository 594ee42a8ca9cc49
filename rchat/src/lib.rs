//! Conversation orchestration over the upstream gateway.
//!
//! [`ChatService`] assembles the system prompt, replayed history and the new user turn,
//! drives a one-shot or streamed completion, satisfies tool calls inline, and persists
//! the exchange through a [`HistoryStore`]. Admission runs through an injected
//! [`RateLimiter`] and a [`QuotaGate`].

mod error;
mod hooks;
mod limiter;
mod prompt;
mod quota;
mod service;
mod store;
mod types;

pub mod prelude {
    pub use crate::{
        Attachment, ChatError, ChatErrorKind, ChatEvent, ChatEventStream, ChatHooks,
        ChatPolicy, ChatReply, ChatService, ChatServiceBuilder, ChatTurnRequest, ChatTurnResult,
        HistoryStore, QuotaGate, QuotaKind, QuotaPolicy, QuotaStore, RateLimiter, SearchLog,
        SearchOutcome, SearchRequest, Turn,
    };
    pub use rcommon::{SessionId, UserId};
    pub use rtooling::{ToolExecutor, ToolRegistry, ToolRuntime, ToolSet};
}

pub use error::{ChatError, ChatErrorKind, ChatErrorPhase};
pub use hooks::{ChatHooks, ChatOperation, NoopChatHooks};
pub use limiter::{RateLimiter, TokenBucketRateLimiter, UnlimitedRateLimiter};
pub use prompt::{
    DEFAULT_SYSTEM_PROMPT, SEARCH_SYSTEM_PROMPT, assemble_messages, load_attachments,
    search_prompt, user_content,
};
pub use quota::{QuotaGate, QuotaPolicy, QuotaTicket};
pub use service::{
    ChatPolicy, ChatReply, ChatService, ChatServiceBuilder, DEFAULT_HISTORY_WINDOW,
    DEFAULT_MODEL,
};
pub use store::{
    ChatFuture, HistoryStore, InMemoryHistoryStore, InMemoryQuotaStore, InMemorySearchLog,
    QuotaKind, QuotaStore, SearchLog,
};
pub use types::{
    Attachment, AttachmentSource, ChatEvent, ChatEventStream, ChatTurnRequest, ChatTurnResult,
    SearchOutcome, SearchRequest, Turn,
};
pub use rcommon::{SessionId, UserId};
