//! Turn, request, result and chat event types.

use std::path::PathBuf;
use std::pin::Pin;
use std::time::SystemTime;

use futures_core::Stream;
use rcommon::{SessionId, UserId};
use rgateway::{MessageContent, Role};
use uuid::Uuid;

use crate::ChatError;

/// One persisted message of a conversation. Turns are append-only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    pub id: String,
    pub session_id: SessionId,
    pub role: Role,
    pub content: MessageContent,
    pub token_cost: u32,
    pub created_at: SystemTime,
}

impl Turn {
    pub fn new(
        session_id: SessionId,
        role: Role,
        content: impl Into<MessageContent>,
        token_cost: u32,
    ) -> Self {
        Self {
            id: new_id(),
            session_id,
            role,
            content: content.into(),
            token_cost,
            created_at: SystemTime::now(),
        }
    }

    pub fn with_created_at(mut self, created_at: SystemTime) -> Self {
        self.created_at = created_at;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttachmentSource {
    Bytes(Vec<u8>),
    /// Read when the turn is assembled.
    Path(PathBuf),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub filename: String,
    pub mime: String,
    pub source: AttachmentSource,
}

impl Attachment {
    pub fn from_bytes(
        filename: impl Into<String>,
        mime: impl Into<String>,
        data: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            filename: filename.into(),
            mime: mime.into(),
            source: AttachmentSource::Bytes(data.into()),
        }
    }

    /// The file name shown to the model and in errors is the final path component.
    pub fn from_path(path: impl Into<PathBuf>, mime: impl Into<String>) -> Self {
        let path = path.into();
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        Self {
            filename,
            mime: mime.into(),
            source: AttachmentSource::Path(path),
        }
    }

    pub fn is_image(&self) -> bool {
        self.mime.starts_with("image/")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatTurnRequest {
    pub session_id: SessionId,
    pub user_id: UserId,
    pub text: String,
    pub attachments: Vec<Attachment>,
    pub want_stream: bool,
}

impl ChatTurnRequest {
    pub fn new(
        session_id: impl Into<SessionId>,
        user_id: impl Into<UserId>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            user_id: user_id.into(),
            text: text.into(),
            attachments: Vec::new(),
            want_stream: false,
        }
    }

    pub fn with_attachment(mut self, attachment: Attachment) -> Self {
        self.attachments.push(attachment);
        self
    }

    pub fn enable_streaming(mut self) -> Self {
        self.want_stream = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatTurnResult {
    /// Id of the persisted assistant turn.
    pub id: String,
    pub session_id: SessionId,
    pub text: String,
    pub token_cost: u32,
    /// Completion id reported by the upstream, when there is one.
    pub upstream_id: Option<String>,
    pub created_at: SystemTime,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    pub user_id: UserId,
    pub query: String,
    /// Advertised to the model as the default number of results.
    pub limit: Option<u32>,
}

impl SearchRequest {
    pub fn new(user_id: impl Into<UserId>, query: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            query: query.into(),
            limit: None,
        }
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchOutcome {
    pub id: String,
    pub user_id: UserId,
    pub query: String,
    pub text: String,
    pub token_cost: u32,
    pub created_at: SystemTime,
}

/// Events of a streamed turn. Exactly one of `Completed`/`Failed` ends a successful
/// or failed stream; a persistence failure after an upstream failure adds a second
/// `Failed`.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatEvent {
    Fragment(String),
    Completed(ChatTurnResult),
    Failed(ChatError),
}

impl ChatEvent {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Fragment(_))
    }
}

pub type ChatEventStream<'a> = Pin<Box<dyn Stream<Item = ChatEvent> + Send + 'a>>;

pub(crate) fn new_id() -> String {
    Uuid::new_v4().to_string()
}
