//! Lifecycle hooks for chat turns and searches.

use std::time::Duration;

use rcommon::UserId;

use crate::ChatError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatOperation {
    Turn,
    StreamTurn,
    Search,
}

impl ChatOperation {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Turn => "turn",
            Self::StreamTurn => "stream_turn",
            Self::Search => "search",
        }
    }
}

pub trait ChatHooks: Send + Sync {
    fn on_turn_start(&self, _operation: ChatOperation, _user_id: &UserId) {}

    fn on_fragment(&self, _user_id: &UserId, _bytes: usize) {}

    fn on_tool_calls(&self, _operation: ChatOperation, _user_id: &UserId, _count: usize) {}

    fn on_turn_complete(
        &self,
        _operation: ChatOperation,
        _user_id: &UserId,
        _token_cost: u32,
        _elapsed: Duration,
    ) {
    }

    fn on_turn_failure(
        &self,
        _operation: ChatOperation,
        _user_id: &UserId,
        _error: &ChatError,
        _elapsed: Duration,
    ) {
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopChatHooks;

impl ChatHooks for NoopChatHooks {}
