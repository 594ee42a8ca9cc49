//! Storage contracts used by the orchestrator and in-memory implementations.

use std::collections::HashMap;

use parking_lot::Mutex;
use rcommon::{BoxFuture, SessionId, UserId};

use crate::{ChatError, SearchOutcome, Turn};

pub type ChatFuture<'a, T> = BoxFuture<'a, T>;

/// Append-only conversation log.
pub trait HistoryStore: Send + Sync {
    /// Appends one turn and returns its id.
    fn append_turn<'a>(&'a self, turn: Turn) -> ChatFuture<'a, Result<String, ChatError>>;

    /// Appends a user turn and its assistant reply as one atomic pair.
    fn append_exchange<'a>(
        &'a self,
        user: Turn,
        assistant: Turn,
    ) -> ChatFuture<'a, Result<(), ChatError>>;

    /// The `limit` most recent turns of a session, oldest first.
    fn replay_history<'a>(
        &'a self,
        session_id: &'a SessionId,
        limit: usize,
    ) -> ChatFuture<'a, Result<Vec<Turn>, ChatError>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QuotaKind {
    Chat,
    Search,
}

impl QuotaKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Chat => "chat",
            Self::Search => "search",
        }
    }
}

/// Per-user remaining-use counters. Users without provisioned counters have none left.
pub trait QuotaStore: Send + Sync {
    fn remaining<'a>(
        &'a self,
        user_id: &'a UserId,
        kind: QuotaKind,
    ) -> ChatFuture<'a, Result<u32, ChatError>>;

    /// Decrements only when the counter is positive. Returns `false` when nothing was
    /// decremented.
    fn decrement<'a>(
        &'a self,
        user_id: &'a UserId,
        kind: QuotaKind,
    ) -> ChatFuture<'a, Result<bool, ChatError>>;

    fn refund<'a>(
        &'a self,
        user_id: &'a UserId,
        kind: QuotaKind,
    ) -> ChatFuture<'a, Result<(), ChatError>>;

    /// Sets both counters for a user, replacing any existing values.
    fn provision<'a>(
        &'a self,
        user_id: &'a UserId,
        chat: u32,
        search: u32,
    ) -> ChatFuture<'a, Result<(), ChatError>>;
}

pub trait SearchLog: Send + Sync {
    fn record<'a>(&'a self, outcome: SearchOutcome) -> ChatFuture<'a, Result<(), ChatError>>;

    /// Most recent first.
    fn recent<'a>(
        &'a self,
        user_id: &'a UserId,
        limit: usize,
    ) -> ChatFuture<'a, Result<Vec<SearchOutcome>, ChatError>>;
}

#[derive(Debug, Default)]
pub struct InMemoryHistoryStore {
    sessions: Mutex<HashMap<SessionId, Vec<Turn>>>,
}

impl InMemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every stored turn of a session, oldest first.
    pub fn turns(&self, session_id: &SessionId) -> Vec<Turn> {
        self.sessions
            .lock()
            .get(session_id)
            .cloned()
            .unwrap_or_default()
    }
}

impl HistoryStore for InMemoryHistoryStore {
    fn append_turn<'a>(&'a self, turn: Turn) -> ChatFuture<'a, Result<String, ChatError>> {
        Box::pin(async move {
            let id = turn.id.clone();
            self.sessions
                .lock()
                .entry(turn.session_id.clone())
                .or_default()
                .push(turn);
            Ok(id)
        })
    }

    fn append_exchange<'a>(
        &'a self,
        user: Turn,
        assistant: Turn,
    ) -> ChatFuture<'a, Result<(), ChatError>> {
        Box::pin(async move {
            if user.session_id != assistant.session_id {
                return Err(ChatError::persistence(
                    "exchange turns belong to different sessions",
                ));
            }

            self.sessions
                .lock()
                .entry(user.session_id.clone())
                .or_default()
                .extend([user, assistant]);
            Ok(())
        })
    }

    fn replay_history<'a>(
        &'a self,
        session_id: &'a SessionId,
        limit: usize,
    ) -> ChatFuture<'a, Result<Vec<Turn>, ChatError>> {
        Box::pin(async move {
            let sessions = self.sessions.lock();
            let turns = sessions.get(session_id).map(Vec::as_slice).unwrap_or(&[]);
            let start = turns.len().saturating_sub(limit);
            Ok(turns[start..].to_vec())
        })
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct Counters {
    chat: u32,
    search: u32,
}

impl Counters {
    fn get_mut(&mut self, kind: QuotaKind) -> &mut u32 {
        match kind {
            QuotaKind::Chat => &mut self.chat,
            QuotaKind::Search => &mut self.search,
        }
    }
}

#[derive(Debug, Default)]
pub struct InMemoryQuotaStore {
    users: Mutex<HashMap<UserId, Counters>>,
}

impl InMemoryQuotaStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl QuotaStore for InMemoryQuotaStore {
    fn remaining<'a>(
        &'a self,
        user_id: &'a UserId,
        kind: QuotaKind,
    ) -> ChatFuture<'a, Result<u32, ChatError>> {
        Box::pin(async move {
            Ok(self
                .users
                .lock()
                .get_mut(user_id)
                .map(|counters| *counters.get_mut(kind))
                .unwrap_or(0))
        })
    }

    fn decrement<'a>(
        &'a self,
        user_id: &'a UserId,
        kind: QuotaKind,
    ) -> ChatFuture<'a, Result<bool, ChatError>> {
        Box::pin(async move {
            let mut users = self.users.lock();
            let Some(counter) = users.get_mut(user_id).map(|counters| counters.get_mut(kind))
            else {
                return Ok(false);
            };

            if *counter == 0 {
                return Ok(false);
            }
            *counter -= 1;
            Ok(true)
        })
    }

    fn refund<'a>(
        &'a self,
        user_id: &'a UserId,
        kind: QuotaKind,
    ) -> ChatFuture<'a, Result<(), ChatError>> {
        Box::pin(async move {
            if let Some(counters) = self.users.lock().get_mut(user_id) {
                let counter = counters.get_mut(kind);
                *counter = counter.saturating_add(1);
            }
            Ok(())
        })
    }

    fn provision<'a>(
        &'a self,
        user_id: &'a UserId,
        chat: u32,
        search: u32,
    ) -> ChatFuture<'a, Result<(), ChatError>> {
        Box::pin(async move {
            self.users
                .lock()
                .insert(user_id.clone(), Counters { chat, search });
            Ok(())
        })
    }
}

#[derive(Debug, Default)]
pub struct InMemorySearchLog {
    outcomes: Mutex<Vec<SearchOutcome>>,
}

impl InMemorySearchLog {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SearchLog for InMemorySearchLog {
    fn record<'a>(&'a self, outcome: SearchOutcome) -> ChatFuture<'a, Result<(), ChatError>> {
        Box::pin(async move {
            self.outcomes.lock().push(outcome);
            Ok(())
        })
    }

    fn recent<'a>(
        &'a self,
        user_id: &'a UserId,
        limit: usize,
    ) -> ChatFuture<'a, Result<Vec<SearchOutcome>, ChatError>> {
        Box::pin(async move {
            Ok(self
                .outcomes
                .lock()
                .iter()
                .rev()
                .filter(|outcome| &outcome.user_id == user_id)
                .take(limit)
                .cloned()
                .collect())
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use rgateway::Role;

    use super::*;

    #[tokio::test]
    async fn replay_returns_most_recent_turns_oldest_first() {
        let store = InMemoryHistoryStore::new();
        let session = SessionId::from("s1");

        for index in 0..15 {
            store
                .append_turn(Turn::new(
                    session.clone(),
                    Role::User,
                    format!("turn {index}"),
                    0,
                ))
                .await
                .expect("append");
        }

        let replayed = store.replay_history(&session, 10).await.expect("replay");
        let texts = replayed
            .iter()
            .map(|turn| turn.content.flatten_text())
            .collect::<Vec<_>>();
        assert_eq!(texts.first().map(String::as_str), Some("turn 5"));
        assert_eq!(texts.last().map(String::as_str), Some("turn 14"));
        assert_eq!(texts.len(), 10);
        assert_eq!(store.turns(&session).len(), 15);
    }

    #[tokio::test]
    async fn exchange_rejects_mixed_sessions() {
        let store = InMemoryHistoryStore::new();
        let error = store
            .append_exchange(
                Turn::new("a".into(), Role::User, "q", 0),
                Turn::new("b".into(), Role::Assistant, "a", 0),
            )
            .await
            .expect_err("mixed sessions");

        assert_eq!(error.kind, crate::ChatErrorKind::Persistence);
        assert!(store.turns(&"a".into()).is_empty());
    }

    #[tokio::test]
    async fn quota_never_goes_negative_under_concurrency() {
        let store = Arc::new(InMemoryQuotaStore::new());
        let user = UserId::from("u1");
        store.provision(&user, 1, 0).await.expect("provision");

        let mut tasks = Vec::new();
        for _ in 0..16 {
            let store = Arc::clone(&store);
            let user = user.clone();
            tasks.push(tokio::spawn(async move {
                store
                    .decrement(&user, QuotaKind::Chat)
                    .await
                    .expect("decrement")
            }));
        }

        let mut succeeded = 0;
        for task in tasks {
            if task.await.expect("task") {
                succeeded += 1;
            }
        }

        assert_eq!(succeeded, 1);
        assert_eq!(store.remaining(&user, QuotaKind::Chat).await.expect("read"), 0);
    }

    #[tokio::test]
    async fn unknown_users_have_no_quota() {
        let store = InMemoryQuotaStore::new();
        let user = UserId::from("ghost");

        assert_eq!(store.remaining(&user, QuotaKind::Search).await.expect("read"), 0);
        assert!(!store.decrement(&user, QuotaKind::Search).await.expect("decrement"));
        store.refund(&user, QuotaKind::Search).await.expect("refund");
        assert_eq!(store.remaining(&user, QuotaKind::Search).await.expect("read"), 0);
    }

    #[tokio::test]
    async fn search_log_lists_recent_outcomes_per_user() {
        let log = InMemorySearchLog::new();
        for (user, query) in [("u1", "a"), ("u2", "b"), ("u1", "c")] {
            log.record(SearchOutcome {
                id: query.to_string(),
                user_id: user.into(),
                query: query.to_string(),
                text: String::new(),
                token_cost: 1,
                created_at: std::time::SystemTime::now(),
            })
            .await
            .expect("record");
        }

        let recent = log.recent(&"u1".into(), 5).await.expect("recent");
        assert_eq!(
            recent.iter().map(|o| o.query.as_str()).collect::<Vec<_>>(),
            vec!["c", "a"]
        );
    }
}
