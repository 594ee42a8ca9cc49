//! SQLite-backed conversation history.

use std::sync::Arc;

use rchat::{ChatError, ChatFuture, HistoryStore, Turn};
use rcommon::SessionId;
use rgateway::Role;
use rusqlite::{Connection, params};

use crate::codec::{decode_content, encode_content};
use crate::database::{decode_count, decode_system_time, encode_system_time};
use crate::{MemoryError, SqliteDatabase};

/// Turns are ordered by an insertion sequence, so replay order is creation order even
/// when timestamps collide.
#[derive(Debug, Clone)]
pub struct SqliteHistoryStore {
    database: Arc<SqliteDatabase>,
}

impl SqliteHistoryStore {
    pub fn new(database: Arc<SqliteDatabase>) -> Self {
        Self { database }
    }

    fn insert(conn: &Connection, turn: &Turn) -> Result<(), MemoryError> {
        let content = encode_content(&turn.content)?;
        let (secs, nanos) = encode_system_time(turn.created_at)?;
        conn.execute(
            "
            INSERT INTO turns (
                id,
                session_id,
                role,
                content,
                token_cost,
                created_at_secs,
                created_at_nanos
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ",
            params![
                &turn.id,
                turn.session_id.as_str(),
                turn.role.as_str(),
                content,
                i64::from(turn.token_cost),
                secs,
                nanos,
            ],
        )
        .map_err(|error| MemoryError::storage(format!("failed to append turn: {error}")))?;
        Ok(())
    }

    fn append_pair(&self, user: &Turn, assistant: &Turn) -> Result<(), MemoryError> {
        if user.session_id != assistant.session_id {
            return Err(MemoryError::invalid_request(
                "exchange turns belong to different sessions",
            ));
        }

        let mut conn = self.database.connection()?;
        let tx = conn.transaction().map_err(|error| {
            MemoryError::storage(format!("failed to begin exchange transaction: {error}"))
        })?;
        Self::insert(&tx, user)?;
        Self::insert(&tx, assistant)?;
        tx.commit().map_err(|error| {
            MemoryError::storage(format!("failed to commit exchange: {error}"))
        })
    }

    fn load_recent(&self, session_id: &SessionId, limit: usize) -> Result<Vec<Turn>, MemoryError> {
        let conn = self.database.connection()?;
        let mut stmt = conn
            .prepare(
                "
                SELECT id, session_id, role, content, token_cost, created_at_secs, created_at_nanos
                FROM (
                    SELECT *
                    FROM turns
                    WHERE session_id = ?1
                    ORDER BY seq DESC
                    LIMIT ?2
                )
                ORDER BY seq ASC
                ",
            )
            .map_err(|error| {
                MemoryError::storage(format!("failed to prepare history query: {error}"))
            })?;

        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = stmt
            .query_map(params![session_id.as_str(), limit], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, i64>(4)?,
                    row.get::<_, i64>(5)?,
                    row.get::<_, i64>(6)?,
                ))
            })
            .map_err(|error| {
                MemoryError::storage(format!("failed to query history rows: {error}"))
            })?;

        let mut turns = Vec::new();
        for row in rows {
            let (id, session, role, content, token_cost, secs, nanos) = row.map_err(|error| {
                MemoryError::storage(format!("failed to read history row: {error}"))
            })?;
            turns.push(Turn {
                id,
                session_id: SessionId::from(session),
                role: Role::parse(&role).ok_or_else(|| {
                    MemoryError::storage(format!("unknown turn role value '{role}'"))
                })?,
                content: decode_content(&content)?,
                token_cost: decode_count(token_cost, "token_cost")?,
                created_at: decode_system_time(secs, nanos)?,
            });
        }
        Ok(turns)
    }
}

impl HistoryStore for SqliteHistoryStore {
    fn append_turn<'a>(&'a self, turn: Turn) -> ChatFuture<'a, Result<String, ChatError>> {
        Box::pin(async move {
            let conn = self.database.connection()?;
            Self::insert(&conn, &turn)?;
            Ok(turn.id)
        })
    }

    fn append_exchange<'a>(
        &'a self,
        user: Turn,
        assistant: Turn,
    ) -> ChatFuture<'a, Result<(), ChatError>> {
        Box::pin(async move { Ok(self.append_pair(&user, &assistant)?) })
    }

    fn replay_history<'a>(
        &'a self,
        session_id: &'a SessionId,
        limit: usize,
    ) -> ChatFuture<'a, Result<Vec<Turn>, ChatError>> {
        Box::pin(async move { Ok(self.load_recent(session_id, limit)?) })
    }
}

#[cfg(test)]
mod tests {
    use rgateway::{ContentPart, MessageContent};

    use super::*;

    fn store() -> SqliteHistoryStore {
        SqliteHistoryStore::new(Arc::new(
            SqliteDatabase::open_in_memory().expect("database opens"),
        ))
    }

    #[tokio::test]
    async fn replay_returns_most_recent_turns_oldest_first() {
        let store = store();
        let session = SessionId::from("s1");
        for index in 0..15 {
            store
                .append_turn(Turn::new(
                    session.clone(),
                    Role::User,
                    format!("turn {index}"),
                    index,
                ))
                .await
                .expect("append");
        }
        store
            .append_turn(Turn::new("other".into(), Role::User, "elsewhere", 0))
            .await
            .expect("append");

        let replayed = store.replay_history(&session, 10).await.expect("replay");
        assert_eq!(replayed.len(), 10);
        assert_eq!(replayed[0].content.flatten_text(), "turn 5");
        assert_eq!(replayed[0].token_cost, 5);
        assert_eq!(replayed[9].content.flatten_text(), "turn 14");
    }

    #[tokio::test]
    async fn exchange_round_trips_multimodal_content() {
        let store = store();
        let session = SessionId::from("s1");
        let user = Turn::new(
            session.clone(),
            Role::User,
            MessageContent::Multimodal(vec![
                ContentPart::text("what is this"),
                ContentPart::image(vec![1, 2, 3], "image/png"),
            ]),
            0,
        );
        let assistant = Turn::new(session.clone(), Role::Assistant, "a tiny image", 21);

        store
            .append_exchange(user.clone(), assistant.clone())
            .await
            .expect("exchange");

        let replayed = store.replay_history(&session, 10).await.expect("replay");
        assert_eq!(replayed, vec![user, assistant]);
    }

    #[tokio::test]
    async fn failed_exchange_leaves_no_partial_rows() {
        let store = store();
        let session = SessionId::from("s1");
        let user = Turn::new(session.clone(), Role::User, "q", 0);
        let mut assistant = Turn::new(session.clone(), Role::Assistant, "a", 0);
        assistant.id = user.id.clone();

        let error = store
            .append_exchange(user, assistant)
            .await
            .expect_err("duplicate id violates uniqueness");
        assert_eq!(error.kind, rchat::ChatErrorKind::Persistence);
        assert!(
            store
                .replay_history(&session, 10)
                .await
                .expect("replay")
                .is_empty()
        );
    }
}
