//! SQLite-backed search log.

use std::sync::Arc;

use rchat::{ChatError, ChatFuture, SearchLog, SearchOutcome};
use rcommon::UserId;
use rusqlite::params;

use crate::database::{decode_count, decode_system_time, encode_system_time};
use crate::{MemoryError, SqliteDatabase};

#[derive(Debug, Clone)]
pub struct SqliteSearchLog {
    database: Arc<SqliteDatabase>,
}

impl SqliteSearchLog {
    pub fn new(database: Arc<SqliteDatabase>) -> Self {
        Self { database }
    }

    fn insert(&self, outcome: &SearchOutcome) -> Result<(), MemoryError> {
        let (secs, nanos) = encode_system_time(outcome.created_at)?;
        let conn = self.database.connection()?;
        conn.execute(
            "
            INSERT INTO searches (
                id,
                user_id,
                query,
                result,
                token_cost,
                created_at_secs,
                created_at_nanos
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ",
            params![
                &outcome.id,
                outcome.user_id.as_str(),
                &outcome.query,
                &outcome.text,
                i64::from(outcome.token_cost),
                secs,
                nanos,
            ],
        )
        .map_err(|error| MemoryError::storage(format!("failed to record search: {error}")))?;
        Ok(())
    }

    fn load_recent(
        &self,
        user_id: &UserId,
        limit: usize,
    ) -> Result<Vec<SearchOutcome>, MemoryError> {
        let conn = self.database.connection()?;
        let mut stmt = conn
            .prepare(
                "
                SELECT id, query, result, token_cost, created_at_secs, created_at_nanos
                FROM searches
                WHERE user_id = ?1
                ORDER BY seq DESC
                LIMIT ?2
                ",
            )
            .map_err(|error| {
                MemoryError::storage(format!("failed to prepare search query: {error}"))
            })?;

        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = stmt
            .query_map(params![user_id.as_str(), limit], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, i64>(3)?,
                    row.get::<_, i64>(4)?,
                    row.get::<_, i64>(5)?,
                ))
            })
            .map_err(|error| {
                MemoryError::storage(format!("failed to query search rows: {error}"))
            })?;

        let mut outcomes = Vec::new();
        for row in rows {
            let (id, query, text, token_cost, secs, nanos) = row.map_err(|error| {
                MemoryError::storage(format!("failed to read search row: {error}"))
            })?;
            outcomes.push(SearchOutcome {
                id,
                user_id: user_id.clone(),
                query,
                text,
                token_cost: decode_count(token_cost, "token_cost")?,
                created_at: decode_system_time(secs, nanos)?,
            });
        }
        Ok(outcomes)
    }
}

impl SearchLog for SqliteSearchLog {
    fn record<'a>(&'a self, outcome: SearchOutcome) -> ChatFuture<'a, Result<(), ChatError>> {
        Box::pin(async move { Ok(self.insert(&outcome)?) })
    }

    fn recent<'a>(
        &'a self,
        user_id: &'a UserId,
        limit: usize,
    ) -> ChatFuture<'a, Result<Vec<SearchOutcome>, ChatError>> {
        Box::pin(async move { Ok(self.load_recent(user_id, limit)?) })
    }
}
