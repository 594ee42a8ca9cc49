//! SQLite-backed quota counters.

use std::sync::Arc;

use rchat::{ChatError, ChatFuture, QuotaKind, QuotaStore};
use rcommon::UserId;
use rusqlite::{OptionalExtension, params};

use crate::database::decode_count;
use crate::{MemoryError, SqliteDatabase};

/// The decrement is a single conditional `UPDATE`, so the counter cannot go below zero
/// whatever the number of concurrent callers.
#[derive(Debug, Clone)]
pub struct SqliteQuotaStore {
    database: Arc<SqliteDatabase>,
}

impl SqliteQuotaStore {
    pub fn new(database: Arc<SqliteDatabase>) -> Self {
        Self { database }
    }

    fn read(&self, user_id: &UserId, kind: QuotaKind) -> Result<u32, MemoryError> {
        let sql = match kind {
            QuotaKind::Chat => "SELECT chat_remaining FROM quotas WHERE user_id = ?1",
            QuotaKind::Search => "SELECT search_remaining FROM quotas WHERE user_id = ?1",
        };

        let conn = self.database.connection()?;
        let remaining = conn
            .query_row(sql, params![user_id.as_str()], |row| row.get::<_, i64>(0))
            .optional()
            .map_err(|error| MemoryError::storage(format!("failed to read quota: {error}")))?;

        remaining.map_or(Ok(0), |value| decode_count(value, "quota"))
    }

    fn take(&self, user_id: &UserId, kind: QuotaKind) -> Result<bool, MemoryError> {
        let sql = match kind {
            QuotaKind::Chat => {
                "UPDATE quotas SET chat_remaining = chat_remaining - 1
                 WHERE user_id = ?1 AND chat_remaining > 0"
            }
            QuotaKind::Search => {
                "UPDATE quotas SET search_remaining = search_remaining - 1
                 WHERE user_id = ?1 AND search_remaining > 0"
            }
        };

        let conn = self.database.connection()?;
        let changed = conn
            .execute(sql, params![user_id.as_str()])
            .map_err(|error| MemoryError::storage(format!("failed to decrement quota: {error}")))?;
        Ok(changed == 1)
    }

    fn give_back(&self, user_id: &UserId, kind: QuotaKind) -> Result<(), MemoryError> {
        let sql = match kind {
            QuotaKind::Chat => {
                "UPDATE quotas SET chat_remaining = chat_remaining + 1 WHERE user_id = ?1"
            }
            QuotaKind::Search => {
                "UPDATE quotas SET search_remaining = search_remaining + 1 WHERE user_id = ?1"
            }
        };

        let conn = self.database.connection()?;
        conn.execute(sql, params![user_id.as_str()])
            .map_err(|error| MemoryError::storage(format!("failed to refund quota: {error}")))?;
        Ok(())
    }

    fn seed(&self, user_id: &UserId, chat: u32, search: u32) -> Result<(), MemoryError> {
        let conn = self.database.connection()?;
        conn.execute(
            "
            INSERT INTO quotas (user_id, chat_remaining, search_remaining)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(user_id) DO UPDATE SET
                chat_remaining = excluded.chat_remaining,
                search_remaining = excluded.search_remaining
            ",
            params![user_id.as_str(), i64::from(chat), i64::from(search)],
        )
        .map_err(|error| MemoryError::storage(format!("failed to provision quota: {error}")))?;
        Ok(())
    }
}

impl QuotaStore for SqliteQuotaStore {
    fn remaining<'a>(
        &'a self,
        user_id: &'a UserId,
        kind: QuotaKind,
    ) -> ChatFuture<'a, Result<u32, ChatError>> {
        Box::pin(async move { Ok(self.read(user_id, kind)?) })
    }

    fn decrement<'a>(
        &'a self,
        user_id: &'a UserId,
        kind: QuotaKind,
    ) -> ChatFuture<'a, Result<bool, ChatError>> {
        Box::pin(async move { Ok(self.take(user_id, kind)?) })
    }

    fn refund<'a>(
        &'a self,
        user_id: &'a UserId,
        kind: QuotaKind,
    ) -> ChatFuture<'a, Result<(), ChatError>> {
        Box::pin(async move { Ok(self.give_back(user_id, kind)?) })
    }

    fn provision<'a>(
        &'a self,
        user_id: &'a UserId,
        chat: u32,
        search: u32,
    ) -> ChatFuture<'a, Result<(), ChatError>> {
        Box::pin(async move { Ok(self.seed(user_id, chat, search)?) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> Arc<SqliteQuotaStore> {
        Arc::new(SqliteQuotaStore::new(Arc::new(
            SqliteDatabase::open_in_memory().expect("database opens"),
        )))
    }

    #[tokio::test]
    async fn decrement_never_goes_below_zero_under_concurrency() {
        let store = store();
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
    async fn counters_are_independent_per_kind() {
        let store = store();
        let user = UserId::from("u1");
        store.provision(&user, 10, 100).await.expect("provision");

        assert!(store.decrement(&user, QuotaKind::Search).await.expect("decrement"));
        assert_eq!(store.remaining(&user, QuotaKind::Chat).await.expect("read"), 10);
        assert_eq!(store.remaining(&user, QuotaKind::Search).await.expect("read"), 99);

        store.refund(&user, QuotaKind::Search).await.expect("refund");
        assert_eq!(store.remaining(&user, QuotaKind::Search).await.expect("read"), 100);
    }

    #[tokio::test]
    async fn unprovisioned_users_have_nothing_to_take() {
        let store = store();
        let user = UserId::from("ghost");

        assert_eq!(store.remaining(&user, QuotaKind::Chat).await.expect("read"), 0);
        assert!(!store.decrement(&user, QuotaKind::Chat).await.expect("decrement"));
    }

    #[tokio::test]
    async fn provisioning_replaces_existing_counters() {
        let store = store();
        let user = UserId::from("u1");
        store.provision(&user, 1, 1).await.expect("provision");
        store.provision(&user, 7, 3).await.expect("reprovision");

        assert_eq!(store.remaining(&user, QuotaKind::Chat).await.expect("read"), 7);
        assert_eq!(store.remaining(&user, QuotaKind::Search).await.expect("read"), 3);
    }
}
