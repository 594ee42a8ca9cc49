//! Shared SQLite connection and schema.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use rusqlite::Connection;

use crate::MemoryError;

/// One connection shared by the history, quota and search-log stores. Statements run
/// under the lock, never across an await point.
#[derive(Debug)]
pub struct SqliteDatabase {
    connection: Mutex<Connection>,
}

impl SqliteDatabase {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, MemoryError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|error| {
                MemoryError::storage(format!(
                    "failed to create sqlite parent directory: {error}"
                ))
            })?;
        }

        let connection = Connection::open(path).map_err(|error| {
            MemoryError::storage(format!("failed to open sqlite database: {error}"))
        })?;
        Self::initialize(connection)
    }

    pub fn open_in_memory() -> Result<Self, MemoryError> {
        let connection = Connection::open_in_memory().map_err(|error| {
            MemoryError::storage(format!("failed to open in-memory sqlite database: {error}"))
        })?;
        Self::initialize(connection)
    }

    fn initialize(connection: Connection) -> Result<Self, MemoryError> {
        connection
            .busy_timeout(Duration::from_secs(5))
            .map_err(|error| {
                MemoryError::storage(format!("failed to configure sqlite busy timeout: {error}"))
            })?;
        connection.execute_batch(SCHEMA).map_err(|error| {
            MemoryError::storage(format!("failed to initialize sqlite schema: {error}"))
        })?;

        Ok(Self {
            connection: Mutex::new(connection),
        })
    }

    pub(crate) fn connection(&self) -> Result<MutexGuard<'_, Connection>, MemoryError> {
        self.connection
            .lock()
            .map_err(|_| MemoryError::storage("sqlite connection lock poisoned"))
    }
}

const SCHEMA: &str = "
    PRAGMA journal_mode = WAL;
    PRAGMA synchronous = NORMAL;

    CREATE TABLE IF NOT EXISTS turns (
        seq INTEGER PRIMARY KEY AUTOINCREMENT,
        id TEXT NOT NULL UNIQUE,
        session_id TEXT NOT NULL,
        role TEXT NOT NULL,
        content TEXT NOT NULL,
        token_cost INTEGER NOT NULL,
        created_at_secs INTEGER NOT NULL,
        created_at_nanos INTEGER NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_turns_session_seq
    ON turns(session_id, seq);

    CREATE TABLE IF NOT EXISTS quotas (
        user_id TEXT PRIMARY KEY,
        chat_remaining INTEGER NOT NULL CHECK (chat_remaining >= 0),
        search_remaining INTEGER NOT NULL CHECK (search_remaining >= 0)
    );

    CREATE TABLE IF NOT EXISTS searches (
        seq INTEGER PRIMARY KEY AUTOINCREMENT,
        id TEXT NOT NULL UNIQUE,
        user_id TEXT NOT NULL,
        query TEXT NOT NULL,
        result TEXT NOT NULL,
        token_cost INTEGER NOT NULL,
        created_at_secs INTEGER NOT NULL,
        created_at_nanos INTEGER NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_searches_user_seq
    ON searches(user_id, seq);
";

pub(crate) fn encode_system_time(value: SystemTime) -> Result<(i64, i64), MemoryError> {
    let duration = value.duration_since(UNIX_EPOCH).map_err(|error| {
        MemoryError::invalid_request(format!("timestamp predates unix epoch: {error}"))
    })?;
    Ok((
        duration.as_secs() as i64,
        i64::from(duration.subsec_nanos()),
    ))
}

pub(crate) fn decode_system_time(seconds: i64, nanos: i64) -> Result<SystemTime, MemoryError> {
    if seconds < 0 {
        return Err(MemoryError::storage(format!(
            "timestamp seconds must be non-negative, got {seconds}"
        )));
    }
    if !(0..1_000_000_000).contains(&nanos) {
        return Err(MemoryError::storage(format!(
            "timestamp nanos must be in [0, 1_000_000_000), got {nanos}"
        )));
    }
    Ok(UNIX_EPOCH + Duration::new(seconds as u64, nanos as u32))
}

pub(crate) fn decode_count(value: i64, column: &str) -> Result<u32, MemoryError> {
    u32::try_from(value)
        .map_err(|_| MemoryError::storage(format!("{column} out of range: {value}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_is_created_once_and_reopening_is_idempotent() {
        let root = std::env::temp_dir().join(format!(
            "rmemory-schema-{}",
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .expect("clock after epoch")
                .as_nanos()
        ));
        let path = root.join("relay.sqlite3");

        SqliteDatabase::open(&path).expect("first open");
        let database = SqliteDatabase::open(&path).expect("second open");

        let mode: String = database
            .connection()
            .expect("lock")
            .query_row("PRAGMA journal_mode", [], |row| row.get(0))
            .expect("journal mode");
        assert_eq!(mode, "wal");

        std::fs::remove_dir_all(&root).expect("temporary directory removable");
    }

    #[test]
    fn timestamps_round_trip_with_nanosecond_precision() {
        let at = UNIX_EPOCH + Duration::new(1_709_651_045, 123_456_789);
        let (secs, nanos) = encode_system_time(at).expect("after epoch");
        assert_eq!(decode_system_time(secs, nanos).expect("valid"), at);
        assert!(decode_system_time(-1, 0).is_err());
    }
}
