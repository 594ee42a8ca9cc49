//! SQLite persistence for conversation history, quota counters and the search log.
//!
//! All three stores share one [`SqliteDatabase`]:
//!
//! ```rust
//! use rmemory::SqliteStores;
//!
//! let stores = SqliteStores::open_in_memory().expect("schema is created on open");
//! let _history = stores.history.clone();
//! ```

mod codec;
mod database;
mod error;
mod history;
mod quota;
mod search;

use std::path::Path;
use std::sync::Arc;

pub mod prelude {
    pub use crate::{
        MemoryError, MemoryErrorKind, SqliteDatabase, SqliteHistoryStore, SqliteQuotaStore,
        SqliteSearchLog, SqliteStores,
    };
}

pub use codec::{decode_content, encode_content};
pub use database::SqliteDatabase;
pub use error::{MemoryError, MemoryErrorKind};
pub use history::SqliteHistoryStore;
pub use quota::SqliteQuotaStore;
pub use search::SqliteSearchLog;

/// The three stores over one shared database.
#[derive(Debug, Clone)]
pub struct SqliteStores {
    pub history: Arc<SqliteHistoryStore>,
    pub quota: Arc<SqliteQuotaStore>,
    pub search_log: Arc<SqliteSearchLog>,
}

impl SqliteStores {
    pub fn new(database: Arc<SqliteDatabase>) -> Self {
        Self {
            history: Arc::new(SqliteHistoryStore::new(Arc::clone(&database))),
            quota: Arc::new(SqliteQuotaStore::new(Arc::clone(&database))),
            search_log: Arc::new(SqliteSearchLog::new(database)),
        }
    }

    pub fn open(path: impl AsRef<Path>) -> Result<Self, MemoryError> {
        Ok(Self::new(Arc::new(SqliteDatabase::open(path)?)))
    }

    pub fn open_in_memory() -> Result<Self, MemoryError> {
        Ok(Self::new(Arc::new(SqliteDatabase::open_in_memory()?)))
    }
}
