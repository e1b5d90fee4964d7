//! SQLite-backed persistence for accounts and the message log.
//!
//! One short-lived transaction (or single statement) per operation; errors
//! surface to the caller uncaught. Schema is created on boot.

pub mod accounts;
pub mod messages;

use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};

use crate::Result;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS accounts (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    phone TEXT NOT NULL UNIQUE,
    status TEXT NOT NULL,
    session_token TEXT,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS messages (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    chat_id INTEGER,
    sender_id INTEGER,
    sender_username TEXT NOT NULL,
    text TEXT NOT NULL,
    is_self INTEGER NOT NULL,
    account_id INTEGER NOT NULL REFERENCES accounts(id),
    counterpart TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_messages_account_counterpart
    ON messages(account_id, counterpart);
"#;

/// Handle to the database pool. Cheap to clone.
#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    pub async fn connect(database_url: &str) -> Result<Self> {
        let opts = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(opts)
            .await?;

        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    /// Hermetic in-memory store. A single connection keeps every operation on
    /// the same database.
    pub async fn connect_in_memory() -> Result<Self> {
        let opts = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(opts)
            .await?;

        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<()> {
        use sqlx::Executor;
        self.pool.execute(SCHEMA).await?;
        Ok(())
    }

    pub(crate) fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}
