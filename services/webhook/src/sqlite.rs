//! Durable ledger on SQLite.
//!
//! One connection behind a mutex; every call runs on the blocking pool.
//! Multi-account writes run in a single transaction.

use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::Context;
use coinhouse_execution::{LedgerStore, StoreError};
use coinhouse_types::{BalanceWrite, Leaderboard};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension};

#[derive(Clone)]
pub struct SqliteLedger {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteLedger {
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        let conn = Connection::open(path).context("open ledger db")?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> anyhow::Result<Self> {
        let conn = Connection::open_in_memory().context("open in-memory ledger db")?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> anyhow::Result<Self> {
        init_schema_sqlite(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn run<T, F>(&self, op: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> rusqlite::Result<T> + Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = conn.lock().unwrap_or_else(|e| e.into_inner());
            op(&mut conn)
        })
        .await
        .map_err(|err| StoreError::Backend(format!("ledger task failed: {err}")))?
        .map_err(classify)
    }
}

fn init_schema_sqlite(conn: &Connection) -> anyhow::Result<()> {
    conn.execute_batch(
        "PRAGMA journal_mode=WAL;
         PRAGMA synchronous=NORMAL;
         PRAGMA busy_timeout=250;
         CREATE TABLE IF NOT EXISTS users (
             id TEXT PRIMARY KEY,
             balance INTEGER NOT NULL DEFAULT 0
         );
         CREATE INDEX IF NOT EXISTS users_by_balance ON users (balance DESC, id ASC);
         CREATE TABLE IF NOT EXISTS winrates (
             game TEXT PRIMARY KEY,
             rate REAL NOT NULL DEFAULT 0.5
         );",
    )
    .context("init ledger schema")?;
    Ok(())
}

/// Busy and locked databases are worth retrying; everything else is not.
fn classify(err: rusqlite::Error) -> StoreError {
    match err.sqlite_error_code() {
        Some(ErrorCode::DatabaseBusy) | Some(ErrorCode::DatabaseLocked) => {
            StoreError::Unavailable(err.to_string())
        }
        _ => StoreError::Backend(err.to_string()),
    }
}

const UPSERT_BALANCE: &str = "INSERT INTO users (id, balance) VALUES (?1, ?2)
     ON CONFLICT(id) DO UPDATE SET balance = excluded.balance";

impl LedgerStore for SqliteLedger {
    async fn get_or_create(&self, user: &str, default: i64) -> Result<i64, StoreError> {
        let user = user.to_string();
        self.run(move |conn| {
            conn.execute(
                "INSERT OR IGNORE INTO users (id, balance) VALUES (?1, ?2)",
                params![user, default],
            )?;
            conn.query_row(
                "SELECT balance FROM users WHERE id = ?1",
                params![user],
                |row| row.get(0),
            )
        })
        .await
    }

    async fn upsert_balance(&self, user: &str, balance: i64) -> Result<(), StoreError> {
        let user = user.to_string();
        self.run(move |conn| {
            conn.execute(UPSERT_BALANCE, params![user, balance])?;
            Ok(())
        })
        .await
    }

    async fn upsert_balances(&self, writes: &[BalanceWrite]) -> Result<(), StoreError> {
        let writes = writes.to_vec();
        self.run(move |conn| {
            let tx = conn.transaction()?;
            {
                let mut stmt = tx.prepare_cached(UPSERT_BALANCE)?;
                for write in &writes {
                    stmt.execute(params![write.user, write.after])?;
                }
            }
            tx.commit()
        })
        .await
    }

    async fn top_n_by_balance(&self, n: usize) -> Result<Leaderboard, StoreError> {
        let limit = i64::try_from(n).unwrap_or(i64::MAX);
        let rows = self
            .run(move |conn| {
                let mut stmt = conn.prepare_cached(
                    "SELECT id, balance FROM users ORDER BY balance DESC, id ASC LIMIT ?1",
                )?;
                let rows = stmt.query_map(params![limit], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
                })?;
                rows.collect::<rusqlite::Result<Vec<_>>>()
            })
            .await?;
        Ok(Leaderboard::from_accounts(rows, n))
    }

    async fn get_or_create_winrate(&self, game: &str, default: f64) -> Result<f64, StoreError> {
        let game = game.to_string();
        self.run(move |conn| {
            conn.execute(
                "INSERT OR IGNORE INTO winrates (game, rate) VALUES (?1, ?2)",
                params![game, default],
            )?;
            conn.query_row(
                "SELECT rate FROM winrates WHERE game = ?1",
                params![game],
                |row| row.get(0),
            )
        })
        .await
    }

    async fn set_winrate(&self, game: &str, rate: f64) -> Result<(), StoreError> {
        let game = game.to_string();
        self.run(move |conn| {
            conn.execute(
                "INSERT INTO winrates (game, rate) VALUES (?1, ?2)
                 ON CONFLICT(game) DO UPDATE SET rate = excluded.rate",
                params![game, rate],
            )?;
            Ok(())
        })
        .await
    }
}

impl SqliteLedger {
    /// Stored balance without creating the account.
    pub async fn balance(&self, user: &str) -> Result<Option<i64>, StoreError> {
        let user = user.to_string();
        self.run(move |conn| {
            conn.query_row(
                "SELECT balance FROM users WHERE id = ?1",
                params![user],
                |row| row.get(0),
            )
            .optional()
        })
        .await
    }
}
