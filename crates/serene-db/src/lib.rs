pub mod migrations;
pub mod models;
pub mod queries;

use anyhow::Result;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::Connection;
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicI64, Ordering};
use tracing::info;

/// Typed failures callers need to tell apart from plain I/O or SQL errors.
/// Returned wrapped in `anyhow::Error`; use `downcast_ref` to inspect.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("record already exists")]
    Duplicate,
}

pub struct Database {
    conn: Mutex<Connection>,
    /// Last write timestamp handed out, in microseconds since the epoch.
    clock: AtomicI64,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;

        // WAL mode for concurrent reads
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;

        let db = Self::from_connection(conn)?;

        info!("Database opened at {}", path.display());
        Ok(db)
    }

    /// Private in-memory database, used by tests and throwaway instances.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;

        Self::from_connection(conn)
    }

    /// Migrate, then start the write clock at the newest stored timestamp so
    /// a wall clock that stepped back across a restart cannot reorder writes.
    fn from_connection(conn: Connection) -> Result<Self> {
        migrations::run(&conn)?;
        let newest = newest_timestamp_micros(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
            clock: AtomicI64::new(newest),
        })
    }

    pub fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self.conn.lock().map_err(|e| anyhow::anyhow!("DB lock poisoned: {}", e))?;
        f(&conn)
    }

    /// Exclusive access for writes that need a transaction.
    pub fn with_conn_mut<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T>,
    {
        let mut conn = self.conn.lock().map_err(|e| anyhow::anyhow!("DB lock poisoned: {}", e))?;
        f(&mut conn)
    }

    /// Server-assigned write timestamp, strictly increasing for the life of
    /// this handle even if the wall clock stalls or steps back. Call it while
    /// holding the connection so timestamp order matches commit order.
    pub(crate) fn next_timestamp(&self) -> String {
        let now = Utc::now().timestamp_micros();
        let prev = self
            .clock
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| Some(now.max(last + 1)))
            .unwrap_or(now);
        format_timestamp(now.max(prev + 1))
    }
}

fn newest_timestamp_micros(conn: &Connection) -> Result<i64> {
    let newest: Option<String> = conn.query_row(
        "SELECT MAX(ts) FROM (
             SELECT MAX(sent_at) AS ts FROM messages
             UNION ALL SELECT MAX(last_message_at) FROM conversations
             UNION ALL SELECT MAX(created_at) FROM users
         )",
        [],
        |row| row.get(0),
    )?;

    Ok(newest
        .and_then(|ts| DateTime::parse_from_rfc3339(&ts).ok())
        .map(|dt| dt.timestamp_micros())
        .unwrap_or(0))
}

/// Fixed-width RFC 3339 in UTC, so string order equals chronological order.
fn format_timestamp(micros: i64) -> String {
    DateTime::<Utc>::from_timestamp_micros(micros)
        .unwrap_or_default()
        .to_rfc3339_opts(SecondsFormat::Micros, true)
}
