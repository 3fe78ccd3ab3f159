//! Database sessions and the factories that open them.
//!
//! # Responsibility
//! - Own one connection and the transaction currently open on it.
//! - Open new sessions for units of work through [`SessionFactory`].
//!
//! # Invariants
//! - A session is used by one task at a time; it is `Send` but not shared.
//! - Closing a session rolls back whatever was not committed.

use super::config::SessionConfig;
use super::open::open_db_with_config;
use super::DbResult;
use log::{debug, error, warn};
use rusqlite::Connection;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// Produces a new connection for every unit-of-work scope.
pub trait SessionFactory: Send + Sync {
    fn open_session(&self) -> DbResult<Connection>;
}

impl<F> SessionFactory for F
where
    F: Fn() -> DbResult<Connection> + Send + Sync,
{
    fn open_session(&self) -> DbResult<Connection> {
        self()
    }
}

/// Opens file-backed sessions with a fixed [`SessionConfig`].
#[derive(Debug, Clone)]
pub struct SqliteSessionFactory {
    config: SessionConfig,
}

impl SqliteSessionFactory {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self::with_config(SessionConfig::new(path))
    }

    pub fn with_config(config: SessionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }
}

impl SessionFactory for SqliteSessionFactory {
    fn open_session(&self) -> DbResult<Connection> {
        open_db_with_config(&self.config)
    }
}

/// One connection plus its open transaction.
///
/// Transactions are `DEFERRED` and begin on first use of
/// [`Session::transaction_conn`]. Locks are left to SQLite: readers share the
/// WAL snapshot, writers take the write lock at their first write and wait up
/// to the configured busy timeout for it.
pub struct Session {
    id: u64,
    conn: Connection,
}

impl Session {
    pub fn new(conn: Connection) -> Self {
        Self {
            id: NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed),
            conn,
        }
    }

    /// Process-unique id used in log events.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn in_transaction(&self) -> bool {
        !self.conn.is_autocommit()
    }

    /// Begins a transaction unless one is already open.
    pub fn begin(&self) -> DbResult<()> {
        if !self.in_transaction() {
            self.conn.execute_batch("BEGIN DEFERRED;")?;
            debug!("event=session_begin module=db status=ok session_id={}", self.id);
        }
        Ok(())
    }

    /// Connection with a transaction guaranteed to be open.
    pub fn transaction_conn(&self) -> DbResult<&Connection> {
        self.begin()?;
        Ok(&self.conn)
    }

    /// Commits the open transaction.
    ///
    /// On failure the transaction is rolled back before the error is returned.
    pub fn commit(&self) -> DbResult<()> {
        if !self.in_transaction() {
            return Ok(());
        }
        if let Err(err) = self.conn.execute_batch("COMMIT;") {
            error!(
                "event=session_commit module=db status=error session_id={} error={}",
                self.id, err
            );
            if self.in_transaction() {
                if let Err(rollback_err) = self.conn.execute_batch("ROLLBACK;") {
                    warn!(
                        "event=session_rollback module=db status=error session_id={} error={}",
                        self.id, rollback_err
                    );
                }
            }
            return Err(err.into());
        }
        Ok(())
    }

    /// Discards the open transaction.
    pub fn rollback(&self) -> DbResult<()> {
        if self.in_transaction() {
            self.conn.execute_batch("ROLLBACK;")?;
        }
        Ok(())
    }

    /// Rolls back pending writes and closes the connection.
    ///
    /// Returns whether uncommitted writes were discarded.
    pub fn close(self) -> DbResult<bool> {
        let discarded = self.in_transaction();
        let rollback = self.rollback();
        let closed = self.conn.close().map_err(|(_, err)| err);
        rollback?;
        closed?;
        Ok(discarded)
    }
}
