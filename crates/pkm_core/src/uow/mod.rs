//! Unit of Work: one session, one transaction scope, bound repositories.
//!
//! # Responsibility
//! - Open a session on scope entry and release it on every exit path.
//! - Expose the note repository bound to that session.
//! - Provide explicit `commit`/`rollback`; roll back on abnormal exit.
//!
//! # Invariants
//! - State is `Idle` or `Active`; `notes`/`commit`/`rollback` need `Active`.
//! - A normal exit never commits; uncommitted writes are discarded.
//! - One instance serves one task; concurrent tasks use separate instances.

use crate::db::DbError;
use crate::repo::RepoError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod async_uow;
pub mod sync_uow;

pub use async_uow::{run_async, AsyncSqliteUnitOfWork, AsyncUnitOfWork, ScopeFuture};
pub use sync_uow::{ScopeGuard, SqliteUnitOfWork, UnitOfWork};

pub type UowResult<T> = Result<T, UowError>;

/// How a scope is being left.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeExit {
    /// The caller finished its work; pending writes are discarded unless
    /// already committed.
    Normal,
    /// A failure is propagating; pending writes are rolled back.
    Failed,
}

impl ScopeExit {
    fn as_str(self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Failed => "failed",
        }
    }
}

/// Errors raised by unit-of-work operations.
#[derive(Debug)]
pub enum UowError {
    /// The session factory could not produce a session.
    SessionAcquisition(DbError),
    /// `notes`/`commit`/`rollback` called outside an active scope.
    NotActive,
    /// `enter` called while a scope is already active.
    AlreadyActive,
    /// A commit failed earlier in this scope; only exit is allowed.
    SessionUnusable,
    /// Store failure during commit or rollback.
    Db(DbError),
    /// Failure from a repository bound to this scope.
    Repo(RepoError),
    /// Blocking task panicked or was cancelled.
    TaskFailed(String),
}

impl Display for UowError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SessionAcquisition(err) => write!(f, "failed to acquire session: {err}"),
            Self::NotActive => write!(f, "unit of work is not active"),
            Self::AlreadyActive => write!(f, "unit of work is already active"),
            Self::SessionUnusable => {
                write!(f, "session is unusable after a failed commit; exit the scope")
            }
            Self::Db(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
            Self::TaskFailed(message) => write!(f, "blocking unit-of-work task failed: {message}"),
        }
    }
}

impl Error for UowError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::SessionAcquisition(err) | Self::Db(err) => Some(err),
            Self::Repo(err) => Some(err),
            Self::NotActive | Self::AlreadyActive | Self::SessionUnusable | Self::TaskFailed(_) => {
                None
            }
        }
    }
}

impl From<DbError> for UowError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<RepoError> for UowError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}
