//! Note repository contracts and SQLite implementations.
//!
//! # Responsibility
//! - Define the note repository surface for blocking and async callers.
//! - Keep SQL, keyword reconciliation and ownership checks in one place.
//!
//! # Invariants
//! - Every operation filters by the acting owner.
//! - Writes run inside a savepoint; a failed write leaves no partial rows.
//! - Absence is reported as `None`/`false`, never as an error.

use crate::db::DbError;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub mod async_note_repo;
pub mod keywords;
pub mod note_repo;

pub type RepoResult<T> = Result<T, RepoError>;

/// Entity family a note may reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceKind {
    Project,
    Source,
}

impl ReferenceKind {
    pub(crate) fn table(self) -> &'static str {
        match self {
            Self::Project => "projects",
            Self::Source => "sources",
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::Project => "project",
            Self::Source => "source",
        }
    }
}

/// Repository error for note persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    /// Underlying SQLite failure.
    Db(DbError),
    /// Referenced project/source is missing or owned by another user.
    InvalidReference { kind: ReferenceKind, id: Uuid },
    /// Persisted row cannot be converted into the read model.
    InvalidData(String),
    /// Note metadata could not be encoded or decoded.
    Serialization(serde_json::Error),
    /// The session was released while a repository was still bound to it.
    SessionClosed,
    /// Background blocking task panicked or was cancelled.
    TaskFailed(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::InvalidReference { kind, id } => {
                write!(f, "{} {id} not found for the acting user", kind.label())
            }
            Self::InvalidData(message) => write!(f, "invalid persisted note data: {message}"),
            Self::Serialization(err) => write!(f, "note metadata serialization failed: {err}"),
            Self::SessionClosed => write!(f, "repository session is no longer available"),
            Self::TaskFailed(message) => write!(f, "blocking repository task failed: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Serialization(err) => Some(err),
            Self::InvalidReference { .. }
            | Self::InvalidData(_)
            | Self::SessionClosed
            | Self::TaskFailed(_) => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<serde_json::Error> for RepoError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization(value)
    }
}
