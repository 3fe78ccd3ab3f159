//! Persistence core for a personal knowledge-management store.
//!
//! Notes are owned by users and may reference a project, a source and a set
//! of keywords. All access goes through a unit of work that owns one session
//! and its transaction; repositories are obtained from the active unit of
//! work and never commit on their own.

pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod uow;

pub use db::{
    open_db, open_db_in_memory, open_db_with_config, DbError, DbResult, SessionConfig,
    SessionFactory, SqliteSessionFactory,
};
pub use logging::{default_log_level, init_logging, logging_status, LogInitError};
pub use model::note::{
    Keyword, KeywordId, Note, NoteCreate, NoteId, NoteMetadata, NoteUpdate, ProjectId,
    ProjectSummary, SourceId, SourceSummary,
};
pub use model::page::Page;
pub use repo::async_note_repo::{AsyncNoteRepository, AsyncSqliteNoteRepository};
pub use repo::note_repo::{NoteRepository, SqliteNoteRepository};
pub use repo::{ReferenceKind, RepoError, RepoResult};
pub use uow::{
    run_async, AsyncSqliteUnitOfWork, AsyncUnitOfWork, ScopeExit, ScopeFuture, ScopeGuard,
    SqliteUnitOfWork, UnitOfWork, UowError, UowResult,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
