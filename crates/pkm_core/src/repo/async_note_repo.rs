//! Non-blocking note repository.
//!
//! # Responsibility
//! - Expose the note repository surface to async callers.
//! - Run each operation on tokio's blocking pool against the session's
//!   connection, reusing [`SqliteNoteRepository`] for the actual work.
//!
//! # Invariants
//! - An operation is suspended only while its blocking task runs; keyword
//!   reconciliation and the note write share one blocking task.
//! - The session is moved into the task and handed back afterwards, so no
//!   lock guards the connection.

use crate::db::Session;
use crate::model::note::{Note, NoteCreate, NoteId, NoteUpdate, ProjectId};
use crate::model::page::Page;
use crate::repo::note_repo::{NoteRepository, SqliteNoteRepository};
use crate::repo::{RepoError, RepoResult};
use async_trait::async_trait;
use rusqlite::Connection;

/// Async repository interface with the same operations as [`NoteRepository`].
#[async_trait]
pub trait AsyncNoteRepository: Send {
    async fn get_by_id(&mut self, note_id: NoteId, owner: &str) -> RepoResult<Option<Note>>;
    async fn list_by_owner(&mut self, owner: &str, page: Page) -> RepoResult<Vec<Note>>;
    async fn create(&mut self, note_in: NoteCreate, owner: &str) -> RepoResult<Note>;
    async fn update(
        &mut self,
        note_id: NoteId,
        note_in: NoteUpdate,
        owner: &str,
    ) -> RepoResult<Option<Note>>;
    async fn delete(&mut self, note_id: NoteId, owner: &str) -> RepoResult<bool>;
    async fn search_by_text(
        &mut self,
        owner: &str,
        query: &str,
        page: Page,
    ) -> RepoResult<Vec<Note>>;
    async fn search_by_project(
        &mut self,
        project_id: ProjectId,
        owner: &str,
        page: Page,
    ) -> RepoResult<Vec<Note>>;
    async fn search_by_keyword_name(
        &mut self,
        keyword_name: &str,
        project_id: Option<ProjectId>,
        owner: &str,
        page: Page,
    ) -> RepoResult<Vec<Note>>;
    async fn search_by_keyword_names(
        &mut self,
        keyword_names: &[String],
        project_id: Option<ProjectId>,
        owner: &str,
        page: Page,
    ) -> RepoResult<Vec<Note>>;
}

/// Async note repository bound to the session slot of a unit of work.
pub struct AsyncSqliteNoteRepository<'s> {
    slot: &'s mut Option<Session>,
}

impl<'s> AsyncSqliteNoteRepository<'s> {
    pub fn new(slot: &'s mut Option<Session>) -> Self {
        Self { slot }
    }

    /// Runs `work` on the blocking pool with the session's connection.
    async fn blocking<T, W>(&mut self, work: W) -> RepoResult<T>
    where
        T: Send + 'static,
        W: FnOnce(&Connection) -> RepoResult<T> + Send + 'static,
    {
        let session = self.slot.take().ok_or(RepoError::SessionClosed)?;
        let (session, result) = tokio::task::spawn_blocking(move || {
            let result = session
                .transaction_conn()
                .map_err(RepoError::from)
                .and_then(work);
            (session, result)
        })
        .await
        .map_err(|err| RepoError::TaskFailed(err.to_string()))?;
        *self.slot = Some(session);
        result
    }
}

#[async_trait]
impl AsyncNoteRepository for AsyncSqliteNoteRepository<'_> {
    async fn get_by_id(&mut self, note_id: NoteId, owner: &str) -> RepoResult<Option<Note>> {
        let owner = owner.to_owned();
        self.blocking(move |conn| SqliteNoteRepository::new(conn).get_by_id(note_id, &owner))
            .await
    }

    async fn list_by_owner(&mut self, owner: &str, page: Page) -> RepoResult<Vec<Note>> {
        let owner = owner.to_owned();
        self.blocking(move |conn| SqliteNoteRepository::new(conn).list_by_owner(&owner, page))
            .await
    }

    async fn create(&mut self, note_in: NoteCreate, owner: &str) -> RepoResult<Note> {
        let owner = owner.to_owned();
        self.blocking(move |conn| SqliteNoteRepository::new(conn).create(&note_in, &owner))
            .await
    }

    async fn update(
        &mut self,
        note_id: NoteId,
        note_in: NoteUpdate,
        owner: &str,
    ) -> RepoResult<Option<Note>> {
        let owner = owner.to_owned();
        self.blocking(move |conn| {
            SqliteNoteRepository::new(conn).update(note_id, &note_in, &owner)
        })
        .await
    }

    async fn delete(&mut self, note_id: NoteId, owner: &str) -> RepoResult<bool> {
        let owner = owner.to_owned();
        self.blocking(move |conn| SqliteNoteRepository::new(conn).delete(note_id, &owner))
            .await
    }

    async fn search_by_text(
        &mut self,
        owner: &str,
        query: &str,
        page: Page,
    ) -> RepoResult<Vec<Note>> {
        let owner = owner.to_owned();
        let query = query.to_owned();
        self.blocking(move |conn| {
            SqliteNoteRepository::new(conn).search_by_text(&owner, &query, page)
        })
        .await
    }

    async fn search_by_project(
        &mut self,
        project_id: ProjectId,
        owner: &str,
        page: Page,
    ) -> RepoResult<Vec<Note>> {
        let owner = owner.to_owned();
        self.blocking(move |conn| {
            SqliteNoteRepository::new(conn).search_by_project(project_id, &owner, page)
        })
        .await
    }

    async fn search_by_keyword_name(
        &mut self,
        keyword_name: &str,
        project_id: Option<ProjectId>,
        owner: &str,
        page: Page,
    ) -> RepoResult<Vec<Note>> {
        let owner = owner.to_owned();
        let keyword_name = keyword_name.to_owned();
        self.blocking(move |conn| {
            SqliteNoteRepository::new(conn).search_by_keyword_name(
                &keyword_name,
                project_id,
                &owner,
                page,
            )
        })
        .await
    }

    async fn search_by_keyword_names(
        &mut self,
        keyword_names: &[String],
        project_id: Option<ProjectId>,
        owner: &str,
        page: Page,
    ) -> RepoResult<Vec<Note>> {
        let owner = owner.to_owned();
        let keyword_names = keyword_names.to_vec();
        self.blocking(move |conn| {
            SqliteNoteRepository::new(conn).search_by_keyword_names(
                &keyword_names,
                project_id,
                &owner,
                page,
            )
        })
        .await
    }
}
