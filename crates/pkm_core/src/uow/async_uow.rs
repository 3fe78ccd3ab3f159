//! Non-blocking unit of work.
//!
//! Session acquisition, commit, rollback and release run on tokio's blocking
//! pool; the session moves into each task and is handed back afterwards.

use super::sync_uow::release_session;
use super::{ScopeExit, UowError, UowResult};
use crate::db::{DbResult, Session, SessionFactory};
use crate::repo::async_note_repo::{AsyncNoteRepository, AsyncSqliteNoteRepository};
use async_trait::async_trait;
use log::{debug, error, info, warn};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;

/// Boxed future returned by closures passed to [`run_async`].
pub type ScopeFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Async unit-of-work contract.
#[async_trait]
pub trait AsyncUnitOfWork: Send {
    /// Note repository bound to the active session.
    type Notes<'s>: AsyncNoteRepository
    where
        Self: 's;

    async fn enter(&mut self) -> UowResult<()>;
    fn notes(&mut self) -> UowResult<Self::Notes<'_>>;
    async fn commit(&mut self) -> UowResult<()>;
    async fn rollback(&mut self) -> UowResult<()>;
    /// Leaves the scope and releases the session. A no-op when idle.
    async fn exit(&mut self, how: ScopeExit);
    fn is_active(&self) -> bool;
}

/// Runs `work` inside a fresh scope of `uow`.
///
/// The scope exits with [`ScopeExit::Failed`] when `work` returns `Err`, and
/// with [`ScopeExit::Normal`] otherwise. Nothing is committed unless `work`
/// commits.
///
/// ```ignore
/// let note = run_async(&mut uow, |uow| {
///     Box::pin(async move {
///         let note = uow.notes()?.create(payload, "alice").await?;
///         uow.commit().await?;
///         Ok::<_, UowError>(note)
///     })
/// })
/// .await?;
/// ```
pub async fn run_async<U, T, E, W>(uow: &mut U, work: W) -> Result<T, E>
where
    U: AsyncUnitOfWork,
    E: From<UowError>,
    W: for<'a> FnOnce(&'a mut U) -> ScopeFuture<'a, Result<T, E>>,
{
    uow.enter().await?;
    let result = work(uow).await;
    let how = if result.is_ok() {
        ScopeExit::Normal
    } else {
        ScopeExit::Failed
    };
    uow.exit(how).await;
    result
}

/// SQLite unit of work for async callers.
pub struct AsyncSqliteUnitOfWork<F> {
    factory: Arc<F>,
    session: Option<Session>,
    unusable: bool,
}

impl<F: SessionFactory + 'static> AsyncSqliteUnitOfWork<F> {
    pub fn new(factory: F) -> Self {
        Self::from_shared(Arc::new(factory))
    }

    /// Builds a unit of work over a factory shared with other instances.
    pub fn from_shared(factory: Arc<F>) -> Self {
        Self {
            factory,
            session: None,
            unusable: false,
        }
    }

    fn ensure_usable(&self) -> UowResult<()> {
        match self.session {
            None => Err(UowError::NotActive),
            Some(_) if self.unusable => Err(UowError::SessionUnusable),
            Some(_) => Ok(()),
        }
    }

    /// Runs `work` against the active session on the blocking pool.
    async fn with_session<T, W>(&mut self, work: W) -> UowResult<(u64, T)>
    where
        T: Send + 'static,
        W: FnOnce(&Session) -> DbResult<T> + Send + 'static,
    {
        self.ensure_usable()?;
        let session = self.session.take().ok_or(UowError::NotActive)?;
        let (session, result) = tokio::task::spawn_blocking(move || {
            let result = work(&session);
            (session, result)
        })
        .await
        .map_err(|err| UowError::TaskFailed(err.to_string()))?;
        let session_id = session.id();
        self.session = Some(session);
        Ok((session_id, result?))
    }
}

#[async_trait]
impl<F: SessionFactory + 'static> AsyncUnitOfWork for AsyncSqliteUnitOfWork<F> {
    type Notes<'s> = AsyncSqliteNoteRepository<'s> where Self: 's;

    async fn enter(&mut self) -> UowResult<()> {
        if self.session.is_some() {
            return Err(UowError::AlreadyActive);
        }

        let started_at = Instant::now();
        let factory = Arc::clone(&self.factory);
        let session = tokio::task::spawn_blocking(move || -> DbResult<Session> {
            factory.open_session().map(Session::new)
        })
        .await
        .map_err(|err| UowError::TaskFailed(err.to_string()))?
        .map_err(|err| {
            error!(
                "event=uow_enter module=uow status=error mode=async duration_ms={} error={}",
                started_at.elapsed().as_millis(),
                err
            );
            UowError::SessionAcquisition(err)
        })?;

        info!(
            "event=uow_enter module=uow status=ok mode=async session_id={} duration_ms={}",
            session.id(),
            started_at.elapsed().as_millis()
        );
        self.session = Some(session);
        self.unusable = false;
        Ok(())
    }

    fn notes(&mut self) -> UowResult<AsyncSqliteNoteRepository<'_>> {
        self.ensure_usable()?;
        Ok(AsyncSqliteNoteRepository::new(&mut self.session))
    }

    async fn commit(&mut self) -> UowResult<()> {
        match self.with_session(|session| session.commit()).await {
            Ok((session_id, ())) => {
                info!("event=uow_commit module=uow status=ok mode=async session_id={session_id}");
                Ok(())
            }
            Err(UowError::Db(err)) => {
                self.unusable = true;
                error!("event=uow_commit module=uow status=error mode=async error={err}");
                Err(UowError::Db(err))
            }
            Err(err) => Err(err),
        }
    }

    async fn rollback(&mut self) -> UowResult<()> {
        let (session_id, ()) = self.with_session(|session| session.rollback()).await?;
        info!("event=uow_rollback module=uow status=ok mode=async session_id={session_id}");
        Ok(())
    }

    async fn exit(&mut self, how: ScopeExit) {
        let Some(session) = self.session.take() else {
            debug!("event=uow_exit module=uow status=skipped mode=async reason=idle");
            return;
        };
        self.unusable = false;
        if let Err(err) =
            tokio::task::spawn_blocking(move || release_session(session, how, "async")).await
        {
            error!("event=uow_exit module=uow status=error mode=async error={err}");
        }
    }

    fn is_active(&self) -> bool {
        self.session.is_some()
    }
}

impl<F> Drop for AsyncSqliteUnitOfWork<F> {
    fn drop(&mut self) {
        if let Some(session) = self.session.take() {
            warn!(
                "event=uow_drop module=uow status=warn mode=async session_id={} reason=scope_not_exited",
                session.id()
            );
            // Release off the runtime workers when a runtime is available.
            match tokio::runtime::Handle::try_current() {
                Ok(handle) => {
                    drop(handle.spawn_blocking(move || {
                        release_session(session, ScopeExit::Failed, "async")
                    }));
                }
                Err(_) => release_session(session, ScopeExit::Failed, "async"),
            }
        }
    }
}
