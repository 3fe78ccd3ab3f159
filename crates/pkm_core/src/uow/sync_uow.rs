//! Blocking unit of work.

use super::{ScopeExit, UowError, UowResult};
use crate::db::{Session, SessionFactory};
use crate::repo::note_repo::{NoteRepository, SqliteNoteRepository};
use log::{debug, error, info, warn};
use std::ops::{Deref, DerefMut};
use std::time::Instant;

/// Blocking unit-of-work contract.
///
/// Use [`UnitOfWork::scope`] or [`UnitOfWork::run`] rather than pairing
/// `enter`/`exit` by hand; both guarantee the session is released.
pub trait UnitOfWork {
    /// Note repository bound to the active session.
    type Notes<'s>: NoteRepository
    where
        Self: 's;

    /// Opens a session (`Idle -> Active`).
    ///
    /// The transaction begins with the first repository call.
    fn enter(&mut self) -> UowResult<()>;
    /// Repository bound to the active session.
    fn notes(&self) -> UowResult<Self::Notes<'_>>;
    /// Durably commits writes made since entry or the previous commit.
    fn commit(&mut self) -> UowResult<()>;
    /// Discards writes made since entry or the previous commit.
    fn rollback(&mut self) -> UowResult<()>;
    /// Leaves the scope and releases the session (`Active -> Idle`).
    ///
    /// Never fails; release problems are logged. A no-op when idle.
    fn exit(&mut self, how: ScopeExit);
    fn is_active(&self) -> bool;

    /// Enters a scope that is exited when the returned guard drops.
    fn scope(&mut self) -> UowResult<ScopeGuard<'_, Self>>
    where
        Self: Sized,
    {
        self.enter()?;
        Ok(ScopeGuard {
            uow: self,
            exit: ScopeExit::Normal,
        })
    }

    /// Runs `work` inside a fresh scope.
    ///
    /// An `Err` from `work` exits with [`ScopeExit::Failed`]; the error is
    /// returned unchanged. Nothing is committed unless `work` commits.
    fn run<T, E, W>(&mut self, work: W) -> Result<T, E>
    where
        Self: Sized,
        E: From<UowError>,
        W: FnOnce(&mut Self) -> Result<T, E>,
    {
        let mut guard = self.scope()?;
        let result = work(&mut *guard);
        if result.is_err() {
            guard.fail();
        }
        result
    }
}

/// RAII handle for an active scope.
///
/// Dropping the guard exits the scope. An unwinding panic counts as a failed
/// exit.
pub struct ScopeGuard<'u, U: UnitOfWork> {
    uow: &'u mut U,
    exit: ScopeExit,
}

impl<U: UnitOfWork> ScopeGuard<'_, U> {
    /// Marks the scope as failing so the exit rolls back.
    pub fn fail(&mut self) {
        self.exit = ScopeExit::Failed;
    }
}

impl<U: UnitOfWork> Deref for ScopeGuard<'_, U> {
    type Target = U;

    fn deref(&self) -> &U {
        self.uow
    }
}

impl<U: UnitOfWork> DerefMut for ScopeGuard<'_, U> {
    fn deref_mut(&mut self) -> &mut U {
        self.uow
    }
}

impl<U: UnitOfWork> Drop for ScopeGuard<'_, U> {
    fn drop(&mut self) {
        let how = if std::thread::panicking() {
            ScopeExit::Failed
        } else {
            self.exit
        };
        self.uow.exit(how);
    }
}

/// SQLite unit of work running every call on the caller's thread.
pub struct SqliteUnitOfWork<F> {
    factory: F,
    session: Option<Session>,
    unusable: bool,
}

impl<F: SessionFactory> SqliteUnitOfWork<F> {
    pub fn new(factory: F) -> Self {
        Self {
            factory,
            session: None,
            unusable: false,
        }
    }

    fn active_session(&self) -> UowResult<&Session> {
        match self.session.as_ref() {
            None => Err(UowError::NotActive),
            Some(_) if self.unusable => Err(UowError::SessionUnusable),
            Some(session) => Ok(session),
        }
    }
}

impl<F: SessionFactory> UnitOfWork for SqliteUnitOfWork<F> {
    type Notes<'s> = SqliteNoteRepository<'s> where Self: 's;

    fn enter(&mut self) -> UowResult<()> {
        if self.session.is_some() {
            return Err(UowError::AlreadyActive);
        }

        let started_at = Instant::now();
        let session = self
            .factory
            .open_session()
            .map(Session::new)
            .map_err(|err| {
                error!(
                    "event=uow_enter module=uow status=error mode=sync duration_ms={} error={}",
                    started_at.elapsed().as_millis(),
                    err
                );
                UowError::SessionAcquisition(err)
            })?;

        info!(
            "event=uow_enter module=uow status=ok mode=sync session_id={} duration_ms={}",
            session.id(),
            started_at.elapsed().as_millis()
        );
        self.session = Some(session);
        self.unusable = false;
        Ok(())
    }

    fn notes(&self) -> UowResult<SqliteNoteRepository<'_>> {
        let conn = self.active_session()?.transaction_conn()?;
        Ok(SqliteNoteRepository::new(conn))
    }

    fn commit(&mut self) -> UowResult<()> {
        let session = self.active_session()?;
        let session_id = session.id();
        match session.commit() {
            Ok(()) => {
                info!("event=uow_commit module=uow status=ok mode=sync session_id={session_id}");
                Ok(())
            }
            Err(err) => {
                self.unusable = true;
                error!(
                    "event=uow_commit module=uow status=error mode=sync session_id={session_id} error={err}"
                );
                Err(UowError::Db(err))
            }
        }
    }

    fn rollback(&mut self) -> UowResult<()> {
        let session = self.active_session()?;
        session.rollback()?;
        info!(
            "event=uow_rollback module=uow status=ok mode=sync session_id={}",
            session.id()
        );
        Ok(())
    }

    fn exit(&mut self, how: ScopeExit) {
        let Some(session) = self.session.take() else {
            debug!("event=uow_exit module=uow status=skipped mode=sync reason=idle");
            return;
        };
        self.unusable = false;
        release_session(session, how, "sync");
    }

    fn is_active(&self) -> bool {
        self.session.is_some()
    }
}

impl<F> Drop for SqliteUnitOfWork<F> {
    fn drop(&mut self) {
        if let Some(session) = self.session.take() {
            warn!(
                "event=uow_drop module=uow status=warn mode=sync session_id={} reason=scope_not_exited",
                session.id()
            );
            release_session(session, ScopeExit::Failed, "sync");
        }
    }
}

/// Rolls back (on failure) and closes `session`, logging the outcome.
pub(super) fn release_session(session: Session, how: ScopeExit, mode: &'static str) {
    let session_id = session.id();
    if how == ScopeExit::Failed {
        if let Err(err) = session.rollback() {
            warn!(
                "event=uow_rollback module=uow status=error mode={mode} session_id={session_id} error={err}"
            );
        }
    }

    match session.close() {
        Ok(discarded_pending) => info!(
            "event=uow_exit module=uow status=ok mode={mode} session_id={session_id} exit={} discarded_pending={discarded_pending}",
            how.as_str()
        ),
        Err(err) => error!(
            "event=uow_exit module=uow status=error mode={mode} session_id={session_id} exit={} error={err}",
            how.as_str()
        ),
    }
}
