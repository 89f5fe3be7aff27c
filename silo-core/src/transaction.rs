use crate::{Backend, CursorHandle, EntityDef, QueryError, Result, TxHandle};

/// Scope guard for one engine transaction.
///
/// Dropping without [`TxGuard::commit`] aborts, so every exit path
/// releases the engine side. Read transactions are aborted on drop as
/// well; for the engine that is a plain release.
pub struct TxGuard<'s, B: Backend> {
    backend: &'s B,
    handle: Option<TxHandle>,
}

impl<'s, B: Backend> TxGuard<'s, B> {
    pub(crate) fn read(backend: &'s B) -> Result<Self> {
        Ok(Self {
            backend,
            handle: Some(backend.begin_read()?),
        })
    }

    pub(crate) fn write(backend: &'s B) -> Result<Self> {
        Ok(Self {
            backend,
            handle: Some(backend.begin_write()?),
        })
    }

    /// Open a cursor over `entity`'s store. The cursor cannot outlive
    /// this transaction scope.
    pub fn cursor(&self, entity: &'static EntityDef) -> Result<CursorGuard<'_, B>> {
        let Some(handle) = self.handle else {
            return Err(QueryError::illegal_state(
                "transaction has already been committed",
            ));
        };
        Ok(CursorGuard {
            backend: self.backend,
            handle: self.backend.open_cursor(handle, entity)?,
        })
    }

    pub fn commit(mut self) -> Result<()> {
        match self.handle.take() {
            Some(handle) => self.backend.commit(handle),
            None => Ok(()),
        }
    }
}

impl<B: Backend> Drop for TxGuard<'_, B> {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.backend.abort(handle);
        }
    }
}

/// Scope guard for a transaction-bound cursor; closed on drop.
pub struct CursorGuard<'t, B: Backend> {
    backend: &'t B,
    handle: CursorHandle,
}

impl<B: Backend> CursorGuard<'_, B> {
    pub fn handle(&self) -> CursorHandle {
        self.handle
    }
}

impl<B: Backend> Drop for CursorGuard<'_, B> {
    fn drop(&mut self) {
        self.backend.close_cursor(self.handle);
    }
}
