use crate::{Backend, Entity, ErrorContext, Id, QueryBuilder, QueryError, Result, TxGuard};
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::{fmt, sync::Arc, thread, time::Duration};

/// Tuning knobs consumed by [`Store::open`].
#[derive(Clone, Debug)]
pub struct StoreOptions {
    /// Retrieval attempts per query before the last error surfaces.
    pub attempts: u32,
    /// Backoff before the second attempt; doubles for every retry
    /// after.
    pub initial_backoff: Duration,
    /// Worker threads for subscription delivery.
    pub worker_threads: usize,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            attempts: 1,
            initial_backoff: Duration::from_millis(10),
            worker_threads: num_cpus::get(),
        }
    }
}

/// Shared handle to an opened store. Cheap to clone; the engine, the
/// options and the worker pool live behind one shared allocation.
pub struct Store<B: Backend> {
    inner: Arc<StoreInner<B>>,
}

struct StoreInner<B> {
    backend: B,
    options: StoreOptions,
    pool: ThreadPool,
}

impl<B: Backend> Store<B> {
    /// Open a store over `backend`.
    pub fn open(backend: B, options: StoreOptions) -> Result<Self> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(options.worker_threads.max(1))
            .thread_name(|index| format!("silo-worker-{index}"))
            .build()
            .context("While building the store worker pool")?;
        Ok(Self {
            inner: Arc::new(StoreInner {
                backend,
                options,
                pool,
            }),
        })
    }

    pub fn backend(&self) -> &B {
        &self.inner.backend
    }

    /// Begin building a query over `T`.
    pub fn query<T: Entity>(&self) -> Result<QueryBuilder<T, B>> {
        QueryBuilder::new(self.clone())
    }

    /// Insert or update one entity, writing the assigned id back.
    pub fn put<T: Entity>(&self, entity: &mut T) -> Result<Id> {
        let id = self.write(|tx| {
            let cursor = tx.cursor(T::def())?;
            self.inner.backend.put(cursor.handle(), entity.to_row())
        })?;
        entity.set_id(id);
        Ok(id)
    }

    /// Fetch one entity by id.
    pub fn get<T: Entity>(&self, id: Id) -> Result<Option<T>> {
        self.read(|tx| {
            let cursor = tx.cursor(T::def())?;
            let row = self.inner.backend.get(cursor.handle(), id)?;
            row.as_ref().map(T::from_row).transpose()
        })
    }

    pub(crate) fn spawn(&self, job: impl FnOnce() + Send + 'static) {
        self.inner.pool.spawn(job);
    }

    /// Single-attempt read scope (reader-cursor operations such as
    /// counts).
    pub(crate) fn read<R>(&self, f: impl FnOnce(&TxGuard<'_, B>) -> Result<R>) -> Result<R> {
        let tx = TxGuard::read(&self.inner.backend)?;
        f(&tx)
    }

    /// Run `f` inside a read transaction, retrying transient engine
    /// errors with doubling backoff. Logical errors surface
    /// immediately.
    pub(crate) fn read_retrying<R>(
        &self,
        mut f: impl FnMut(&TxGuard<'_, B>) -> Result<R>,
    ) -> Result<R> {
        let attempts = self.inner.options.attempts.max(1);
        let mut backoff = self.inner.options.initial_backoff;
        let mut tries = 0;
        loop {
            tries += 1;
            let result = TxGuard::read(&self.inner.backend).and_then(|tx| f(&tx));
            match result {
                Ok(value) => return Ok(value),
                Err(error) if tries < attempts && QueryError::is_transient(&error) => {
                    log::debug!(
                        "retrying after transient backend error (attempt {tries}/{attempts}): {error:#}"
                    );
                    thread::sleep(backoff);
                    backoff *= 2;
                }
                Err(error) => {
                    log::error!("{:#}", error);
                    return Err(error);
                }
            }
        }
    }

    /// Write scope; commits on success, aborts on error.
    pub(crate) fn write<R>(&self, f: impl FnOnce(&TxGuard<'_, B>) -> Result<R>) -> Result<R> {
        let tx = TxGuard::write(&self.inner.backend)?;
        let value = f(&tx)?;
        tx.commit()?;
        Ok(value)
    }
}

impl<B: Backend> Clone for Store<B> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<B: Backend> fmt::Debug for Store<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("backend", &self.inner.backend)
            .field("options", &self.inner.options)
            .finish()
    }
}
