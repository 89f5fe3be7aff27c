use crate::{Backend, Entity, query::QueryInner};
use std::{
    panic::{AssertUnwindSafe, catch_unwind},
    sync::{
        Arc, Mutex, PoisonError, Weak,
        atomic::{AtomicU64, Ordering},
    },
};

/// Re-broadcasts a query's current results to its observers.
///
/// The only contract this layer upholds is that a publish re-runs the
/// query on the store's shared worker pool and hands the results to
/// every registered observer.
pub trait Publisher: Send + Sync {
    fn publish(&self);
}

struct ObserverEntry<T> {
    id: u64,
    /// Serializes deliveries of one subscription.
    deliver: Mutex<()>,
    callback: Box<dyn Fn(&[T]) + Send + Sync>,
}

/// Observer registry of one query. Deliveries run on the store pool;
/// notifications go out in subscription order and callbacks of a
/// single subscription never overlap.
pub(crate) struct QueryPublisher<T: Entity, B: Backend> {
    query: Weak<QueryInner<T, B>>,
    observers: Mutex<Vec<Arc<ObserverEntry<T>>>>,
    next_id: AtomicU64,
}

impl<T: Entity, B: Backend> QueryPublisher<T, B> {
    pub(crate) fn new(query: Weak<QueryInner<T, B>>) -> Self {
        Self {
            query,
            observers: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    fn subscribe(&self, callback: Box<dyn Fn(&[T]) + Send + Sync>) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let entry = Arc::new(ObserverEntry {
            id,
            deliver: Mutex::new(()),
            callback,
        });
        self.observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(entry);
        id
    }

    pub(crate) fn unsubscribe(&self, id: u64) {
        self.observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|entry| entry.id != id);
    }

    /// Schedule a delivery to every observer, or to one of them.
    fn publish_to(&self, only: Option<u64>) {
        let Some(inner) = self.query.upgrade() else {
            return;
        };
        let query = self.query.clone();
        inner.store().spawn(move || {
            let Some(inner) = query.upgrade() else {
                return;
            };
            let data = match inner.find() {
                Ok(data) => data,
                Err(error) => {
                    log::error!("subscription delivery failed: {error:#}");
                    return;
                }
            };
            let entries: Vec<_> = inner
                .publisher()
                .observers
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone();
            for entry in entries {
                if only.is_some_and(|id| id != entry.id) {
                    continue;
                }
                let _serialized = entry.deliver.lock().unwrap_or_else(PoisonError::into_inner);
                if let Err(panic) = catch_unwind(AssertUnwindSafe(|| (entry.callback)(&data))) {
                    log::error!("observer callback panicked: {panic:?}");
                }
            }
        });
    }
}

impl<T: Entity, B: Backend> Publisher for QueryPublisher<T, B> {
    fn publish(&self) {
        self.publish_to(None);
    }
}

/// Configures an observer registration for one query.
pub struct SubscriptionBuilder<'q, T: Entity, B: Backend> {
    query: &'q Arc<QueryInner<T, B>>,
}

impl<'q, T: Entity, B: Backend> SubscriptionBuilder<'q, T, B> {
    pub(crate) fn new(query: &'q Arc<QueryInner<T, B>>) -> Self {
        Self { query }
    }

    /// Register `observer` and deliver the current results to it on the
    /// store pool. The returned subscription cancels itself on drop.
    pub fn observer(self, observer: impl Fn(&[T]) + Send + Sync + 'static) -> DataSubscription<T, B> {
        let publisher = self.query.publisher();
        let id = publisher.subscribe(Box::new(observer));
        publisher.publish_to(Some(id));
        DataSubscription {
            id,
            query: Arc::downgrade(self.query),
        }
    }
}

/// Live observer registration; dropping it unsubscribes.
pub struct DataSubscription<T: Entity, B: Backend> {
    id: u64,
    query: Weak<QueryInner<T, B>>,
}

impl<T: Entity, B: Backend> DataSubscription<T, B> {
    pub fn cancel(&self) {
        if let Some(inner) = self.query.upgrade() {
            inner.publisher().unsubscribe(self.id);
        }
    }
}

impl<T: Entity, B: Backend> Drop for DataSubscription<T, B> {
    fn drop(&mut self) {
        self.cancel();
    }
}
