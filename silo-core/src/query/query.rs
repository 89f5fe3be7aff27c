use crate::{
    Backend, EagerSpec, Entity, FloatValue, Id, IntegerValue, LazyList, Property, PropertyQuery,
    Publisher, QueryError, QueryHandle, Result, Store, SubscriptionBuilder,
    observer::QueryPublisher,
};
use std::{
    cmp::Ordering,
    fmt,
    ops::ControlFlow,
    sync::{Arc, Mutex, PoisonError},
};

/// A compiled, repeatable query over `T`.
///
/// Every retrieval opens a fresh read transaction (bounded-retry
/// envelope configured on the store), acquires a cursor for `T`'s
/// store, runs the engine-side primitive, then applies post-filtering,
/// eager resolution and in-process sorting.
///
/// The engine handle is owned until [`close`](Self::close) or drop;
/// closing twice is a no-op.
pub struct Query<T: Entity, B: Backend> {
    inner: Arc<QueryInner<T, B>>,
}

pub(crate) struct QueryInner<T: Entity, B: Backend> {
    store: Store<B>,
    handle: Mutex<Option<QueryHandle>>,
    has_order: bool,
    eager: Vec<EagerSpec<T>>,
    filter: Option<Box<dyn Fn(&T) -> bool + Send + Sync>>,
    comparator: Option<Box<dyn Fn(&T, &T) -> Ordering + Send + Sync>>,
    publisher: QueryPublisher<T, B>,
}

impl<T: Entity, B: Backend> Query<T, B> {
    pub(crate) fn new(
        store: Store<B>,
        handle: QueryHandle,
        has_order: bool,
        eager: Vec<EagerSpec<T>>,
        filter: Option<Box<dyn Fn(&T) -> bool + Send + Sync>>,
        comparator: Option<Box<dyn Fn(&T, &T) -> Ordering + Send + Sync>>,
    ) -> Self {
        Self {
            inner: Arc::new_cyclic(|weak| QueryInner {
                store,
                handle: Mutex::new(Some(handle)),
                has_order,
                eager,
                filter,
                comparator,
                publisher: QueryPublisher::new(weak.clone()),
            }),
        }
    }

    /// First match, or `None`.
    pub fn find_first(&self) -> Result<Option<T>> {
        self.inner.find_first()
    }

    /// The single match; `NotUnique` when the engine reports more than
    /// one.
    pub fn find_unique(&self) -> Result<Option<T>> {
        self.inner.find_unique()
    }

    /// All matches: engine order, post-filter, eager resolution, then
    /// the in-process comparator (stable).
    pub fn find(&self) -> Result<Vec<T>> {
        self.inner.find()
    }

    /// Engine-level pagination; incompatible with post-filter and
    /// comparator.
    pub fn find_range(&self, offset: u64, limit: u64) -> Result<Vec<T>> {
        self.inner.find_range(offset, limit)
    }

    /// Matching ids, unordered; rejects ordered queries. A post-filter
    /// is silently ignored.
    pub fn find_ids(&self) -> Result<Vec<Id>> {
        self.inner.find_ids(0, 0)
    }

    /// Engine-paginated ids, same restrictions as [`find_ids`](Self::find_ids).
    pub fn find_ids_range(&self, offset: u64, limit: u64) -> Result<Vec<Id>> {
        self.inner.find_ids(offset, limit)
    }

    /// Ids now, entities on access.
    pub fn find_lazy(&self) -> Result<LazyList<T, B>> {
        self.inner.find_lazy(false)
    }

    /// Ids now, entities on access, resolved entities cached.
    pub fn find_lazy_cached(&self) -> Result<LazyList<T, B>> {
        self.inner.find_lazy(true)
    }

    /// Visit every passing entity in engine order. The consumer returns
    /// [`ControlFlow::Break`] to stop early; breaking is not an error.
    pub fn for_each(&self, consumer: impl FnMut(&T) -> ControlFlow<()>) -> Result<()> {
        self.inner.for_each(consumer)
    }

    /// Number of matches, via a reader cursor.
    pub fn count(&self) -> Result<u64> {
        self.inner.count()
    }

    /// Delete all matches inside a write transaction, returning the
    /// deleted count.
    pub fn remove(&self) -> Result<u64> {
        self.inner.remove()
    }

    /// Engine-rendered description of the compiled predicate.
    pub fn describe(&self) -> Result<String> {
        self.inner.describe()
    }

    /// Derive a retrieval over a single property of the matches.
    pub fn property<V>(&self, property: &Property<V>) -> PropertyQuery<'_, T, B> {
        PropertyQuery::new(&self.inner, property.id, property.ty)
    }

    // Parameter rebinding. Slots of the compiled query are updated in
    // place; observers are not notified.

    /// Rebind an integer-channel parameter (bool and dates coerce to
    /// the long slot).
    pub fn set_parameter<V: IntegerValue>(&self, property: &Property<V>, value: V) -> Result<()> {
        self.inner.with_handle(|backend, query| {
            backend.set_parameter_long(query, property.id, value.as_long())
        })
    }

    pub fn set_parameter_double<V: FloatValue>(
        &self,
        property: &Property<V>,
        value: V,
    ) -> Result<()> {
        self.inner.with_handle(|backend, query| {
            backend.set_parameter_double(query, property.id, value.as_double())
        })
    }

    pub fn set_parameter_string(&self, property: &Property<String>, value: &str) -> Result<()> {
        self.inner.with_handle(|backend, query| {
            backend.set_parameter_string(query, property.id, value)
        })
    }

    /// Rebind both ends of a range condition.
    pub fn set_parameters<V: IntegerValue>(
        &self,
        property: &Property<V>,
        first: V,
        second: V,
    ) -> Result<()> {
        self.inner.with_handle(|backend, query| {
            backend.set_parameters_long(query, property.id, first.as_long(), second.as_long())
        })
    }

    pub fn set_parameters_double<V: FloatValue>(
        &self,
        property: &Property<V>,
        first: V,
        second: V,
    ) -> Result<()> {
        self.inner.with_handle(|backend, query| {
            backend.set_parameters_double(query, property.id, first.as_double(), second.as_double())
        })
    }

    /// Rebind the condition tagged with `alias` on the integer channel.
    pub fn set_parameter_alias<V: IntegerValue>(&self, alias: &str, value: V) -> Result<()> {
        self.inner.with_handle(|backend, query| {
            backend.set_parameter_long_alias(query, alias, value.as_long())
        })
    }

    pub fn set_parameter_double_alias<V: FloatValue>(&self, alias: &str, value: V) -> Result<()> {
        self.inner.with_handle(|backend, query| {
            backend.set_parameter_double_alias(query, alias, value.as_double())
        })
    }

    pub fn set_parameter_string_alias(&self, alias: &str, value: &str) -> Result<()> {
        self.inner
            .with_handle(|backend, query| backend.set_parameter_string_alias(query, alias, value))
    }

    pub fn set_parameters_alias<V: IntegerValue>(
        &self,
        alias: &str,
        first: V,
        second: V,
    ) -> Result<()> {
        self.inner.with_handle(|backend, query| {
            backend.set_parameters_long_alias(query, alias, first.as_long(), second.as_long())
        })
    }

    /// Re-broadcast current results to every observer on the store
    /// pool.
    pub fn publish(&self) {
        self.inner.publisher.publish();
    }

    /// Begin an observer registration.
    pub fn subscribe(&self) -> SubscriptionBuilder<'_, T, B> {
        SubscriptionBuilder::new(&self.inner)
    }

    /// Release the engine handle. Idempotent and thread-safe; further
    /// retrievals fail with `IllegalState`.
    pub fn close(&self) {
        self.inner.close();
    }
}

impl<T: Entity, B: Backend> QueryInner<T, B> {
    pub(crate) fn store(&self) -> &Store<B> {
        &self.store
    }

    pub(crate) fn publisher(&self) -> &QueryPublisher<T, B> {
        &self.publisher
    }

    /// Run `f` with the live handle, serialized against close and
    /// concurrent parameter rebinding.
    pub(crate) fn with_handle<R>(&self, f: impl FnOnce(&B, QueryHandle) -> Result<R>) -> Result<R> {
        let guard = self.handle.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(handle) = *guard else {
            return Err(QueryError::illegal_state("query is closed"));
        };
        f(self.store.backend(), handle)
    }

    fn ensure_no_filter(&self, operation: &str) -> Result<()> {
        if self.filter.is_some() {
            return Err(QueryError::unsupported(format!(
                "{operation} cannot be combined with a post-filter"
            )));
        }
        Ok(())
    }

    fn ensure_no_comparator(&self, operation: &str) -> Result<()> {
        if self.comparator.is_some() {
            return Err(QueryError::unsupported(format!(
                "{operation} cannot be combined with a comparator"
            )));
        }
        Ok(())
    }

    fn ensure_unordered(&self, operation: &str) -> Result<()> {
        if self.has_order {
            return Err(QueryError::unsupported(format!(
                "{operation} is unordered and rejects ordered queries"
            )));
        }
        Ok(())
    }

    fn resolve_eager_at(&self, entity: &T, index: usize) -> Result<()> {
        for spec in &self.eager {
            if spec.applies_to(index) {
                spec.relation.resolve(entity)?;
            }
        }
        Ok(())
    }

    fn resolve_eager(&self, entities: &[T]) -> Result<()> {
        if self.eager.is_empty() {
            return Ok(());
        }
        for (index, entity) in entities.iter().enumerate() {
            self.resolve_eager_at(entity, index)?;
        }
        Ok(())
    }

    fn find_first(&self) -> Result<Option<T>> {
        self.ensure_no_filter("find_first")?;
        self.ensure_no_comparator("find_first")?;
        self.store.read_retrying(|tx| {
            let cursor = tx.cursor(T::def())?;
            self.with_handle(|backend, query| {
                let row = backend.find_first(cursor.handle(), query)?;
                let entity = row.as_ref().map(T::from_row).transpose()?;
                if let Some(entity) = &entity {
                    self.resolve_eager_at(entity, 0)?;
                }
                Ok(entity)
            })
        })
    }

    fn find_unique(&self) -> Result<Option<T>> {
        self.ensure_no_filter("find_unique")?;
        self.ensure_no_comparator("find_unique")?;
        self.store.read_retrying(|tx| {
            let cursor = tx.cursor(T::def())?;
            self.with_handle(|backend, query| {
                let row = backend.find_unique(cursor.handle(), query)?;
                let entity = row.as_ref().map(T::from_row).transpose()?;
                if let Some(entity) = &entity {
                    self.resolve_eager_at(entity, 0)?;
                }
                Ok(entity)
            })
        })
    }

    pub(crate) fn find(&self) -> Result<Vec<T>> {
        let mut entities = self.store.read_retrying(|tx| {
            let cursor = tx.cursor(T::def())?;
            self.with_handle(|backend, query| {
                let rows = backend.find(cursor.handle(), query, 0, 0)?;
                rows.iter().map(T::from_row).collect::<Result<Vec<_>>>()
            })
        })?;
        if let Some(filter) = &self.filter {
            entities.retain(|entity| filter(entity));
        }
        self.resolve_eager(&entities)?;
        if let Some(comparator) = &self.comparator {
            entities.sort_by(|a, b| comparator(a, b));
        }
        Ok(entities)
    }

    fn find_range(&self, offset: u64, limit: u64) -> Result<Vec<T>> {
        self.ensure_no_filter("find with offset/limit")?;
        self.ensure_no_comparator("find with offset/limit")?;
        let entities = self.store.read_retrying(|tx| {
            let cursor = tx.cursor(T::def())?;
            self.with_handle(|backend, query| {
                let rows = backend.find(cursor.handle(), query, offset, limit)?;
                rows.iter().map(T::from_row).collect::<Result<Vec<_>>>()
            })
        })?;
        self.resolve_eager(&entities)?;
        Ok(entities)
    }

    fn find_ids(&self, offset: u64, limit: u64) -> Result<Vec<Id>> {
        self.ensure_unordered("find_ids")?;
        self.store.read_retrying(|tx| {
            let cursor = tx.cursor(T::def())?;
            self.with_handle(|backend, query| backend.find_ids(cursor.handle(), query, offset, limit))
        })
    }

    fn find_lazy(&self, cached: bool) -> Result<LazyList<T, B>> {
        self.ensure_no_filter("find_lazy")?;
        self.ensure_no_comparator("find_lazy")?;
        let ids = self.find_ids(0, 0)?;
        Ok(LazyList::new(self.store.clone(), ids, cached))
    }

    fn for_each(&self, mut consumer: impl FnMut(&T) -> ControlFlow<()>) -> Result<()> {
        self.ensure_no_comparator("for_each")?;
        self.ensure_unordered("for_each")?;
        self.store.read_retrying(|tx| {
            let cursor = tx.cursor(T::def())?;
            self.with_handle(|backend, query| {
                let ids = backend.find_ids(cursor.handle(), query, 0, 0)?;
                let mut index = 0;
                for id in ids {
                    let Some(row) = backend.get(cursor.handle(), id)? else {
                        continue;
                    };
                    let entity = T::from_row(&row)?;
                    if let Some(filter) = &self.filter
                        && !filter(&entity)
                    {
                        continue;
                    }
                    self.resolve_eager_at(&entity, index)?;
                    index += 1;
                    if let ControlFlow::Break(()) = consumer(&entity) {
                        break;
                    }
                }
                Ok(())
            })
        })
    }

    fn count(&self) -> Result<u64> {
        self.store.read(|tx| {
            let cursor = tx.cursor(T::def())?;
            self.with_handle(|backend, query| backend.count(cursor.handle(), query))
        })
    }

    fn remove(&self) -> Result<u64> {
        self.store.write(|tx| {
            let cursor = tx.cursor(T::def())?;
            self.with_handle(|backend, query| backend.remove(cursor.handle(), query))
        })
    }

    fn describe(&self) -> Result<String> {
        self.with_handle(|backend, query| backend.describe(query))
    }

    fn close(&self) {
        let mut guard = self.handle.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(handle) = guard.take() {
            self.store.backend().destroy_query(handle);
            log::debug!("closed query over `{}`", T::def().name);
        }
    }
}

impl<T: Entity, B: Backend> Drop for QueryInner<T, B> {
    fn drop(&mut self) {
        self.close();
    }
}

impl<T: Entity, B: Backend> fmt::Debug for Query<T, B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Query")
            .field("entity", &T::def().name)
            .field("has_order", &self.inner.has_order)
            .field("eager", &self.inner.eager)
            .finish()
    }
}
