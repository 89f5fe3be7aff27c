use crate::{Backend, Entity, Id, Result, Store};
use std::{
    fmt,
    sync::{Mutex, PoisonError},
};

/// Entities fetched on access, backed by the id list of a query run.
///
/// Each access opens its own read transaction, so an entity removed
/// since the query ran resolves to `None`. The caching variant keeps
/// resolved entities; the plain variant re-fetches on every access.
pub struct LazyList<T: Entity, B: Backend> {
    store: Store<B>,
    ids: Vec<Id>,
    cache: Option<Mutex<Vec<Option<T>>>>,
}

impl<T: Entity, B: Backend> LazyList<T, B> {
    pub(crate) fn new(store: Store<B>, ids: Vec<Id>, cached: bool) -> Self {
        let cache = cached.then(|| {
            let mut slots = Vec::with_capacity(ids.len());
            slots.resize_with(ids.len(), || None);
            Mutex::new(slots)
        });
        Self { store, ids, cache }
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn ids(&self) -> &[Id] {
        &self.ids
    }

    /// Fetch the entity at `index`; `None` past the end or when the
    /// entity was removed meanwhile.
    pub fn get(&self, index: usize) -> Result<Option<T>>
    where
        T: Clone,
    {
        let Some(&id) = self.ids.get(index) else {
            return Ok(None);
        };
        let Some(cache) = &self.cache else {
            return self.store.get(id);
        };
        let mut slots = cache.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(hit) = &slots[index] {
            return Ok(Some(hit.clone()));
        }
        let loaded: Option<T> = self.store.get(id)?;
        slots[index] = loaded.clone();
        Ok(loaded)
    }

    /// Resolve every entity still present, in id-list order.
    pub fn to_vec(&self) -> Result<Vec<T>>
    where
        T: Clone,
    {
        let mut entities = Vec::with_capacity(self.ids.len());
        for index in 0..self.ids.len() {
            if let Some(entity) = self.get(index)? {
                entities.push(entity);
            }
        }
        Ok(entities)
    }
}

impl<T: Entity, B: Backend> fmt::Debug for LazyList<T, B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyList")
            .field("store", &self.store)
            .field("ids", &self.ids)
            .field("cached", &self.cache.is_some())
            .finish()
    }
}
