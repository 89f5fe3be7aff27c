use crate::{QueryError, Result};
use std::fmt;

/// Target side of a to-one relation, materializable on demand.
pub trait EagerTarget {
    /// Force the target entity to load.
    fn materialize(&self);
}

/// Target side of a to-many relation; computing the size forces the
/// collection to load.
pub trait EagerCollection {
    fn materialize(&self) -> usize;
}

/// Identifies a declared to-one or to-many relation and how to traverse
/// it from an entity.
pub struct RelationDescriptor<T> {
    pub name: &'static str,
    pub to_one: Option<fn(&T) -> &dyn EagerTarget>,
    pub to_many: Option<fn(&T) -> &dyn EagerCollection>,
}

impl<T> RelationDescriptor<T> {
    pub const fn to_one(name: &'static str, getter: fn(&T) -> &dyn EagerTarget) -> Self {
        Self {
            name,
            to_one: Some(getter),
            to_many: None,
        }
    }

    pub const fn to_many(name: &'static str, getter: fn(&T) -> &dyn EagerCollection) -> Self {
        Self {
            name,
            to_one: None,
            to_many: Some(getter),
        }
    }

    /// Force materialization of the related entity or collection.
    pub(crate) fn resolve(&self, entity: &T) -> Result<()> {
        if let Some(getter) = self.to_one {
            getter(entity).materialize();
            Ok(())
        } else if let Some(getter) = self.to_many {
            getter(entity).materialize();
            Ok(())
        } else {
            Err(QueryError::illegal_state(format!(
                "relation `{}` declares no traversal getter",
                self.name
            )))
        }
    }
}

impl<T> Clone for RelationDescriptor<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for RelationDescriptor<T> {}

impl<T> fmt::Debug for RelationDescriptor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelationDescriptor")
            .field("name", &self.name)
            .field("to_one", &self.to_one.is_some())
            .field("to_many", &self.to_many.is_some())
            .finish()
    }
}

/// Pairing of a relation with a result-prefix limit; limit 0 resolves
/// for every result.
pub struct EagerSpec<T> {
    pub relation: RelationDescriptor<T>,
    pub limit: u32,
}

impl<T> EagerSpec<T> {
    pub(crate) fn applies_to(&self, index: usize) -> bool {
        self.limit == 0 || (index as u64) < u64::from(self.limit)
    }
}

impl<T> Clone for EagerSpec<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for EagerSpec<T> {}

impl<T> fmt::Debug for EagerSpec<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EagerSpec")
            .field("relation", &self.relation.name)
            .field("limit", &self.limit)
            .finish()
    }
}
