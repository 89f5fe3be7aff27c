use crate::{
    Backend, BuilderHandle, CompareOp, ConditionHandle, Entity, EagerSpec, FloatValue,
    IntegerValue, OrderFlags, OrderedValue, Property, QueryError, Query, RelationDescriptor,
    Result, Scalar, Store, StringOp, StringOrder,
};
use std::{cmp::Ordering, fmt, mem};

/// Pending explicit combinator, consumed by the next condition.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
enum PendingOp {
    #[default]
    None,
    And,
    Or,
}

/// Accumulates a logical expression over predicates plus auxiliary
/// execution directives, and compiles a repeatable [`Query`].
///
/// Conditions chain fluently; sequential conditions without an
/// intervening [`and`](Self::and)/[`or`](Self::or) are conjoined at
/// build time. An explicit operator is eager: when the next condition
/// arrives, the deferred conjunction of everything before it
/// materializes and the operator binds it to that condition, so
/// grouping is left-to-right:
///
/// `equal(color, blue) . equal(size, xl) . or() . less(price, 30)`
/// compiles to `(color == blue AND size == xl) OR price < 30`.
///
/// The builder owns an engine handle; [`build`](Self::build) consumes
/// it, and an abandoned builder releases it on drop.
pub struct QueryBuilder<T: Entity, B: Backend> {
    store: Store<B>,
    handle: Option<BuilderHandle>,
    last_condition: Option<ConditionHandle>,
    pending: PendingOp,
    has_order: bool,
    eager: Vec<EagerSpec<T>>,
    filter: Option<Box<dyn Fn(&T) -> bool + Send + Sync>>,
    comparator: Option<Box<dyn Fn(&T, &T) -> Ordering + Send + Sync>>,
}

impl<T: Entity, B: Backend> QueryBuilder<T, B> {
    pub(crate) fn new(store: Store<B>) -> Result<Self> {
        let handle = store.backend().create_builder(T::def())?;
        log::debug!("created query builder over `{}`", T::def().name);
        Ok(Self {
            store,
            handle: Some(handle),
            last_condition: None,
            pending: PendingOp::None,
            has_order: false,
            eager: Vec::new(),
            filter: None,
            comparator: None,
        })
    }

    fn handle(&self) -> Result<BuilderHandle> {
        self.handle
            .ok_or_else(|| QueryError::illegal_state("builder was already consumed by build()"))
    }

    /// Combinator sink: every new condition lands here.
    fn push(&mut self, condition: ConditionHandle) -> Result<&mut Self> {
        match mem::take(&mut self.pending) {
            PendingOp::None => self.last_condition = Some(condition),
            op => {
                let Some(last) = self.last_condition else {
                    return Err(QueryError::illegal_state(
                        "combine operator pending without a prior condition",
                    ));
                };
                let combined = self.store.backend().combine(
                    self.handle()?,
                    last,
                    condition,
                    op == PendingOp::Or,
                )?;
                self.last_condition = Some(combined);
            }
        }
        Ok(self)
    }

    fn pend(&mut self, op: PendingOp) -> Result<&mut Self> {
        self.handle()?;
        if self.last_condition.is_none() {
            return Err(QueryError::illegal_state(
                "no condition to combine; add a condition before and()/or()",
            ));
        }
        if self.pending != PendingOp::None {
            return Err(QueryError::illegal_state(
                "a combine operator is already pending",
            ));
        }
        self.pending = op;
        Ok(self)
    }

    /// Combine the previous and the next condition with AND, eagerly.
    pub fn and(&mut self) -> Result<&mut Self> {
        self.pend(PendingOp::And)
    }

    /// Combine the previous and the next condition with OR, eagerly.
    pub fn or(&mut self) -> Result<&mut Self> {
        self.pend(PendingOp::Or)
    }

    // Nullness.

    pub fn is_null<V>(&mut self, property: &Property<V>) -> Result<&mut Self> {
        let condition = self
            .store
            .backend()
            .null_condition(self.handle()?, property.id, false)?;
        self.push(condition)
    }

    pub fn not_null<V>(&mut self, property: &Property<V>) -> Result<&mut Self> {
        let condition = self
            .store
            .backend()
            .null_condition(self.handle()?, property.id, true)?;
        self.push(condition)
    }

    // Integer-channel comparisons (bool packs to 0/1, dates to epoch
    // milliseconds).

    pub fn equal<V: IntegerValue>(&mut self, property: &Property<V>, value: V) -> Result<&mut Self> {
        let condition = self.store.backend().long_condition(
            self.handle()?,
            property.id,
            CompareOp::Equal,
            value.as_long(),
        )?;
        self.push(condition)
    }

    pub fn not_equal<V: IntegerValue>(
        &mut self,
        property: &Property<V>,
        value: V,
    ) -> Result<&mut Self> {
        let condition = self.store.backend().long_condition(
            self.handle()?,
            property.id,
            CompareOp::NotEqual,
            value.as_long(),
        )?;
        self.push(condition)
    }

    pub fn less<V: OrderedValue>(&mut self, property: &Property<V>, value: V) -> Result<&mut Self> {
        self.compare(property, CompareOp::Less, value)
    }

    pub fn greater<V: OrderedValue>(
        &mut self,
        property: &Property<V>,
        value: V,
    ) -> Result<&mut Self> {
        self.compare(property, CompareOp::Greater, value)
    }

    fn compare<V: OrderedValue>(
        &mut self,
        property: &Property<V>,
        op: CompareOp,
        value: V,
    ) -> Result<&mut Self> {
        let handle = self.handle()?;
        let condition = match value.as_scalar() {
            Scalar::Long(value) => self
                .store
                .backend()
                .long_condition(handle, property.id, op, value)?,
            Scalar::Double(value) => self
                .store
                .backend()
                .double_condition(handle, property.id, op, value)?,
        };
        self.push(condition)
    }

    /// Inclusive range; `from == to` degenerates to equality.
    pub fn between<V: OrderedValue>(
        &mut self,
        property: &Property<V>,
        from: V,
        to: V,
    ) -> Result<&mut Self> {
        let handle = self.handle()?;
        let condition = match (from.as_scalar(), to.as_scalar()) {
            (Scalar::Long(from), Scalar::Long(to)) => self
                .store
                .backend()
                .long_range_condition(handle, property.id, from, to)?,
            (Scalar::Double(from), Scalar::Double(to)) => self
                .store
                .backend()
                .double_range_condition(handle, property.id, from, to)?,
            _ => {
                return Err(QueryError::invalid_argument(
                    "range endpoints must share a scalar channel",
                ));
            }
        };
        self.push(condition)
    }

    // Set membership.

    pub fn any_of<V: IntegerValue>(
        &mut self,
        property: &Property<V>,
        values: &[V],
    ) -> Result<&mut Self> {
        let longs: Vec<i64> = values.iter().map(|v| v.as_long()).collect();
        let condition =
            self.store
                .backend()
                .long_set_condition(self.handle()?, property.id, &longs, false)?;
        self.push(condition)
    }

    pub fn none_of<V: IntegerValue>(
        &mut self,
        property: &Property<V>,
        values: &[V],
    ) -> Result<&mut Self> {
        let longs: Vec<i64> = values.iter().map(|v| v.as_long()).collect();
        let condition =
            self.store
                .backend()
                .long_set_condition(self.handle()?, property.id, &longs, true)?;
        self.push(condition)
    }

    /// Floating-point equality, exposed only as a tolerance band:
    /// `between(value - tolerance, value + tolerance)`.
    pub fn equal_with_tolerance<V: FloatValue>(
        &mut self,
        property: &Property<V>,
        value: V,
        tolerance: V,
    ) -> Result<&mut Self> {
        let (value, tolerance) = (value.as_double(), tolerance.as_double());
        let condition = self.store.backend().double_range_condition(
            self.handle()?,
            property.id,
            value - tolerance,
            value + tolerance,
        )?;
        self.push(condition)
    }

    // String predicates. `StringOrder::CaseInsensitive` is the default
    // the engine assumes elsewhere; it compares ASCII case-insensitively.

    pub fn equal_string(
        &mut self,
        property: &Property<String>,
        value: &str,
        order: StringOrder,
    ) -> Result<&mut Self> {
        self.string(property, StringOp::Equal, value, order)
    }

    pub fn not_equal_string(
        &mut self,
        property: &Property<String>,
        value: &str,
        order: StringOrder,
    ) -> Result<&mut Self> {
        self.string(property, StringOp::NotEqual, value, order)
    }

    pub fn contains(
        &mut self,
        property: &Property<String>,
        value: &str,
        order: StringOrder,
    ) -> Result<&mut Self> {
        self.string(property, StringOp::Contains, value, order)
    }

    pub fn starts_with(
        &mut self,
        property: &Property<String>,
        value: &str,
        order: StringOrder,
    ) -> Result<&mut Self> {
        self.string(property, StringOp::StartsWith, value, order)
    }

    pub fn ends_with(
        &mut self,
        property: &Property<String>,
        value: &str,
        order: StringOrder,
    ) -> Result<&mut Self> {
        self.string(property, StringOp::EndsWith, value, order)
    }

    fn string(
        &mut self,
        property: &Property<String>,
        op: StringOp,
        value: &str,
        order: StringOrder,
    ) -> Result<&mut Self> {
        let condition = self.store.backend().string_condition(
            self.handle()?,
            property.id,
            op,
            value,
            order.is_case_sensitive(),
        )?;
        self.push(condition)
    }

    /// Name the most recent condition for parameter rebinding by alias.
    pub fn alias(&mut self, name: &str) -> Result<&mut Self> {
        let Some(last) = self.last_condition else {
            return Err(QueryError::illegal_state(
                "no condition to alias; add a condition first",
            ));
        };
        self.store.backend().set_alias(self.handle()?, last, name)?;
        Ok(self)
    }

    // Ordering. Clauses accumulate; earlier clauses dominate.

    pub fn order<V>(&mut self, property: &Property<V>) -> Result<&mut Self> {
        self.order_with_flags(property, OrderFlags::empty())
    }

    pub fn order_desc<V>(&mut self, property: &Property<V>) -> Result<&mut Self> {
        self.order_with_flags(property, OrderFlags::DESCENDING)
    }

    pub fn order_with_flags<V>(
        &mut self,
        property: &Property<V>,
        flags: OrderFlags,
    ) -> Result<&mut Self> {
        if self.pending != PendingOp::None {
            return Err(QueryError::illegal_state(
                "cannot order while a combine operator is pending",
            ));
        }
        self.store
            .backend()
            .add_order(self.handle()?, property.id, flags)?;
        self.has_order = true;
        Ok(self)
    }

    // Eager relation resolution.

    /// Resolve `relation` for every result.
    pub fn eager(&mut self, relation: RelationDescriptor<T>) -> &mut Self {
        self.eager_limited(0, relation)
    }

    /// Resolve `relation` for the first `limit` results; 0 means all.
    pub fn eager_limited(&mut self, limit: u32, relation: RelationDescriptor<T>) -> &mut Self {
        self.eager.push(EagerSpec { relation, limit });
        self
    }

    /// In-process post-filter applied after engine-level selection. At
    /// most one per builder.
    pub fn filter(&mut self, filter: impl Fn(&T) -> bool + Send + Sync + 'static) -> Result<&mut Self> {
        if self.filter.is_some() {
            return Err(QueryError::illegal_state("a post-filter is already set"));
        }
        self.filter = Some(Box::new(filter));
        Ok(self)
    }

    /// In-process comparator applied after the post-filter; orthogonal
    /// to engine ordering. The sort is stable.
    pub fn sort_by(
        &mut self,
        comparator: impl Fn(&T, &T) -> Ordering + Send + Sync + 'static,
    ) -> &mut Self {
        self.comparator = Some(Box::new(comparator));
        self
    }

    /// Compile into a repeatable [`Query`] and release the builder
    /// handle; the builder is unusable afterwards.
    pub fn build(&mut self) -> Result<Query<T, B>> {
        if self.pending != PendingOp::None {
            return Err(QueryError::illegal_state(
                "incomplete logic: a combine operator awaits its right-hand condition",
            ));
        }
        let handle = self.handle()?;
        let compiled = self.store.backend().compile(handle)?;
        let query = Query::new(
            self.store.clone(),
            compiled,
            self.has_order,
            mem::take(&mut self.eager),
            self.filter.take(),
            self.comparator.take(),
        );
        self.store.backend().destroy_builder(handle);
        self.handle = None;
        Ok(query)
    }
}

impl<T: Entity, B: Backend> Drop for QueryBuilder<T, B> {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.store.backend().destroy_builder(handle);
        }
    }
}

impl<T: Entity, B: Backend> fmt::Debug for QueryBuilder<T, B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryBuilder")
            .field("entity", &T::def().name)
            .field("handle", &self.handle)
            .field("has_order", &self.has_order)
            .finish()
    }
}
