use silo_core::{
    Backend, BuilderHandle, CompareOp, ConditionHandle, CursorHandle, EntityDef, Id, OrderFlags,
    PropertyId, PropertyParams, QueryError, QueryHandle, Result, Row, StringOp, TxHandle,
};
use std::sync::atomic::{AtomicU32, Ordering};

/// Backend wrapper that fails the first `failures` read-transaction
/// begins, then behaves like the wrapped engine. Used to exercise the
/// bounded-retry envelope.
#[derive(Debug)]
pub struct FlakyBackend<B: Backend> {
    inner: B,
    failures: AtomicU32,
    transient: bool,
}

impl<B: Backend> FlakyBackend<B> {
    pub fn failing_reads(inner: B, failures: u32) -> Self {
        Self {
            inner,
            failures: AtomicU32::new(failures),
            transient: true,
        }
    }

    pub fn failing_reads_fatally(inner: B, failures: u32) -> Self {
        Self {
            inner,
            failures: AtomicU32::new(failures),
            transient: false,
        }
    }

    /// Injected failures not yet consumed.
    pub fn remaining_failures(&self) -> u32 {
        self.failures.load(Ordering::SeqCst)
    }
}

impl<B: Backend> Backend for FlakyBackend<B> {
    fn begin_read(&self) -> Result<TxHandle> {
        let remaining = self.failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures.store(remaining - 1, Ordering::SeqCst);
            return Err(QueryError::backend("injected failure", self.transient));
        }
        self.inner.begin_read()
    }

    fn begin_write(&self) -> Result<TxHandle> {
        self.inner.begin_write()
    }

    fn commit(&self, tx: TxHandle) -> Result<()> {
        self.inner.commit(tx)
    }

    fn abort(&self, tx: TxHandle) {
        self.inner.abort(tx);
    }

    fn open_cursor(&self, tx: TxHandle, entity: &'static EntityDef) -> Result<CursorHandle> {
        self.inner.open_cursor(tx, entity)
    }

    fn close_cursor(&self, cursor: CursorHandle) {
        self.inner.close_cursor(cursor);
    }

    fn put(&self, cursor: CursorHandle, row: Row) -> Result<Id> {
        self.inner.put(cursor, row)
    }

    fn get(&self, cursor: CursorHandle, id: Id) -> Result<Option<Row>> {
        self.inner.get(cursor, id)
    }

    fn create_builder(&self, entity: &'static EntityDef) -> Result<BuilderHandle> {
        self.inner.create_builder(entity)
    }

    fn destroy_builder(&self, builder: BuilderHandle) {
        self.inner.destroy_builder(builder);
    }

    fn compile(&self, builder: BuilderHandle) -> Result<QueryHandle> {
        self.inner.compile(builder)
    }

    fn destroy_query(&self, query: QueryHandle) {
        self.inner.destroy_query(query);
    }

    fn add_order(
        &self,
        builder: BuilderHandle,
        property: PropertyId,
        flags: OrderFlags,
    ) -> Result<()> {
        self.inner.add_order(builder, property, flags)
    }

    fn combine(
        &self,
        builder: BuilderHandle,
        first: ConditionHandle,
        second: ConditionHandle,
        use_or: bool,
    ) -> Result<ConditionHandle> {
        self.inner.combine(builder, first, second, use_or)
    }

    fn set_alias(
        &self,
        builder: BuilderHandle,
        condition: ConditionHandle,
        alias: &str,
    ) -> Result<()> {
        self.inner.set_alias(builder, condition, alias)
    }

    fn null_condition(
        &self,
        builder: BuilderHandle,
        property: PropertyId,
        negate: bool,
    ) -> Result<ConditionHandle> {
        self.inner.null_condition(builder, property, negate)
    }

    fn long_condition(
        &self,
        builder: BuilderHandle,
        property: PropertyId,
        op: CompareOp,
        value: i64,
    ) -> Result<ConditionHandle> {
        self.inner.long_condition(builder, property, op, value)
    }

    fn long_range_condition(
        &self,
        builder: BuilderHandle,
        property: PropertyId,
        from: i64,
        to: i64,
    ) -> Result<ConditionHandle> {
        self.inner.long_range_condition(builder, property, from, to)
    }

    fn long_set_condition(
        &self,
        builder: BuilderHandle,
        property: PropertyId,
        values: &[i64],
        negate: bool,
    ) -> Result<ConditionHandle> {
        self.inner.long_set_condition(builder, property, values, negate)
    }

    fn double_condition(
        &self,
        builder: BuilderHandle,
        property: PropertyId,
        op: CompareOp,
        value: f64,
    ) -> Result<ConditionHandle> {
        self.inner.double_condition(builder, property, op, value)
    }

    fn double_range_condition(
        &self,
        builder: BuilderHandle,
        property: PropertyId,
        from: f64,
        to: f64,
    ) -> Result<ConditionHandle> {
        self.inner.double_range_condition(builder, property, from, to)
    }

    fn string_condition(
        &self,
        builder: BuilderHandle,
        property: PropertyId,
        op: StringOp,
        value: &str,
        case_sensitive: bool,
    ) -> Result<ConditionHandle> {
        self.inner
            .string_condition(builder, property, op, value, case_sensitive)
    }

    fn find(
        &self,
        cursor: CursorHandle,
        query: QueryHandle,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<Row>> {
        self.inner.find(cursor, query, offset, limit)
    }

    fn find_first(&self, cursor: CursorHandle, query: QueryHandle) -> Result<Option<Row>> {
        self.inner.find_first(cursor, query)
    }

    fn find_unique(&self, cursor: CursorHandle, query: QueryHandle) -> Result<Option<Row>> {
        self.inner.find_unique(cursor, query)
    }

    fn find_ids(
        &self,
        cursor: CursorHandle,
        query: QueryHandle,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<Id>> {
        self.inner.find_ids(cursor, query, offset, limit)
    }

    fn count(&self, cursor: CursorHandle, query: QueryHandle) -> Result<u64> {
        self.inner.count(cursor, query)
    }

    fn remove(&self, cursor: CursorHandle, query: QueryHandle) -> Result<u64> {
        self.inner.remove(cursor, query)
    }

    fn describe(&self, query: QueryHandle) -> Result<String> {
        self.inner.describe(query)
    }

    fn property_strings(
        &self,
        cursor: CursorHandle,
        query: QueryHandle,
        property: PropertyId,
        params: &PropertyParams,
    ) -> Result<Vec<String>> {
        self.inner.property_strings(cursor, query, property, params)
    }

    fn property_longs(
        &self,
        cursor: CursorHandle,
        query: QueryHandle,
        property: PropertyId,
        params: &PropertyParams,
    ) -> Result<Vec<i64>> {
        self.inner.property_longs(cursor, query, property, params)
    }

    fn property_floats(
        &self,
        cursor: CursorHandle,
        query: QueryHandle,
        property: PropertyId,
        params: &PropertyParams,
    ) -> Result<Vec<f32>> {
        self.inner.property_floats(cursor, query, property, params)
    }

    fn property_doubles(
        &self,
        cursor: CursorHandle,
        query: QueryHandle,
        property: PropertyId,
        params: &PropertyParams,
    ) -> Result<Vec<f64>> {
        self.inner.property_doubles(cursor, query, property, params)
    }

    fn property_string(
        &self,
        cursor: CursorHandle,
        query: QueryHandle,
        property: PropertyId,
        params: &PropertyParams,
    ) -> Result<Option<String>> {
        self.inner.property_string(cursor, query, property, params)
    }

    fn property_long(
        &self,
        cursor: CursorHandle,
        query: QueryHandle,
        property: PropertyId,
        params: &PropertyParams,
    ) -> Result<Option<i64>> {
        self.inner.property_long(cursor, query, property, params)
    }

    fn property_float(
        &self,
        cursor: CursorHandle,
        query: QueryHandle,
        property: PropertyId,
        params: &PropertyParams,
    ) -> Result<Option<f32>> {
        self.inner.property_float(cursor, query, property, params)
    }

    fn property_double(
        &self,
        cursor: CursorHandle,
        query: QueryHandle,
        property: PropertyId,
        params: &PropertyParams,
    ) -> Result<Option<f64>> {
        self.inner.property_double(cursor, query, property, params)
    }

    fn property_count(
        &self,
        cursor: CursorHandle,
        query: QueryHandle,
        property: PropertyId,
        params: &PropertyParams,
    ) -> Result<u64> {
        self.inner.property_count(cursor, query, property, params)
    }

    fn sum(&self, cursor: CursorHandle, query: QueryHandle, property: PropertyId) -> Result<i64> {
        self.inner.sum(cursor, query, property)
    }

    fn sum_double(
        &self,
        cursor: CursorHandle,
        query: QueryHandle,
        property: PropertyId,
    ) -> Result<f64> {
        self.inner.sum_double(cursor, query, property)
    }

    fn min(&self, cursor: CursorHandle, query: QueryHandle, property: PropertyId) -> Result<i64> {
        self.inner.min(cursor, query, property)
    }

    fn max(&self, cursor: CursorHandle, query: QueryHandle, property: PropertyId) -> Result<i64> {
        self.inner.max(cursor, query, property)
    }

    fn min_double(
        &self,
        cursor: CursorHandle,
        query: QueryHandle,
        property: PropertyId,
    ) -> Result<f64> {
        self.inner.min_double(cursor, query, property)
    }

    fn max_double(
        &self,
        cursor: CursorHandle,
        query: QueryHandle,
        property: PropertyId,
    ) -> Result<f64> {
        self.inner.max_double(cursor, query, property)
    }

    fn avg(&self, cursor: CursorHandle, query: QueryHandle, property: PropertyId) -> Result<f64> {
        self.inner.avg(cursor, query, property)
    }

    fn set_parameter_long(
        &self,
        query: QueryHandle,
        property: PropertyId,
        value: i64,
    ) -> Result<()> {
        self.inner.set_parameter_long(query, property, value)
    }

    fn set_parameter_double(
        &self,
        query: QueryHandle,
        property: PropertyId,
        value: f64,
    ) -> Result<()> {
        self.inner.set_parameter_double(query, property, value)
    }

    fn set_parameter_string(
        &self,
        query: QueryHandle,
        property: PropertyId,
        value: &str,
    ) -> Result<()> {
        self.inner.set_parameter_string(query, property, value)
    }

    fn set_parameters_long(
        &self,
        query: QueryHandle,
        property: PropertyId,
        first: i64,
        second: i64,
    ) -> Result<()> {
        self.inner.set_parameters_long(query, property, first, second)
    }

    fn set_parameters_double(
        &self,
        query: QueryHandle,
        property: PropertyId,
        first: f64,
        second: f64,
    ) -> Result<()> {
        self.inner
            .set_parameters_double(query, property, first, second)
    }

    fn set_parameter_long_alias(&self, query: QueryHandle, alias: &str, value: i64) -> Result<()> {
        self.inner.set_parameter_long_alias(query, alias, value)
    }

    fn set_parameter_double_alias(
        &self,
        query: QueryHandle,
        alias: &str,
        value: f64,
    ) -> Result<()> {
        self.inner.set_parameter_double_alias(query, alias, value)
    }

    fn set_parameter_string_alias(
        &self,
        query: QueryHandle,
        alias: &str,
        value: &str,
    ) -> Result<()> {
        self.inner.set_parameter_string_alias(query, alias, value)
    }

    fn set_parameters_long_alias(
        &self,
        query: QueryHandle,
        alias: &str,
        first: i64,
        second: i64,
    ) -> Result<()> {
        self.inner
            .set_parameters_long_alias(query, alias, first, second)
    }
}
