use crate::{EntityDef, Id, OrderFlags, PropertyId, Result, Row};
use std::fmt::Debug;

/// Opaque engine token for an open transaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TxHandle(pub u64);

/// Opaque engine token for a transaction-scoped cursor over one
/// entity's store.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CursorHandle(pub u64);

/// Opaque engine token for a query under construction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BuilderHandle(pub u64);

/// Opaque engine token for a compiled, repeatable query.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct QueryHandle(pub u64);

/// Opaque engine token for one predicate leaf or combination.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ConditionHandle(pub u64);

/// Comparison operator of a scalar leaf predicate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompareOp {
    Equal,
    NotEqual,
    Less,
    Greater,
}

/// Operator of a string leaf predicate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StringOp {
    Equal,
    NotEqual,
    Contains,
    StartsWith,
    EndsWith,
}

/// Case handling for string predicates and string distinct semantics.
/// The insensitive mode compares ASCII case-insensitively.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum StringOrder {
    #[default]
    CaseInsensitive,
    CaseSensitive,
}

impl StringOrder {
    pub fn is_case_sensitive(self) -> bool {
        self == StringOrder::CaseSensitive
    }
}

/// Per-property retrieval switches passed through to the engine.
///
/// The null substitutes are typed slots: the engine picks the slot
/// matching the property's declared type and skips nulls when that slot
/// is empty.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PropertyParams {
    pub distinct: bool,
    /// Case handling for string distinct.
    pub case_sensitive: bool,
    /// Scalar retrievals fail with `NotUnique` on more than one
    /// distinct value.
    pub unique: bool,
    pub null_string: Option<String>,
    pub null_long: Option<i64>,
    pub null_float: Option<f32>,
    pub null_double: Option<f64>,
}

/// The consumed storage-engine contract.
///
/// Everything the query layer needs from an engine: transactions and
/// cursors, native predicate construction, query compilation and
/// execution, property-scoped retrieval, aggregates and parameter
/// rebinding. Handles are engine-owned; the query layer guards their
/// lifecycles but never interprets them.
pub trait Backend: Debug + Send + Sync + 'static {
    // Transactions and cursors.

    fn begin_read(&self) -> Result<TxHandle>;

    fn begin_write(&self) -> Result<TxHandle>;

    fn commit(&self, tx: TxHandle) -> Result<()>;

    fn abort(&self, tx: TxHandle);

    fn open_cursor(&self, tx: TxHandle, entity: &'static EntityDef) -> Result<CursorHandle>;

    fn close_cursor(&self, cursor: CursorHandle);

    // Row primitives.

    /// Insert or update one row. An id cell of 0 requests assignment;
    /// the assigned id is returned either way.
    fn put(&self, cursor: CursorHandle, row: Row) -> Result<Id>;

    fn get(&self, cursor: CursorHandle, id: Id) -> Result<Option<Row>>;

    // Builder lifecycle.

    fn create_builder(&self, entity: &'static EntityDef) -> Result<BuilderHandle>;

    fn destroy_builder(&self, builder: BuilderHandle);

    /// Finalize the builder into a repeatable query. Dangling
    /// conditions are conjoined left to right.
    fn compile(&self, builder: BuilderHandle) -> Result<QueryHandle>;

    fn destroy_query(&self, query: QueryHandle);

    fn add_order(
        &self,
        builder: BuilderHandle,
        property: PropertyId,
        flags: OrderFlags,
    ) -> Result<()>;

    /// Combine two previously returned conditions into one.
    fn combine(
        &self,
        builder: BuilderHandle,
        first: ConditionHandle,
        second: ConditionHandle,
        use_or: bool,
    ) -> Result<ConditionHandle>;

    /// Name a condition for later parameter rebinding.
    fn set_alias(
        &self,
        builder: BuilderHandle,
        condition: ConditionHandle,
        alias: &str,
    ) -> Result<()>;

    // Leaf predicate constructors.

    fn null_condition(
        &self,
        builder: BuilderHandle,
        property: PropertyId,
        negate: bool,
    ) -> Result<ConditionHandle>;

    fn long_condition(
        &self,
        builder: BuilderHandle,
        property: PropertyId,
        op: CompareOp,
        value: i64,
    ) -> Result<ConditionHandle>;

    /// Inclusive range on the integer channel.
    fn long_range_condition(
        &self,
        builder: BuilderHandle,
        property: PropertyId,
        from: i64,
        to: i64,
    ) -> Result<ConditionHandle>;

    fn long_set_condition(
        &self,
        builder: BuilderHandle,
        property: PropertyId,
        values: &[i64],
        negate: bool,
    ) -> Result<ConditionHandle>;

    fn double_condition(
        &self,
        builder: BuilderHandle,
        property: PropertyId,
        op: CompareOp,
        value: f64,
    ) -> Result<ConditionHandle>;

    /// Inclusive range on the floating channel.
    fn double_range_condition(
        &self,
        builder: BuilderHandle,
        property: PropertyId,
        from: f64,
        to: f64,
    ) -> Result<ConditionHandle>;

    fn string_condition(
        &self,
        builder: BuilderHandle,
        property: PropertyId,
        op: StringOp,
        value: &str,
        case_sensitive: bool,
    ) -> Result<ConditionHandle>;

    // Execution.

    /// Matching rows in engine order; `limit` 0 means unlimited.
    fn find(
        &self,
        cursor: CursorHandle,
        query: QueryHandle,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<Row>>;

    fn find_first(&self, cursor: CursorHandle, query: QueryHandle) -> Result<Option<Row>>;

    /// Error with `QueryError::NotUnique` on more than one match.
    fn find_unique(&self, cursor: CursorHandle, query: QueryHandle) -> Result<Option<Row>>;

    /// Matching ids; no ordering guarantee.
    fn find_ids(
        &self,
        cursor: CursorHandle,
        query: QueryHandle,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<Id>>;

    fn count(&self, cursor: CursorHandle, query: QueryHandle) -> Result<u64>;

    /// Delete matching rows, returning the deleted count.
    fn remove(&self, cursor: CursorHandle, query: QueryHandle) -> Result<u64>;

    /// Human-readable rendering of the compiled predicate.
    fn describe(&self, query: QueryHandle) -> Result<String>;

    // Property-scoped retrieval.

    fn property_strings(
        &self,
        cursor: CursorHandle,
        query: QueryHandle,
        property: PropertyId,
        params: &PropertyParams,
    ) -> Result<Vec<String>>;

    fn property_longs(
        &self,
        cursor: CursorHandle,
        query: QueryHandle,
        property: PropertyId,
        params: &PropertyParams,
    ) -> Result<Vec<i64>>;

    fn property_floats(
        &self,
        cursor: CursorHandle,
        query: QueryHandle,
        property: PropertyId,
        params: &PropertyParams,
    ) -> Result<Vec<f32>>;

    fn property_doubles(
        &self,
        cursor: CursorHandle,
        query: QueryHandle,
        property: PropertyId,
        params: &PropertyParams,
    ) -> Result<Vec<f64>>;

    fn property_string(
        &self,
        cursor: CursorHandle,
        query: QueryHandle,
        property: PropertyId,
        params: &PropertyParams,
    ) -> Result<Option<String>>;

    fn property_long(
        &self,
        cursor: CursorHandle,
        query: QueryHandle,
        property: PropertyId,
        params: &PropertyParams,
    ) -> Result<Option<i64>>;

    fn property_float(
        &self,
        cursor: CursorHandle,
        query: QueryHandle,
        property: PropertyId,
        params: &PropertyParams,
    ) -> Result<Option<f32>>;

    fn property_double(
        &self,
        cursor: CursorHandle,
        query: QueryHandle,
        property: PropertyId,
        params: &PropertyParams,
    ) -> Result<Option<f64>>;

    /// Count of the property's values under the same distinct/null
    /// rules as the array retrievals.
    fn property_count(
        &self,
        cursor: CursorHandle,
        query: QueryHandle,
        property: PropertyId,
        params: &PropertyParams,
    ) -> Result<u64>;

    // Aggregates. Nulls are excluded.

    fn sum(&self, cursor: CursorHandle, query: QueryHandle, property: PropertyId) -> Result<i64>;

    fn sum_double(
        &self,
        cursor: CursorHandle,
        query: QueryHandle,
        property: PropertyId,
    ) -> Result<f64>;

    fn min(&self, cursor: CursorHandle, query: QueryHandle, property: PropertyId) -> Result<i64>;

    fn max(&self, cursor: CursorHandle, query: QueryHandle, property: PropertyId) -> Result<i64>;

    fn min_double(
        &self,
        cursor: CursorHandle,
        query: QueryHandle,
        property: PropertyId,
    ) -> Result<f64>;

    fn max_double(
        &self,
        cursor: CursorHandle,
        query: QueryHandle,
        property: PropertyId,
    ) -> Result<f64>;

    fn avg(&self, cursor: CursorHandle, query: QueryHandle, property: PropertyId) -> Result<f64>;

    // Parameter rebinding. Pre-declared slots of the compiled query are
    // updated in place; the query's shape never changes.

    fn set_parameter_long(
        &self,
        query: QueryHandle,
        property: PropertyId,
        value: i64,
    ) -> Result<()>;

    fn set_parameter_double(
        &self,
        query: QueryHandle,
        property: PropertyId,
        value: f64,
    ) -> Result<()>;

    fn set_parameter_string(
        &self,
        query: QueryHandle,
        property: PropertyId,
        value: &str,
    ) -> Result<()>;

    fn set_parameters_long(
        &self,
        query: QueryHandle,
        property: PropertyId,
        first: i64,
        second: i64,
    ) -> Result<()>;

    fn set_parameters_double(
        &self,
        query: QueryHandle,
        property: PropertyId,
        first: f64,
        second: f64,
    ) -> Result<()>;

    fn set_parameter_long_alias(&self, query: QueryHandle, alias: &str, value: i64) -> Result<()>;

    fn set_parameter_double_alias(&self, query: QueryHandle, alias: &str, value: f64)
    -> Result<()>;

    fn set_parameter_string_alias(&self, query: QueryHandle, alias: &str, value: &str)
    -> Result<()>;

    fn set_parameters_long_alias(
        &self,
        query: QueryHandle,
        alias: &str,
        first: i64,
        second: i64,
    ) -> Result<()>;
}
