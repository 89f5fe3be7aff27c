use crate::{
    predicate::{BuilderState, CompiledQuery, Leaf, LeafOp, substitute_for},
    sort::compare_rows,
};
use silo_core::{
    Backend, BuilderHandle, CompareOp, ConditionHandle, CursorHandle, EntityDef, Id, OrderFlags,
    PropertyDef, PropertyId, PropertyParams, QueryError, QueryHandle, Result, Row, StringOp,
    TxHandle, TypeTag, Value,
};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{
    Mutex, MutexGuard, PoisonError,
    atomic::{AtomicU64, Ordering},
};

/// In-memory storage engine implementing the `Backend` capability.
///
/// One mutex guards the whole engine; transactions, cursors, builders
/// and compiled queries are entries in handle-keyed registries, so the
/// layer above sees the same opaque-token world a native engine
/// exposes. Writes go through a single write transaction at a time;
/// a concurrent `begin_write` reports a transient busy error.
#[derive(Debug)]
pub struct MemStore {
    state: Mutex<Engine>,
    next_handle: AtomicU64,
}

#[derive(Debug, Default)]
struct Engine {
    tables: HashMap<&'static str, Table>,
    transactions: HashMap<u64, TxState>,
    cursors: HashMap<u64, CursorState>,
    builders: HashMap<u64, BuilderState>,
    queries: HashMap<u64, CompiledQuery>,
}

#[derive(Clone, Debug, Default)]
struct Table {
    rows: BTreeMap<Id, Row>,
    next_id: Id,
}

#[derive(Debug)]
struct TxState {
    write: bool,
    /// Tables as of `begin_write`; restored on abort.
    snapshot: Option<HashMap<&'static str, Table>>,
}

#[derive(Debug)]
struct CursorState {
    tx: u64,
    entity: &'static EntityDef,
}

impl MemStore {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(Engine::default()),
            next_handle: AtomicU64::new(1),
        }
    }

    fn next(&self) -> u64 {
        self.next_handle.fetch_add(1, Ordering::Relaxed)
    }

    fn lock(&self) -> MutexGuard<'_, Engine> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for MemStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    fn transaction(&self, tx: TxHandle) -> Result<&TxState> {
        self.transactions
            .get(&tx.0)
            .ok_or_else(|| QueryError::illegal_state("unknown transaction handle"))
    }

    fn cursor(&self, cursor: CursorHandle) -> Result<&CursorState> {
        self.cursors
            .get(&cursor.0)
            .ok_or_else(|| QueryError::illegal_state("unknown cursor handle"))
    }

    fn writable_cursor(&self, cursor: CursorHandle) -> Result<&CursorState> {
        let state = self.cursor(cursor)?;
        let tx = self
            .transactions
            .get(&state.tx)
            .ok_or_else(|| QueryError::illegal_state("cursor outlived its transaction"))?;
        if !tx.write {
            return Err(QueryError::illegal_state(
                "mutation requires a write transaction",
            ));
        }
        Ok(state)
    }

    fn builder_mut(&mut self, builder: BuilderHandle) -> Result<&mut BuilderState> {
        self.builders
            .get_mut(&builder.0)
            .ok_or_else(|| QueryError::illegal_state("unknown builder handle"))
    }

    fn compiled(&self, query: QueryHandle) -> Result<&CompiledQuery> {
        self.queries
            .get(&query.0)
            .ok_or_else(|| QueryError::illegal_state("unknown query handle"))
    }

    fn compiled_mut(&mut self, query: QueryHandle) -> Result<&mut CompiledQuery> {
        self.queries
            .get_mut(&query.0)
            .ok_or_else(|| QueryError::illegal_state("unknown query handle"))
    }

    /// Cursor/query pair sanity: both must target the same entity.
    fn selection(
        &self,
        cursor: CursorHandle,
        query: QueryHandle,
    ) -> Result<(&CompiledQuery, Option<&Table>)> {
        let cursor = self.cursor(cursor)?;
        self.transaction(TxHandle(cursor.tx))?;
        let compiled = self.compiled(query)?;
        if cursor.entity.name != compiled.entity.name {
            return Err(QueryError::illegal_state(
                "cursor and query target different entities",
            ));
        }
        Ok((compiled, self.tables.get(compiled.entity.name)))
    }

    fn drop_cursors_of(&mut self, tx: u64) {
        self.cursors.retain(|_, cursor| cursor.tx != tx);
    }
}

/// Matching rows in id order, then engine ordering, then pagination.
fn select_rows(
    compiled: &CompiledQuery,
    table: Option<&Table>,
    offset: u64,
    limit: u64,
) -> Vec<Row> {
    let Some(table) = table else {
        return Vec::new();
    };
    let mut matches: Vec<(Id, &Row)> = table
        .rows
        .iter()
        .filter(|(_, row)| compiled.matches(row))
        .map(|(id, row)| (*id, row))
        .collect();
    if !compiled.orders.is_empty() {
        matches.sort_by(|(_, a), (_, b)| compare_rows(compiled.entity, &compiled.orders, a, b));
    }
    let limit = if limit == 0 { usize::MAX } else { limit as usize };
    matches
        .into_iter()
        .skip(offset as usize)
        .take(limit)
        .map(|(_, row)| row.clone())
        .collect()
}

/// Property cells of the matching rows with null substitution and
/// distinct applied. No ordering guarantee.
fn select_values(
    compiled: &CompiledQuery,
    table: Option<&Table>,
    property: &PropertyDef,
    params: &PropertyParams,
) -> Vec<Value> {
    let Some(table) = table else {
        return Vec::new();
    };
    let Some(index) = compiled.entity.property_index(property.id) else {
        return Vec::new();
    };
    let substitute = substitute_for(property.ty, params);
    let mut seen_text: HashSet<String> = HashSet::new();
    let mut seen_bits: HashSet<u64> = HashSet::new();
    let mut out = Vec::new();
    for row in table.rows.values().filter(|row| compiled.matches(row)) {
        let cell = row
            .get(index)
            .cloned()
            .unwrap_or_else(|| Value::null_of(property.ty));
        let cell = if cell.is_null() {
            match &substitute {
                Some(substitute) => substitute.clone(),
                None => continue,
            }
        } else {
            cell
        };
        if params.distinct {
            let fresh = if let Some(text) = cell.as_text() {
                let key = if params.case_sensitive {
                    text.to_owned()
                } else {
                    text.to_ascii_lowercase()
                };
                seen_text.insert(key)
            } else if let Some(long) = cell.as_long() {
                seen_bits.insert(long as u64)
            } else if let Some(double) = cell.as_double() {
                seen_bits.insert(double.to_bits())
            } else {
                true
            };
            if !fresh {
                continue;
            }
        }
        out.push(cell);
    }
    out
}

fn scalar_value(
    compiled: &CompiledQuery,
    table: Option<&Table>,
    property: &PropertyDef,
    params: &PropertyParams,
) -> Result<Option<Value>> {
    let values = select_values(compiled, table, property, params);
    if params.unique && values.len() > 1 {
        return Err(QueryError::not_unique());
    }
    Ok(values.into_iter().next())
}

fn integer_channel(ty: TypeTag) -> bool {
    matches!(
        ty,
        TypeTag::Bool
            | TypeTag::Byte
            | TypeTag::Short
            | TypeTag::Char
            | TypeTag::Int
            | TypeTag::Long
            | TypeTag::Date
    )
}

fn float_channel(ty: TypeTag) -> bool {
    matches!(ty, TypeTag::Float | TypeTag::Double)
}

fn expect_channel(property: &PropertyDef, ok: bool, channel: &str) -> Result<()> {
    if ok {
        Ok(())
    } else {
        Err(QueryError::invalid_argument(format!(
            "property `{}` is not on the {channel} channel",
            property.name
        )))
    }
}

impl MemStore {
    fn leaf(
        &self,
        builder: BuilderHandle,
        property: PropertyId,
        check: impl FnOnce(&PropertyDef) -> Result<()>,
        op: LeafOp,
    ) -> Result<ConditionHandle> {
        let mut engine = self.lock();
        let state = engine.builder_mut(builder)?;
        if let Some(def) = state.entity.property(property) {
            check(def)?;
        }
        let index = state.push_leaf(Leaf { property, op })?;
        Ok(ConditionHandle(index as u64))
    }

    fn property_def(
        engine: &Engine,
        query: QueryHandle,
        property: PropertyId,
    ) -> Result<&'static PropertyDef> {
        let compiled = engine.compiled(query)?;
        compiled
            .entity
            .properties
            .iter()
            .find(|def| def.id == property)
            .ok_or_else(|| {
                QueryError::invalid_argument(format!(
                    "entity `{}` has no property {property}",
                    compiled.entity.name
                ))
            })
    }
}

impl Backend for MemStore {
    fn begin_read(&self) -> Result<TxHandle> {
        let handle = self.next();
        self.lock().transactions.insert(
            handle,
            TxState {
                write: false,
                snapshot: None,
            },
        );
        Ok(TxHandle(handle))
    }

    fn begin_write(&self) -> Result<TxHandle> {
        let mut engine = self.lock();
        if engine.transactions.values().any(|tx| tx.write) {
            return Err(QueryError::backend(
                "another write transaction is active",
                true,
            ));
        }
        let handle = self.next();
        let snapshot = engine.tables.clone();
        engine.transactions.insert(
            handle,
            TxState {
                write: true,
                snapshot: Some(snapshot),
            },
        );
        Ok(TxHandle(handle))
    }

    fn commit(&self, tx: TxHandle) -> Result<()> {
        let mut engine = self.lock();
        engine
            .transactions
            .remove(&tx.0)
            .ok_or_else(|| QueryError::illegal_state("unknown transaction handle"))?;
        engine.drop_cursors_of(tx.0);
        Ok(())
    }

    fn abort(&self, tx: TxHandle) {
        let mut engine = self.lock();
        if let Some(state) = engine.transactions.remove(&tx.0) {
            if let Some(snapshot) = state.snapshot {
                engine.tables = snapshot;
            }
            engine.drop_cursors_of(tx.0);
        }
    }

    fn open_cursor(&self, tx: TxHandle, entity: &'static EntityDef) -> Result<CursorHandle> {
        let handle = self.next();
        let mut engine = self.lock();
        engine.transaction(tx)?;
        engine.tables.entry(entity.name).or_default();
        engine
            .cursors
            .insert(handle, CursorState { tx: tx.0, entity });
        Ok(CursorHandle(handle))
    }

    fn close_cursor(&self, cursor: CursorHandle) {
        self.lock().cursors.remove(&cursor.0);
    }

    fn put(&self, cursor: CursorHandle, mut row: Row) -> Result<Id> {
        let mut engine = self.lock();
        let state = engine.writable_cursor(cursor)?;
        let entity = state.entity;
        if row.values.len() != entity.properties.len() {
            return Err(QueryError::invalid_argument(format!(
                "row arity {} does not match `{}` schema arity {}",
                row.values.len(),
                entity.name,
                entity.properties.len()
            )));
        }
        let id_index = entity
            .property_index(entity.id_property)
            .ok_or_else(|| QueryError::illegal_state("entity declares no id property"))?;
        let table = engine.tables.entry(entity.name).or_default();
        let mut id = row.values[id_index].as_long().unwrap_or(0) as Id;
        if id == 0 {
            table.next_id += 1;
            id = table.next_id;
            row.values[id_index] = Value::Long(Some(id as i64));
        } else {
            table.next_id = table.next_id.max(id);
        }
        table.rows.insert(id, row);
        Ok(id)
    }

    fn get(&self, cursor: CursorHandle, id: Id) -> Result<Option<Row>> {
        let engine = self.lock();
        let state = engine.cursor(cursor)?;
        engine.transaction(TxHandle(state.tx))?;
        Ok(engine
            .tables
            .get(state.entity.name)
            .and_then(|table| table.rows.get(&id))
            .cloned())
    }

    fn create_builder(&self, entity: &'static EntityDef) -> Result<BuilderHandle> {
        let handle = self.next();
        self.lock()
            .builders
            .insert(handle, BuilderState::new(entity));
        Ok(BuilderHandle(handle))
    }

    fn destroy_builder(&self, builder: BuilderHandle) {
        self.lock().builders.remove(&builder.0);
    }

    fn compile(&self, builder: BuilderHandle) -> Result<QueryHandle> {
        let mut engine = self.lock();
        let state = engine
            .builders
            .remove(&builder.0)
            .ok_or_else(|| QueryError::illegal_state("unknown builder handle"))?;
        let handle = self.next();
        engine.queries.insert(handle, state.compile());
        Ok(QueryHandle(handle))
    }

    fn destroy_query(&self, query: QueryHandle) {
        self.lock().queries.remove(&query.0);
    }

    fn add_order(
        &self,
        builder: BuilderHandle,
        property: PropertyId,
        flags: OrderFlags,
    ) -> Result<()> {
        self.lock().builder_mut(builder)?.add_order(property, flags)
    }

    fn combine(
        &self,
        builder: BuilderHandle,
        first: ConditionHandle,
        second: ConditionHandle,
        use_or: bool,
    ) -> Result<ConditionHandle> {
        let index = self.lock().builder_mut(builder)?.combine(
            first.0 as usize,
            second.0 as usize,
            use_or,
        )?;
        Ok(ConditionHandle(index as u64))
    }

    fn set_alias(
        &self,
        builder: BuilderHandle,
        condition: ConditionHandle,
        alias: &str,
    ) -> Result<()> {
        self.lock()
            .builder_mut(builder)?
            .set_alias(condition.0 as usize, alias)
    }

    fn null_condition(
        &self,
        builder: BuilderHandle,
        property: PropertyId,
        negate: bool,
    ) -> Result<ConditionHandle> {
        let op = if negate { LeafOp::NotNull } else { LeafOp::IsNull };
        self.leaf(builder, property, |_| Ok(()), op)
    }

    fn long_condition(
        &self,
        builder: BuilderHandle,
        property: PropertyId,
        op: CompareOp,
        value: i64,
    ) -> Result<ConditionHandle> {
        self.leaf(
            builder,
            property,
            |def| expect_channel(def, integer_channel(def.ty), "integer"),
            LeafOp::Long(op, value),
        )
    }

    fn long_range_condition(
        &self,
        builder: BuilderHandle,
        property: PropertyId,
        from: i64,
        to: i64,
    ) -> Result<ConditionHandle> {
        self.leaf(
            builder,
            property,
            |def| expect_channel(def, integer_channel(def.ty), "integer"),
            LeafOp::LongRange(from, to),
        )
    }

    fn long_set_condition(
        &self,
        builder: BuilderHandle,
        property: PropertyId,
        values: &[i64],
        negate: bool,
    ) -> Result<ConditionHandle> {
        self.leaf(
            builder,
            property,
            |def| expect_channel(def, integer_channel(def.ty), "integer"),
            LeafOp::LongSet(values.to_vec(), negate),
        )
    }

    fn double_condition(
        &self,
        builder: BuilderHandle,
        property: PropertyId,
        op: CompareOp,
        value: f64,
    ) -> Result<ConditionHandle> {
        self.leaf(
            builder,
            property,
            |def| expect_channel(def, float_channel(def.ty), "floating"),
            LeafOp::Double(op, value),
        )
    }

    fn double_range_condition(
        &self,
        builder: BuilderHandle,
        property: PropertyId,
        from: f64,
        to: f64,
    ) -> Result<ConditionHandle> {
        self.leaf(
            builder,
            property,
            |def| expect_channel(def, float_channel(def.ty), "floating"),
            LeafOp::DoubleRange(from, to),
        )
    }

    fn string_condition(
        &self,
        builder: BuilderHandle,
        property: PropertyId,
        op: StringOp,
        value: &str,
        case_sensitive: bool,
    ) -> Result<ConditionHandle> {
        self.leaf(
            builder,
            property,
            |def| expect_channel(def, def.ty == TypeTag::String, "string"),
            LeafOp::Str(op, value.to_owned(), case_sensitive),
        )
    }

    fn find(
        &self,
        cursor: CursorHandle,
        query: QueryHandle,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<Row>> {
        let engine = self.lock();
        let (compiled, table) = engine.selection(cursor, query)?;
        Ok(select_rows(compiled, table, offset, limit))
    }

    fn find_first(&self, cursor: CursorHandle, query: QueryHandle) -> Result<Option<Row>> {
        let engine = self.lock();
        let (compiled, table) = engine.selection(cursor, query)?;
        Ok(select_rows(compiled, table, 0, 1).into_iter().next())
    }

    fn find_unique(&self, cursor: CursorHandle, query: QueryHandle) -> Result<Option<Row>> {
        let engine = self.lock();
        let (compiled, table) = engine.selection(cursor, query)?;
        let rows = select_rows(compiled, table, 0, 2);
        if rows.len() > 1 {
            return Err(QueryError::not_unique());
        }
        Ok(rows.into_iter().next())
    }

    fn find_ids(
        &self,
        cursor: CursorHandle,
        query: QueryHandle,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<Id>> {
        let engine = self.lock();
        let (compiled, table) = engine.selection(cursor, query)?;
        let Some(table) = table else {
            return Ok(Vec::new());
        };
        let limit = if limit == 0 { usize::MAX } else { limit as usize };
        Ok(table
            .rows
            .iter()
            .filter(|(_, row)| compiled.matches(row))
            .map(|(id, _)| *id)
            .skip(offset as usize)
            .take(limit)
            .collect())
    }

    fn count(&self, cursor: CursorHandle, query: QueryHandle) -> Result<u64> {
        let engine = self.lock();
        let (compiled, table) = engine.selection(cursor, query)?;
        let Some(table) = table else {
            return Ok(0);
        };
        Ok(table
            .rows
            .values()
            .filter(|row| compiled.matches(row))
            .count() as u64)
    }

    fn remove(&self, cursor: CursorHandle, query: QueryHandle) -> Result<u64> {
        let mut engine = self.lock();
        engine.writable_cursor(cursor)?;
        let (compiled, table) = engine.selection(cursor, query)?;
        let Some(table) = table else {
            return Ok(0);
        };
        let doomed: Vec<Id> = table
            .rows
            .iter()
            .filter(|(_, row)| compiled.matches(row))
            .map(|(id, _)| *id)
            .collect();
        let name = compiled.entity.name;
        if let Some(table) = engine.tables.get_mut(name) {
            for id in &doomed {
                table.rows.remove(id);
            }
        }
        Ok(doomed.len() as u64)
    }

    fn describe(&self, query: QueryHandle) -> Result<String> {
        Ok(self.lock().compiled(query)?.describe())
    }

    fn property_strings(
        &self,
        cursor: CursorHandle,
        query: QueryHandle,
        property: PropertyId,
        params: &PropertyParams,
    ) -> Result<Vec<String>> {
        let engine = self.lock();
        let def = Self::property_def(&engine, query, property)?;
        expect_channel(def, def.ty == TypeTag::String, "string")?;
        let (compiled, table) = engine.selection(cursor, query)?;
        Ok(select_values(compiled, table, def, params)
            .iter()
            .filter_map(|value| value.as_text().map(str::to_owned))
            .collect())
    }

    fn property_longs(
        &self,
        cursor: CursorHandle,
        query: QueryHandle,
        property: PropertyId,
        params: &PropertyParams,
    ) -> Result<Vec<i64>> {
        let engine = self.lock();
        let def = Self::property_def(&engine, query, property)?;
        expect_channel(def, integer_channel(def.ty), "integer")?;
        let (compiled, table) = engine.selection(cursor, query)?;
        Ok(select_values(compiled, table, def, params)
            .iter()
            .filter_map(Value::as_long)
            .collect())
    }

    fn property_floats(
        &self,
        cursor: CursorHandle,
        query: QueryHandle,
        property: PropertyId,
        params: &PropertyParams,
    ) -> Result<Vec<f32>> {
        let engine = self.lock();
        let def = Self::property_def(&engine, query, property)?;
        expect_channel(def, def.ty == TypeTag::Float, "floating")?;
        let (compiled, table) = engine.selection(cursor, query)?;
        Ok(select_values(compiled, table, def, params)
            .iter()
            .filter_map(|value| value.as_double().map(|v| v as f32))
            .collect())
    }

    fn property_doubles(
        &self,
        cursor: CursorHandle,
        query: QueryHandle,
        property: PropertyId,
        params: &PropertyParams,
    ) -> Result<Vec<f64>> {
        let engine = self.lock();
        let def = Self::property_def(&engine, query, property)?;
        expect_channel(def, def.ty == TypeTag::Double, "floating")?;
        let (compiled, table) = engine.selection(cursor, query)?;
        Ok(select_values(compiled, table, def, params)
            .iter()
            .filter_map(Value::as_double)
            .collect())
    }

    fn property_string(
        &self,
        cursor: CursorHandle,
        query: QueryHandle,
        property: PropertyId,
        params: &PropertyParams,
    ) -> Result<Option<String>> {
        let engine = self.lock();
        let def = Self::property_def(&engine, query, property)?;
        expect_channel(def, def.ty == TypeTag::String, "string")?;
        let (compiled, table) = engine.selection(cursor, query)?;
        Ok(scalar_value(compiled, table, def, params)?
            .and_then(|value| value.as_text().map(str::to_owned)))
    }

    fn property_long(
        &self,
        cursor: CursorHandle,
        query: QueryHandle,
        property: PropertyId,
        params: &PropertyParams,
    ) -> Result<Option<i64>> {
        let engine = self.lock();
        let def = Self::property_def(&engine, query, property)?;
        expect_channel(def, integer_channel(def.ty), "integer")?;
        let (compiled, table) = engine.selection(cursor, query)?;
        Ok(scalar_value(compiled, table, def, params)?.and_then(|value| value.as_long()))
    }

    fn property_float(
        &self,
        cursor: CursorHandle,
        query: QueryHandle,
        property: PropertyId,
        params: &PropertyParams,
    ) -> Result<Option<f32>> {
        let engine = self.lock();
        let def = Self::property_def(&engine, query, property)?;
        expect_channel(def, def.ty == TypeTag::Float, "floating")?;
        let (compiled, table) = engine.selection(cursor, query)?;
        Ok(scalar_value(compiled, table, def, params)?
            .and_then(|value| value.as_double().map(|v| v as f32)))
    }

    fn property_double(
        &self,
        cursor: CursorHandle,
        query: QueryHandle,
        property: PropertyId,
        params: &PropertyParams,
    ) -> Result<Option<f64>> {
        let engine = self.lock();
        let def = Self::property_def(&engine, query, property)?;
        expect_channel(def, def.ty == TypeTag::Double, "floating")?;
        let (compiled, table) = engine.selection(cursor, query)?;
        Ok(scalar_value(compiled, table, def, params)?.and_then(|value| value.as_double()))
    }

    fn property_count(
        &self,
        cursor: CursorHandle,
        query: QueryHandle,
        property: PropertyId,
        params: &PropertyParams,
    ) -> Result<u64> {
        let engine = self.lock();
        let def = Self::property_def(&engine, query, property)?;
        let (compiled, table) = engine.selection(cursor, query)?;
        Ok(select_values(compiled, table, def, params).len() as u64)
    }

    fn sum(&self, cursor: CursorHandle, query: QueryHandle, property: PropertyId) -> Result<i64> {
        let engine = self.lock();
        let def = Self::property_def(&engine, query, property)?;
        expect_channel(def, integer_channel(def.ty), "integer")?;
        let (compiled, table) = engine.selection(cursor, query)?;
        let params = PropertyParams::default();
        select_values(compiled, table, def, &params)
            .iter()
            .filter_map(Value::as_long)
            .try_fold(0i64, |sum, value| {
                sum.checked_add(value)
                    .ok_or_else(|| QueryError::backend("sum overflowed 64 bits", false))
            })
    }

    fn sum_double(
        &self,
        cursor: CursorHandle,
        query: QueryHandle,
        property: PropertyId,
    ) -> Result<f64> {
        let engine = self.lock();
        let def = Self::property_def(&engine, query, property)?;
        expect_channel(def, float_channel(def.ty), "floating")?;
        let (compiled, table) = engine.selection(cursor, query)?;
        let params = PropertyParams::default();
        Ok(select_values(compiled, table, def, &params)
            .iter()
            .filter_map(Value::as_double)
            .sum())
    }

    fn min(&self, cursor: CursorHandle, query: QueryHandle, property: PropertyId) -> Result<i64> {
        let engine = self.lock();
        let def = Self::property_def(&engine, query, property)?;
        expect_channel(def, integer_channel(def.ty), "integer")?;
        let (compiled, table) = engine.selection(cursor, query)?;
        let params = PropertyParams::default();
        Ok(select_values(compiled, table, def, &params)
            .iter()
            .filter_map(Value::as_long)
            .min()
            .unwrap_or(0))
    }

    fn max(&self, cursor: CursorHandle, query: QueryHandle, property: PropertyId) -> Result<i64> {
        let engine = self.lock();
        let def = Self::property_def(&engine, query, property)?;
        expect_channel(def, integer_channel(def.ty), "integer")?;
        let (compiled, table) = engine.selection(cursor, query)?;
        let params = PropertyParams::default();
        Ok(select_values(compiled, table, def, &params)
            .iter()
            .filter_map(Value::as_long)
            .max()
            .unwrap_or(0))
    }

    fn min_double(
        &self,
        cursor: CursorHandle,
        query: QueryHandle,
        property: PropertyId,
    ) -> Result<f64> {
        let engine = self.lock();
        let def = Self::property_def(&engine, query, property)?;
        expect_channel(def, float_channel(def.ty), "floating")?;
        let (compiled, table) = engine.selection(cursor, query)?;
        let params = PropertyParams::default();
        Ok(select_values(compiled, table, def, &params)
            .iter()
            .filter_map(Value::as_double)
            .fold(None, |min: Option<f64>, value| {
                Some(min.map_or(value, |m| if value.total_cmp(&m).is_lt() { value } else { m }))
            })
            .unwrap_or(0.0))
    }

    fn max_double(
        &self,
        cursor: CursorHandle,
        query: QueryHandle,
        property: PropertyId,
    ) -> Result<f64> {
        let engine = self.lock();
        let def = Self::property_def(&engine, query, property)?;
        expect_channel(def, float_channel(def.ty), "floating")?;
        let (compiled, table) = engine.selection(cursor, query)?;
        let params = PropertyParams::default();
        Ok(select_values(compiled, table, def, &params)
            .iter()
            .filter_map(Value::as_double)
            .fold(None, |max: Option<f64>, value| {
                Some(max.map_or(value, |m| if value.total_cmp(&m).is_gt() { value } else { m }))
            })
            .unwrap_or(0.0))
    }

    fn avg(&self, cursor: CursorHandle, query: QueryHandle, property: PropertyId) -> Result<f64> {
        let engine = self.lock();
        let def = Self::property_def(&engine, query, property)?;
        expect_channel(
            def,
            integer_channel(def.ty) || float_channel(def.ty),
            "numeric",
        )?;
        let (compiled, table) = engine.selection(cursor, query)?;
        let params = PropertyParams::default();
        let values: Vec<f64> = select_values(compiled, table, def, &params)
            .iter()
            .filter_map(|value| {
                value
                    .as_double()
                    .or_else(|| value.as_long().map(|v| v as f64))
            })
            .collect();
        if values.is_empty() {
            return Ok(0.0);
        }
        Ok(values.iter().sum::<f64>() / values.len() as f64)
    }

    fn set_parameter_long(
        &self,
        query: QueryHandle,
        property: PropertyId,
        value: i64,
    ) -> Result<()> {
        self.lock()
            .compiled_mut(query)?
            .rebind(property, |op| match op {
                LeafOp::Long(_, slot) => {
                    *slot = value;
                    true
                }
                _ => false,
            })
    }

    fn set_parameter_double(
        &self,
        query: QueryHandle,
        property: PropertyId,
        value: f64,
    ) -> Result<()> {
        self.lock()
            .compiled_mut(query)?
            .rebind(property, |op| match op {
                LeafOp::Double(_, slot) => {
                    *slot = value;
                    true
                }
                _ => false,
            })
    }

    fn set_parameter_string(
        &self,
        query: QueryHandle,
        property: PropertyId,
        value: &str,
    ) -> Result<()> {
        self.lock()
            .compiled_mut(query)?
            .rebind(property, |op| match op {
                LeafOp::Str(_, slot, _) => {
                    *slot = value.to_owned();
                    true
                }
                _ => false,
            })
    }

    fn set_parameters_long(
        &self,
        query: QueryHandle,
        property: PropertyId,
        first: i64,
        second: i64,
    ) -> Result<()> {
        self.lock()
            .compiled_mut(query)?
            .rebind(property, |op| match op {
                LeafOp::LongRange(from, to) => {
                    (*from, *to) = (first, second);
                    true
                }
                _ => false,
            })
    }

    fn set_parameters_double(
        &self,
        query: QueryHandle,
        property: PropertyId,
        first: f64,
        second: f64,
    ) -> Result<()> {
        self.lock()
            .compiled_mut(query)?
            .rebind(property, |op| match op {
                LeafOp::DoubleRange(from, to) => {
                    (*from, *to) = (first, second);
                    true
                }
                _ => false,
            })
    }

    fn set_parameter_long_alias(&self, query: QueryHandle, alias: &str, value: i64) -> Result<()> {
        self.lock()
            .compiled_mut(query)?
            .rebind_alias(alias, |op| match op {
                LeafOp::Long(_, slot) => {
                    *slot = value;
                    true
                }
                _ => false,
            })
    }

    fn set_parameter_double_alias(
        &self,
        query: QueryHandle,
        alias: &str,
        value: f64,
    ) -> Result<()> {
        self.lock()
            .compiled_mut(query)?
            .rebind_alias(alias, |op| match op {
                LeafOp::Double(_, slot) => {
                    *slot = value;
                    true
                }
                _ => false,
            })
    }

    fn set_parameter_string_alias(
        &self,
        query: QueryHandle,
        alias: &str,
        value: &str,
    ) -> Result<()> {
        self.lock()
            .compiled_mut(query)?
            .rebind_alias(alias, |op| match op {
                LeafOp::Str(_, slot, _) => {
                    *slot = value.to_owned();
                    true
                }
                _ => false,
            })
    }

    fn set_parameters_long_alias(
        &self,
        query: QueryHandle,
        alias: &str,
        first: i64,
        second: i64,
    ) -> Result<()> {
        self.lock()
            .compiled_mut(query)?
            .rebind_alias(alias, |op| match op {
                LeafOp::LongRange(from, to) => {
                    (*from, *to) = (first, second);
                    true
                }
                _ => false,
            })
    }
}
