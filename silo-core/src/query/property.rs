use crate::{
    Backend, CursorHandle, Entity, PropertyId, PropertyParams, QueryError, QueryHandle, Result,
    StringOrder, TypeTag, Value, query::QueryInner,
};
use std::fmt;

/// Runs the parent query but returns a single property's values or an
/// aggregate over them.
///
/// Configuration is fluent and sticky until [`reset`](Self::reset); the
/// property must belong to the parent query's entity. Array retrievals
/// carry no ordering guarantee and skip nulls unless a substitute was
/// configured.
pub struct PropertyQuery<'q, T: Entity, B: Backend> {
    query: &'q QueryInner<T, B>,
    property: PropertyId,
    ty: TypeTag,
    params: PropertyParams,
}

impl<'q, T: Entity, B: Backend> PropertyQuery<'q, T, B> {
    pub(crate) fn new(query: &'q QueryInner<T, B>, property: PropertyId, ty: TypeTag) -> Self {
        Self {
            query,
            property,
            ty,
            params: PropertyParams::default(),
        }
    }

    /// Return each distinct value once. String comparison defaults to
    /// ASCII case-insensitive.
    pub fn distinct(&mut self) -> &mut Self {
        self.params.distinct = true;
        self
    }

    /// Distinct with explicit string case handling; only valid on
    /// String-typed properties.
    pub fn distinct_with_order(&mut self, order: StringOrder) -> Result<&mut Self> {
        if self.ty != TypeTag::String {
            return Err(QueryError::invalid_argument(
                "string-ordered distinct requires a String property",
            ));
        }
        self.params.distinct = true;
        self.params.case_sensitive = order.is_case_sensitive();
        Ok(self)
    }

    /// Make scalar retrievals fail with `NotUnique` on more than one
    /// distinct value. Array retrievals ignore this.
    pub fn unique(&mut self) -> &mut Self {
        self.params.unique = true;
        self
    }

    /// Substitute for null values, dispatched to the engine through the
    /// typed slot matching the property. Strings and numbers only.
    pub fn null_value(&mut self, substitute: Value) -> Result<&mut Self> {
        match substitute {
            Value::Text(Some(value)) => self.params.null_string = Some(value),
            Value::Float(Some(value)) => self.params.null_float = Some(value),
            Value::Double(Some(value)) => self.params.null_double = Some(value),
            Value::Byte(Some(value)) => self.params.null_long = Some(i64::from(value)),
            Value::Short(Some(value)) => self.params.null_long = Some(i64::from(value)),
            Value::Int(Some(value)) => self.params.null_long = Some(i64::from(value)),
            Value::Long(Some(value)) => self.params.null_long = Some(value),
            Value::Date(Some(value)) => self.params.null_long = Some(value),
            _ => {
                return Err(QueryError::invalid_argument(
                    "null substitute must be a non-null string or number",
                ));
            }
        }
        Ok(self)
    }

    /// Restore construction-time defaults.
    pub fn reset(&mut self) -> &mut Self {
        self.params = PropertyParams::default();
        self
    }

    fn run<R>(&self, mut f: impl FnMut(&B, CursorHandle, QueryHandle) -> Result<R>) -> Result<R> {
        self.query.store().read_retrying(|tx| {
            let cursor = tx.cursor(T::def())?;
            self.query
                .with_handle(|backend, query| f(backend, cursor.handle(), query))
        })
    }

    /// Params for a scalar retrieval: uniqueness is decided over
    /// distinct values even when `distinct` was not requested.
    fn scalar_params(&self) -> PropertyParams {
        let mut params = self.params.clone();
        if params.unique {
            params.distinct = true;
        }
        params
    }

    // Array retrievals.

    pub fn find_strings(&self) -> Result<Vec<String>> {
        self.run(|backend, cursor, query| {
            backend.property_strings(cursor, query, self.property, &self.params)
        })
    }

    pub fn find_longs(&self) -> Result<Vec<i64>> {
        self.run(|backend, cursor, query| {
            backend.property_longs(cursor, query, self.property, &self.params)
        })
    }

    pub fn find_ints(&self) -> Result<Vec<i32>> {
        Ok(self.find_longs()?.into_iter().map(|v| v as i32).collect())
    }

    pub fn find_shorts(&self) -> Result<Vec<i16>> {
        Ok(self.find_longs()?.into_iter().map(|v| v as i16).collect())
    }

    pub fn find_chars(&self) -> Result<Vec<char>> {
        self.find_longs()?
            .into_iter()
            .map(|v| {
                char::from_u32(v as u32).ok_or_else(|| {
                    QueryError::invalid_argument(format!("value {v} is not a character scalar"))
                })
            })
            .collect()
    }

    pub fn find_bytes(&self) -> Result<Vec<i8>> {
        Ok(self.find_longs()?.into_iter().map(|v| v as i8).collect())
    }

    pub fn find_floats(&self) -> Result<Vec<f32>> {
        self.run(|backend, cursor, query| {
            backend.property_floats(cursor, query, self.property, &self.params)
        })
    }

    pub fn find_doubles(&self) -> Result<Vec<f64>> {
        self.run(|backend, cursor, query| {
            backend.property_doubles(cursor, query, self.property, &self.params)
        })
    }

    // Scalar retrievals. Respect `unique` and `distinct`.

    pub fn find_string(&self) -> Result<Option<String>> {
        let params = self.scalar_params();
        self.run(|backend, cursor, query| {
            backend.property_string(cursor, query, self.property, &params)
        })
    }

    pub fn find_long(&self) -> Result<Option<i64>> {
        let params = self.scalar_params();
        self.run(|backend, cursor, query| {
            backend.property_long(cursor, query, self.property, &params)
        })
    }

    pub fn find_int(&self) -> Result<Option<i32>> {
        Ok(self.find_long()?.map(|v| v as i32))
    }

    pub fn find_short(&self) -> Result<Option<i16>> {
        Ok(self.find_long()?.map(|v| v as i16))
    }

    pub fn find_char(&self) -> Result<Option<char>> {
        self.find_long()?
            .map(|v| {
                char::from_u32(v as u32).ok_or_else(|| {
                    QueryError::invalid_argument(format!("value {v} is not a character scalar"))
                })
            })
            .transpose()
    }

    pub fn find_byte(&self) -> Result<Option<i8>> {
        Ok(self.find_long()?.map(|v| v as i8))
    }

    pub fn find_boolean(&self) -> Result<Option<bool>> {
        Ok(self.find_long()?.map(|v| v != 0))
    }

    pub fn find_float(&self) -> Result<Option<f32>> {
        let params = self.scalar_params();
        self.run(|backend, cursor, query| {
            backend.property_float(cursor, query, self.property, &params)
        })
    }

    pub fn find_double(&self) -> Result<Option<f64>> {
        let params = self.scalar_params();
        self.run(|backend, cursor, query| {
            backend.property_double(cursor, query, self.property, &params)
        })
    }

    // Aggregates. The parent query's post-filter is silently ignored:
    // aggregation happens entirely in the engine.

    pub fn sum(&self) -> Result<i64> {
        self.run(|backend, cursor, query| backend.sum(cursor, query, self.property))
    }

    pub fn sum_double(&self) -> Result<f64> {
        self.run(|backend, cursor, query| backend.sum_double(cursor, query, self.property))
    }

    pub fn min(&self) -> Result<i64> {
        self.run(|backend, cursor, query| backend.min(cursor, query, self.property))
    }

    pub fn max(&self) -> Result<i64> {
        self.run(|backend, cursor, query| backend.max(cursor, query, self.property))
    }

    pub fn min_double(&self) -> Result<f64> {
        self.run(|backend, cursor, query| backend.min_double(cursor, query, self.property))
    }

    pub fn max_double(&self) -> Result<f64> {
        self.run(|backend, cursor, query| backend.max_double(cursor, query, self.property))
    }

    pub fn avg(&self) -> Result<f64> {
        self.run(|backend, cursor, query| backend.avg(cursor, query, self.property))
    }

    /// Count of the property's values under the configured distinct
    /// rules.
    pub fn count(&self) -> Result<u64> {
        self.run(|backend, cursor, query| {
            backend.property_count(cursor, query, self.property, &self.params)
        })
    }
}

impl<'q, T: Entity, B: Backend> fmt::Debug for PropertyQuery<'q, T, B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyQuery")
            .field("entity", &T::def().name)
            .field("property", &self.property)
            .field("ty", &self.ty)
            .field("params", &self.params)
            .finish()
    }
}
