use crate::{TypeTag, datetime_to_epoch_ms};
use std::{fmt, marker::PhantomData};
use time::OffsetDateTime;

pub type PropertyId = u32;

/// Schema metadata for one entity property.
#[derive(Debug, PartialEq, Eq)]
pub struct PropertyDef {
    pub id: PropertyId,
    pub name: &'static str,
    pub ty: TypeTag,
}

/// Immutable typed handle identifying a property of an entity schema.
///
/// The phantom parameter is the Rust-side value type; the predicate
/// methods of the builder use it to dispatch at compile time, replacing
/// the overload-by-argument-type surface of dynamic bindings.
pub struct Property<V> {
    pub id: PropertyId,
    pub ty: TypeTag,
    marker: PhantomData<fn() -> V>,
}

impl<V> Property<V> {
    pub const fn new(id: PropertyId, ty: TypeTag) -> Self {
        Self {
            id,
            ty,
            marker: PhantomData,
        }
    }
}

impl<V> Clone for Property<V> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<V> Copy for Property<V> {}

impl<V> fmt::Debug for Property<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Property")
            .field("id", &self.id)
            .field("ty", &self.ty)
            .finish()
    }
}

/// Value of either scalar comparison channel.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Scalar {
    Long(i64),
    Double(f64),
}

/// Property value types carried on the integer channel.
///
/// `bool` packs to 0/1, `char` to its scalar value and dates to epoch
/// milliseconds, matching the engine encoding.
pub trait IntegerValue: Copy {
    fn as_long(self) -> i64;
}

impl IntegerValue for bool {
    fn as_long(self) -> i64 {
        i64::from(self)
    }
}

impl IntegerValue for i8 {
    fn as_long(self) -> i64 {
        i64::from(self)
    }
}

impl IntegerValue for i16 {
    fn as_long(self) -> i64 {
        i64::from(self)
    }
}

impl IntegerValue for char {
    fn as_long(self) -> i64 {
        i64::from(u32::from(self))
    }
}

impl IntegerValue for i32 {
    fn as_long(self) -> i64 {
        i64::from(self)
    }
}

impl IntegerValue for i64 {
    fn as_long(self) -> i64 {
        self
    }
}

impl IntegerValue for OffsetDateTime {
    fn as_long(self) -> i64 {
        datetime_to_epoch_ms(self)
    }
}

/// Property value types carried on the floating channel.
pub trait FloatValue: Copy {
    fn as_double(self) -> f64;
}

impl FloatValue for f32 {
    fn as_double(self) -> f64 {
        f64::from(self)
    }
}

impl FloatValue for f64 {
    fn as_double(self) -> f64 {
        self
    }
}

/// Property value types with a total engine order on one of the scalar
/// channels.
pub trait OrderedValue: Copy {
    fn as_scalar(self) -> Scalar;
}

impl OrderedValue for bool {
    fn as_scalar(self) -> Scalar {
        Scalar::Long(self.as_long())
    }
}

impl OrderedValue for i8 {
    fn as_scalar(self) -> Scalar {
        Scalar::Long(self.as_long())
    }
}

impl OrderedValue for i16 {
    fn as_scalar(self) -> Scalar {
        Scalar::Long(self.as_long())
    }
}

impl OrderedValue for char {
    fn as_scalar(self) -> Scalar {
        Scalar::Long(self.as_long())
    }
}

impl OrderedValue for i32 {
    fn as_scalar(self) -> Scalar {
        Scalar::Long(self.as_long())
    }
}

impl OrderedValue for i64 {
    fn as_scalar(self) -> Scalar {
        Scalar::Long(self)
    }
}

impl OrderedValue for OffsetDateTime {
    fn as_scalar(self) -> Scalar {
        Scalar::Long(self.as_long())
    }
}

impl OrderedValue for f32 {
    fn as_scalar(self) -> Scalar {
        Scalar::Double(self.as_double())
    }
}

impl OrderedValue for f64 {
    fn as_scalar(self) -> Scalar {
        Scalar::Double(self)
    }
}
