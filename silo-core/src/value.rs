use std::fmt::{self, Display};
use time::OffsetDateTime;

/// Declared type of an entity property.
///
/// `Date` travels to the engine as `Long` (milliseconds since the Unix
/// epoch); the remaining tags map one to one onto engine value channels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TypeTag {
    Bool,
    Byte,
    Short,
    Char,
    Int,
    Long,
    Float,
    Double,
    String,
    ByteArray,
    Date,
}

/// A nullable typed cell. Rows are vectors of these in property
/// declaration order.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Bool(Option<bool>),
    Byte(Option<i8>),
    Short(Option<i16>),
    Char(Option<char>),
    Int(Option<i32>),
    Long(Option<i64>),
    Float(Option<f32>),
    Double(Option<f64>),
    Text(Option<String>),
    Bytes(Option<Vec<u8>>),
    /// Milliseconds since the Unix epoch.
    Date(Option<i64>),
}

impl Value {
    /// Declared type of this cell.
    pub fn type_tag(&self) -> TypeTag {
        match self {
            Value::Bool(..) => TypeTag::Bool,
            Value::Byte(..) => TypeTag::Byte,
            Value::Short(..) => TypeTag::Short,
            Value::Char(..) => TypeTag::Char,
            Value::Int(..) => TypeTag::Int,
            Value::Long(..) => TypeTag::Long,
            Value::Float(..) => TypeTag::Float,
            Value::Double(..) => TypeTag::Double,
            Value::Text(..) => TypeTag::String,
            Value::Bytes(..) => TypeTag::ByteArray,
            Value::Date(..) => TypeTag::Date,
        }
    }

    /// Null cell of the given declared type.
    pub fn null_of(tag: TypeTag) -> Value {
        match tag {
            TypeTag::Bool => Value::Bool(None),
            TypeTag::Byte => Value::Byte(None),
            TypeTag::Short => Value::Short(None),
            TypeTag::Char => Value::Char(None),
            TypeTag::Int => Value::Int(None),
            TypeTag::Long => Value::Long(None),
            TypeTag::Float => Value::Float(None),
            TypeTag::Double => Value::Double(None),
            TypeTag::String => Value::Text(None),
            TypeTag::ByteArray => Value::Bytes(None),
            TypeTag::Date => Value::Date(None),
        }
    }

    pub fn is_null(&self) -> bool {
        match self {
            Value::Bool(v) => v.is_none(),
            Value::Byte(v) => v.is_none(),
            Value::Short(v) => v.is_none(),
            Value::Char(v) => v.is_none(),
            Value::Int(v) => v.is_none(),
            Value::Long(v) => v.is_none(),
            Value::Float(v) => v.is_none(),
            Value::Double(v) => v.is_none(),
            Value::Text(v) => v.is_none(),
            Value::Bytes(v) => v.is_none(),
            Value::Date(v) => v.is_none(),
        }
    }

    /// Integer-channel view: `Bool` packs to 0/1, `Char` to its scalar
    /// value, `Date` to epoch milliseconds. `None` for nulls and for
    /// cells outside the integer channel.
    pub fn as_long(&self) -> Option<i64> {
        match self {
            Value::Bool(v) => v.map(i64::from),
            Value::Byte(v) => v.map(i64::from),
            Value::Short(v) => v.map(i64::from),
            Value::Char(v) => v.map(|c| i64::from(u32::from(c))),
            Value::Int(v) => v.map(i64::from),
            Value::Long(v) => *v,
            Value::Date(v) => *v,
            _ => None,
        }
    }

    /// Floating-channel view. `None` for nulls and non-float cells.
    pub fn as_double(&self) -> Option<f64> {
        match self {
            Value::Float(v) => v.map(f64::from),
            Value::Double(v) => *v,
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(v) => v.as_deref(),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(v) => v.as_deref(),
            _ => None,
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            return write!(f, "null");
        }
        match self {
            Value::Bool(Some(v)) => write!(f, "{v}"),
            Value::Byte(Some(v)) => write!(f, "{v}"),
            Value::Short(Some(v)) => write!(f, "{v}"),
            Value::Char(Some(v)) => write!(f, "'{v}'"),
            Value::Int(Some(v)) => write!(f, "{v}"),
            Value::Long(Some(v)) => write!(f, "{v}"),
            Value::Float(Some(v)) => write!(f, "{v}"),
            Value::Double(Some(v)) => write!(f, "{v}"),
            Value::Text(Some(v)) => write!(f, "\"{v}\""),
            Value::Bytes(Some(v)) => write!(f, "[{} bytes]", v.len()),
            Value::Date(Some(v)) => write!(f, "{v}ms"),
            _ => unreachable!(),
        }
    }
}

/// Epoch-millisecond encoding used for `Date` cells at the engine
/// boundary.
pub fn datetime_to_epoch_ms(value: OffsetDateTime) -> i64 {
    (value.unix_timestamp_nanos() / 1_000_000) as i64
}

/// Inverse of [`datetime_to_epoch_ms`].
pub fn epoch_ms_to_datetime(ms: i64) -> crate::Result<OffsetDateTime> {
    Ok(OffsetDateTime::from_unix_timestamp_nanos(
        i128::from(ms) * 1_000_000,
    )?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn integer_channel_packing() {
        assert_eq!(Value::Bool(Some(true)).as_long(), Some(1));
        assert_eq!(Value::Bool(Some(false)).as_long(), Some(0));
        assert_eq!(Value::Char(Some('A')).as_long(), Some(65));
        assert_eq!(Value::Byte(Some(-3)).as_long(), Some(-3));
        assert_eq!(Value::Long(None).as_long(), None);
        assert_eq!(Value::Double(Some(1.5)).as_long(), None);
    }

    #[test]
    fn float_channel() {
        assert_eq!(Value::Float(Some(0.5)).as_double(), Some(0.5));
        assert_eq!(Value::Double(Some(2.25)).as_double(), Some(2.25));
        assert_eq!(Value::Long(Some(2)).as_double(), None);
    }

    #[test]
    fn date_round_trip() {
        let moment = datetime!(2024-05-17 12:30:00 UTC);
        let ms = datetime_to_epoch_ms(moment);
        assert_eq!(epoch_ms_to_datetime(ms).unwrap(), moment);
    }

    #[test]
    fn null_of_matches_tag() {
        for tag in [
            TypeTag::Bool,
            TypeTag::Byte,
            TypeTag::Short,
            TypeTag::Char,
            TypeTag::Int,
            TypeTag::Long,
            TypeTag::Float,
            TypeTag::Double,
            TypeTag::String,
            TypeTag::ByteArray,
            TypeTag::Date,
        ] {
            let value = Value::null_of(tag);
            assert!(value.is_null());
            assert_eq!(value.type_tag(), tag);
        }
    }
}
