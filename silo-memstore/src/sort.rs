use silo_core::{EntityDef, OrderFlags, PropertyId, Row, TypeTag, Value};
use std::cmp::Ordering;

/// Comparator over rows for a list of order clauses; earlier clauses
/// dominate, later ones break ties.
pub(crate) fn compare_rows(
    entity: &EntityDef,
    orders: &[(PropertyId, OrderFlags)],
    a: &Row,
    b: &Row,
) -> Ordering {
    for (property, flags) in orders {
        let Some(index) = entity.property_index(*property) else {
            continue;
        };
        let ordering = compare_keys(key(a.get(index), *flags), key(b.get(index), *flags), *flags);
        let ordering = if flags.contains(OrderFlags::DESCENDING) {
            ordering.reverse()
        } else {
            ordering
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

/// Channel-typed sort key of one cell.
enum Key<'a> {
    Null,
    Long(i64),
    ULong(u64),
    Double(f64),
    Text(&'a str),
    Bytes(&'a [u8]),
}

fn key(value: Option<&Value>, flags: OrderFlags) -> Key<'_> {
    let Some(value) = value else {
        return Key::Null;
    };
    if value.is_null() {
        if flags.contains(OrderFlags::NULLS_ZERO) {
            return zero_key(value.type_tag(), flags);
        }
        return Key::Null;
    }
    if let Some(long) = value.as_long() {
        return if flags.contains(OrderFlags::UNSIGNED) {
            Key::ULong(long as u64)
        } else {
            Key::Long(long)
        };
    }
    if let Some(double) = value.as_double() {
        return Key::Double(double);
    }
    if let Some(text) = value.as_text() {
        return Key::Text(text);
    }
    if let Some(bytes) = value.as_bytes() {
        return Key::Bytes(bytes);
    }
    Key::Null
}

fn zero_key(ty: TypeTag, flags: OrderFlags) -> Key<'static> {
    match ty {
        TypeTag::Float | TypeTag::Double => Key::Double(0.0),
        TypeTag::String | TypeTag::ByteArray => Key::Null,
        _ if flags.contains(OrderFlags::UNSIGNED) => Key::ULong(0),
        _ => Key::Long(0),
    }
}

fn compare_keys(a: Key<'_>, b: Key<'_>, flags: OrderFlags) -> Ordering {
    use Key::*;
    match (a, b) {
        (Null, Null) => Ordering::Equal,
        (Null, _) => {
            if flags.contains(OrderFlags::NULLS_LAST) {
                Ordering::Greater
            } else {
                Ordering::Less
            }
        }
        (_, Null) => {
            if flags.contains(OrderFlags::NULLS_LAST) {
                Ordering::Less
            } else {
                Ordering::Greater
            }
        }
        (Long(x), Long(y)) => x.cmp(&y),
        (ULong(x), ULong(y)) => x.cmp(&y),
        (Double(x), Double(y)) => x.total_cmp(&y),
        (Text(x), Text(y)) => {
            if flags.contains(OrderFlags::CASE_SENSITIVE) {
                x.cmp(y)
            } else {
                x.to_ascii_lowercase().cmp(&y.to_ascii_lowercase())
            }
        }
        (Bytes(x), Bytes(y)) => x.cmp(y),
        // Mixed channels cannot happen for one property; keep the sort
        // total anyway.
        _ => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use silo_core::PropertyDef;

    static PROPERTIES: [PropertyDef; 3] = [
        PropertyDef { id: 1, name: "id", ty: TypeTag::Long },
        PropertyDef { id: 2, name: "name", ty: TypeTag::String },
        PropertyDef { id: 3, name: "score", ty: TypeTag::Long },
    ];

    static DEF: EntityDef = EntityDef {
        name: "Probe",
        properties: &PROPERTIES,
        id_property: 1,
    };

    fn row(name: Option<&str>, score: i64) -> Row {
        Row::new(vec![
            Value::Long(Some(1)),
            Value::Text(name.map(str::to_owned)),
            Value::Long(Some(score)),
        ])
    }

    #[test]
    fn strings_default_to_nulls_first_case_insensitive() {
        let orders = [(2, OrderFlags::empty())];
        assert!(compare_rows(&DEF, &orders, &row(None, 0), &row(Some("a"), 0)).is_lt());
        assert!(compare_rows(&DEF, &orders, &row(Some("apple"), 0), &row(Some("BANANA"), 0)).is_lt());
        assert!(compare_rows(&DEF, &orders, &row(Some("Apple"), 0), &row(Some("apple"), 0)).is_eq());
    }

    #[test]
    fn nulls_last_flips_null_placement() {
        let orders = [(2, OrderFlags::NULLS_LAST)];
        assert!(compare_rows(&DEF, &orders, &row(None, 0), &row(Some("a"), 0)).is_gt());
    }

    #[test]
    fn nulls_zero_ranks_null_as_zero() {
        let orders = [(3, OrderFlags::NULLS_ZERO)];
        let null_score = Row::new(vec![
            Value::Long(Some(1)),
            Value::Text(None),
            Value::Long(None),
        ]);
        assert!(compare_rows(&DEF, &orders, &null_score, &row(None, -1)).is_gt());
        assert!(compare_rows(&DEF, &orders, &null_score, &row(None, 1)).is_lt());
        assert!(compare_rows(&DEF, &orders, &null_score, &row(None, 0)).is_eq());
    }

    #[test]
    fn descending_reverses_the_clause() {
        let orders = [(3, OrderFlags::DESCENDING)];
        assert!(compare_rows(&DEF, &orders, &row(None, 10), &row(None, 2)).is_lt());
    }

    #[test]
    fn case_sensitive_separates_the_cases() {
        let orders = [(2, OrderFlags::CASE_SENSITIVE)];
        assert!(compare_rows(&DEF, &orders, &row(Some("Zebra"), 0), &row(Some("apple"), 0)).is_lt());
    }

    #[test]
    fn unsigned_reinterprets_negatives() {
        let signed = [(3, OrderFlags::empty())];
        let unsigned = [(3, OrderFlags::UNSIGNED)];
        assert!(compare_rows(&DEF, &signed, &row(None, -1), &row(None, 1)).is_lt());
        assert!(compare_rows(&DEF, &unsigned, &row(None, -1), &row(None, 1)).is_gt());
    }

    #[test]
    fn later_clauses_break_ties() {
        let orders = [(2, OrderFlags::empty()), (3, OrderFlags::DESCENDING)];
        assert!(compare_rows(&DEF, &orders, &row(Some("a"), 5), &row(Some("A"), 3)).is_lt());
        assert!(compare_rows(&DEF, &orders, &row(Some("a"), 5), &row(Some("b"), 9)).is_lt());
    }
}
