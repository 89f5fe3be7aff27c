use crate::entities::TShirt;
use silo_core::{Backend, QueryError, Store, StringOrder, Value};

fn seed_priced<B: Backend>(store: &Store<B>, prices: &[i64]) {
    for price in prices {
        let mut shirt = TShirt::new(Some("Gray"), Some("M"), *price, *price as f64 / 100.0, true);
        store.put(&mut shirt).expect("Failed to seed shirt");
    }
}

pub fn property_values<B: Backend>(store: &Store<B>) {
    seed_priced(store, &[10, 10, 20, 30, 30]);

    let query = store.query::<TShirt>().unwrap().build().unwrap();

    // Distinct collapses duplicates; order is not guaranteed.
    let mut prices = query.property(&TShirt::PRICE).distinct().find_longs().unwrap();
    prices.sort_unstable();
    assert_eq!(prices, vec![10, 20, 30]);

    let all = query.property(&TShirt::PRICE).find_longs().unwrap();
    assert_eq!(all.len(), 5, "without distinct every row contributes");

    // Narrow integer projections ride the long channel.
    let mut ints = query.property(&TShirt::PRICE).distinct().find_ints().unwrap();
    ints.sort_unstable();
    assert_eq!(ints, vec![10, 20, 30]);
    assert_eq!(query.property(&TShirt::PRICE).find_shorts().unwrap().len(), 5);
    assert_eq!(query.property(&TShirt::PRICE).find_bytes().unwrap().len(), 5);

    // Doubles come from the floating channel; a float projection of a
    // double property is a type error.
    assert_eq!(query.property(&TShirt::WEIGHT).find_doubles().unwrap().len(), 5);
    let error = query.property(&TShirt::WEIGHT).find_floats().unwrap_err();
    assert!(matches!(
        error.downcast_ref::<QueryError>(),
        Some(QueryError::InvalidArgument(..))
    ));

    query.close();
}

pub fn property_nulls<B: Backend>(store: &Store<B>) {
    let mut named = TShirt::new(Some("Olive"), Some("L"), 15, 0.2, true);
    store.put(&mut named).unwrap();
    let mut anonymous = TShirt::new(None, Some("L"), 25, 0.3, true);
    store.put(&mut anonymous).unwrap();

    let query = store.query::<TShirt>().unwrap().build().unwrap();

    // Nulls are skipped by default...
    let colors = query.property(&TShirt::COLOR).find_strings().unwrap();
    assert_eq!(colors, vec!["Olive"]);

    // ...and substituted when a null value is configured.
    let mut substituted = query
        .property(&TShirt::COLOR)
        .null_value(Value::Text(Some("NULL".to_owned())))
        .unwrap()
        .find_strings()
        .unwrap();
    substituted.sort_unstable();
    assert_eq!(substituted, vec!["NULL", "Olive"]);

    // The substitute must be a string or a number.
    let mut property = query.property(&TShirt::COLOR);
    assert!(property.null_value(Value::Bool(Some(true))).is_err());
    assert!(property.null_value(Value::Text(None)).is_err());
    assert!(property.null_value(Value::Bytes(Some(vec![1]))).is_err());

    // reset() restores construction-time behavior.
    let mut property = query.property(&TShirt::COLOR);
    property
        .null_value(Value::Text(Some("NULL".to_owned())))
        .unwrap()
        .distinct();
    property.reset();
    assert_eq!(property.find_strings().unwrap(), vec!["Olive"]);

    query.close();
}

pub fn property_distinct_strings<B: Backend>(store: &Store<B>) {
    for color in ["Blue", "blue", "BLUE", "Red"] {
        let mut shirt = TShirt::new(Some(color), Some("M"), 10, 0.2, true);
        store.put(&mut shirt).unwrap();
    }

    let query = store.query::<TShirt>().unwrap().build().unwrap();

    // Case-insensitive distinct folds the blue variants together.
    let folded = query.property(&TShirt::COLOR).distinct().find_strings().unwrap();
    assert_eq!(folded.len(), 2);

    let mut kept = query
        .property(&TShirt::COLOR)
        .distinct_with_order(StringOrder::CaseSensitive)
        .unwrap()
        .find_strings()
        .unwrap();
    kept.sort_unstable();
    assert_eq!(kept, vec!["BLUE", "Blue", "Red", "blue"]);

    // Ordered distinct is a string-only configuration.
    let error = query
        .property(&TShirt::PRICE)
        .distinct_with_order(StringOrder::CaseSensitive)
        .unwrap_err();
    assert!(matches!(
        error.downcast_ref::<QueryError>(),
        Some(QueryError::InvalidArgument(..))
    ));

    // Distinct-aware count.
    assert_eq!(query.property(&TShirt::COLOR).count().unwrap(), 4);
    assert_eq!(query.property(&TShirt::COLOR).distinct().count().unwrap(), 2);

    query.close();
}

pub fn property_scalars<B: Backend>(store: &Store<B>) {
    seed_priced(store, &[10, 10, 20]);

    let query = store.query::<TShirt>().unwrap().build().unwrap();

    // unique() fails on more than one distinct value, even without
    // distinct() requested.
    let error = query.property(&TShirt::PRICE).unique().find_long().unwrap_err();
    assert!(matches!(
        error.downcast_ref::<QueryError>(),
        Some(QueryError::NotUnique)
    ));

    // A selective query narrows to one distinct value.
    let mut builder = store.query::<TShirt>().unwrap();
    builder.less(&TShirt::PRICE, 15).unwrap();
    let narrow = builder.build().unwrap();
    assert_eq!(
        narrow.property(&TShirt::PRICE).unique().distinct().find_long().unwrap(),
        Some(10),
        "two rows share the single distinct value 10"
    );
    assert_eq!(
        narrow.property(&TShirt::SIZE).unique().find_string().unwrap(),
        Some("M".to_owned())
    );
    assert_eq!(narrow.property(&TShirt::IN_STOCK).find_boolean().unwrap(), Some(true));
    assert_eq!(narrow.property(&TShirt::PRICE).find_int().unwrap(), Some(10));

    // No match resolves to None.
    let mut builder = store.query::<TShirt>().unwrap();
    builder.greater(&TShirt::PRICE, 1_000).unwrap();
    let empty = builder.build().unwrap();
    assert_eq!(empty.property(&TShirt::PRICE).find_long().unwrap(), None);
    assert_eq!(empty.property(&TShirt::SIZE).find_string().unwrap(), None);

    narrow.close();
    empty.close();
    query.close();
}

pub fn aggregates<B: Backend>(store: &Store<B>) {
    seed_priced(store, &[10, 20, 30, 40]);

    let query = store.query::<TShirt>().unwrap().build().unwrap();
    let prices = query.property(&TShirt::PRICE);
    assert_eq!(prices.sum().unwrap(), 100);
    assert_eq!(prices.min().unwrap(), 10);
    assert_eq!(prices.max().unwrap(), 40);
    assert!((prices.avg().unwrap() - 25.0).abs() < f64::EPSILON);

    let weights = query.property(&TShirt::WEIGHT);
    assert!((weights.sum_double().unwrap() - 1.0).abs() < 1e-9);
    assert!((weights.min_double().unwrap() - 0.1).abs() < 1e-9);
    assert!((weights.max_double().unwrap() - 0.4).abs() < 1e-9);

    // Aggregates run entirely in the engine: a post-filter is silently
    // ignored.
    let mut builder = store.query::<TShirt>().unwrap();
    builder.filter(|shirt: &TShirt| shirt.price > 25).unwrap();
    let filtered = builder.build().unwrap();
    assert_eq!(filtered.property(&TShirt::PRICE).sum().unwrap(), 100);

    // Empty selections aggregate to zero.
    let mut builder = store.query::<TShirt>().unwrap();
    builder.greater(&TShirt::PRICE, 1_000).unwrap();
    let none = builder.build().unwrap();
    assert_eq!(none.property(&TShirt::PRICE).sum().unwrap(), 0);
    assert_eq!(none.property(&TShirt::PRICE).min().unwrap(), 0);
    assert_eq!(none.property(&TShirt::PRICE).avg().unwrap(), 0.0);

    // Aggregating a string property is a type error.
    let error = query.property(&TShirt::COLOR).sum().unwrap_err();
    assert!(matches!(
        error.downcast_ref::<QueryError>(),
        Some(QueryError::InvalidArgument(..))
    ));

    filtered.close();
    none.close();
    query.close();
}
