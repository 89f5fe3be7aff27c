use crate::entities::TShirt;
use silo_core::{Backend, Store, StringOrder};

/// Standard dataset shared by the condition and ordering suites.
pub fn seed_shirts<B: Backend>(store: &Store<B>) {
    let shirts = [
        TShirt::new(Some("Blue"), Some("XL"), 30, 0.30, true),
        TShirt::new(Some("Blue"), Some("M"), 20, 0.20, true),
        TShirt::new(Some("Red"), Some("XL"), 45, 0.30, false),
        TShirt::new(Some("Green"), Some("S"), 10, 0.10, true),
        TShirt::new(None, Some("M"), 25, 0.20, true),
        TShirt::new(Some("blue"), Some("S"), 55, 0.15, false),
    ];
    for mut shirt in shirts {
        store.put(&mut shirt).expect("Failed to seed shirt");
    }
}

fn matching_ids<B: Backend>(query: &silo_core::Query<TShirt, B>) -> Vec<u64> {
    let mut ids: Vec<u64> = query
        .find()
        .expect("Failed to run query")
        .iter()
        .map(|shirt| shirt.id)
        .collect();
    ids.sort_unstable();
    ids
}

pub fn conditions<B: Backend>(store: &Store<B>) {
    seed_shirts(store);

    // Implicit AND groups before an explicit OR.
    let mut builder = store.query::<TShirt>().expect("Failed to begin builder");
    builder
        .equal_string(&TShirt::COLOR, "blue", StringOrder::CaseInsensitive)
        .unwrap()
        .equal_string(&TShirt::SIZE, "XL", StringOrder::CaseInsensitive)
        .unwrap()
        .or()
        .unwrap()
        .less(&TShirt::PRICE, 30)
        .unwrap();
    let query = builder.build().expect("Failed to build query");
    assert_eq!(
        matching_ids(&query),
        vec![1, 2, 4, 5],
        "(blue AND XL) OR price < 30 should match 4 shirts"
    );

    // The explicit AND combines eagerly and yields the same grouping.
    let mut builder = store.query::<TShirt>().unwrap();
    builder
        .equal_string(&TShirt::COLOR, "blue", StringOrder::CaseInsensitive)
        .unwrap()
        .and()
        .unwrap()
        .equal_string(&TShirt::SIZE, "XL", StringOrder::CaseInsensitive)
        .unwrap()
        .or()
        .unwrap()
        .less(&TShirt::PRICE, 30)
        .unwrap();
    let explicit = builder.build().unwrap();
    assert_eq!(matching_ids(&explicit), vec![1, 2, 4, 5]);

    // Case-sensitive string equality.
    let mut builder = store.query::<TShirt>().unwrap();
    builder
        .equal_string(&TShirt::COLOR, "blue", StringOrder::CaseSensitive)
        .unwrap();
    assert_eq!(matching_ids(&builder.build().unwrap()), vec![6]);

    // Negated string equality never matches null cells.
    let mut builder = store.query::<TShirt>().unwrap();
    builder
        .not_equal_string(&TShirt::COLOR, "Red", StringOrder::CaseInsensitive)
        .unwrap();
    assert_eq!(matching_ids(&builder.build().unwrap()), vec![1, 2, 4, 6]);

    // Substrings, prefixes, suffixes.
    let mut builder = store.query::<TShirt>().unwrap();
    builder
        .contains(&TShirt::COLOR, "LUE", StringOrder::CaseInsensitive)
        .unwrap();
    assert_eq!(matching_ids(&builder.build().unwrap()), vec![1, 2, 6]);

    let mut builder = store.query::<TShirt>().unwrap();
    builder
        .starts_with(&TShirt::COLOR, "Blu", StringOrder::CaseSensitive)
        .unwrap();
    assert_eq!(matching_ids(&builder.build().unwrap()), vec![1, 2]);

    let mut builder = store.query::<TShirt>().unwrap();
    builder
        .ends_with(&TShirt::COLOR, "EEN", StringOrder::CaseInsensitive)
        .unwrap();
    assert_eq!(matching_ids(&builder.build().unwrap()), vec![4]);

    // Nullness.
    let mut builder = store.query::<TShirt>().unwrap();
    builder.is_null(&TShirt::COLOR).unwrap();
    assert_eq!(matching_ids(&builder.build().unwrap()), vec![5]);

    let mut builder = store.query::<TShirt>().unwrap();
    builder.not_null(&TShirt::COLOR).unwrap();
    assert_eq!(matching_ids(&builder.build().unwrap()), vec![1, 2, 3, 4, 6]);

    // Integer comparisons and set membership.
    let mut builder = store.query::<TShirt>().unwrap();
    builder.greater(&TShirt::PRICE, 30).unwrap();
    assert_eq!(matching_ids(&builder.build().unwrap()), vec![3, 6]);

    let mut builder = store.query::<TShirt>().unwrap();
    builder.any_of(&TShirt::PRICE, &[10, 45]).unwrap();
    assert_eq!(matching_ids(&builder.build().unwrap()), vec![3, 4]);

    let mut builder = store.query::<TShirt>().unwrap();
    builder.none_of(&TShirt::PRICE, &[10, 45]).unwrap();
    assert_eq!(matching_ids(&builder.build().unwrap()), vec![1, 2, 5, 6]);

    // A degenerate range is equality.
    let mut builder = store.query::<TShirt>().unwrap();
    builder.between(&TShirt::PRICE, 20, 20).unwrap();
    assert_eq!(matching_ids(&builder.build().unwrap()), vec![2]);

    // Booleans pack to 0/1.
    let mut builder = store.query::<TShirt>().unwrap();
    builder.equal(&TShirt::IN_STOCK, true).unwrap();
    assert_eq!(matching_ids(&builder.build().unwrap()), vec![1, 2, 4, 5]);

    // Floating comparisons; equality only through a tolerance band.
    let mut builder = store.query::<TShirt>().unwrap();
    builder.equal_with_tolerance(&TShirt::WEIGHT, 0.20, 0.001).unwrap();
    assert_eq!(matching_ids(&builder.build().unwrap()), vec![2, 5]);

    let mut builder = store.query::<TShirt>().unwrap();
    builder.less(&TShirt::WEIGHT, 0.18).unwrap();
    assert_eq!(matching_ids(&builder.build().unwrap()), vec![4, 6]);

    let mut builder = store.query::<TShirt>().unwrap();
    builder.between(&TShirt::WEIGHT, 0.15, 0.25).unwrap();
    assert_eq!(matching_ids(&builder.build().unwrap()), vec![2, 5, 6]);

    // A builder without conditions matches everything.
    let all = store.query::<TShirt>().unwrap().build().unwrap();
    assert_eq!(all.count().expect("Failed to count"), 6);
}
