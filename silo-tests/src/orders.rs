use crate::{conditions::seed_shirts, entities::TShirt};
use silo_core::{Backend, OrderFlags, Store};

fn found_ids<B: Backend>(query: &silo_core::Query<TShirt, B>) -> Vec<u64> {
    query
        .find()
        .expect("Failed to run ordered query")
        .iter()
        .map(|shirt| shirt.id)
        .collect()
}

pub fn orders<B: Backend>(store: &Store<B>) {
    seed_shirts(store);

    // Ascending, case-insensitive, nulls first; ties keep engine order.
    let mut builder = store.query::<TShirt>().unwrap();
    builder.order(&TShirt::COLOR).unwrap();
    assert_eq!(
        found_ids(&builder.build().unwrap()),
        vec![5, 1, 2, 6, 4, 3],
        "null, then blue group, Green, Red"
    );

    // Nulls last.
    let mut builder = store.query::<TShirt>().unwrap();
    builder
        .order_with_flags(&TShirt::COLOR, OrderFlags::NULLS_LAST)
        .unwrap();
    assert_eq!(found_ids(&builder.build().unwrap()), vec![1, 2, 6, 4, 3, 5]);

    // Case-sensitive puts lowercase after the uppercase block.
    let mut builder = store.query::<TShirt>().unwrap();
    builder
        .order_with_flags(&TShirt::COLOR, OrderFlags::CASE_SENSITIVE)
        .unwrap();
    assert_eq!(found_ids(&builder.build().unwrap()), vec![5, 1, 2, 4, 3, 6]);

    // Descending reverses the whole clause, nulls included.
    let mut builder = store.query::<TShirt>().unwrap();
    builder.order_desc(&TShirt::COLOR).unwrap();
    assert_eq!(found_ids(&builder.build().unwrap()), vec![3, 4, 1, 2, 6, 5]);

    // Earlier clauses dominate; the second breaks ties.
    let mut builder = store.query::<TShirt>().unwrap();
    builder
        .order(&TShirt::SIZE)
        .unwrap()
        .order_desc(&TShirt::PRICE)
        .unwrap();
    assert_eq!(
        found_ids(&builder.build().unwrap()),
        vec![5, 2, 6, 4, 3, 1],
        "size ascending, price descending within a size"
    );

    // Engine ordering happens before the in-process comparator; the
    // comparator wins on the final list.
    let mut builder = store.query::<TShirt>().unwrap();
    builder.order(&TShirt::COLOR).unwrap();
    builder.sort_by(|a, b| a.price.cmp(&b.price));
    assert_eq!(found_ids(&builder.build().unwrap()), vec![4, 2, 5, 1, 3, 6]);

    // Unsigned comparison treats negative scalars as large.
    let mut negative = TShirt::new(Some("Black"), Some("M"), -5, 0.2, true);
    store.put(&mut negative).unwrap();

    let mut builder = store.query::<TShirt>().unwrap();
    builder.order(&TShirt::PRICE).unwrap();
    let plain = found_ids(&builder.build().unwrap());
    assert_eq!(plain.first(), Some(&negative.id), "signed: -5 sorts first");

    let mut builder = store.query::<TShirt>().unwrap();
    builder
        .order_with_flags(&TShirt::PRICE, OrderFlags::UNSIGNED)
        .unwrap();
    let unsigned = found_ids(&builder.build().unwrap());
    assert_eq!(
        unsigned.last(),
        Some(&negative.id),
        "unsigned: -5 reinterprets as a huge value"
    );
}
