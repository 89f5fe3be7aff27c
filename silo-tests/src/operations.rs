use crate::{conditions::seed_shirts, entities::TShirt};
use silo_core::{Backend, QueryError, Store, StringOrder};
use std::ops::ControlFlow;

pub fn retrievals<B: Backend>(store: &Store<B>) {
    seed_shirts(store);

    // find_first honors engine ordering.
    let mut builder = store.query::<TShirt>().unwrap();
    builder.order(&TShirt::PRICE).unwrap();
    let cheapest = builder.build().unwrap().find_first().unwrap();
    assert_eq!(cheapest.map(|shirt| shirt.id), Some(4), "Green at 10 is cheapest");

    let mut builder = store.query::<TShirt>().unwrap();
    builder.greater(&TShirt::PRICE, 1_000).unwrap();
    assert!(builder.build().unwrap().find_first().unwrap().is_none());

    // find_unique: zero, one and too many matches.
    let mut builder = store.query::<TShirt>().unwrap();
    builder.equal(&TShirt::PRICE, 45).unwrap();
    let unique = builder.build().unwrap().find_unique().unwrap();
    assert_eq!(unique.map(|shirt| shirt.id), Some(3));

    let mut builder = store.query::<TShirt>().unwrap();
    builder.greater(&TShirt::PRICE, 1_000).unwrap();
    assert!(builder.build().unwrap().find_unique().unwrap().is_none());

    let mut builder = store.query::<TShirt>().unwrap();
    builder
        .equal_string(&TShirt::SIZE, "XL", StringOrder::CaseInsensitive)
        .unwrap();
    let error = builder.build().unwrap().find_unique().unwrap_err();
    assert!(
        matches!(error.downcast_ref::<QueryError>(), Some(QueryError::NotUnique)),
        "two XL shirts must refuse find_unique: {error:#}"
    );

    // Engine pagination over an ordered run.
    let mut builder = store.query::<TShirt>().unwrap();
    builder.order(&TShirt::PRICE).unwrap();
    let page: Vec<u64> = builder
        .build()
        .unwrap()
        .find_range(1, 2)
        .unwrap()
        .iter()
        .map(|shirt| shirt.id)
        .collect();
    assert_eq!(page, vec![2, 5], "skip the cheapest, take two");

    // Id retrieval is unordered and rejects ordered queries.
    let query = store.query::<TShirt>().unwrap().build().unwrap();
    let mut ids = query.find_ids().unwrap();
    ids.sort_unstable();
    assert_eq!(ids, vec![1, 2, 3, 4, 5, 6]);
    assert_eq!(query.find_ids_range(2, 2).unwrap().len(), 2);

    let mut builder = store.query::<TShirt>().unwrap();
    builder.order(&TShirt::PRICE).unwrap();
    let error = builder.build().unwrap().find_ids().unwrap_err();
    assert!(matches!(
        error.downcast_ref::<QueryError>(),
        Some(QueryError::Unsupported(..))
    ));

    // A post-filter is silently ignored by id retrieval.
    let mut builder = store.query::<TShirt>().unwrap();
    builder.filter(|shirt: &TShirt| shirt.price > 1_000).unwrap();
    assert_eq!(builder.build().unwrap().find_ids().unwrap().len(), 6);

    // ...but rejected by the single-result retrievals.
    let mut builder = store.query::<TShirt>().unwrap();
    builder.filter(|shirt: &TShirt| shirt.in_stock).unwrap();
    let query = builder.build().unwrap();
    for error in [
        query.find_first().unwrap_err(),
        query.find_unique().unwrap_err(),
        query.find_range(0, 2).unwrap_err(),
        query.find_lazy().unwrap_err(),
    ] {
        assert!(matches!(
            error.downcast_ref::<QueryError>(),
            Some(QueryError::Unsupported(..))
        ));
    }

    // ...and applied by find().
    assert_eq!(query.find().unwrap().len(), 4, "post-filter keeps stocked shirts");

    // Lazy lists resolve on access; a removed entity resolves to None.
    let lazy = store.query::<TShirt>().unwrap().build().unwrap().find_lazy().unwrap();
    assert_eq!(lazy.len(), 6);
    let second = lazy.get(1).unwrap().expect("shirt 2 is present");
    assert_eq!(second.id, 2);
    assert!(lazy.get(99).unwrap().is_none(), "past the end");

    let mut builder = store.query::<TShirt>().unwrap();
    builder.equal(&TShirt::ID, 2).unwrap();
    assert_eq!(builder.build().unwrap().remove().unwrap(), 1);
    assert!(lazy.get(1).unwrap().is_none(), "removed since the id run");
    assert_eq!(lazy.to_vec().unwrap().len(), 5);

    let cached = store
        .query::<TShirt>()
        .unwrap()
        .build()
        .unwrap()
        .find_lazy_cached()
        .unwrap();
    let first = cached.get(0).unwrap().expect("shirt 1 is present");
    let again = cached.get(0).unwrap().expect("cached hit");
    assert_eq!(first, again);

    // count and remove.
    let mut builder = store.query::<TShirt>().unwrap();
    builder.equal(&TShirt::IN_STOCK, false).unwrap();
    let query = builder.build().unwrap();
    assert_eq!(query.count().unwrap(), 2);
    assert_eq!(query.remove().unwrap(), 2);
    assert_eq!(query.count().unwrap(), 0);

    // close is idempotent; a closed query refuses to run.
    query.close();
    query.close();
    let error = query.find().unwrap_err();
    assert!(matches!(
        error.downcast_ref::<QueryError>(),
        Some(QueryError::IllegalState(..))
    ));
}

pub fn iteration<B: Backend>(store: &Store<B>) {
    seed_shirts(store);

    // Visits every passing entity exactly once, in engine order.
    let query = store.query::<TShirt>().unwrap().build().unwrap();
    let mut visited = Vec::new();
    query
        .for_each(|shirt| {
            visited.push(shirt.id);
            ControlFlow::Continue(())
        })
        .unwrap();
    assert_eq!(visited, vec![1, 2, 3, 4, 5, 6]);

    // Breaking stops cleanly after the requested visits.
    let mut visits = 0;
    query
        .for_each(|_| {
            visits += 1;
            if visits == 2 {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        })
        .unwrap();
    assert_eq!(visits, 2, "break after two visits");

    // The post-filter applies to iteration.
    let mut builder = store.query::<TShirt>().unwrap();
    builder.filter(|shirt: &TShirt| shirt.in_stock).unwrap();
    let filtered = builder.build().unwrap();
    let mut stocked = Vec::new();
    filtered
        .for_each(|shirt| {
            stocked.push(shirt.id);
            ControlFlow::Continue(())
        })
        .unwrap();
    assert_eq!(stocked, vec![1, 2, 4, 5]);

    // Iteration walks ids, so ordered queries are rejected, and so is
    // a comparator.
    let mut builder = store.query::<TShirt>().unwrap();
    builder.order(&TShirt::PRICE).unwrap();
    let ordered = builder.build().unwrap();
    assert!(ordered.for_each(|_| ControlFlow::Continue(())).is_err());

    let mut builder = store.query::<TShirt>().unwrap();
    builder.sort_by(|a, b| a.price.cmp(&b.price));
    let sorted = builder.build().unwrap();
    assert!(sorted.for_each(|_| ControlFlow::Continue(())).is_err());
}

pub fn builder_misuse<B: Backend>(store: &Store<B>) {
    seed_shirts(store);

    // An operator needs a prior condition.
    let mut builder = store.query::<TShirt>().unwrap();
    let error = builder.or().unwrap_err();
    assert!(matches!(
        error.downcast_ref::<QueryError>(),
        Some(QueryError::IllegalState(..))
    ));

    // Operators do not stack.
    let mut builder = store.query::<TShirt>().unwrap();
    builder.equal(&TShirt::PRICE, 10).unwrap();
    builder.or().unwrap();
    assert!(builder.and().is_err());

    // A pending operator blocks ordering and build.
    let mut builder = store.query::<TShirt>().unwrap();
    builder.equal(&TShirt::PRICE, 10).unwrap();
    builder.and().unwrap();
    assert!(builder.order(&TShirt::PRICE).is_err());
    let error = builder.build().unwrap_err();
    assert!(matches!(
        error.downcast_ref::<QueryError>(),
        Some(QueryError::IllegalState(..))
    ));

    // The pending operator is consumed by the next condition.
    builder.equal(&TShirt::PRICE, 20).unwrap();
    assert!(builder.build().is_ok());

    // Only one post-filter.
    let mut builder = store.query::<TShirt>().unwrap();
    builder.filter(|_: &TShirt| true).unwrap();
    assert!(builder.filter(|_: &TShirt| false).is_err());

    // A built builder is spent.
    let mut builder = store.query::<TShirt>().unwrap();
    builder.equal(&TShirt::PRICE, 10).unwrap();
    builder.build().unwrap();
    assert!(builder.equal(&TShirt::PRICE, 20).is_err());
    assert!(builder.build().is_err());

    // The compiled predicate renders with its effective grouping.
    let mut builder = store.query::<TShirt>().unwrap();
    builder
        .equal_string(&TShirt::COLOR, "blue", StringOrder::CaseInsensitive)
        .unwrap()
        .equal_string(&TShirt::SIZE, "XL", StringOrder::CaseInsensitive)
        .unwrap()
        .or()
        .unwrap()
        .less(&TShirt::PRICE, 30)
        .unwrap();
    let description = builder.build().unwrap().describe().unwrap();
    assert_eq!(
        description,
        r#"((color == "blue" AND size == "XL") OR price < 30)"#
    );
}

pub fn parameters<B: Backend>(store: &Store<B>) {
    seed_shirts(store);

    // Rebinding a long slot changes later runs, not the query shape.
    let mut builder = store.query::<TShirt>().unwrap();
    builder.less(&TShirt::PRICE, 30).unwrap();
    let query = builder.build().unwrap();
    assert_eq!(query.count().unwrap(), 3);
    query.set_parameter(&TShirt::PRICE, 50).unwrap();
    assert_eq!(query.count().unwrap(), 5);

    // String and range slots.
    let mut builder = store.query::<TShirt>().unwrap();
    builder
        .equal_string(&TShirt::COLOR, "Red", StringOrder::CaseInsensitive)
        .unwrap();
    let query = builder.build().unwrap();
    assert_eq!(query.count().unwrap(), 1);
    query.set_parameter_string(&TShirt::COLOR, "Green").unwrap();
    assert_eq!(query.count().unwrap(), 1);
    query.set_parameter_string(&TShirt::COLOR, "Purple").unwrap();
    assert_eq!(query.count().unwrap(), 0);

    let mut builder = store.query::<TShirt>().unwrap();
    builder.between(&TShirt::PRICE, 10, 20).unwrap();
    let query = builder.build().unwrap();
    assert_eq!(query.count().unwrap(), 2);
    query.set_parameters(&TShirt::PRICE, 25, 45).unwrap();
    assert_eq!(query.count().unwrap(), 3);

    // Booleans coerce onto the long slot.
    let mut builder = store.query::<TShirt>().unwrap();
    builder.equal(&TShirt::IN_STOCK, true).unwrap();
    let query = builder.build().unwrap();
    assert_eq!(query.count().unwrap(), 4);
    query.set_parameter(&TShirt::IN_STOCK, false).unwrap();
    assert_eq!(query.count().unwrap(), 2);

    // Aliases address one condition among several on the same property.
    let mut builder = store.query::<TShirt>().unwrap();
    builder
        .greater(&TShirt::PRICE, 15)
        .unwrap()
        .alias("floor")
        .unwrap()
        .less(&TShirt::PRICE, 40)
        .unwrap()
        .alias("ceiling")
        .unwrap();
    let query = builder.build().unwrap();
    assert_eq!(query.count().unwrap(), 3, "15 < price < 40");
    query.set_parameter_alias("ceiling", 60).unwrap();
    assert_eq!(query.count().unwrap(), 5, "15 < price < 60");

    let error = query.set_parameter_alias("roof", 10).unwrap_err();
    assert!(matches!(
        error.downcast_ref::<QueryError>(),
        Some(QueryError::InvalidArgument(..))
    ));

    // Rebinding a property with no parameterized condition fails.
    let error = query.set_parameter_double(&TShirt::WEIGHT, 1.0).unwrap_err();
    assert!(matches!(
        error.downcast_ref::<QueryError>(),
        Some(QueryError::InvalidArgument(..))
    ));

    // Double slots.
    let mut builder = store.query::<TShirt>().unwrap();
    builder.less(&TShirt::WEIGHT, 0.18).unwrap();
    let query = builder.build().unwrap();
    assert_eq!(query.count().unwrap(), 2);
    query.set_parameter_double(&TShirt::WEIGHT, 0.25).unwrap();
    assert_eq!(query.count().unwrap(), 4);
}
