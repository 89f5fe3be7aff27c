use silo_core::{Backend, Entity, QueryError, Store, StoreOptions};
use silo_memstore::MemStore;
use silo_tests::{FlakyBackend, TShirt, init_logs};
use std::time::Duration;

fn store() -> Store<MemStore> {
    init_logs();
    Store::open(MemStore::new(), StoreOptions::default()).expect("Failed to open store")
}

#[test]
fn conditions() {
    silo_tests::conditions(&store());
}

#[test]
fn orders() {
    silo_tests::orders(&store());
}

#[test]
fn retrievals() {
    silo_tests::retrievals(&store());
}

#[test]
fn iteration() {
    silo_tests::iteration(&store());
}

#[test]
fn builder_misuse() {
    silo_tests::builder_misuse(&store());
}

#[test]
fn parameters() {
    silo_tests::parameters(&store());
}

#[test]
fn eager_relations() {
    silo_tests::eager_relations(&store());
}

#[test]
fn dates() {
    silo_tests::dates(&store());
}

#[test]
fn property_values() {
    silo_tests::property_values(&store());
}

#[test]
fn property_nulls() {
    silo_tests::property_nulls(&store());
}

#[test]
fn property_distinct_strings() {
    silo_tests::property_distinct_strings(&store());
}

#[test]
fn property_scalars() {
    silo_tests::property_scalars(&store());
}

#[test]
fn aggregates() {
    silo_tests::aggregates(&store());
}

#[test]
fn reactive() {
    init_logs();
    // One worker thread sequences subscription deliveries.
    let options = StoreOptions {
        worker_threads: 1,
        ..StoreOptions::default()
    };
    let store = Store::open(MemStore::new(), options).unwrap();
    silo_tests::reactive(&store);
}

fn retry_options(attempts: u32) -> StoreOptions {
    StoreOptions {
        attempts,
        initial_backoff: Duration::from_millis(1),
        ..StoreOptions::default()
    }
}

#[test]
fn transient_failures_are_retried() {
    init_logs();
    let backend = FlakyBackend::failing_reads(MemStore::new(), 2);
    let store = Store::open(backend, retry_options(3)).unwrap();
    let mut shirt = TShirt::new(Some("Blue"), Some("M"), 20, 0.2, true);
    store.put(&mut shirt).unwrap();

    let query = store.query::<TShirt>().unwrap().build().unwrap();
    let found = query.find().expect("two transient failures, then success");
    assert_eq!(found.len(), 1);
    assert_eq!(store.backend().remaining_failures(), 0);
}

#[test]
fn retries_exhaust_and_surface_the_last_error() {
    init_logs();
    let backend = FlakyBackend::failing_reads(MemStore::new(), 5);
    let store = Store::open(backend, retry_options(2)).unwrap();

    let query = store.query::<TShirt>().unwrap().build().unwrap();
    let error = query.find().unwrap_err();
    assert!(matches!(
        error.downcast_ref::<QueryError>(),
        Some(QueryError::Backend { transient: true, .. })
    ));
    assert_eq!(
        store.backend().remaining_failures(),
        3,
        "two attempts consumed two injected failures"
    );
}

#[test]
fn fatal_failures_are_not_retried() {
    init_logs();
    let backend = FlakyBackend::failing_reads_fatally(MemStore::new(), 1);
    let store = Store::open(backend, retry_options(5)).unwrap();

    let query = store.query::<TShirt>().unwrap().build().unwrap();
    let error = query.find().unwrap_err();
    assert!(matches!(
        error.downcast_ref::<QueryError>(),
        Some(QueryError::Backend {
            transient: false,
            ..
        })
    ));
    assert_eq!(
        store.backend().remaining_failures(),
        0,
        "a single attempt, no retry"
    );
}

#[test]
fn aborted_writes_roll_back() {
    init_logs();
    let engine = MemStore::new();

    let tx = engine.begin_write().unwrap();
    let cursor = engine.open_cursor(tx, TShirt::def()).unwrap();
    let shirt = TShirt::new(Some("Blue"), Some("M"), 20, 0.2, true);
    engine.put(cursor, shirt.to_row()).unwrap();
    engine.close_cursor(cursor);
    engine.abort(tx);

    let store = Store::open(engine, StoreOptions::default()).unwrap();
    let query = store.query::<TShirt>().unwrap().build().unwrap();
    assert_eq!(query.count().unwrap(), 0, "the aborted put left no row");
}

#[test]
fn committed_writes_stick() {
    init_logs();
    let engine = MemStore::new();

    let tx = engine.begin_write().unwrap();
    let cursor = engine.open_cursor(tx, TShirt::def()).unwrap();
    let shirt = TShirt::new(Some("Blue"), Some("M"), 20, 0.2, true);
    let id = engine.put(cursor, shirt.to_row()).unwrap();
    engine.close_cursor(cursor);
    engine.commit(tx).unwrap();
    assert_eq!(id, 1);

    let store = Store::open(engine, StoreOptions::default()).unwrap();
    assert_eq!(store.get::<TShirt>(id).unwrap().map(|s| s.price), Some(20));
}

#[test]
fn single_writer_at_a_time() {
    init_logs();
    let engine = MemStore::new();

    let tx = engine.begin_write().unwrap();
    let error = engine.begin_write().unwrap_err();
    assert!(
        matches!(
            error.downcast_ref::<QueryError>(),
            Some(QueryError::Backend { transient: true, .. })
        ),
        "a busy writer is a transient condition"
    );
    engine.abort(tx);
    assert!(engine.begin_write().is_ok());
}

#[test]
fn mutation_requires_a_write_transaction() {
    init_logs();
    let engine = MemStore::new();

    let tx = engine.begin_read().unwrap();
    let cursor = engine.open_cursor(tx, TShirt::def()).unwrap();
    let shirt = TShirt::new(Some("Blue"), Some("M"), 20, 0.2, true);
    let error = engine.put(cursor, shirt.to_row()).unwrap_err();
    assert!(matches!(
        error.downcast_ref::<QueryError>(),
        Some(QueryError::IllegalState(..))
    ));
    engine.abort(tx);
}
