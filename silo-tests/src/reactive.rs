use crate::entities::TShirt;
use silo_core::{Backend, Store};
use std::{
    sync::{Arc, Mutex},
    thread,
    time::{Duration, Instant},
};

fn wait_until(mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(2);
    while !condition() {
        assert!(Instant::now() < deadline, "timed out waiting for delivery");
        thread::sleep(Duration::from_millis(5));
    }
}

/// Exercises subscription delivery. Run against a store configured
/// with a single worker thread so deliveries are sequenced.
pub fn reactive<B: Backend>(store: &Store<B>) {
    let mut shirt = TShirt::new(Some("Blue"), Some("M"), 20, 0.2, true);
    store.put(&mut shirt).unwrap();

    let query = store.query::<TShirt>().unwrap().build().unwrap();

    // Subscribing delivers the current results once.
    let batches: Arc<Mutex<Vec<Vec<i64>>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&batches);
    let subscription = query.subscribe().observer(move |shirts: &[TShirt]| {
        sink.lock()
            .unwrap()
            .push(shirts.iter().map(|shirt| shirt.price).collect());
    });
    wait_until(|| batches.lock().unwrap().len() == 1);
    assert_eq!(batches.lock().unwrap()[0], vec![20]);

    // publish() re-runs the query and re-broadcasts.
    let mut second = TShirt::new(Some("Red"), Some("L"), 45, 0.3, true);
    store.put(&mut second).unwrap();
    query.publish();
    wait_until(|| batches.lock().unwrap().len() == 2);
    assert_eq!(batches.lock().unwrap()[1], vec![20, 45]);

    // Nothing is delivered without an explicit publish.
    thread::sleep(Duration::from_millis(50));
    assert_eq!(batches.lock().unwrap().len(), 2);

    // Observers are notified in subscription order.
    let sequence: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));
    let first_sink = Arc::clone(&sequence);
    let _first = query.subscribe().observer(move |_: &[TShirt]| {
        first_sink.lock().unwrap().push("first");
    });
    let second_sink = Arc::clone(&sequence);
    let _second = query.subscribe().observer(move |_: &[TShirt]| {
        second_sink.lock().unwrap().push("second");
    });
    wait_until(|| sequence.lock().unwrap().len() == 2);
    sequence.lock().unwrap().clear();

    query.publish();
    wait_until(|| sequence.lock().unwrap().len() >= 2);
    let observed = sequence.lock().unwrap().clone();
    assert_eq!(&observed[..2], ["first", "second"]);

    // A dropped subscription receives nothing further.
    drop(subscription);
    let before = batches.lock().unwrap().len();
    query.publish();
    wait_until(|| sequence.lock().unwrap().len() >= 4);
    assert_eq!(batches.lock().unwrap().len(), before, "cancelled observer stays quiet");

    query.close();
}
