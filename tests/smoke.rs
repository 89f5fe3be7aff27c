#[cfg(test)]
mod tests {
    use silo::{Store, StoreOptions, StringOrder};
    use silo_memstore::MemStore;
    use silo_tests::TShirt;

    fn store() -> Store<MemStore> {
        silo_tests::init_logs();
        Store::open(MemStore::new(), StoreOptions::default()).unwrap()
    }

    #[test]
    fn put_assigns_ids_and_get_round_trips() {
        let store = store();
        let mut first = TShirt::new(Some("Blue"), Some("M"), 20, 0.2, true);
        let mut second = TShirt::new(Some("Red"), Some("L"), 45, 0.3, false);
        assert_eq!(store.put(&mut first).unwrap(), 1);
        assert_eq!(store.put(&mut second).unwrap(), 2);
        assert_eq!(first.id, 1);

        let loaded: TShirt = store.get(2).unwrap().expect("second shirt is stored");
        assert_eq!(loaded, second);
        assert!(store.get::<TShirt>(99).unwrap().is_none());
    }

    #[test]
    fn updates_overwrite_by_id() {
        let store = store();
        let mut shirt = TShirt::new(Some("Blue"), Some("M"), 20, 0.2, true);
        store.put(&mut shirt).unwrap();
        shirt.price = 25;
        store.put(&mut shirt).unwrap();

        let query = store.query::<TShirt>().unwrap().build().unwrap();
        assert_eq!(query.count().unwrap(), 1);
        assert_eq!(query.property(&TShirt::PRICE).find_long().unwrap(), Some(25));
    }

    #[test]
    fn a_query_composes_engine_and_in_process_stages() {
        let store = store();
        for (color, price) in [("Blue", 30), ("Blue", 10), ("Red", 45), ("Blue", 20)] {
            let mut shirt = TShirt::new(Some(color), Some("M"), price, 0.2, true);
            store.put(&mut shirt).unwrap();
        }

        // Engine selection, then post-filter, then comparator.
        let mut builder = store.query::<TShirt>().unwrap();
        builder
            .equal_string(&TShirt::COLOR, "blue", StringOrder::CaseInsensitive)
            .unwrap()
            .filter(|shirt: &TShirt| shirt.price >= 15)
            .unwrap();
        builder.sort_by(|a, b| b.price.cmp(&a.price));
        let prices: Vec<i64> = builder
            .build()
            .unwrap()
            .find()
            .unwrap()
            .iter()
            .map(|shirt| shirt.price)
            .collect();
        assert_eq!(prices, vec![30, 20], "blue shirts at 15+, dearest first");
    }
}
