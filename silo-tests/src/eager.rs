use crate::entities::Customer;
use silo_core::{Backend, QueryError, RelationDescriptor, Store};
use std::ops::ControlFlow;
use time::macros::datetime;

fn seed_customers<B: Backend>(store: &Store<B>) {
    let joined = [
        Some(datetime!(2020-01-15 09:00:00 UTC)),
        Some(datetime!(2021-06-01 12:00:00 UTC)),
        None,
        Some(datetime!(2023-11-20 18:30:00 UTC)),
        Some(datetime!(2019-03-05 08:15:00 UTC)),
    ];
    for (index, joined) in joined.into_iter().enumerate() {
        let mut customer = Customer::new(Some(&format!("customer-{index}")), 20 + index as i64);
        customer.joined = joined;
        store.put(&mut customer).expect("Failed to seed customer");
    }
}

pub fn eager_relations<B: Backend>(store: &Store<B>) {
    seed_customers(store);

    // Unlimited: every result materializes its to-many collection.
    let mut builder = store.query::<Customer>().unwrap();
    builder.eager(Customer::orders_relation());
    let customers = builder.build().unwrap().find().unwrap();
    assert_eq!(customers.len(), 5);
    assert!(customers.iter().all(|customer| customer.orders.is_loaded()));
    assert!(
        customers.iter().all(|customer| !customer.address.is_loaded()),
        "the to-one relation was not requested"
    );

    // A limit resolves only the result prefix.
    let mut builder = store.query::<Customer>().unwrap();
    builder.eager_limited(3, Customer::address_relation());
    let customers = builder.build().unwrap().find().unwrap();
    let loaded: Vec<bool> = customers
        .iter()
        .map(|customer| customer.address.is_loaded())
        .collect();
    assert_eq!(loaded, vec![true, true, true, false, false]);

    // Single-result retrievals resolve at index 0.
    let mut builder = store.query::<Customer>().unwrap();
    builder.eager_limited(1, Customer::orders_relation());
    let first = builder.build().unwrap().find_first().unwrap().unwrap();
    assert!(first.orders.is_loaded());

    // Iteration counts the limit over passing entities.
    let mut builder = store.query::<Customer>().unwrap();
    builder.eager_limited(2, Customer::address_relation());
    let query = builder.build().unwrap();
    let mut loaded = Vec::new();
    query
        .for_each(|customer| {
            loaded.push(customer.address.is_loaded());
            ControlFlow::Continue(())
        })
        .unwrap();
    assert_eq!(loaded, vec![true, true, false, false, false]);

    // A descriptor without a traversal getter is a defect.
    let broken: RelationDescriptor<Customer> = RelationDescriptor {
        name: "broken",
        to_one: None,
        to_many: None,
    };
    let mut builder = store.query::<Customer>().unwrap();
    builder.eager(broken);
    let error = builder.build().unwrap().find().unwrap_err();
    assert!(matches!(
        error.downcast_ref::<QueryError>(),
        Some(QueryError::IllegalState(..))
    ));
}

pub fn dates<B: Backend>(store: &Store<B>) {
    seed_customers(store);

    // Date predicates ride the epoch-millisecond channel.
    let mut builder = store.query::<Customer>().unwrap();
    builder
        .greater(&Customer::JOINED, datetime!(2021-01-01 00:00:00 UTC))
        .unwrap();
    let late: Vec<i64> = builder
        .build()
        .unwrap()
        .find()
        .unwrap()
        .iter()
        .map(|customer| customer.age)
        .collect();
    assert_eq!(late, vec![21, 23], "joined in 2021 and 2023");

    // Null dates never match a comparison.
    let mut builder = store.query::<Customer>().unwrap();
    builder
        .less(&Customer::JOINED, datetime!(2030-01-01 00:00:00 UTC))
        .unwrap();
    assert_eq!(builder.build().unwrap().count().unwrap(), 4);

    let mut builder = store.query::<Customer>().unwrap();
    builder.is_null(&Customer::JOINED).unwrap();
    assert_eq!(builder.build().unwrap().count().unwrap(), 1);

    // Dates rebind through the long slot.
    let mut builder = store.query::<Customer>().unwrap();
    builder
        .greater(&Customer::JOINED, datetime!(2021-01-01 00:00:00 UTC))
        .unwrap();
    let query = builder.build().unwrap();
    assert_eq!(query.count().unwrap(), 2);
    query
        .set_parameter(&Customer::JOINED, datetime!(2018-01-01 00:00:00 UTC))
        .unwrap();
    assert_eq!(query.count().unwrap(), 4);
}
