use silo_core::{
    EagerCollection, EagerTarget, Entity, EntityDef, Id, Property, PropertyDef, QueryError,
    RelationDescriptor, Result, Row, TypeTag, Value, datetime_to_epoch_ms, epoch_ms_to_datetime,
};
use std::sync::atomic::{AtomicBool, Ordering};
use time::OffsetDateTime;

fn cell<'r>(row: &'r Row, index: usize) -> Result<&'r Value> {
    row.get(index)
        .ok_or_else(|| QueryError::invalid_argument(format!("row is missing cell {index}")))
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct TShirt {
    pub id: Id,
    pub color: Option<String>,
    pub size: Option<String>,
    pub price: i64,
    pub weight: f64,
    pub in_stock: bool,
}

impl TShirt {
    pub const ID: Property<i64> = Property::new(1, TypeTag::Long);
    pub const COLOR: Property<String> = Property::new(2, TypeTag::String);
    pub const SIZE: Property<String> = Property::new(3, TypeTag::String);
    pub const PRICE: Property<i64> = Property::new(4, TypeTag::Long);
    pub const WEIGHT: Property<f64> = Property::new(5, TypeTag::Double);
    pub const IN_STOCK: Property<bool> = Property::new(6, TypeTag::Bool);

    pub fn new(color: Option<&str>, size: Option<&str>, price: i64, weight: f64, in_stock: bool) -> Self {
        Self {
            id: 0,
            color: color.map(str::to_owned),
            size: size.map(str::to_owned),
            price,
            weight,
            in_stock,
        }
    }
}

static TSHIRT_PROPERTIES: [PropertyDef; 6] = [
    PropertyDef { id: 1, name: "id", ty: TypeTag::Long },
    PropertyDef { id: 2, name: "color", ty: TypeTag::String },
    PropertyDef { id: 3, name: "size", ty: TypeTag::String },
    PropertyDef { id: 4, name: "price", ty: TypeTag::Long },
    PropertyDef { id: 5, name: "weight", ty: TypeTag::Double },
    PropertyDef { id: 6, name: "in_stock", ty: TypeTag::Bool },
];

static TSHIRT_DEF: EntityDef = EntityDef {
    name: "TShirt",
    properties: &TSHIRT_PROPERTIES,
    id_property: 1,
};

impl Entity for TShirt {
    fn def() -> &'static EntityDef {
        &TSHIRT_DEF
    }

    fn id(&self) -> Id {
        self.id
    }

    fn set_id(&mut self, id: Id) {
        self.id = id;
    }

    fn to_row(&self) -> Row {
        Row::new(vec![
            Value::Long(Some(self.id as i64)),
            Value::Text(self.color.clone()),
            Value::Text(self.size.clone()),
            Value::Long(Some(self.price)),
            Value::Double(Some(self.weight)),
            Value::Bool(Some(self.in_stock)),
        ])
    }

    fn from_row(row: &Row) -> Result<Self> {
        Ok(Self {
            id: cell(row, 0)?.as_long().unwrap_or(0) as Id,
            color: cell(row, 1)?.as_text().map(str::to_owned),
            size: cell(row, 2)?.as_text().map(str::to_owned),
            price: cell(row, 3)?
                .as_long()
                .ok_or_else(|| QueryError::invalid_argument("price must be a long"))?,
            weight: cell(row, 4)?
                .as_double()
                .ok_or_else(|| QueryError::invalid_argument("weight must be a double"))?,
            in_stock: cell(row, 5)?.as_long() == Some(1),
        })
    }
}

/// Probe standing in for a lazily loaded to-one target; flips a flag
/// when materialized.
#[derive(Debug, Default)]
pub struct LoadProbe {
    loaded: AtomicBool,
}

impl LoadProbe {
    pub fn is_loaded(&self) -> bool {
        self.loaded.load(Ordering::SeqCst)
    }
}

impl Clone for LoadProbe {
    fn clone(&self) -> Self {
        Self {
            loaded: AtomicBool::new(self.is_loaded()),
        }
    }
}

impl EagerTarget for LoadProbe {
    fn materialize(&self) {
        self.loaded.store(true, Ordering::SeqCst);
    }
}

/// Probe standing in for a lazily loaded to-many collection; computing
/// the size is the load trigger.
#[derive(Debug, Default)]
pub struct CollectionProbe {
    loaded: AtomicBool,
}

impl CollectionProbe {
    pub fn is_loaded(&self) -> bool {
        self.loaded.load(Ordering::SeqCst)
    }
}

impl Clone for CollectionProbe {
    fn clone(&self) -> Self {
        Self {
            loaded: AtomicBool::new(self.is_loaded()),
        }
    }
}

impl EagerCollection for CollectionProbe {
    fn materialize(&self) -> usize {
        self.loaded.store(true, Ordering::SeqCst);
        0
    }
}

#[derive(Clone, Debug, Default)]
pub struct Customer {
    pub id: Id,
    pub name: Option<String>,
    pub age: i64,
    pub joined: Option<OffsetDateTime>,
    pub address: LoadProbe,
    pub orders: CollectionProbe,
}

impl Customer {
    pub const ID: Property<i64> = Property::new(1, TypeTag::Long);
    pub const NAME: Property<String> = Property::new(2, TypeTag::String);
    pub const AGE: Property<i64> = Property::new(3, TypeTag::Long);
    pub const JOINED: Property<OffsetDateTime> = Property::new(4, TypeTag::Date);

    pub fn new(name: Option<&str>, age: i64) -> Self {
        Self {
            name: name.map(str::to_owned),
            age,
            ..Self::default()
        }
    }

    pub fn address_relation() -> RelationDescriptor<Customer> {
        RelationDescriptor::to_one("address", |customer| &customer.address)
    }

    pub fn orders_relation() -> RelationDescriptor<Customer> {
        RelationDescriptor::to_many("orders", |customer| &customer.orders)
    }
}

static CUSTOMER_PROPERTIES: [PropertyDef; 4] = [
    PropertyDef { id: 1, name: "id", ty: TypeTag::Long },
    PropertyDef { id: 2, name: "name", ty: TypeTag::String },
    PropertyDef { id: 3, name: "age", ty: TypeTag::Long },
    PropertyDef { id: 4, name: "joined", ty: TypeTag::Date },
];

static CUSTOMER_DEF: EntityDef = EntityDef {
    name: "Customer",
    properties: &CUSTOMER_PROPERTIES,
    id_property: 1,
};

impl Entity for Customer {
    fn def() -> &'static EntityDef {
        &CUSTOMER_DEF
    }

    fn id(&self) -> Id {
        self.id
    }

    fn set_id(&mut self, id: Id) {
        self.id = id;
    }

    fn to_row(&self) -> Row {
        Row::new(vec![
            Value::Long(Some(self.id as i64)),
            Value::Text(self.name.clone()),
            Value::Long(Some(self.age)),
            Value::Date(self.joined.map(datetime_to_epoch_ms)),
        ])
    }

    fn from_row(row: &Row) -> Result<Self> {
        let joined = match cell(row, 3)? {
            Value::Date(Some(ms)) => Some(epoch_ms_to_datetime(*ms)?),
            _ => None,
        };
        Ok(Self {
            id: cell(row, 0)?.as_long().unwrap_or(0) as Id,
            name: cell(row, 1)?.as_text().map(str::to_owned),
            age: cell(row, 2)?
                .as_long()
                .ok_or_else(|| QueryError::invalid_argument("age must be a long"))?,
            joined,
            address: LoadProbe::default(),
            orders: CollectionProbe::default(),
        })
    }
}
