use crate::{PropertyDef, PropertyId, Value};

/// Engine-assigned 64-bit entity id. Zero marks a not-yet-persisted
/// entity.
pub type Id = u64;

/// Schema metadata for one entity type.
#[derive(Debug)]
pub struct EntityDef {
    pub name: &'static str,
    /// Declared properties, including the id property.
    pub properties: &'static [PropertyDef],
    /// Property carrying the engine id; must be `Long`-typed.
    pub id_property: PropertyId,
}

impl EntityDef {
    pub fn property(&self, id: PropertyId) -> Option<&PropertyDef> {
        self.properties.iter().find(|p| p.id == id)
    }

    /// Position of `id` in the row layout.
    pub fn property_index(&self, id: PropertyId) -> Option<usize> {
        self.properties.iter().position(|p| p.id == id)
    }
}

/// One stored record as the engine sees it: cells in property
/// declaration order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Row {
    pub values: Vec<Value>,
}

impl Row {
    pub fn new(values: Vec<Value>) -> Self {
        Self { values }
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }
}

/// A schema-defined record identified by an engine id.
///
/// Implementations are normally produced by entity code generation; the
/// contract here is only what the query layer consumes: static schema
/// plus a row codec that follows `def()` property order.
pub trait Entity: Send + Sized + 'static {
    /// Static schema of this entity type.
    fn def() -> &'static EntityDef;

    /// Engine id, 0 when not yet persisted.
    fn id(&self) -> Id;

    fn set_id(&mut self, id: Id);

    /// Encode into a row following `def()` property order.
    fn to_row(&self) -> Row;

    /// Decode from a row following `def()` property order.
    ///
    /// Error if mandatory cells are missing or a cell's type does not
    /// match its declaration.
    fn from_row(row: &Row) -> crate::Result<Self>;
}
