mod backend;
mod entity;
mod error;
mod observer;
mod order;
mod property;
mod query;
mod relation;
mod store;
mod transaction;
mod value;

pub use ::anyhow::Context as ErrorContext;
pub use backend::*;
pub use entity::*;
pub use error::*;
pub use observer::*;
pub use order::*;
pub use property::*;
pub use query::*;
pub use relation::*;
pub use store::*;
pub use transaction::*;
pub use value::*;

/// Crate-wide result alias using `anyhow` for flexible error context.
pub type Result<T> = anyhow::Result<T>;
/// Crate-wide error alias using `anyhow`.
pub type Error = anyhow::Error;
