pub use silo_core::*;
