mod base;
pub mod memory;
pub mod postgres;

pub use base::{Destination, RowId, StoredRecord};
