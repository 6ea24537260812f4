mod entity;
mod record;
mod row;

pub use entity::*;
pub use record::*;
pub use row::*;
