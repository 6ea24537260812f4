mod base;
mod connection;
mod job;
mod sync;

pub use base::*;
pub use connection::*;
pub use job::*;
pub use sync::*;
