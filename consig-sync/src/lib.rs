//! Incremental synchronization of consignado members, sales and installments from the legacy
//! MySQL store into the PostgreSQL schema used by the administration system.
//!
//! A run walks the entity kinds in foreign-key order (members, sales, installments). For each
//! kind the [`source::Source`] yields untyped rows, the [`mapper`] turns them into typed
//! records, and the [`workers::fan_out`] upserts them into a [`destination::Destination`] with a
//! bounded number of rows in flight. Every row ends up in exactly one counter of the
//! [`report::RunReport`].

pub mod concurrency;
pub mod conversions;
pub mod destination;
pub mod error;
mod macros;
pub mod mapper;
pub mod pipeline;
pub mod report;
pub mod source;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
pub mod types;
pub mod workers;
pub mod writer;
