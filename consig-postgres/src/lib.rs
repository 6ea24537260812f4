//! Connection utilities for the destination PostgreSQL database.

pub mod connection;
pub mod sqlstate;
#[cfg(feature = "test-utils")]
pub mod test_utils;
