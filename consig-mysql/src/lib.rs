//! Connection utilities for the legacy MySQL store.

pub mod connection;
pub mod time;
#[cfg(feature = "test-utils")]
pub mod test_utils;
pub mod version;
