//! Logging setup shared by the sync binary and tests.

pub mod tracing;
