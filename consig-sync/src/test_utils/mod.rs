//! Fixtures shared by unit and integration tests.

pub mod fixtures;
pub mod pipeline;
