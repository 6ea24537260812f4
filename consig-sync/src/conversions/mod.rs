//! Coercions from untyped legacy values into the typed fields of records.
//!
//! Every function maps null and blank values to `None`. A value that is present but cannot
//! be coerced is an [`crate::error::ErrorKind::ConversionError`].

pub mod date;
pub mod flag;
pub mod numeric;
pub mod text;
