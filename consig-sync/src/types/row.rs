use std::collections::HashMap;
use std::fmt;

use bigdecimal::BigDecimal;
use chrono::{NaiveDate, NaiveDateTime};

/// A single column value as read from the legacy store, before any coercion.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceValue {
    Null,
    Text(String),
    Int(i64),
    Decimal(BigDecimal),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
}

impl SourceValue {
    pub fn is_null(&self) -> bool {
        matches!(self, SourceValue::Null)
    }
}

impl fmt::Display for SourceValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceValue::Null => f.write_str("NULL"),
            SourceValue::Text(value) => write!(f, "'{value}'"),
            SourceValue::Int(value) => write!(f, "{value}"),
            SourceValue::Decimal(value) => write!(f, "{value}"),
            SourceValue::Date(value) => write!(f, "{value}"),
            SourceValue::DateTime(value) => write!(f, "{value}"),
        }
    }
}

impl From<&str> for SourceValue {
    fn from(value: &str) -> Self {
        SourceValue::Text(value.to_string())
    }
}

impl From<String> for SourceValue {
    fn from(value: String) -> Self {
        SourceValue::Text(value)
    }
}

impl From<i64> for SourceValue {
    fn from(value: i64) -> Self {
        SourceValue::Int(value)
    }
}

impl From<BigDecimal> for SourceValue {
    fn from(value: BigDecimal) -> Self {
        SourceValue::Decimal(value)
    }
}

impl From<NaiveDate> for SourceValue {
    fn from(value: NaiveDate) -> Self {
        SourceValue::Date(value)
    }
}

impl From<NaiveDateTime> for SourceValue {
    fn from(value: NaiveDateTime) -> Self {
        SourceValue::DateTime(value)
    }
}

impl<T> From<Option<T>> for SourceValue
where
    T: Into<SourceValue>,
{
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(SourceValue::Null)
    }
}

/// An untyped row of the legacy store, keyed by lowercase column name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceRow {
    values: HashMap<String, SourceValue>,
}

impl SourceRow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, column: &str, value: impl Into<SourceValue>) {
        self.values.insert(column.to_lowercase(), value.into());
    }

    /// Builder form of [`SourceRow::insert`].
    pub fn with(mut self, column: &str, value: impl Into<SourceValue>) -> Self {
        self.insert(column, value);
        self
    }

    /// Returns the value of `column`. Absent columns read as [`SourceValue::Null`].
    pub fn get(&self, column: &str) -> &SourceValue {
        static NULL: SourceValue = SourceValue::Null;

        self.values
            .get(column)
            .or_else(|| self.values.get(&column.to_lowercase()))
            .unwrap_or(&NULL)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<C, V> FromIterator<(C, V)> for SourceRow
where
    C: AsRef<str>,
    V: Into<SourceValue>,
{
    fn from_iter<I: IntoIterator<Item = (C, V)>>(iter: I) -> Self {
        let mut row = SourceRow::new();
        for (column, value) in iter {
            row.insert(column.as_ref(), value);
        }
        row
    }
}
