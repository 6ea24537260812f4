use consig_mysql::time::DATE_FORMAT;

use crate::types::SourceValue;

/// Renders a value as trimmed text. Blank text becomes `None`.
///
/// Numeric columns are rendered without any float round trip, so an enrollment stored as an
/// integer in one table and as text in another maps to the same key.
pub fn parse_text(value: &SourceValue) -> Option<String> {
    let text = match value {
        SourceValue::Null => return None,
        SourceValue::Text(text) => text.trim().to_string(),
        SourceValue::Int(int) => int.to_string(),
        SourceValue::Decimal(decimal) if decimal.is_integer() => decimal.with_scale(0).to_string(),
        SourceValue::Decimal(decimal) => decimal.normalized().to_string(),
        SourceValue::Date(date) => date.format(DATE_FORMAT).to_string(),
        SourceValue::DateTime(date_time) => date_time.format(DATE_FORMAT).to_string(),
    };

    (!text.is_empty()).then_some(text)
}
