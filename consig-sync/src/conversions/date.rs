use chrono::{NaiveDate, NaiveDateTime};
use consig_mysql::time::{BR_DATE_FORMAT, DATE_FORMAT, DATETIME_FORMAT, is_zero_date};

use crate::bail;
use crate::error::{ErrorKind, SyncResult};
use crate::types::SourceValue;

/// Parses a calendar date. Times of day are dropped and zero dates mean "no date".
pub fn parse_date(value: &SourceValue) -> SyncResult<Option<NaiveDate>> {
    match value {
        SourceValue::Null => Ok(None),
        SourceValue::Date(date) => Ok(Some(*date)),
        SourceValue::DateTime(date_time) => Ok(Some(date_time.date())),
        SourceValue::Text(text) => parse_date_text(text),
        other => bail!(
            ErrorKind::ConversionError,
            "Invalid date value",
            format!("Expected a date (received: {other})")
        ),
    }
}

fn parse_date_text(text: &str) -> SyncResult<Option<NaiveDate>> {
    let trimmed = text.trim();
    if trimmed.is_empty() || is_zero_date(trimmed) {
        return Ok(None);
    }

    if let Ok(date) = NaiveDate::parse_from_str(trimmed, DATE_FORMAT) {
        return Ok(Some(date));
    }

    if let Ok(date_time) = NaiveDateTime::parse_from_str(trimmed, DATETIME_FORMAT) {
        return Ok(Some(date_time.date()));
    }

    Ok(Some(NaiveDate::parse_from_str(trimmed, BR_DATE_FORMAT)?))
}
