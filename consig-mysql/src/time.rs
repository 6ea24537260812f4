/// MySQL date format.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// MySQL datetime format with optional fractional seconds.
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// Date format typed by operators into legacy free-text columns.
pub const BR_DATE_FORMAT: &str = "%d/%m/%Y";

/// Returns whether `value` is a MySQL zero date (`0000-00-00`, optionally with a time part).
///
/// Legacy tables use zero dates as "not set" and chrono rejects them, so callers treat them as
/// missing values.
pub fn is_zero_date(value: &str) -> bool {
    value.trim().starts_with("0000-00-00")
}
