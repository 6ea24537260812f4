use crate::bail;
use crate::error::{ErrorKind, SyncResult};
use crate::types::SourceValue;

/// Parses a legacy single-character flag.
///
/// `S` (sim) is true and `N` (não) is false, case-insensitively and ignoring surrounding
/// whitespace. Integer columns holding `1` or `0` are accepted too.
pub fn parse_flag(value: &SourceValue) -> SyncResult<Option<bool>> {
    match value {
        SourceValue::Null => Ok(None),
        SourceValue::Text(text) => parse_flag_text(text),
        SourceValue::Int(1) => Ok(Some(true)),
        SourceValue::Int(0) => Ok(Some(false)),
        other => bail!(
            ErrorKind::ConversionError,
            "Invalid flag value",
            format!("Flag value must be 'S' or 'N' (received: {other})")
        ),
    }
}

fn parse_flag_text(text: &str) -> SyncResult<Option<bool>> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    if trimmed.eq_ignore_ascii_case("s") || trimmed == "1" {
        Ok(Some(true))
    } else if trimmed.eq_ignore_ascii_case("n") || trimmed == "0" {
        Ok(Some(false))
    } else {
        bail!(
            ErrorKind::ConversionError,
            "Invalid flag value",
            format!("Flag value must be 'S' or 'N' (received: '{text}')")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_s_and_n() {
        assert_eq!(parse_flag(&"S".into()).unwrap(), Some(true));
        assert_eq!(parse_flag(&" n ".into()).unwrap(), Some(false));
        assert_eq!(parse_flag(&"s".into()).unwrap(), Some(true));
    }

    #[test]
    fn null_and_blank_are_unknown() {
        assert_eq!(parse_flag(&SourceValue::Null).unwrap(), None);
        assert_eq!(parse_flag(&"  ".into()).unwrap(), None);
    }

    #[test]
    fn accepts_integer_flags() {
        assert_eq!(parse_flag(&SourceValue::Int(1)).unwrap(), Some(true));
        assert_eq!(parse_flag(&SourceValue::Int(0)).unwrap(), Some(false));
    }

    #[test]
    fn rejects_other_values() {
        for value in [SourceValue::from("X"), SourceValue::from("SIM"), SourceValue::Int(2)] {
            let err = parse_flag(&value).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::ConversionError);
        }
    }
}
