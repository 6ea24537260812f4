use std::str::FromStr;

use bigdecimal::BigDecimal;

use crate::bail;
use crate::error::{ErrorKind, SyncResult};
use crate::types::SourceValue;

/// Parses a fixed-point decimal. Text is parsed directly, so no binary float is involved.
///
/// A comma is accepted as decimal separator when the text holds no dot, since some legacy
/// columns store amounts typed as `150,00`.
pub fn parse_decimal(value: &SourceValue) -> SyncResult<Option<BigDecimal>> {
    match value {
        SourceValue::Null => Ok(None),
        SourceValue::Decimal(decimal) => Ok(Some(decimal.clone())),
        SourceValue::Int(int) => Ok(Some(BigDecimal::from(*int))),
        SourceValue::Text(text) => {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                return Ok(None);
            }

            let decimal = if !trimmed.contains('.') && trimmed.contains(',') {
                BigDecimal::from_str(&trimmed.replace(',', "."))?
            } else {
                BigDecimal::from_str(trimmed)?
            };

            Ok(Some(decimal))
        }
        other => bail!(
            ErrorKind::ConversionError,
            "Invalid decimal value",
            format!("Expected a numeric value (received: {other})")
        ),
    }
}

/// Parses a 32-bit integer such as an installment count or index.
pub fn parse_int(value: &SourceValue) -> SyncResult<Option<i32>> {
    match value {
        SourceValue::Null => Ok(None),
        SourceValue::Int(int) => Ok(Some(i32::try_from(*int)?)),
        SourceValue::Text(text) => {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                return Ok(None);
            }

            Ok(Some(trimmed.parse::<i32>()?))
        }
        SourceValue::Decimal(decimal) if decimal.is_integer() => {
            let text = decimal.with_scale(0).to_string();
            Ok(Some(text.parse::<i32>()?))
        }
        other => bail!(
            ErrorKind::ConversionError,
            "Invalid integer value",
            format!("Expected an integer value (received: {other})")
        ),
    }
}
