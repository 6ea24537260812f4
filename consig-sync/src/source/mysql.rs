use std::collections::HashMap;

use bigdecimal::BigDecimal;
use chrono::{NaiveDate, NaiveDateTime};
use futures::StreamExt;
use futures::stream::{self, BoxStream};
use sqlx::mysql::MySqlRow;
use sqlx::{Column, MySqlConnection, Row, TypeInfo};
use tracing::debug;

use crate::error::{ErrorKind, SyncError, SyncResult};
use crate::source::Source;
use crate::sync_error;
use crate::types::{EntityKind, EntitySpec, SourceRow, SourceValue};

/// Extracts rows from the legacy MySQL store over a single connection.
///
/// The connection is expected to be read-only, see `consig_mysql::connection::connect_source`.
#[derive(Debug)]
pub struct MySqlSource {
    connection: MySqlConnection,
    statements: HashMap<(EntityKind, bool), String>,
}

impl MySqlSource {
    pub fn new(connection: MySqlConnection) -> Self {
        let statements = EntityKind::ALL
            .iter()
            .flat_map(|kind| {
                [false, true].map(|incremental| {
                    (
                        (*kind, incremental),
                        select_statement(kind.spec(), incremental),
                    )
                })
            })
            .collect();

        Self {
            connection,
            statements,
        }
    }
}

impl Source for MySqlSource {
    fn name() -> &'static str {
        "mysql"
    }

    fn rows(
        &mut self,
        kind: EntityKind,
        changed_since: Option<NaiveDateTime>,
    ) -> BoxStream<'_, SyncResult<SourceRow>> {
        let Self {
            connection,
            statements,
        } = self;

        let Some(statement) = statements.get(&(kind, changed_since.is_some())) else {
            return stream::once(async move {
                Err(sync_error!(
                    ErrorKind::InvalidState,
                    "No extraction statement for entity kind",
                    kind
                ))
            })
            .boxed();
        };

        debug!(%kind, %statement, ?changed_since, "extracting rows");

        let mut query = sqlx::query(statement.as_str());
        if let Some(changed_since) = changed_since {
            query = query.bind(changed_since);
        }

        query
            .fetch(connection)
            .map(move |result| {
                result
                    .map_err(SyncError::from_source)
                    .and_then(|row| decode_row(kind, &row))
            })
            .boxed()
    }
}

/// Builds the extraction query for `spec`, ordered by natural key.
fn select_statement(spec: &EntitySpec, incremental: bool) -> String {
    let columns = spec
        .columns
        .iter()
        .map(|column| quote_identifier(column))
        .collect::<Vec<_>>()
        .join(", ");
    let order_by = spec
        .key_columns
        .iter()
        .map(|column| quote_identifier(column))
        .collect::<Vec<_>>()
        .join(", ");

    let mut statement = format!(
        "SELECT {columns} FROM {}",
        quote_identifier(spec.source_table)
    );
    if incremental {
        statement.push_str(&format!(
            " WHERE {} >= ?",
            quote_identifier(spec.changed_at_column)
        ));
    }
    statement.push_str(&format!(" ORDER BY {order_by}"));

    statement
}

fn quote_identifier(identifier: &str) -> String {
    format!("`{}`", identifier.replace('`', "``"))
}

/// Decodes every column of `row`. A failure is reported once the whole row has been read so
/// the error can name the row by its key.
fn decode_row(kind: EntityKind, row: &MySqlRow) -> SyncResult<SourceRow> {
    let mut source_row = SourceRow::new();
    let mut failure = None;

    for column in row.columns() {
        match decode_value(row, column.ordinal(), column.type_info().name()) {
            Ok(value) => source_row.insert(column.name(), value),
            Err(err) if failure.is_none() => failure = Some((column.name().to_string(), err)),
            Err(_) => {}
        }
    }

    match failure {
        None => Ok(source_row),
        Some((column, err)) => Err(sync_error!(
            ErrorKind::ConversionError,
            "Source value could not be decoded",
            format!(
                "{}, column `{}.{column}`: {err}",
                kind.describe_row(&source_row),
                kind.spec().source_table
            ),
            source: err
        )),
    }
}

fn decode_value(row: &MySqlRow, index: usize, type_name: &str) -> Result<SourceValue, sqlx::Error> {
    let value = match type_name {
        "BOOLEAN" | "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" => row
            .try_get::<Option<i64>, _>(index)?
            .map(SourceValue::Int),
        "TINYINT UNSIGNED" | "SMALLINT UNSIGNED" | "MEDIUMINT UNSIGNED" | "INT UNSIGNED"
        | "BIGINT UNSIGNED" => row.try_get::<Option<u64>, _>(index)?.map(|value| {
            i64::try_from(value)
                .map(SourceValue::Int)
                .unwrap_or_else(|_| SourceValue::Decimal(BigDecimal::from(value)))
        }),
        "DECIMAL" => row
            .try_get::<Option<BigDecimal>, _>(index)?
            .map(SourceValue::Decimal),
        // Rendered as text so the decimal parser sees the shortest round-trip representation.
        "FLOAT" | "DOUBLE" => row
            .try_get::<Option<f64>, _>(index)?
            .map(|value| SourceValue::Text(value.to_string())),
        "DATE" => zero_date_as_null(row.try_get::<Option<NaiveDate>, _>(index))?
            .map(SourceValue::Date),
        "DATETIME" | "TIMESTAMP" => {
            zero_date_as_null(row.try_get::<Option<NaiveDateTime>, _>(index))?
                .map(SourceValue::DateTime)
        }
        "NULL" => None,
        _ => row
            .try_get::<Option<String>, _>(index)?
            .map(SourceValue::Text),
    };

    Ok(value.unwrap_or(SourceValue::Null))
}

/// Zero dates (`0000-00-00`) mean "not set" in the legacy tables. The driver reports them as
/// an unexpected null while decoding; every other decode failure is kept.
fn zero_date_as_null<T>(
    decoded: Result<Option<T>, sqlx::Error>,
) -> Result<Option<T>, sqlx::Error> {
    match decoded {
        Err(sqlx::Error::ColumnDecode { ref source, .. })
            if source.is::<sqlx::error::UnexpectedNullError>() =>
        {
            Ok(None)
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_statement_orders_by_natural_key() {
        let statement = select_statement(EntityKind::Installments.spec(), false);

        assert_eq!(
            statement,
            "SELECT `empresa`, `sequencia`, `parcela`, `matricula`, `vencimento`, `valor`, \
             `baixa`, `data_baixa`, `data_alteracao` FROM `parcelas` \
             ORDER BY `empresa`, `sequencia`, `parcela`"
        );
    }

    #[test]
    fn incremental_statement_filters_on_change_column() {
        let statement = select_statement(EntityKind::Members.spec(), true);

        assert!(statement.contains("FROM `socios` WHERE `data_alteracao` >= ? ORDER BY"));
    }

    #[test]
    fn zero_dates_decode_as_null() {
        let zero_date: Result<Option<NaiveDate>, sqlx::Error> = Err(sqlx::Error::ColumnDecode {
            index: "\"data_baixa\"".to_string(),
            source: Box::new(sqlx::error::UnexpectedNullError),
        });

        assert_eq!(zero_date_as_null(zero_date).unwrap(), None);
    }

    #[test]
    fn other_date_decode_failures_are_kept() {
        let malformed: Result<Option<NaiveDateTime>, sqlx::Error> =
            Err(sqlx::Error::ColumnDecode {
                index: "\"data_alteracao\"".to_string(),
                source: "expected 7 bytes, got 3".into(),
            });

        let err = zero_date_as_null(malformed).unwrap_err();

        assert!(matches!(err, sqlx::Error::ColumnDecode { .. }));
        assert!(err.to_string().contains("expected 7 bytes"));
    }

    #[test]
    fn present_dates_pass_through() {
        let date = NaiveDate::from_ymd_opt(2024, 5, 10);

        assert_eq!(zero_date_as_null(Ok(date)).unwrap(), date);
    }

    #[test]
    fn identifiers_are_escaped() {
        assert_eq!(quote_identifier("we`ird"), "`we``ird`");
    }
}
