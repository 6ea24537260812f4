//! Mapping of untyped legacy rows into typed records.

use bigdecimal::BigDecimal;
use chrono::NaiveDate;

use crate::bail;
use crate::conversions::date::parse_date;
use crate::conversions::flag::parse_flag;
use crate::conversions::numeric::{parse_decimal, parse_int};
use crate::conversions::text::parse_text;
use crate::error::{ErrorKind, SyncError, SyncResult};
use crate::sync_error;
use crate::types::{
    EntityKind, EntitySpec, InstallmentRecord, MemberRecord, Record, SaleRecord, SourceRow,
    SourceValue,
};

/// Maps a legacy row of `kind` into a [`Record`].
///
/// Fails with [`ErrorKind::MissingNaturalKey`] when a key column is null or blank and with
/// [`ErrorKind::ConversionError`] when a present value cannot be coerced. Error details start
/// with the row's raw key and name the offending column. Columns that are not part of the
/// mapping are ignored.
pub fn map_row(kind: EntityKind, row: &SourceRow) -> SyncResult<Record> {
    let reader = RowReader {
        kind,
        spec: kind.spec(),
        row,
    };

    match kind {
        EntityKind::Members => map_member(&reader).map(Record::Member),
        EntityKind::Sales => map_sale(&reader).map(Record::Sale),
        EntityKind::Installments => map_installment(&reader).map(Record::Installment),
    }
}

fn map_member(reader: &RowReader<'_>) -> SyncResult<MemberRecord> {
    Ok(MemberRecord {
        organization: reader.key_text("empresa")?,
        enrollment: reader.key_text("matricula")?,
        name: reader.text("nome"),
        cpf: reader.text("cpf"),
        email: reader.text("email"),
        phone: reader.text("celular"),
        active: reader.flag("ativo")?,
        blocked: reader.flag("bloqueado")?,
        credit_limit: reader.decimal("limite")?,
    })
}

fn map_sale(reader: &RowReader<'_>) -> SyncResult<SaleRecord> {
    Ok(SaleRecord {
        organization: reader.key_text("empresa")?,
        sequence: reader.key_text("sequencia")?,
        enrollment: reader.key_text("matricula")?,
        merchant: reader.text("convenio"),
        issued_on: reader.date("data_emissao")?,
        installment_count: reader.int("qtd_parcelas")?,
        installment_value: reader.decimal("valor_parcela")?,
        cancelled: reader.flag("cancelada")?,
    })
}

fn map_installment(reader: &RowReader<'_>) -> SyncResult<InstallmentRecord> {
    Ok(InstallmentRecord {
        organization: reader.key_text("empresa")?,
        sale_sequence: reader.key_text("sequencia")?,
        index: reader.key_int("parcela")?,
        enrollment: reader.key_text("matricula")?,
        due_on: reader.date("vencimento")?,
        amount: reader.decimal("valor")?,
        paid: reader.flag("baixa")?,
        paid_on: reader.date("data_baixa")?,
    })
}

/// Reads columns of one row and attaches the row key and column to coercion failures.
struct RowReader<'a> {
    kind: EntityKind,
    spec: &'static EntitySpec,
    row: &'a SourceRow,
}

impl RowReader<'_> {
    fn key_text(&self, column: &'static str) -> SyncResult<String> {
        match parse_text(self.row.get(column)) {
            Some(value) => Ok(value),
            None => bail!(
                ErrorKind::MissingNaturalKey,
                "Key column is null or blank",
                self.column_detail(column)
            ),
        }
    }

    fn key_int(&self, column: &'static str) -> SyncResult<i32> {
        match self.coerce(column, parse_int)? {
            Some(value) => Ok(value),
            None => bail!(
                ErrorKind::MissingNaturalKey,
                "Key column is null or blank",
                self.column_detail(column)
            ),
        }
    }

    fn text(&self, column: &'static str) -> Option<String> {
        parse_text(self.row.get(column))
    }

    fn flag(&self, column: &'static str) -> SyncResult<Option<bool>> {
        self.coerce(column, parse_flag)
    }

    fn decimal(&self, column: &'static str) -> SyncResult<Option<BigDecimal>> {
        self.coerce(column, parse_decimal)
    }

    fn int(&self, column: &'static str) -> SyncResult<Option<i32>> {
        self.coerce(column, parse_int)
    }

    fn date(&self, column: &'static str) -> SyncResult<Option<NaiveDate>> {
        self.coerce(column, parse_date)
    }

    fn coerce<T>(
        &self,
        column: &'static str,
        parse: fn(&SourceValue) -> SyncResult<T>,
    ) -> SyncResult<T> {
        parse(self.row.get(column)).map_err(|err| self.column_error(column, err))
    }

    fn column_detail(&self, column: &'static str) -> String {
        format!(
            "{}, column `{}.{column}`",
            self.kind.describe_row(self.row),
            self.spec.source_table
        )
    }

    fn column_error(&self, column: &'static str, err: SyncError) -> SyncError {
        let detail = format!(
            "{}: {}",
            self.column_detail(column),
            err.detail().unwrap_or("value could not be coerced")
        );

        sync_error!(err.kind(), "Column coercion failed", detail, source: err)
    }
}
