use chrono::{NaiveDate, NaiveDateTime};

use crate::source::memory::MemorySource;
use crate::types::{EntityKind, SourceRow};

/// Organization code used by the fixtures.
pub const ORGANIZATION: &str = "1";

/// Change timestamp stamped on fixture rows unless a test overrides it.
pub fn fixture_changed_at() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 3, 1)
        .and_then(|date| date.and_hms_opt(10, 0, 0))
        .expect("valid fixture timestamp")
}

pub fn member_row(enrollment: &str, name: &str) -> SourceRow {
    SourceRow::new()
        .with("empresa", ORGANIZATION)
        .with("matricula", enrollment)
        .with("nome", name)
        .with("cpf", "")
        .with("ativo", "S")
        .with("bloqueado", "N")
        .with("limite", "1500.00")
        .with("data_alteracao", fixture_changed_at())
}

pub fn sale_row(
    sequence: &str,
    enrollment: &str,
    installment_count: i64,
    installment_value: &str,
) -> SourceRow {
    SourceRow::new()
        .with("empresa", ORGANIZATION)
        .with("sequencia", sequence)
        .with("matricula", enrollment)
        .with("convenio", "FARMACIA")
        .with("data_emissao", "2024-03-01")
        .with("qtd_parcelas", installment_count)
        .with("valor_parcela", installment_value)
        .with("cancelada", "N")
        .with("data_alteracao", fixture_changed_at())
}

pub fn installment_row(
    sequence: &str,
    index: i64,
    enrollment: &str,
    due_on: &str,
    amount: &str,
) -> SourceRow {
    SourceRow::new()
        .with("empresa", ORGANIZATION)
        .with("sequencia", sequence)
        .with("parcela", index)
        .with("matricula", enrollment)
        .with("vencimento", due_on)
        .with("valor", amount)
        .with("baixa", "N")
        .with("data_baixa", "0000-00-00")
        .with("data_alteracao", fixture_changed_at())
}

/// Member `2221` with sale `1` of two installments of `150.00`.
pub async fn seed_single_sale(source: &MemorySource) {
    source
        .add_rows(
            EntityKind::Members,
            [member_row("2221", "MARIA DAS DORES")],
        )
        .await;
    source
        .add_rows(EntityKind::Sales, [sale_row("1", "2221", 2, "150.00")])
        .await;
    source
        .add_rows(
            EntityKind::Installments,
            [
                installment_row("1", 1, "2221", "2024-04-10", "150.00"),
                installment_row("1", 2, "2221", "2024-05-10", "150.00"),
            ],
        )
        .await;
}

/// Seeds `members` members with `sales_per_member` sales of `installments_per_sale`
/// installments each.
pub async fn seed_portfolio(
    source: &MemorySource,
    members: usize,
    sales_per_member: usize,
    installments_per_sale: usize,
) {
    let mut member_rows = Vec::with_capacity(members);
    let mut sale_rows = Vec::new();
    let mut installment_rows = Vec::new();

    for member in 0..members {
        let enrollment = format!("{}", 1000 + member);
        member_rows.push(member_row(&enrollment, &format!("SOCIO {member}")));

        for sale in 0..sales_per_member {
            let sequence = format!("{}", member * sales_per_member + sale + 1);
            let count = installments_per_sale as i64;
            sale_rows.push(sale_row(&sequence, &enrollment, count, "99.90"));

            for index in 1..=count {
                let due_on = format!("2024-{:02}-10", (index - 1) % 12 + 1);
                installment_rows.push(installment_row(
                    &sequence,
                    index,
                    &enrollment,
                    &due_on,
                    "99.90",
                ));
            }
        }
    }

    source.add_rows(EntityKind::Members, member_rows).await;
    source.add_rows(EntityKind::Sales, sale_rows).await;
    source
        .add_rows(EntityKind::Installments, installment_rows)
        .await;
}
