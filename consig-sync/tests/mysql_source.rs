#![cfg(feature = "test-utils")]

use std::str::FromStr;

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use consig_config::shared::MySqlConnectionConfig;
use consig_mysql::connection::connect_source;
use consig_mysql::test_utils::{
    create_mysql_database, drop_mysql_database, local_mysql_connection_config,
};
use consig_sync::mapper::map_row;
use consig_sync::source::Source;
use consig_sync::source::mysql::MySqlSource;
use consig_sync::types::{EntityKind, MemberRecord, Record, SourceRow, SourceValue};
use consig_telemetry::tracing::init_test_tracing;
use futures::TryStreamExt;
use sqlx::MySqlPool;

/// Seeds one row per legacy table. The installment carries a zero settlement date, which
/// needs a permissive `sql_mode` on the seeding session.
const SEED: &str = r#"
    SET SESSION sql_mode = '';

    INSERT INTO socios (empresa, matricula, nome, cpf, email, celular, ativo, bloqueado,
        limite, data_alteracao)
    VALUES (1, '2221', ' MARIA DAS DORES ', '12345678909', NULL, '', 'S', 0, 1500.00,
        '2024-03-01 10:00:00');

    INSERT INTO vendas (empresa, sequencia, matricula, convenio, data_emissao, qtd_parcelas,
        valor_parcela, cancelada, data_alteracao)
    VALUES (1, 18446744073709551615, '2221', 'FARMACIA', '2024-03-01', 2, 150.5, 'N',
        '2024-03-01 10:00:00');

    INSERT INTO parcelas (empresa, sequencia, parcela, matricula, vencimento, valor, baixa,
        data_baixa, data_alteracao)
    VALUES (1, 1, 2, '2221', '2024-05-10', 150.00, 'N', '0000-00-00', '2024-03-01 10:00:00');
"#;

async fn spawn_source() -> Option<(MySqlConnectionConfig, MySqlPool, MySqlSource)> {
    init_test_tracing();

    let Some(config) = local_mysql_connection_config() else {
        eprintln!("TESTS_MYSQL_HOST is not set, skipping");
        return None;
    };

    let pool = create_mysql_database(&config).await;
    let mut connection = pool.acquire().await.unwrap();
    sqlx::raw_sql(SEED).execute(&mut *connection).await.unwrap();
    drop(connection);

    let source = MySqlSource::new(connect_source(&config).await.unwrap());

    Some((config, pool, source))
}

async fn teardown(config: MySqlConnectionConfig, pool: MySqlPool) {
    pool.close().await;
    drop_mysql_database(&config).await;
}

async fn single_row(source: &mut MySqlSource, kind: EntityKind) -> SourceRow {
    let mut rows: Vec<SourceRow> = source.rows(kind, None).try_collect().await.unwrap();
    assert_eq!(rows.len(), 1);
    rows.remove(0)
}

fn datetime(day: u32, hour: u32) -> SourceValue {
    SourceValue::DateTime(
        NaiveDate::from_ymd_opt(2024, 3, day)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap(),
    )
}

#[tokio::test(flavor = "multi_thread")]
async fn member_columns_decode_by_type() {
    let Some((config, pool, mut source)) = spawn_source().await else {
        return;
    };

    let row = single_row(&mut source, EntityKind::Members).await;

    assert_eq!(row.get("empresa"), &SourceValue::Int(1));
    assert_eq!(row.get("matricula"), &SourceValue::from("2221"));
    assert_eq!(row.get("email"), &SourceValue::Null);
    assert_eq!(row.get("bloqueado"), &SourceValue::Int(0));
    assert_eq!(
        row.get("limite"),
        &SourceValue::Decimal(BigDecimal::from_str("1500.00").unwrap())
    );
    assert_eq!(row.get("data_alteracao"), &datetime(1, 10));

    let record = map_row(EntityKind::Members, &row).unwrap();
    assert_eq!(
        record,
        Record::Member(MemberRecord {
            organization: "1".to_string(),
            enrollment: "2221".to_string(),
            name: Some("MARIA DAS DORES".to_string()),
            cpf: Some("12345678909".to_string()),
            email: None,
            phone: None,
            active: Some(true),
            blocked: Some(false),
            credit_limit: Some(BigDecimal::from_str("1500").unwrap()),
        })
    );

    teardown(config, pool).await;
}

#[tokio::test(flavor = "multi_thread")]
async fn sale_columns_decode_unsigned_float_date_and_timestamp() {
    let Some((config, pool, mut source)) = spawn_source().await else {
        return;
    };

    let row = single_row(&mut source, EntityKind::Sales).await;

    assert_eq!(row.get("empresa"), &SourceValue::Int(1));
    assert_eq!(
        row.get("sequencia"),
        &SourceValue::Decimal(BigDecimal::from(u64::MAX))
    );
    assert_eq!(row.get("valor_parcela"), &SourceValue::from("150.5"));
    assert_eq!(
        row.get("data_emissao"),
        &SourceValue::Date(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap())
    );
    assert_eq!(row.get("data_alteracao"), &datetime(1, 10));

    teardown(config, pool).await;
}

#[tokio::test(flavor = "multi_thread")]
async fn zero_date_decodes_as_null() {
    let Some((config, pool, mut source)) = spawn_source().await else {
        return;
    };

    let row = single_row(&mut source, EntityKind::Installments).await;

    assert_eq!(row.get("data_baixa"), &SourceValue::Null);
    assert_eq!(
        row.get("vencimento"),
        &SourceValue::Date(NaiveDate::from_ymd_opt(2024, 5, 10).unwrap())
    );
    assert_eq!(row.get("parcela"), &SourceValue::Int(2));

    let Record::Installment(installment) = map_row(EntityKind::Installments, &row).unwrap()
    else {
        panic!("expected an installment");
    };
    assert_eq!(installment.paid_on, None);

    teardown(config, pool).await;
}
