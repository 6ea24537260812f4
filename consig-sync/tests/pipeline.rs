#![cfg(feature = "test-utils")]

use std::str::FromStr;
use std::time::Duration;

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use consig_sync::destination::memory::{MemoryDestination, WriteEvent};
use consig_sync::error::ErrorKind;
use consig_sync::mapper::map_row;
use consig_sync::pipeline::{RunOptions, SyncPhase};
use consig_sync::report::EntityReport;
use consig_sync::source::memory::MemorySource;
use consig_sync::test_utils::fixtures::{
    fixture_changed_at, installment_row, member_row, sale_row, seed_portfolio, seed_single_sale,
};
use consig_sync::test_utils::pipeline::create_memory_pipeline;
use consig_sync::types::{EntityKind, InstallmentRecord, NaturalKey, Record};
use consig_telemetry::tracing::init_test_tracing;

fn counts(inserted: u64, updated: u64, unchanged: u64, errored: u64) -> EntityReport {
    EntityReport {
        inserted,
        updated,
        unchanged,
        errored,
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn single_sale_is_copied_with_both_installments() {
    init_test_tracing();

    let source = MemorySource::new();
    let destination = MemoryDestination::new();
    seed_single_sale(&source).await;

    let mut pipeline = create_memory_pipeline(&source, &destination, 4);
    let report = pipeline.run(&RunOptions::all()).await.unwrap();

    insta::assert_snapshot!(report.to_string(), @r"
    members: inserted=1 updated=0 unchanged=0 errored=0
    sales: inserted=1 updated=0 unchanged=0 errored=0
    installments: inserted=2 updated=0 unchanged=0 errored=0
    total: inserted=4 updated=0 unchanged=0 errored=0
    ");
    assert_eq!(pipeline.phase(), SyncPhase::Reported);

    let installments = destination.records(EntityKind::Installments).await;
    assert_eq!(
        installments,
        vec![
            Record::Installment(InstallmentRecord {
                organization: "1".to_string(),
                sale_sequence: "1".to_string(),
                index: 1,
                enrollment: "2221".to_string(),
                due_on: NaiveDate::from_ymd_opt(2024, 4, 10),
                amount: Some(BigDecimal::from_str("150.00").unwrap()),
                paid: Some(false),
                paid_on: None,
            }),
            Record::Installment(InstallmentRecord {
                organization: "1".to_string(),
                sale_sequence: "1".to_string(),
                index: 2,
                enrollment: "2221".to_string(),
                due_on: NaiveDate::from_ymd_opt(2024, 5, 10),
                amount: Some(BigDecimal::from_str("150.00").unwrap()),
                paid: Some(false),
                paid_on: None,
            }),
        ]
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn second_run_over_unchanged_source_writes_nothing() {
    init_test_tracing();

    let source = MemorySource::new();
    let destination = MemoryDestination::new();
    seed_portfolio(&source, 5, 2, 3).await;

    let mut pipeline = create_memory_pipeline(&source, &destination, 8);
    pipeline.run(&RunOptions::all()).await.unwrap();
    let writes_after_first_run = destination.writes().await;
    let state_after_first_run = destination.snapshot().await;

    let report = pipeline.run(&RunOptions::all()).await.unwrap();

    assert_eq!(report.get(EntityKind::Members), Some(&counts(0, 0, 5, 0)));
    assert_eq!(report.get(EntityKind::Sales), Some(&counts(0, 0, 10, 0)));
    assert_eq!(
        report.get(EntityKind::Installments),
        Some(&counts(0, 0, 30, 0))
    );
    assert_eq!(destination.writes().await, writes_after_first_run);
    assert_eq!(destination.snapshot().await, state_after_first_run);
}

#[tokio::test(flavor = "multi_thread")]
async fn changed_field_updates_only_that_row() {
    init_test_tracing();

    let source = MemorySource::new();
    let destination = MemoryDestination::new();
    seed_single_sale(&source).await;

    let mut pipeline = create_memory_pipeline(&source, &destination, 4);
    pipeline.run(&RunOptions::all()).await.unwrap();

    let key = NaturalKey::installment("1", "1", 2);
    let id_before = destination.get(&key).await.unwrap().id;

    source
        .set_rows(
            EntityKind::Installments,
            vec![
                installment_row("1", 1, "2221", "2024-04-10", "150.00"),
                installment_row("1", 2, "2221", "2024-05-10", "150.00")
                    .with("baixa", "S")
                    .with("data_baixa", "10/05/2024"),
            ],
        )
        .await;

    let report = pipeline.run(&RunOptions::all()).await.unwrap();

    assert_eq!(report.get(EntityKind::Members), Some(&counts(0, 0, 1, 0)));
    assert_eq!(report.get(EntityKind::Sales), Some(&counts(0, 0, 1, 0)));
    assert_eq!(
        report.get(EntityKind::Installments),
        Some(&counts(0, 1, 1, 0))
    );

    let stored = destination.get(&key).await.unwrap();
    assert_eq!(stored.id, id_before);
    let Record::Installment(installment) = stored.record else {
        panic!("expected an installment");
    };
    assert_eq!(installment.paid, Some(true));
    assert_eq!(installment.paid_on, NaiveDate::from_ymd_opt(2024, 5, 10));
}

#[tokio::test(flavor = "multi_thread")]
async fn parents_are_written_before_children() {
    init_test_tracing();

    let source = MemorySource::new();
    let destination = MemoryDestination::new();
    destination.set_latency(Duration::from_millis(1)).await;
    seed_portfolio(&source, 10, 2, 3).await;

    let mut pipeline = create_memory_pipeline(&source, &destination, 20);
    let report = pipeline.run(&RunOptions::all()).await.unwrap();

    assert_eq!(report.total_errored(), 0);

    let kinds: Vec<EntityKind> = destination
        .writes()
        .await
        .iter()
        .map(|write| write.key().kind())
        .collect();
    let mut sorted = kinds.clone();
    sorted.sort();
    assert_eq!(kinds, sorted);
    assert_eq!(kinds.len(), 10 + 20 + 60);
}

#[tokio::test(flavor = "multi_thread")]
async fn concurrency_cap_does_not_change_the_result() {
    init_test_tracing();

    let source = MemorySource::new();
    seed_portfolio(&source, 12, 3, 4).await;

    let sequential = MemoryDestination::new();
    let report_sequential = create_memory_pipeline(&source, &sequential, 1)
        .run(&RunOptions::all())
        .await
        .unwrap();

    let concurrent = MemoryDestination::new();
    concurrent.set_latency(Duration::from_millis(1)).await;
    let report_concurrent = create_memory_pipeline(&source, &concurrent, 20)
        .run(&RunOptions::all())
        .await
        .unwrap();

    assert_eq!(report_sequential, report_concurrent);
    assert_eq!(sequential.snapshot().await, concurrent.snapshot().await);
    assert_eq!(sequential.max_in_flight().await, 1);
    assert!(concurrent.max_in_flight().await <= 20);
}

#[tokio::test(flavor = "multi_thread")]
async fn invalid_flag_fails_the_member_and_its_children() {
    init_test_tracing();

    let source = MemorySource::new();
    let destination = MemoryDestination::new();
    seed_single_sale(&source).await;
    source
        .add_rows(
            EntityKind::Members,
            [member_row("3000", "JOAO").with("ativo", "X")],
        )
        .await;
    source
        .add_rows(EntityKind::Sales, [sale_row("2", "3000", 1, "80.00")])
        .await;
    source
        .add_rows(
            EntityKind::Installments,
            [installment_row("2", 1, "3000", "2024-04-10", "80.00")],
        )
        .await;

    let mut pipeline = create_memory_pipeline(&source, &destination, 4);
    let report = pipeline.run(&RunOptions::all()).await.unwrap();

    assert_eq!(report.get(EntityKind::Members), Some(&counts(1, 0, 0, 1)));
    assert_eq!(report.get(EntityKind::Sales), Some(&counts(1, 0, 0, 1)));
    assert_eq!(
        report.get(EntityKind::Installments),
        Some(&counts(2, 0, 0, 1))
    );
    assert_eq!(report.total_errored(), 3);
    assert_eq!(pipeline.phase(), SyncPhase::Reported);
}

#[tokio::test(flavor = "multi_thread")]
async fn installment_enrolled_under_another_member_is_errored() {
    init_test_tracing();

    let source = MemorySource::new();
    let destination = MemoryDestination::new();
    seed_single_sale(&source).await;
    source
        .add_rows(EntityKind::Members, [member_row("3005", "JOAO")])
        .await;
    source
        .add_rows(
            EntityKind::Installments,
            [installment_row("1", 3, "3005", "2024-06-10", "150.00")],
        )
        .await;

    let mut pipeline = create_memory_pipeline(&source, &destination, 4);
    let report = pipeline.run(&RunOptions::all()).await.unwrap();

    assert_eq!(
        report.get(EntityKind::Installments),
        Some(&counts(2, 0, 0, 1))
    );
    assert!(
        destination
            .get(&NaturalKey::installment("1", "1", 3))
            .await
            .is_none()
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn concurrent_writer_conflict_is_retried_once() {
    init_test_tracing();

    let source = MemorySource::new();
    let destination = MemoryDestination::new();
    seed_single_sale(&source).await;
    source
        .add_rows(EntityKind::Members, [member_row("4000", "ANA")])
        .await;

    // Another writer stores an older version of 2221 right before our insert.
    let mut pipeline = create_memory_pipeline(&source, &destination, 2);
    let older = map_row(EntityKind::Members, &member_row("2221", "MARIA D. DORES")).unwrap();
    destination.inject_racing_write(older).await;
    destination
        .inject_conflicts(NaturalKey::member("1", "4000"), 2)
        .await;

    let report = pipeline
        .run(&RunOptions::only([EntityKind::Members]))
        .await
        .unwrap();

    assert_eq!(report.get(EntityKind::Members), Some(&counts(0, 1, 0, 1)));
    assert_eq!(
        destination.writes().await,
        vec![WriteEvent::Update(NaturalKey::member("1", "2221"))]
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn only_selected_kinds_are_extracted() {
    init_test_tracing();

    let source = MemorySource::new();
    let destination = MemoryDestination::new();
    seed_single_sale(&source).await;

    let mut pipeline = create_memory_pipeline(&source, &destination, 4);
    let report = pipeline
        .run(&RunOptions::only([EntityKind::Installments, EntityKind::Members]))
        .await
        .unwrap();

    assert_eq!(
        source.extractions().await,
        vec![EntityKind::Members, EntityKind::Installments]
    );
    assert_eq!(report.get(EntityKind::Sales), None);
    assert_eq!(
        report.get(EntityKind::Installments),
        Some(&counts(0, 0, 0, 2))
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn extraction_failure_fails_the_run() {
    init_test_tracing();

    let source = MemorySource::new();
    let destination = MemoryDestination::new();
    seed_single_sale(&source).await;
    source.fail_extraction(EntityKind::Sales, 0).await;

    let mut pipeline = create_memory_pipeline(&source, &destination, 4);
    let err = pipeline.run(&RunOptions::all()).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::SourceQueryFailed);
    assert!(err.is_fatal());
    assert_eq!(pipeline.phase(), SyncPhase::Failed);
    assert_eq!(
        source.extractions().await,
        vec![EntityKind::Members, EntityKind::Sales]
    );
    assert_eq!(destination.records(EntityKind::Members).await.len(), 1);
    assert!(destination.records(EntityKind::Sales).await.is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn incremental_run_only_sees_recent_rows() {
    init_test_tracing();

    let source = MemorySource::new();
    let destination = MemoryDestination::new();
    seed_single_sale(&source).await;

    let later = fixture_changed_at() + chrono::Duration::days(3);
    source
        .add_rows(
            EntityKind::Members,
            [member_row("5000", "PEDRO").with("data_alteracao", later)],
        )
        .await;

    let mut pipeline = create_memory_pipeline(&source, &destination, 4);
    let report = pipeline
        .run(&RunOptions {
            kinds: vec![],
            changed_since: Some(fixture_changed_at() + chrono::Duration::days(1)),
        })
        .await
        .unwrap();

    assert_eq!(report.get(EntityKind::Members), Some(&counts(1, 0, 0, 0)));
    assert_eq!(report.get(EntityKind::Sales), Some(&counts(0, 0, 0, 0)));
    assert!(
        destination
            .get(&NaturalKey::member("1", "5000"))
            .await
            .is_some()
    );
    assert!(
        destination
            .get(&NaturalKey::member("1", "2221"))
            .await
            .is_none()
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn shutdown_cancels_a_running_sync() {
    init_test_tracing();

    let source = MemorySource::new();
    let destination = MemoryDestination::new();
    destination.set_latency(Duration::from_millis(20)).await;
    seed_portfolio(&source, 50, 1, 1).await;

    let mut pipeline = create_memory_pipeline(&source, &destination, 1);
    let shutdown_tx = pipeline.shutdown_tx();

    let run = tokio::spawn(async move {
        let result = pipeline.run(&RunOptions::all()).await;
        (result, pipeline.phase())
    });

    tokio::time::sleep(Duration::from_millis(100)).await;
    shutdown_tx.shutdown().unwrap();

    let (result, phase) = run.await.unwrap();

    assert_eq!(result.unwrap_err().kind(), ErrorKind::Cancelled);
    assert_eq!(phase, SyncPhase::Failed);
    assert!(destination.records(EntityKind::Members).await.len() < 50);
    assert!(destination.records(EntityKind::Sales).await.is_empty());
}
