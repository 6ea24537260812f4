use consig_config::shared::SyncJobConfig;
use consig_mysql::connection::connect_source;
use consig_postgres::connection::connect_destination;
use consig_sync::concurrency::shutdown::ShutdownTx;
use consig_sync::destination::Destination;
use consig_sync::destination::postgres::PostgresDestination;
use consig_sync::error::ErrorKind;
use consig_sync::pipeline::{RunOptions, SyncPipeline};
use consig_sync::report::RunReport;
use consig_sync::source::Source;
use consig_sync::source::mysql::MySqlSource;
use consig_sync::sync_error;
use tokio::signal::unix::{SignalKind, signal};
use tracing::{info, warn};

use crate::error::ReplicatorResult;

/// Connects to both databases and runs one sync with `options`.
pub async fn start_sync_with_config(
    config: SyncJobConfig,
    options: RunOptions,
) -> ReplicatorResult<RunReport> {
    info!("starting consignado sync");

    log_config(&config);

    let connection = connect_source(&config.source).await.map_err(|err| {
        sync_error!(
            ErrorKind::SourceConnectionFailed,
            "Could not connect to the source database",
            format!("{}:{}/{}", config.source.host, config.source.port, config.source.name),
            source: err
        )
    })?;
    let source = MySqlSource::new(connection);

    let pool = connect_destination(&config.destination, config.sync.destination_pool_size())
        .await
        .map_err(|err| {
            sync_error!(
                ErrorKind::DestinationConnectionFailed,
                "Could not connect to the destination database",
                format!(
                    "{}:{}/{}",
                    config.destination.host, config.destination.port, config.destination.name
                ),
                source: err
            )
        })?;
    let destination = PostgresDestination::new(pool.clone());

    let pipeline = SyncPipeline::new(config.sync, source, destination);
    let result = run_pipeline(pipeline, &options).await;

    pool.close().await;

    result
}

fn log_config(config: &SyncJobConfig) {
    info!(
        host = %config.source.host,
        port = config.source.port,
        dbname = %config.source.name,
        username = %config.source.username,
        tls_enabled = config.source.tls.enabled,
        "source config"
    );
    info!(
        host = %config.destination.host,
        port = config.destination.port,
        dbname = %config.destination.name,
        username = %config.destination.username,
        tls_enabled = config.destination.tls.enabled,
        "destination config"
    );
    info!(
        members_max_concurrency = config.sync.members.max_concurrency,
        sales_max_concurrency = config.sync.sales.max_concurrency,
        installments_max_concurrency = config.sync.installments.max_concurrency,
        changed_since_hours = ?config.sync.changed_since_hours,
        "sync config"
    );
}

/// Runs `pipeline` once and stops it gracefully on SIGINT or SIGTERM.
///
/// Rows already handed to the destination finish before the run returns a cancellation error.
pub async fn run_pipeline<S, D>(
    mut pipeline: SyncPipeline<S, D>,
    options: &RunOptions,
) -> ReplicatorResult<RunReport>
where
    S: Source,
    D: Destination + Clone + Send + Sync + 'static,
{
    let shutdown_tx = pipeline.shutdown_tx();
    let shutdown_handle = tokio::spawn(async move {
        wait_for_shutdown_signal().await;
        request_shutdown(&shutdown_tx);
    });

    let result = pipeline.run(options).await;

    shutdown_handle.abort();
    let _ = shutdown_handle.await;

    let report = result?;
    if report.total_errored() > 0 {
        warn!(
            errored = report.total_errored(),
            "some rows could not be synchronized, see the logged row errors"
        );
    }

    Ok(report)
}

/// Asks the pipeline to stop and returns whether anyone was still listening.
fn request_shutdown(shutdown_tx: &ShutdownTx) -> bool {
    match shutdown_tx.shutdown() {
        Ok(()) => true,
        Err(err) => {
            warn!(error = %err, "shutdown requested but the sync has already stopped listening");
            false
        }
    }
}

async fn wait_for_shutdown_signal() {
    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(sigterm) => sigterm,
        Err(err) => {
            warn!(error = %err, "failed to listen for SIGTERM, only SIGINT stops the sync");

            if tokio::signal::ctrl_c().await.is_ok() {
                info!("SIGINT received, shutting down sync");
                return;
            }
            // Without any signal source the run can only end on its own.
            std::future::pending::<()>().await;
            return;
        }
    };

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if result.is_err() {
                // Keep waiting on SIGTERM alone.
                sigterm.recv().await;
                info!("SIGTERM received, shutting down sync");
                return;
            }
            info!("SIGINT received, shutting down sync");
        }
        _ = sigterm.recv() => {
            info!("SIGTERM received, shutting down sync");
        }
    }
}
