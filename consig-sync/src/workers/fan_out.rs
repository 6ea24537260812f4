use std::pin::pin;
use std::sync::Arc;

use futures::{Stream, StreamExt};
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};
use tracing::{Instrument, error, info, warn};

use crate::bail;
use crate::concurrency::shutdown::ShutdownRx;
use crate::destination::Destination;
use crate::error::{ErrorKind, SyncResult};
use crate::mapper::map_row;
use crate::report::EntityReport;
use crate::sync_error;
use crate::types::{EntityKind, NaturalKey, SourceRow};
use crate::writer::{WriteOutcome, upsert};

type RowTaskResult = (NaturalKey, SyncResult<WriteOutcome>);

/// Maps and upserts every row of `rows`, keeping at most `max_in_flight` upserts running.
///
/// Rows are pulled lazily and dispatched as soon as a slot frees up; there is no ordering
/// between rows. Row-local failures, including mapping errors and panicking row tasks, are
/// counted as `errored`. The first fatal error aborts every running task and is returned.
///
/// When `shutdown_rx` fires no further rows are dispatched. Rows already in flight are
/// awaited and the call then fails with [`ErrorKind::Cancelled`].
pub async fn fan_out<D, S>(
    kind: EntityKind,
    rows: S,
    max_in_flight: u16,
    destination: D,
    mut shutdown_rx: ShutdownRx,
) -> SyncResult<EntityReport>
where
    D: Destination + Clone + Send + Sync + 'static,
    S: Stream<Item = SyncResult<SourceRow>>,
{
    let semaphore = Arc::new(Semaphore::new(usize::from(max_in_flight.max(1))));
    let mut join_set: JoinSet<RowTaskResult> = JoinSet::new();
    let mut report = EntityReport::default();
    let mut rows = pin!(rows);
    let mut shutdown_open = true;
    let mut cancelled = false;

    loop {
        while let Some(result) = join_set.try_join_next() {
            if let Err(err) = collect(kind, &mut report, result) {
                join_set.abort_all();
                return Err(err);
            }
        }

        let next = tokio::select! {
            biased;

            changed = shutdown_rx.changed(), if shutdown_open => {
                if changed.is_err() {
                    // Sender dropped, a shutdown can no longer be requested.
                    shutdown_open = false;
                    continue;
                }

                info!(%kind, in_flight = join_set.len(), "shutdown requested, no longer dispatching rows");
                cancelled = true;
                break;
            }
            row = rows.next() => row,
        };

        let Some(row) = next else {
            break;
        };

        let row = match row {
            Ok(row) => row,
            Err(err) if err.is_fatal() => {
                error!(%kind, error = %err, "extraction failed, aborting in flight rows");
                join_set.abort_all();
                return Err(err);
            }
            Err(err) => {
                warn!(%kind, error = %err, "source row could not be read");
                report.record_error();
                continue;
            }
        };

        let record = match map_row(kind, &row) {
            Ok(record) => record,
            Err(err) => {
                warn!(
                    %kind,
                    row = %kind.describe_row(&row),
                    error = %err,
                    "source row could not be mapped"
                );
                report.record_error();
                continue;
            }
        };

        // Hold the slot until the upsert is done.
        let permit = semaphore.clone().acquire_owned().await.map_err(|err| {
            sync_error!(
                ErrorKind::InvalidState,
                "Could not acquire a row slot",
                err.to_string()
            )
        })?;

        let destination = destination.clone();
        join_set.spawn(
            async move {
                let key = record.natural_key();
                let result = upsert(&destination, &record).await;

                drop(permit);

                (key, result)
            }
            .in_current_span(),
        );
    }

    while let Some(result) = join_set.join_next().await {
        if let Err(err) = collect(kind, &mut report, result) {
            join_set.abort_all();
            return Err(err);
        }
    }

    if cancelled {
        bail!(
            ErrorKind::Cancelled,
            "Sync run was cancelled",
            format!("{kind} stopped after {}", report)
        );
    }

    Ok(report)
}

/// Adds a finished row task to `report`, returning fatal errors.
fn collect(
    kind: EntityKind,
    report: &mut EntityReport,
    result: Result<RowTaskResult, JoinError>,
) -> SyncResult<()> {
    match result {
        Ok((_, Ok(outcome))) => report.record(outcome),
        Ok((key, Err(err))) if !err.is_fatal() => {
            warn!(%kind, %key, error = %err, "row could not be written");
            report.record_error();
        }
        Ok((key, Err(err))) => {
            error!(%kind, %key, error = %err, "row failed with a fatal error, aborting in flight rows");
            return Err(err);
        }
        Err(join_err) => {
            let err = sync_error!(
                ErrorKind::RowTaskPanic,
                "Row task panicked",
                join_err.to_string()
            );
            error!(%kind, error = %err, "row task panicked");
            report.record_error();
        }
    }

    Ok(())
}
