//! The sync run: every selected entity kind, in foreign-key order.

use std::fmt;
use std::pin::Pin;

use chrono::NaiveDateTime;
use consig_config::shared::SyncConfig;
use futures::StreamExt;
use tracing::{debug, error, info};

use crate::bail;
use crate::concurrency::shutdown::{
    ShutdownRx, ShutdownTx, create_shutdown_channel, is_shutdown_requested,
};
use crate::destination::Destination;
use crate::error::{ErrorKind, SyncResult};
use crate::report::{EntityReport, RunReport};
use crate::source::Source;
use crate::types::EntityKind;
use crate::workers::fan_out;

/// Where a [`SyncPipeline`] currently is.
///
/// A run moves through `Extracting(kind)` then `Writing(kind)` for each selected kind in
/// processing order and ends in `Reported`, or in `Failed` when a fatal error stopped it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    NotStarted,
    Extracting(EntityKind),
    Writing(EntityKind),
    Reported,
    Failed,
}

impl fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncPhase::NotStarted => f.write_str("not_started"),
            SyncPhase::Extracting(kind) => write!(f, "extracting_{kind}"),
            SyncPhase::Writing(kind) => write!(f, "writing_{kind}"),
            SyncPhase::Reported => f.write_str("reported"),
            SyncPhase::Failed => f.write_str("failed"),
        }
    }
}

/// What a single run should synchronize.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunOptions {
    /// Kinds to process. Empty means every kind.
    pub kinds: Vec<EntityKind>,
    /// Only extract rows changed at or after this instant.
    pub changed_since: Option<NaiveDateTime>,
}

impl RunOptions {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn only(kinds: impl IntoIterator<Item = EntityKind>) -> Self {
        Self {
            kinds: kinds.into_iter().collect(),
            changed_since: None,
        }
    }

    /// Returns the kinds to process, deduplicated and in processing order.
    pub fn selected_kinds(&self) -> Vec<EntityKind> {
        if self.kinds.is_empty() {
            return EntityKind::ALL.to_vec();
        }

        let mut kinds = self.kinds.clone();
        kinds.sort();
        kinds.dedup();
        kinds
    }
}

/// Synchronizes entity kinds from a [`Source`] into a [`Destination`].
///
/// Kinds run strictly one after the other so that every parent row has been written before
/// its children are. Within a kind, rows are upserted concurrently up to the cap configured
/// for that kind. A pipeline can be run any number of times; each run starts a fresh report.
#[derive(Debug)]
pub struct SyncPipeline<S, D> {
    config: SyncConfig,
    source: S,
    destination: D,
    phase: SyncPhase,
    shutdown_tx: ShutdownTx,
}

impl<S, D> SyncPipeline<S, D>
where
    S: Source,
    D: Destination + Clone + Send + Sync + 'static,
{
    pub fn new(config: SyncConfig, source: S, destination: D) -> Self {
        // Receivers are created per run from the sender.
        let (shutdown_tx, _) = create_shutdown_channel();

        Self {
            config,
            source,
            destination,
            phase: SyncPhase::NotStarted,
            shutdown_tx,
        }
    }

    pub fn phase(&self) -> SyncPhase {
        self.phase
    }

    /// Returns a handle that stops a running run, see [`crate::workers::fan_out`].
    pub fn shutdown_tx(&self) -> ShutdownTx {
        self.shutdown_tx.clone()
    }

    /// Runs the selected kinds and returns their counters.
    ///
    /// Row-local errors are counted in the report. Connection and extraction failures stop
    /// the run, leave the pipeline in [`SyncPhase::Failed`] and are returned.
    pub async fn run(&mut self, options: &RunOptions) -> SyncResult<RunReport> {
        let shutdown_rx = self.shutdown_tx.subscribe();
        let kinds = options.selected_kinds();

        self.phase = SyncPhase::NotStarted;

        info!(
            source = S::name(),
            destination = D::name(),
            ?kinds,
            changed_since = ?options.changed_since,
            "starting sync run"
        );

        let mut report = RunReport::new();
        for kind in kinds {
            match self
                .sync_kind(kind, options.changed_since, shutdown_rx.clone())
                .await
            {
                Ok(entity_report) => {
                    info!(
                        %kind,
                        inserted = entity_report.inserted,
                        updated = entity_report.updated,
                        unchanged = entity_report.unchanged,
                        errored = entity_report.errored,
                        "entity kind synchronized"
                    );
                    report.push(kind, entity_report);
                }
                Err(err) => {
                    error!(phase = %self.phase, error = %err, "sync run failed");
                    transition(&mut self.phase, SyncPhase::Failed);

                    return Err(err);
                }
            }
        }

        transition(&mut self.phase, SyncPhase::Reported);

        let totals = report.totals();
        info!(
            inserted = totals.inserted,
            updated = totals.updated,
            unchanged = totals.unchanged,
            errored = totals.errored,
            "sync run finished"
        );

        Ok(report)
    }

    async fn sync_kind(
        &mut self,
        kind: EntityKind,
        changed_since: Option<NaiveDateTime>,
        shutdown_rx: ShutdownRx,
    ) -> SyncResult<EntityReport> {
        if is_shutdown_requested(&shutdown_rx) {
            bail!(
                ErrorKind::Cancelled,
                "Sync run was cancelled",
                format!("stopped before {kind}")
            );
        }

        transition(&mut self.phase, SyncPhase::Extracting(kind));

        let mut rows = self.source.rows(kind, changed_since).peekable();
        // Issues the extraction query, so an unreachable source fails while extracting.
        if let Some(Err(err)) = Pin::new(&mut rows).peek().await
            && err.is_fatal()
        {
            return Err(err.clone());
        }

        transition(&mut self.phase, SyncPhase::Writing(kind));

        let max_in_flight = max_in_flight(&self.config, kind);
        fan_out(
            kind,
            rows,
            max_in_flight,
            self.destination.clone(),
            shutdown_rx,
        )
        .await
    }
}

fn transition(current: &mut SyncPhase, next: SyncPhase) {
    debug!(from = %current, to = %next, "sync phase transition");
    *current = next;
}

fn max_in_flight(config: &SyncConfig, kind: EntityKind) -> u16 {
    match kind {
        EntityKind::Members => config.members.max_concurrency,
        EntityKind::Sales => config.sales.max_concurrency,
        EntityKind::Installments => config.installments.max_concurrency,
    }
}
