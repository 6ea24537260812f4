use std::collections::HashMap;
use std::sync::Arc;

use chrono::NaiveDateTime;
use futures::StreamExt;
use futures::stream::{self, BoxStream};
use tokio::sync::Mutex;

use crate::error::{ErrorKind, SyncResult};
use crate::source::Source;
use crate::sync_error;
use crate::types::{EntityKind, SourceRow, SourceValue};

#[derive(Debug, Default)]
struct Inner {
    rows: HashMap<EntityKind, Vec<SourceRow>>,
    /// Kinds whose extraction fails after yielding the given number of rows.
    failures: HashMap<EntityKind, usize>,
    extractions: Vec<EntityKind>,
}

/// In-memory source used by tests and local runs.
///
/// Clones share the same rows, so a test can change the legacy data between two runs of the
/// same pipeline.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    inner: Arc<Mutex<Inner>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends rows of `kind`.
    pub async fn add_rows(&self, kind: EntityKind, rows: impl IntoIterator<Item = SourceRow>) {
        let mut inner = self.inner.lock().await;
        inner.rows.entry(kind).or_default().extend(rows);
    }

    /// Replaces every row of `kind`.
    pub async fn set_rows(&self, kind: EntityKind, rows: Vec<SourceRow>) {
        let mut inner = self.inner.lock().await;
        inner.rows.insert(kind, rows);
    }

    /// Makes the extraction of `kind` fail with a query error after `after_rows` rows.
    pub async fn fail_extraction(&self, kind: EntityKind, after_rows: usize) {
        let mut inner = self.inner.lock().await;
        inner.failures.insert(kind, after_rows);
    }

    /// Returns the kinds extracted so far, in extraction order.
    pub async fn extractions(&self) -> Vec<EntityKind> {
        let inner = self.inner.lock().await;
        inner.extractions.clone()
    }
}

impl Source for MemorySource {
    fn name() -> &'static str {
        "memory"
    }

    fn rows(
        &mut self,
        kind: EntityKind,
        changed_since: Option<NaiveDateTime>,
    ) -> BoxStream<'_, SyncResult<SourceRow>> {
        let inner = self.inner.clone();

        stream::once(async move {
            let mut inner = inner.lock().await;
            inner.extractions.push(kind);

            let changed_at_column = kind.spec().changed_at_column;
            let mut rows: Vec<SyncResult<SourceRow>> = inner
                .rows
                .get(&kind)
                .into_iter()
                .flatten()
                .filter(|row| match changed_since {
                    Some(since) => changed_at(row.get(changed_at_column))
                        .is_some_and(|changed_at| changed_at >= since),
                    None => true,
                })
                .cloned()
                .map(Ok)
                .collect();

            if let Some(after_rows) = inner.failures.get(&kind).copied() {
                rows.truncate(after_rows);
                rows.push(Err(sync_error!(
                    ErrorKind::SourceQueryFailed,
                    "Source query failed",
                    format!("extraction of {kind} was configured to fail")
                )));
            }

            stream::iter(rows)
        })
        .flatten()
        .boxed()
    }
}

fn changed_at(value: &SourceValue) -> Option<NaiveDateTime> {
    match value {
        SourceValue::DateTime(date_time) => Some(*date_time),
        SourceValue::Date(date) => date.and_hms_opt(0, 0, 0),
        _ => None,
    }
}
