use std::future::Future;

use crate::error::SyncResult;
use crate::types::{NaturalKey, Record};

/// Internal id the destination assigns to a row.
pub type RowId = i64;

/// A record as currently stored in the destination, with its internal id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredRecord {
    pub id: RowId,
    pub record: Record,
}

/// Trait for stores the sync writes records into.
///
/// Operations work on one record at a time and are called concurrently by the fan-out, so
/// implementations must be safe to share between tasks. Each call is its own atomic unit.
///
/// Failures must be classified through [`crate::error::ErrorKind`]:
/// - a natural key collision with a concurrent writer is a `WriteConflict`,
/// - a sale or installment whose parent row is absent is a `MissingParent`,
/// - an unreachable database is a `DestinationConnectionFailed`.
pub trait Destination {
    /// Returns the name of the destination.
    fn name() -> &'static str;

    /// Looks up the stored row with `key`.
    fn find(
        &self,
        key: &NaturalKey,
    ) -> impl Future<Output = SyncResult<Option<StoredRecord>>> + Send;

    /// Inserts a new row and returns its id. Foreign keys are resolved from the parent's
    /// natural key.
    fn insert(&self, record: &Record) -> impl Future<Output = SyncResult<RowId>> + Send;

    /// Overwrites every mapped field of the row with `id`.
    fn update(&self, id: RowId, record: &Record) -> impl Future<Output = SyncResult<()>> + Send;
}
