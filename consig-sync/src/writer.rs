//! Idempotent upsert of a single record.

use std::fmt;

use tracing::debug;

use crate::destination::Destination;
use crate::error::{ErrorKind, SyncResult};
use crate::types::Record;

/// What an upsert did to the destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Inserted,
    Updated,
    Unchanged,
}

impl fmt::Display for WriteOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriteOutcome::Inserted => f.write_str("inserted"),
            WriteOutcome::Updated => f.write_str("updated"),
            WriteOutcome::Unchanged => f.write_str("unchanged"),
        }
    }
}

/// Makes the destination row of `record` match it.
///
/// Inserts when no row has the record's natural key, updates by internal id when a stored
/// field differs and does nothing otherwise. When the write collides with a concurrent writer
/// the whole decision is taken again once from a fresh read; a second collision is returned.
pub async fn upsert<D>(destination: &D, record: &Record) -> SyncResult<WriteOutcome>
where
    D: Destination,
{
    match try_upsert(destination, record).await {
        Err(err) if err.kind() == ErrorKind::WriteConflict => {
            debug!(
                key = %record.natural_key(),
                "write conflict, retrying from a fresh read"
            );

            try_upsert(destination, record).await
        }
        result => result,
    }
}

async fn try_upsert<D>(destination: &D, record: &Record) -> SyncResult<WriteOutcome>
where
    D: Destination,
{
    let key = record.natural_key();

    match destination.find(&key).await? {
        None => {
            destination.insert(record).await?;
            Ok(WriteOutcome::Inserted)
        }
        Some(stored) if stored.record == *record => Ok(WriteOutcome::Unchanged),
        Some(stored) => {
            destination.update(stored.id, record).await?;
            Ok(WriteOutcome::Updated)
        }
    }
}
