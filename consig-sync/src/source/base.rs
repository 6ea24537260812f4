use chrono::NaiveDateTime;
use futures::stream::BoxStream;

use crate::error::SyncResult;
use crate::types::{EntityKind, SourceRow};

/// Trait for stores the sync extracts rows from.
///
/// A [`Source`] yields the rows of one [`EntityKind`] as a lazy stream of untyped
/// [`SourceRow`]s. With `changed_since` set, only rows whose change timestamp is at or after
/// that instant are returned; rows without a change timestamp are then skipped.
///
/// Extraction is sequential: the pipeline drains one stream before asking for the next, so
/// implementations can serve every kind from a single connection. Errors that are fatal per
/// [`crate::error::SyncError::is_fatal`] end the run; other errors are counted against the row
/// that could not be read.
pub trait Source {
    /// Returns the name of the source.
    fn name() -> &'static str;

    /// Returns the rows of `kind`, optionally restricted to recently changed ones.
    fn rows(
        &mut self,
        kind: EntityKind,
        changed_since: Option<NaiveDateTime>,
    ) -> BoxStream<'_, SyncResult<SourceRow>>;
}
