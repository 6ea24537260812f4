//! Error types and result definitions for sync operations.
//!
//! [`SyncError`] carries an [`ErrorKind`] used to decide whether a failure is local to one row
//! (counted in the report, run continues) or fatal (the run aborts). Errors keep a static
//! description, an optional dynamic detail, the originating error and the callsite location.
//! Each error describes one failure; row failures are counted in the report, not collected.

use std::borrow::Cow;
use std::error;
use std::fmt;
use std::panic::Location;
use std::sync::Arc;

use consig_postgres::sqlstate;

/// Convenient result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Main error type of the sync library.
#[derive(Debug, Clone)]
pub struct SyncError {
    kind: ErrorKind,
    description: Cow<'static, str>,
    detail: Option<Cow<'static, str>>,
    source: Option<Arc<dyn error::Error + Send + Sync>>,
    location: &'static Location<'static>,
}

/// Categories of failures that can happen during a sync run.
#[derive(PartialEq, Eq, Copy, Clone, Debug, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    // Connection errors, always fatal.
    SourceConnectionFailed,
    DestinationConnectionFailed,

    // Query errors
    SourceQueryFailed,
    DestinationQueryFailed,

    // Mapping errors
    MissingNaturalKey,
    ConversionError,

    // Write errors
    WriteConflict,
    MissingParent,

    // Run errors
    IoError,
    InvalidState,
    RowTaskPanic,
    Cancelled,
}

impl ErrorKind {
    /// Returns whether an error of this kind only affects the row that produced it.
    ///
    /// Row-local errors are counted as `errored` and the run goes on. Everything else aborts
    /// the run, which covers unreachable databases and broken extraction queries.
    pub fn is_row_local(&self) -> bool {
        matches!(
            self,
            ErrorKind::MissingNaturalKey
                | ErrorKind::ConversionError
                | ErrorKind::WriteConflict
                | ErrorKind::MissingParent
                | ErrorKind::DestinationQueryFailed
                | ErrorKind::RowTaskPanic
        )
    }
}

impl SyncError {
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns whether this error must abort the run.
    pub fn is_fatal(&self) -> bool {
        !self.kind.is_row_local()
    }

    pub fn detail(&self) -> Option<&str> {
        self.detail.as_deref()
    }

    /// Attaches the originating error.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: error::Error + Send + Sync + 'static,
    {
        self.source = Some(Arc::new(source));
        self
    }

    /// Classifies an error returned by the legacy source database.
    #[track_caller]
    pub fn from_source(err: sqlx::Error) -> SyncError {
        let (kind, description) = if sqlstate::is_connection_error(&err) {
            (
                ErrorKind::SourceConnectionFailed,
                "Source database connection failed",
            )
        } else {
            (ErrorKind::SourceQueryFailed, "Source query failed")
        };

        SyncError::from_sqlx(kind, description, err)
    }

    /// Classifies an error returned by the destination database.
    #[track_caller]
    pub fn from_destination(err: sqlx::Error) -> SyncError {
        let (kind, description) = if sqlstate::is_connection_error(&err) {
            (
                ErrorKind::DestinationConnectionFailed,
                "Destination database connection failed",
            )
        } else if sqlstate::is_write_conflict(&err) {
            (
                ErrorKind::WriteConflict,
                "Natural key collided with a concurrent write",
            )
        } else if sqlstate::is_foreign_key_violation(&err) {
            (ErrorKind::MissingParent, "Parent row does not exist")
        } else {
            (ErrorKind::DestinationQueryFailed, "Destination query failed")
        };

        SyncError::from_sqlx(kind, description, err)
    }

    #[track_caller]
    fn from_sqlx(kind: ErrorKind, description: &'static str, err: sqlx::Error) -> SyncError {
        let detail = err.to_string();
        SyncError::from_components(
            kind,
            Cow::Borrowed(description),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }

    #[track_caller]
    fn from_components(
        kind: ErrorKind,
        description: Cow<'static, str>,
        detail: Option<Cow<'static, str>>,
        source: Option<Arc<dyn error::Error + Send + Sync>>,
    ) -> Self {
        SyncError {
            kind,
            description,
            detail,
            source,
            location: Location::caller(),
        }
    }
}

impl PartialEq for SyncError {
    fn eq(&self, other: &SyncError) -> bool {
        self.kind == other.kind
    }
}

impl fmt::Display for SyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{:?}] {} @ {}:{}",
            self.kind,
            self.description,
            self.location.file(),
            self.location.line(),
        )?;

        if let Some(detail) = self.detail.as_deref() {
            for line in detail.lines() {
                write!(f, "\n  {line}")?;
            }
        }

        Ok(())
    }
}

impl error::Error for SyncError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|source| source.as_ref() as &(dyn error::Error + 'static))
    }
}

impl From<(ErrorKind, &'static str)> for SyncError {
    #[track_caller]
    fn from((kind, desc): (ErrorKind, &'static str)) -> SyncError {
        SyncError::from_components(kind, Cow::Borrowed(desc), None, None)
    }
}

impl<D> From<(ErrorKind, &'static str, D)> for SyncError
where
    D: Into<Cow<'static, str>>,
{
    #[track_caller]
    fn from((kind, desc, detail): (ErrorKind, &'static str, D)) -> SyncError {
        SyncError::from_components(kind, Cow::Borrowed(desc), Some(detail.into()), None)
    }
}

impl From<std::io::Error> for SyncError {
    #[track_caller]
    fn from(err: std::io::Error) -> SyncError {
        let detail = err.to_string();
        SyncError::from_components(
            ErrorKind::IoError,
            Cow::Borrowed("I/O operation failed"),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}

impl From<bigdecimal::ParseBigDecimalError> for SyncError {
    #[track_caller]
    fn from(err: bigdecimal::ParseBigDecimalError) -> SyncError {
        let detail = err.to_string();
        SyncError::from_components(
            ErrorKind::ConversionError,
            Cow::Borrowed("Decimal parsing failed"),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}

impl From<chrono::ParseError> for SyncError {
    #[track_caller]
    fn from(err: chrono::ParseError) -> SyncError {
        let detail = err.to_string();
        SyncError::from_components(
            ErrorKind::ConversionError,
            Cow::Borrowed("Date parsing failed"),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}

impl From<std::num::ParseIntError> for SyncError {
    #[track_caller]
    fn from(err: std::num::ParseIntError) -> SyncError {
        let detail = err.to_string();
        SyncError::from_components(
            ErrorKind::ConversionError,
            Cow::Borrowed("Integer parsing failed"),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}

impl From<std::num::TryFromIntError> for SyncError {
    #[track_caller]
    fn from(err: std::num::TryFromIntError) -> SyncError {
        let detail = err.to_string();
        SyncError::from_components(
            ErrorKind::ConversionError,
            Cow::Borrowed("Integer out of range"),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}
