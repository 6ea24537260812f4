//! Classification of sqlx errors by Postgres SQLSTATE.

/// `unique_violation`.
pub const UNIQUE_VIOLATION: &str = "23505";

/// `foreign_key_violation`.
pub const FOREIGN_KEY_VIOLATION: &str = "23503";

/// `serialization_failure`, raised when two writers race on the same row.
pub const SERIALIZATION_FAILURE: &str = "40001";

/// Class `08`, connection exceptions.
const CONNECTION_EXCEPTION_CLASS: &str = "08";

/// Class `57P`, operator intervention such as an admin shutdown.
const OPERATOR_INTERVENTION_CLASS: &str = "57P";

/// Returns the SQLSTATE of a database error, if any.
pub fn sqlstate(err: &sqlx::Error) -> Option<String> {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().map(|code| code.into_owned()),
        _ => None,
    }
}

/// Returns whether the error is a natural-key collision between concurrent writers.
pub fn is_write_conflict(err: &sqlx::Error) -> bool {
    matches!(
        sqlstate(err).as_deref(),
        Some(UNIQUE_VIOLATION) | Some(SERIALIZATION_FAILURE)
    )
}

/// Returns whether the error is a missing parent row.
pub fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    sqlstate(err).as_deref() == Some(FOREIGN_KEY_VIOLATION)
}

/// Returns whether the error means the database cannot be reached at all.
pub fn is_connection_error(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed => true,
        sqlx::Error::Database(_) => sqlstate(err).is_some_and(|code| {
            code.starts_with(CONNECTION_EXCEPTION_CLASS)
                || code.starts_with(OPERATOR_INTERVENTION_CLASS)
        }),
        _ => false,
    }
}
