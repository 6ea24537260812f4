use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// A per-kind concurrency cap was set to zero.
    #[error("`sync.{kind}.max_concurrency` cannot be zero")]
    MaxConcurrencyZero { kind: &'static str },
    /// The change look-back window was set to zero hours.
    #[error("`sync.changed_since_hours` cannot be zero, omit it to run a full sync")]
    ChangedSinceHoursZero,
    /// TLS is enabled but no trusted root certificates are provided.
    #[error("Invalid TLS config for {connection}: `trusted_root_certs` must be set when `enabled` is true")]
    MissingTrustedRootCerts { connection: &'static str },
}
