use serde::Deserialize;

use crate::Config;
use crate::shared::{MySqlConnectionConfig, PgConnectionConfig, SyncConfig, ValidationError};

/// Complete configuration of the sync job binary.
///
/// Does not implement `Serialize` so the connection secrets cannot leak into serialized forms.
#[derive(Debug, Clone, Deserialize)]
pub struct SyncJobConfig {
    /// Legacy MySQL store rows are read from.
    pub source: MySqlConnectionConfig,
    /// PostgreSQL database rows are upserted into.
    pub destination: PgConnectionConfig,
    #[serde(default)]
    pub sync: SyncConfig,
}

impl Config for SyncJobConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        self.source.validate()?;
        self.destination.validate()?;
        self.sync.validate()
    }
}
