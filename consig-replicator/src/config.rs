use consig_config::load_config;
use consig_config::shared::SyncJobConfig;

use crate::error::{ReplicatorError, ReplicatorResult};

/// Loads the sync job configuration from `configuration/` in the working directory.
///
/// Validation failures are reported as configuration errors like parse failures are.
pub fn load_sync_job_config() -> ReplicatorResult<SyncJobConfig> {
    load_config::<SyncJobConfig>().map_err(ReplicatorError::config)
}
