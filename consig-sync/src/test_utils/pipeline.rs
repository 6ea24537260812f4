use consig_config::shared::{EntityConfig, SyncConfig};

use crate::destination::memory::MemoryDestination;
use crate::pipeline::SyncPipeline;
use crate::source::memory::MemorySource;

/// Returns a sync config with the same concurrency cap for every kind.
pub fn sync_config_with_concurrency(max_concurrency: u16) -> SyncConfig {
    SyncConfig {
        members: EntityConfig::new(max_concurrency),
        sales: EntityConfig::new(max_concurrency),
        installments: EntityConfig::new(max_concurrency),
        changed_since_hours: None,
    }
}

/// Creates a pipeline over clones of `source` and `destination`, so the caller keeps handles
/// to inspect and mutate both.
pub fn create_memory_pipeline(
    source: &MemorySource,
    destination: &MemoryDestination,
    max_concurrency: u16,
) -> SyncPipeline<MemorySource, MemoryDestination> {
    SyncPipeline::new(
        sync_config_with_concurrency(max_concurrency),
        source.clone(),
        destination.clone(),
    )
}
