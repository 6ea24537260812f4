use std::time::Duration;

use consig_config::shared::{PgConnectionConfig, SYNC_WRITER_OPTIONS};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tracing::info;

/// How long a row task waits for a pooled connection before failing.
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(30);

/// Creates the destination pool and checks that the database is reachable.
///
/// `max_connections` should cover the sum of the per-kind concurrency caps, otherwise row tasks
/// queue on the pool instead of on the fan-out.
pub async fn connect_destination(
    config: &PgConnectionConfig,
    max_connections: u32,
) -> Result<PgPool, sqlx::Error> {
    let pool = PgPoolOptions::new()
        .min_connections(1)
        .max_connections(max_connections)
        .acquire_timeout(ACQUIRE_TIMEOUT)
        .connect_with(config.with_db(Some(&SYNC_WRITER_OPTIONS)))
        .await?;

    sqlx::query("select 1").execute(&pool).await?;

    info!(
        host = %config.host,
        database = %config.name,
        max_connections,
        "connected to destination database"
    );

    Ok(pool)
}
