use consig_config::shared::MySqlConnectionConfig;
use sqlx::{Connection, MySqlConnection, Row};
use tracing::info;

use crate::version::extract_server_version;

/// Opens the single read-only connection used for extraction.
///
/// The session is switched to read-only so a bad query can never modify the legacy data.
pub async fn connect_source(config: &MySqlConnectionConfig) -> Result<MySqlConnection, sqlx::Error> {
    let mut connection = MySqlConnection::connect_with(&config.with_db()).await?;

    sqlx::query("SET SESSION TRANSACTION READ ONLY")
        .execute(&mut connection)
        .await?;

    let version: String = sqlx::query("SELECT VERSION() AS version")
        .fetch_one(&mut connection)
        .await?
        .try_get("version")?;

    info!(
        host = %config.host,
        database = %config.name,
        server_version = %version,
        numeric_version = extract_server_version(&version).map(|v| v.get()),
        "connected to source database"
    );

    Ok(connection)
}
