//! Throwaway databases for tests that need a MySQL server.
//!
//! The server comes from `TESTS_MYSQL_HOST`, `TESTS_MYSQL_PORT`, `TESTS_MYSQL_USERNAME` and
//! `TESTS_MYSQL_PASSWORD`.

use consig_config::shared::{MySqlConnectionConfig, TlsConfig};
use secrecy::SecretString;
use sqlx::{Connection, Executor, MySqlConnection, MySqlPool};
use uuid::Uuid;

/// The legacy tables read by the sync. Column types vary on purpose, as they do in the
/// production store.
pub const LEGACY_SCHEMA: &str = r#"
    CREATE TABLE socios (
        empresa INT NOT NULL,
        matricula VARCHAR(20) NOT NULL,
        nome VARCHAR(120),
        cpf CHAR(11),
        email VARCHAR(120),
        celular VARCHAR(20),
        ativo CHAR(1),
        bloqueado TINYINT,
        limite DECIMAL(12, 2),
        data_alteracao DATETIME,
        PRIMARY KEY (empresa, matricula)
    );

    CREATE TABLE vendas (
        empresa SMALLINT NOT NULL,
        sequencia BIGINT UNSIGNED NOT NULL,
        matricula VARCHAR(20),
        convenio VARCHAR(40),
        data_emissao DATE,
        qtd_parcelas INT,
        valor_parcela DOUBLE,
        cancelada CHAR(1),
        data_alteracao TIMESTAMP NULL,
        PRIMARY KEY (empresa, sequencia)
    );

    CREATE TABLE parcelas (
        empresa INT NOT NULL,
        sequencia INT NOT NULL,
        parcela INT NOT NULL,
        matricula VARCHAR(20),
        vencimento DATE,
        valor DECIMAL(12, 2),
        baixa CHAR(1),
        data_baixa DATE,
        data_alteracao DATETIME,
        PRIMARY KEY (empresa, sequencia, parcela)
    );
"#;

/// Returns a config pointing at a new, not yet created database, or `None` when
/// `TESTS_MYSQL_HOST` is unset.
pub fn local_mysql_connection_config() -> Option<MySqlConnectionConfig> {
    let host = std::env::var("TESTS_MYSQL_HOST").ok()?;

    Some(MySqlConnectionConfig {
        host,
        port: std::env::var("TESTS_MYSQL_PORT")
            .map(|port| {
                port.parse()
                    .expect("TESTS_MYSQL_PORT must be a valid port number")
            })
            .unwrap_or(3306),
        name: format!("consig_test_{}", Uuid::new_v4().simple()),
        username: std::env::var("TESTS_MYSQL_USERNAME").unwrap_or_else(|_| "root".to_string()),
        password: std::env::var("TESTS_MYSQL_PASSWORD")
            .ok()
            .map(SecretString::new),
        tls: TlsConfig::disabled(),
    })
}

/// Creates the database named in `config` with the legacy tables and returns a pool to it.
///
/// # Panics
/// Panics if the server is unreachable or a statement fails.
pub async fn create_mysql_database(config: &MySqlConnectionConfig) -> MySqlPool {
    let mut connection = MySqlConnection::connect_with(&config.without_db())
        .await
        .expect("Failed to connect to MySQL");
    connection
        .execute(&*format!("CREATE DATABASE `{}`", config.name))
        .await
        .expect("Failed to create database");

    let pool = MySqlPool::connect_with(config.with_db())
        .await
        .expect("Failed to connect to the new database");
    sqlx::raw_sql(LEGACY_SCHEMA)
        .execute(&pool)
        .await
        .expect("Failed to create the legacy tables");

    pool
}

/// Drops the database named in `config`. Problems are printed, never raised.
pub async fn drop_mysql_database(config: &MySqlConnectionConfig) {
    let mut connection = match MySqlConnection::connect_with(&config.without_db()).await {
        Ok(connection) => connection,
        Err(err) => {
            eprintln!("warning: could not connect to drop {}: {err}", config.name);
            return;
        }
    };

    if let Err(err) = connection
        .execute(&*format!("DROP DATABASE IF EXISTS `{}`", config.name))
        .await
    {
        eprintln!("warning: {} was not dropped: {err}", config.name);
    }
}
