//! Throwaway databases for tests that need a PostgreSQL server.
//!
//! The server comes from `TESTS_POSTGRES_HOST`, `TESTS_POSTGRES_PORT`,
//! `TESTS_POSTGRES_USERNAME` and `TESTS_POSTGRES_PASSWORD`. Each config gets a fresh database
//! name, so tests can run in parallel against one server.

use consig_config::shared::{PgConnectionConfig, TlsConfig};
use secrecy::SecretString;
use sqlx::{Connection, Executor, PgConnection, PgPool};
use uuid::Uuid;

/// Tables written by the sync, with the natural-key unique constraints and foreign keys the
/// destination relies on.
pub const DESTINATION_SCHEMA: &str = r#"
    create table socios (
        id bigserial primary key,
        empresa text not null,
        matricula text not null,
        nome text,
        cpf text,
        email text,
        celular text,
        ativo boolean,
        bloqueado boolean,
        limite numeric(14, 2),
        created_at timestamptz not null default now(),
        updated_at timestamptz not null default now(),
        unique (empresa, matricula)
    );

    create table vendas (
        id bigserial primary key,
        socio_id bigint not null references socios (id),
        empresa text not null,
        sequencia text not null,
        convenio text,
        data_emissao date,
        qtd_parcelas integer,
        valor_parcela numeric(14, 2),
        cancelada boolean,
        created_at timestamptz not null default now(),
        updated_at timestamptz not null default now(),
        unique (empresa, sequencia)
    );

    create table parcelas (
        id bigserial primary key,
        venda_id bigint not null references vendas (id),
        empresa text not null,
        sequencia text not null,
        numero integer not null,
        matricula text not null,
        vencimento date,
        valor numeric(14, 2),
        paga boolean,
        data_pagamento date,
        created_at timestamptz not null default now(),
        updated_at timestamptz not null default now(),
        unique (empresa, sequencia, numero)
    );
"#;

/// Returns a config pointing at a new, not yet created database, or `None` when
/// `TESTS_POSTGRES_HOST` is unset.
pub fn local_pg_connection_config() -> Option<PgConnectionConfig> {
    let host = std::env::var("TESTS_POSTGRES_HOST").ok()?;

    Some(PgConnectionConfig {
        host,
        port: std::env::var("TESTS_POSTGRES_PORT")
            .map(|port| {
                port.parse()
                    .expect("TESTS_POSTGRES_PORT must be a valid port number")
            })
            .unwrap_or(5432),
        name: format!("consig_test_{}", Uuid::new_v4().simple()),
        username: std::env::var("TESTS_POSTGRES_USERNAME")
            .unwrap_or_else(|_| "postgres".to_string()),
        password: std::env::var("TESTS_POSTGRES_PASSWORD")
            .ok()
            .map(SecretString::new),
        tls: TlsConfig::disabled(),
    })
}

/// Creates the database named in `config` and returns a pool connected to it.
///
/// # Panics
/// Panics if the server is unreachable or the database cannot be created.
pub async fn create_pg_database(config: &PgConnectionConfig) -> PgPool {
    let mut connection = PgConnection::connect_with(&config.without_db(None))
        .await
        .expect("Failed to connect to Postgres");
    connection
        .execute(&*format!(r#"create database "{}";"#, config.name))
        .await
        .expect("Failed to create database");

    PgPool::connect_with(config.with_db(None))
        .await
        .expect("Failed to connect to the new database")
}

/// Creates `socios`, `vendas` and `parcelas` in the database behind `pool`.
///
/// # Panics
/// Panics if the statements fail.
pub async fn apply_destination_schema(pool: &PgPool) {
    sqlx::raw_sql(DESTINATION_SCHEMA)
        .execute(pool)
        .await
        .expect("Failed to create the destination tables");
}

/// Drops the database named in `config` after closing its remaining sessions.
///
/// Cleanup problems are printed, never raised, so a failing test keeps its own error.
pub async fn drop_pg_database(config: &PgConnectionConfig) {
    let mut connection = match PgConnection::connect_with(&config.without_db(None)).await {
        Ok(connection) => connection,
        Err(err) => {
            eprintln!("warning: could not connect to drop {}: {err}", config.name);
            return;
        }
    };

    let terminate = format!(
        "select pg_terminate_backend(pid) from pg_stat_activity \
         where datname = '{}' and pid <> pg_backend_pid();",
        config.name
    );
    if let Err(err) = connection.execute(&*terminate).await {
        eprintln!("warning: sessions of {} were not terminated: {err}", config.name);
    }

    if let Err(err) = connection
        .execute(&*format!(r#"drop database if exists "{}";"#, config.name))
        .await
    {
        eprintln!("warning: {} was not dropped: {err}", config.name);
    }
}
