use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sqlx::mysql::{MySqlConnectOptions, MySqlSslMode};
use sqlx::postgres::{PgConnectOptions, PgSslMode};
use std::sync::LazyLock;

use crate::shared::ValidationError;

const COMMON_DATESTYLE: &str = "ISO";
const COMMON_CLIENT_ENCODING: &str = "UTF8";
const COMMON_TIMEZONE: &str = "UTC";

const APP_NAME_SYNC_WRITER: &str = "consig_sync_writer";

/// Session settings applied to every destination connection used by the sync writer.
///
/// Statements are short single-row lookups and writes, so a tight statement timeout surfaces
/// a stuck destination as a row error instead of a hung run.
pub static SYNC_WRITER_OPTIONS: LazyLock<PgConnectionOptions> =
    LazyLock::new(|| PgConnectionOptions {
        datestyle: COMMON_DATESTYLE.to_string(),
        client_encoding: COMMON_CLIENT_ENCODING.to_string(),
        timezone: COMMON_TIMEZONE.to_string(),
        statement_timeout: 30_000,
        lock_timeout: 10_000,
        application_name: APP_NAME_SYNC_WRITER.to_string(),
    });

#[derive(Debug, Clone)]
pub struct PgConnectionOptions {
    pub datestyle: String,
    pub client_encoding: String,
    pub timezone: String,
    pub statement_timeout: u32,
    pub lock_timeout: u32,
    pub application_name: String,
}

impl PgConnectionOptions {
    pub fn to_key_value_pairs(&self) -> Vec<(String, String)> {
        vec![
            ("datestyle".to_string(), self.datestyle.clone()),
            ("client_encoding".to_string(), self.client_encoding.clone()),
            ("timezone".to_string(), self.timezone.clone()),
            (
                "statement_timeout".to_string(),
                self.statement_timeout.to_string(),
            ),
            ("lock_timeout".to_string(), self.lock_timeout.to_string()),
        ]
    }
}

/// TLS settings shared by the source and destination connections.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TlsConfig {
    /// PEM-encoded trusted root certificates.
    #[serde(default)]
    pub trusted_root_certs: String,
    pub enabled: bool,
}

impl TlsConfig {
    pub fn disabled() -> Self {
        Self {
            trusted_root_certs: String::new(),
            enabled: false,
        }
    }

    fn validate(&self, connection: &'static str) -> Result<(), ValidationError> {
        if self.enabled && self.trusted_root_certs.is_empty() {
            return Err(ValidationError::MissingTrustedRootCerts { connection });
        }

        Ok(())
    }
}

/// Connection to the legacy MySQL store. The sync only ever reads from it.
#[derive(Debug, Clone, Deserialize)]
pub struct MySqlConnectionConfig {
    pub host: String,
    pub port: u16,
    pub name: String,
    pub username: String,
    /// Usually provided through `APP_SOURCE__PASSWORD`.
    pub password: Option<SecretString>,
    pub tls: TlsConfig,
}

impl MySqlConnectionConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.tls.validate("source")
    }

    /// Returns connect options for the server, without selecting a database.
    pub fn without_db(&self) -> MySqlConnectOptions {
        let ssl_mode = if self.tls.enabled {
            MySqlSslMode::VerifyCa
        } else {
            MySqlSslMode::Preferred
        };

        let mut options = MySqlConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.username)
            .charset("utf8mb4")
            .ssl_mode(ssl_mode);

        if self.tls.enabled {
            options = options.ssl_ca_from_pem(self.tls.trusted_root_certs.clone().into_bytes());
        }

        if let Some(password) = &self.password {
            options = options.password(password.expose_secret());
        }

        options
    }

    /// Returns connect options for the configured database.
    pub fn with_db(&self) -> MySqlConnectOptions {
        self.without_db().database(&self.name)
    }
}

/// Connection to the PostgreSQL database the application reads from.
#[derive(Debug, Clone, Deserialize)]
pub struct PgConnectionConfig {
    pub host: String,
    pub port: u16,
    pub name: String,
    pub username: String,
    /// Usually provided through `APP_DESTINATION__PASSWORD`.
    pub password: Option<SecretString>,
    pub tls: TlsConfig,
}

impl PgConnectionConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.tls.validate("destination")
    }

    /// Returns connect options for the server with optional session settings, without
    /// selecting a database.
    pub fn without_db(&self, options: Option<&PgConnectionOptions>) -> PgConnectOptions {
        let ssl_mode = if self.tls.enabled {
            PgSslMode::VerifyFull
        } else {
            PgSslMode::Prefer
        };

        let mut connect_options = PgConnectOptions::new_without_pgpass()
            .host(&self.host)
            .port(self.port)
            .username(&self.username)
            .ssl_mode(ssl_mode)
            .ssl_root_cert_from_pem(self.tls.trusted_root_certs.clone().into_bytes());

        if let Some(password) = &self.password {
            connect_options = connect_options.password(password.expose_secret());
        }

        if let Some(opts) = options {
            connect_options = connect_options
                .application_name(&opts.application_name)
                .options(opts.to_key_value_pairs());
        }

        connect_options
    }

    /// Returns connect options for the configured database with optional session settings.
    pub fn with_db(&self, options: Option<&PgConnectionOptions>) -> PgConnectOptions {
        self.without_db(options).database(&self.name)
    }
}
