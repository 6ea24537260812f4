use std::fmt;
use std::io;

/// Variable selecting the environment, `dev` when unset.
const ENVIRONMENT_VAR: &str = "APP_ENVIRONMENT";

/// Where the sync job is running. Picks the `{environment}.yaml` layer and the log format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Dev,
    Prod,
}

impl Environment {
    /// Reads [`ENVIRONMENT_VAR`]. Unknown names are an error rather than a silent fallback.
    pub fn load() -> Result<Environment, io::Error> {
        match std::env::var(ENVIRONMENT_VAR) {
            Ok(name) => parse(&name),
            Err(_) => Ok(Environment::Dev),
        }
    }

    /// File stem of the environment layer.
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Dev => "dev",
            Environment::Prod => "prod",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn parse(name: &str) -> Result<Environment, io::Error> {
    [Environment::Dev, Environment::Prod]
        .into_iter()
        .find(|environment| name.trim().eq_ignore_ascii_case(environment.as_str()))
        .ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{ENVIRONMENT_VAR}=`{name}` is unknown, expected `dev` or `prod`"),
            )
        })
}
