use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::environment::Environment;
use crate::shared::ValidationError;

/// Directory holding the configuration files, relative to the working directory.
const CONFIGURATION_DIR: &str = "configuration";

/// Accepted extensions, in lookup order.
const CONFIG_FILE_EXTENSIONS: &[&str] = &["yaml", "yml"];

/// Prefix of environment variable overrides, as in `APP_SOURCE__PASSWORD`.
const ENV_PREFIX: &str = "APP";

const ENV_PREFIX_SEPARATOR: &str = "_";

/// Separator between nested keys in environment variable names.
const ENV_SEPARATOR: &str = "__";

/// Top-level configuration that can be loaded with [`load_config`].
pub trait Config: DeserializeOwned {
    /// Checks values that deserialize fine but cannot be used.
    fn validate(&self) -> Result<(), ValidationError>;
}

/// One layer of the configuration, in the order layers are applied.
#[derive(Debug, Clone, Copy)]
enum Layer {
    Base,
    Environment(Environment),
}

impl Layer {
    fn stem(&self) -> &'static str {
        match self {
            Layer::Base => "base",
            Layer::Environment(environment) => environment.as_str(),
        }
    }
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Layer::Base => f.write_str("base configuration"),
            Layer::Environment(environment) => {
                write!(f, "{environment} environment configuration")
            }
        }
    }
}

/// Errors returned while loading configuration.
#[derive(Debug, Error)]
pub enum LoadConfigError {
    #[error("failed to determine the current directory: {0}")]
    CurrentDir(#[source] io::Error),

    #[error("failed to determine runtime environment: {0}")]
    Environment(#[from] io::Error),

    #[error("configuration directory `{0}` does not exist")]
    MissingConfigurationDirectory(PathBuf),

    #[error("no {layer} in `{directory}`, looked for {attempted}")]
    MissingFile {
        layer: String,
        directory: PathBuf,
        attempted: String,
    },

    #[error("{layer} in `{path}` is malformed: {source}")]
    MalformedFile {
        layer: String,
        path: PathBuf,
        source: config::ConfigError,
    },

    #[error("configuration could not be read: {0}")]
    Deserialization(#[source] config::ConfigError),

    #[error("configuration is invalid: {0}")]
    Invalid(#[from] ValidationError),
}

/// Loads and validates `T` from `./configuration` for the environment in `APP_ENVIRONMENT`.
///
/// `base.yaml` is applied first, then `{environment}.yaml`, then every `APP_` prefixed
/// environment variable, with `__` separating nested keys.
pub fn load_config<T: Config>() -> Result<T, LoadConfigError> {
    let working_directory = std::env::current_dir().map_err(LoadConfigError::CurrentDir)?;
    let environment = Environment::load()?;

    load_config_from(&working_directory.join(CONFIGURATION_DIR), environment)
}

/// Same as [`load_config`] with an explicit directory and environment.
pub fn load_config_from<T: Config>(
    directory: &Path,
    environment: Environment,
) -> Result<T, LoadConfigError> {
    if !directory.is_dir() {
        return Err(LoadConfigError::MissingConfigurationDirectory(
            directory.to_path_buf(),
        ));
    }

    let mut builder = config::Config::builder();
    for layer in [Layer::Base, Layer::Environment(environment)] {
        let path = find_layer_file(directory, layer)?;
        builder = builder.add_source(config::File::from(path.as_path()));

        // Building each prefix attributes a syntax error to the file that caused it.
        builder
            .build_cloned()
            .map_err(|source| LoadConfigError::MalformedFile {
                layer: layer.to_string(),
                path,
                source,
            })?;
    }

    // Overrides stay strings, so numeric-looking secrets keep their leading zeros.
    let overrides = config::Environment::with_prefix(ENV_PREFIX)
        .prefix_separator(ENV_PREFIX_SEPARATOR)
        .separator(ENV_SEPARATOR);

    let loaded: T = builder
        .add_source(overrides)
        .build()
        .and_then(|settings| settings.try_deserialize())
        .map_err(LoadConfigError::Deserialization)?;
    loaded.validate()?;

    Ok(loaded)
}

fn find_layer_file(directory: &Path, layer: Layer) -> Result<PathBuf, LoadConfigError> {
    let candidates: Vec<PathBuf> = CONFIG_FILE_EXTENSIONS
        .iter()
        .map(|extension| directory.join(format!("{}.{extension}", layer.stem())))
        .collect();

    if let Some(found) = candidates.iter().find(|path| path.is_file()) {
        return Ok(found.clone());
    }

    let attempted = candidates
        .iter()
        .map(|path| format!("`{}`", path.display()))
        .collect::<Vec<_>>()
        .join(", ");

    Err(LoadConfigError::MissingFile {
        layer: layer.to_string(),
        directory: directory.to_path_buf(),
        attempted,
    })
}

#[cfg(test)]
mod tests {
    use std::fs;

    use serde::Deserialize;

    use super::*;

    #[derive(Debug, Deserialize)]
    struct WorkerConfig {
        name: String,
        workers: u16,
    }

    impl Config for WorkerConfig {
        fn validate(&self) -> Result<(), ValidationError> {
            if self.workers == 0 {
                return Err(ValidationError::MaxConcurrencyZero { kind: "workers" });
            }
            Ok(())
        }
    }

    fn scratch_dir(test_name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "consig-config-{test_name}-{}",
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn environment_file_overrides_base_file() {
        let dir = scratch_dir("override");
        fs::write(dir.join("base.yaml"), "name: base\nworkers: 2\n").unwrap();
        fs::write(dir.join("prod.yml"), "workers: 8\n").unwrap();

        let config: WorkerConfig = load_config_from(&dir, Environment::Prod).unwrap();

        assert_eq!(config.name, "base");
        assert_eq!(config.workers, 8);

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn missing_environment_file_lists_attempted_paths() {
        let dir = scratch_dir("missing");
        fs::write(dir.join("base.yaml"), "name: base\nworkers: 2\n").unwrap();

        let err = load_config_from::<WorkerConfig>(&dir, Environment::Dev).unwrap_err();

        match err {
            LoadConfigError::MissingFile { attempted, .. } => {
                assert!(attempted.contains("dev.yaml"));
                assert!(attempted.contains("dev.yml"));
            }
            other => panic!("unexpected error: {other}"),
        }

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn malformed_file_is_named_in_the_error() {
        let dir = scratch_dir("malformed");
        fs::write(dir.join("base.yaml"), "name: base\nworkers: 2\n").unwrap();
        fs::write(dir.join("dev.yaml"), "workers: [unclosed\n").unwrap();

        let err = load_config_from::<WorkerConfig>(&dir, Environment::Dev).unwrap_err();

        assert!(matches!(err, LoadConfigError::MalformedFile { .. }));
        assert!(err.to_string().contains("dev environment configuration"));

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn loaded_configuration_is_validated() {
        let dir = scratch_dir("invalid");
        fs::write(dir.join("base.yaml"), "name: base\nworkers: 0\n").unwrap();
        fs::write(dir.join("dev.yaml"), "name: dev\n").unwrap();

        let err = load_config_from::<WorkerConfig>(&dir, Environment::Dev).unwrap_err();

        assert!(matches!(
            err,
            LoadConfigError::Invalid(ValidationError::MaxConcurrencyZero { kind: "workers" })
        ));

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn missing_directory_is_reported() {
        let dir = std::env::temp_dir().join("consig-config-does-not-exist");

        let err = load_config_from::<WorkerConfig>(&dir, Environment::Dev).unwrap_err();

        assert!(matches!(
            err,
            LoadConfigError::MissingConfigurationDirectory(_)
        ));
    }
}
