//! Configuration types and loading for the consignado sync workspace.
//!
//! Configuration is read from `configuration/base.yaml` plus an environment specific file and
//! can be overridden by `APP_` prefixed environment variables. Credentials are expected to
//! arrive through environment variables and are kept in [`secrecy`] wrappers.

mod environment;
mod load;
pub mod shared;

pub use environment::Environment;
pub use load::{Config, LoadConfigError, load_config, load_config_from};
