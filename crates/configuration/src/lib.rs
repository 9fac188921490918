//! # Orchestrator Configuration
//!
//! Loads `config.toml` (plus `APP_`-prefixed environment overrides) into a
//! strongly-typed `Settings` struct, and wires up `tracing` the same way for
//! every entry point in the workspace.

use crate::error::ConfigError;

pub mod error;
pub mod logging;
pub mod settings;

pub use logging::{init_tracing, LoggingConfig};
pub use settings::{EventBusConfig, PipelineConfig, RpcConfig, Settings};

/// Loads configuration from `config.toml` in the current directory, then
/// layers `APP_`-prefixed environment variables on top (e.g.
/// `APP_RPC__ADDRESS` overrides `[rpc] address`). `path` overrides the
/// default file name, mirroring the `--config` flag the CLI exposes.
pub fn load_config(path: Option<&str>) -> Result<Settings, ConfigError> {
    let file_name = path.unwrap_or("config.toml");

    let builder = config::Config::builder()
        .add_source(config::File::with_name(file_name).required(false))
        .add_source(config::Environment::with_prefix("APP").separator("__"))
        .build()?;

    builder
        .try_deserialize::<Settings>()
        .map_err(ConfigError::LoadError)
}
