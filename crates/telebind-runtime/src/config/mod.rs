//! Runtime configuration: schema, layered loading and validation.

pub mod error;
pub mod loader;
pub mod schema;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, ENV_PREFIX, PROFILE_ENV, Profile};
pub use schema::{
    BotConfig, LogFormat, LogLevel, LogOutput, LogRotation, LoggingConfig, PollingConfig,
    SpanEventConfig, TelebindConfig,
};
pub use validation::{validate_config, validate_polling_config};

/// Loads configuration from the default locations and the environment.
pub fn load_config() -> ConfigResult<TelebindConfig> {
    ConfigLoader::new().load()
}

/// Loads configuration from one file plus the environment.
pub fn load_config_from_file(path: impl AsRef<std::path::Path>) -> ConfigResult<TelebindConfig> {
    ConfigLoader::new().file(path).load()
}
