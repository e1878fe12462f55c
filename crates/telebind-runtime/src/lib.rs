//! # telebind runtime
//!
//! Everything between "a registry of handlers" and "a running bot":
//!
//! - [`Poller`]: the offset-cursor long-poll loop, with [`FailurePolicy`],
//!   [`AdvancePolicy`] and cooperative shutdown through a cancellation token
//! - [`config`]: figment-based loading of [`TelebindConfig`] from TOML/YAML
//!   files and `TELEBIND_*` environment variables, plus validation
//! - [`logging`]: `tracing-subscriber` setup driven by the logging section
//! - [`TelebindRuntime`]: loads config, initializes logging, logs in and
//!   polls until Ctrl+C or SIGTERM
//!
//! ```rust,ignore
//! use telebind_runtime::TelebindRuntime;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let mut runtime = TelebindRuntime::new();
//!     runtime.handlers().on_message(echo);
//!     runtime.run().await?;
//!     Ok(())
//! }
//! ```
//!
//! # Features
//!
//! - `toml-config` *(default)*: TOML configuration files
//! - `yaml-config`: YAML configuration files
//! - `json-log`: JSON log output
//! - `http-client` *(default)*: build the reqwest transport from `[bot]`

pub mod config;
pub mod error;
pub mod logging;
pub mod poller;
pub mod runtime;

#[cfg(test)]
pub(crate) mod testing;

pub use config::{
    ConfigError, ConfigLoader, ConfigResult, LoggingConfig, PollingConfig, TelebindConfig,
};
pub use error::{RuntimeError, RuntimeResult};
pub use logging::{LoggingBuilder, SpanEvents};
pub use poller::{AdvancePolicy, FailurePolicy, Poller, PollerBuilder, PollerState, next_offset};
pub use runtime::{RuntimeBuilder, TelebindRuntime, shutdown_signal};

pub use tracing;
pub use tracing_subscriber;

/// Logging macros, for `use telebind_runtime::prelude::*`.
pub mod prelude {
    pub use tracing::{Level, debug, error, info, instrument, span, trace, warn};
}
