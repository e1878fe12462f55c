//! Runtime error types.

use thiserror::Error;

use crate::config::ConfigError;
use telebind_core::{ApiError, TransportError};

/// Errors that end a runtime or poller.
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Loading or validating configuration failed.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The HTTP transport could not be built.
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// A call made before the first poll failed.
    #[error("Startup failed during {step}: {source}")]
    Startup {
        step: &'static str,
        #[source]
        source: ApiError,
    },

    /// `getUpdates` failed under the stop policy.
    #[error("Polling failed at offset {offset}: {source}")]
    Poll {
        offset: i64,
        #[source]
        source: ApiError,
    },

    /// `run` was called while a previous run was still active.
    #[error("Runtime is already running")]
    AlreadyRunning,

    /// No HTTP transport was compiled in and none was supplied.
    #[error("No transport available; enable the `http-client` feature or supply a Bot")]
    NoTransport,
}

impl RuntimeError {
    /// The API error behind a poll or startup failure.
    pub fn api_error(&self) -> Option<&ApiError> {
        match self {
            Self::Startup { source, .. } | Self::Poll { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
