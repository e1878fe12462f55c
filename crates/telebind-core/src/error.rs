//! Unified error types for telebind.
//!
//! Every remote call resolves to an [`ApiResult`]. The variants of [`ApiError`]
//! keep the three failure families apart so callers can tell "the request never
//! made it" from "the service said no" from "the answer had the wrong shape".

use std::time::Duration;

use thiserror::Error;

use crate::envelope::ResponseParameters;

// =============================================================================
// Transport Errors
// =============================================================================

/// Errors raised while moving bytes to and from the remote service.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// The request could not be sent or the response could not be read.
    #[error("I/O error: {0}")]
    Io(String),

    /// The service answered with a non-success HTTP status and no envelope.
    #[error("HTTP {status} error: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Raw response body (possibly truncated by the transport).
        body: String,
    },

    /// The transport could not be built from its configuration.
    #[error("invalid transport configuration: {0}")]
    InvalidConfig(String),
}

impl From<std::io::Error> for TransportError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

// =============================================================================
// API Errors
// =============================================================================

/// Error type for a single remote method call.
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    /// The request could not be delivered or the response could not be read.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// The service answered with `ok: false`.
    #[error("API error ({error_code}): {description}")]
    Remote {
        /// Human-readable description supplied by the service.
        description: String,
        /// Numeric error code supplied by the service.
        error_code: i32,
        /// Optional retry / migration hints.
        parameters: Option<ResponseParameters>,
    },

    /// The response body was not a well-formed envelope.
    #[error("malformed response envelope: {0}")]
    MalformedEnvelope(String),

    /// The envelope was fine but its `result` did not match the expected type.
    #[error("failed to decode result of '{method}': {reason}")]
    Decode {
        /// Remote method whose result failed to decode.
        method: String,
        /// Decoder message.
        reason: String,
    },

    /// The parameters could not be serialized.
    #[error("failed to serialize parameters: {0}")]
    Serialize(String),
}

impl ApiError {
    /// Creates a remote application error.
    pub fn remote(
        description: impl Into<String>,
        error_code: i32,
        parameters: Option<ResponseParameters>,
    ) -> Self {
        Self::Remote {
            description: description.into(),
            error_code,
            parameters,
        }
    }

    /// Returns the error code if the service reported one.
    pub fn error_code(&self) -> Option<i32> {
        match self {
            Self::Remote { error_code, .. } => Some(*error_code),
            _ => None,
        }
    }

    /// Returns the "retry after" hint carried by a remote error.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::Remote {
                parameters: Some(p),
                ..
            } => p.retry_after.map(Duration::from_secs),
            _ => None,
        }
    }

    /// Returns the chat id a group was migrated to, if the service said so.
    pub fn migrate_to_chat_id(&self) -> Option<i64> {
        match self {
            Self::Remote {
                parameters: Some(p),
                ..
            } => p.migrate_to_chat_id,
            _ => None,
        }
    }

    /// Whether repeating the same call later can reasonably succeed.
    ///
    /// Only flood-control answers qualify; retry policy itself stays with the caller.
    pub fn is_retryable(&self) -> bool {
        self.retry_after().is_some() || self.error_code() == Some(429)
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialize(err.to_string())
    }
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// Result type for API calls.
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_error_exposes_hints() {
        let err = ApiError::remote(
            "Too Many Requests: retry after 5",
            429,
            Some(ResponseParameters {
                migrate_to_chat_id: None,
                retry_after: Some(5),
            }),
        );

        assert_eq!(err.error_code(), Some(429));
        assert_eq!(err.retry_after(), Some(Duration::from_secs(5)));
        assert!(err.is_retryable());
        assert_eq!(
            err.to_string(),
            "API error (429): Too Many Requests: retry after 5"
        );
    }

    #[test]
    fn migration_hint_is_not_retryable() {
        let err = ApiError::remote(
            "Bad Request: group chat was upgraded to a supergroup chat",
            400,
            Some(ResponseParameters {
                migrate_to_chat_id: Some(-1001234567890),
                retry_after: None,
            }),
        );

        assert_eq!(err.migrate_to_chat_id(), Some(-1001234567890));
        assert!(!err.is_retryable());
    }

    #[test]
    fn transport_errors_carry_no_code() {
        let err: ApiError = TransportError::Io("connection reset".into()).into();
        assert_eq!(err.error_code(), None);
        assert!(!err.is_retryable());
    }
}
