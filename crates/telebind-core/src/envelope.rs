//! The generic response envelope returned by every Bot API method.
//!
//! ```text
//! { "ok": true,  "result": <payload> }
//! { "ok": false, "description": "...", "error_code": 400, "parameters": { ... } }
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ApiError, ApiResult};

/// Retry and migration hints attached to some failed calls.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseParameters {
    /// The group has been migrated to a supergroup with this identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub migrate_to_chat_id: Option<i64>,
    /// Seconds to wait before the request can be repeated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
}

/// A decoded response envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse {
    /// Whether the call succeeded.
    pub ok: bool,
    /// The payload on success; left opaque for the caller to decode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Error description on failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Error code on failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<i32>,
    /// Optional retry / migration hints on failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<ResponseParameters>,
}

impl ApiResponse {
    /// Parses an envelope from raw response bytes.
    pub fn from_slice(body: &[u8]) -> ApiResult<Self> {
        serde_json::from_slice(body).map_err(|e| ApiError::MalformedEnvelope(e.to_string()))
    }

    /// Parses an envelope from an already-decoded JSON value.
    pub fn from_value(value: Value) -> ApiResult<Self> {
        serde_json::from_value(value).map_err(|e| ApiError::MalformedEnvelope(e.to_string()))
    }

    /// Builds a successful envelope around `result`.
    pub fn success(result: Value) -> Self {
        Self {
            ok: true,
            result: Some(result),
            description: None,
            error_code: None,
            parameters: None,
        }
    }

    /// Builds a failed envelope.
    pub fn failure(description: impl Into<String>, error_code: i32) -> Self {
        Self {
            ok: false,
            result: None,
            description: Some(description.into()),
            error_code: Some(error_code),
            parameters: None,
        }
    }

    /// Converts the envelope into the opaque payload or a typed error.
    pub fn into_result(self) -> ApiResult<Value> {
        if self.ok {
            return self
                .result
                .ok_or_else(|| ApiError::MalformedEnvelope("'ok' is true but 'result' is missing".into()));
        }

        Err(ApiError::Remote {
            description: self
                .description
                .unwrap_or_else(|| "Unknown error".to_string()),
            error_code: self.error_code.unwrap_or_default(),
            parameters: self.parameters,
        })
    }
}
