//! The request primitive.
//!
//! [`ApiCaller`] is the seam between the typed client and whatever moves bytes
//! to the remote service. A caller performs exactly one exchange per call: no
//! retry, no backoff, no caching. [`request`] layers serialization and result
//! decoding on top of it.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::trace;

use crate::error::{ApiError, ApiResult};

/// Transport-agnostic remote method invocation.
#[async_trait]
pub trait ApiCaller: Send + Sync {
    /// Invokes `method` with optional JSON parameters.
    ///
    /// Returns the envelope's opaque `result` on success. Implementations must
    /// map a not-ok envelope to [`ApiError::Remote`], an unreadable body to
    /// [`ApiError::MalformedEnvelope`] and delivery failures to
    /// [`ApiError::Transport`].
    async fn call(&self, method: &str, params: Option<Value>) -> ApiResult<Value>;
}

/// A shared, type-erased caller.
pub type BoxedCaller = Arc<dyn ApiCaller>;

#[async_trait]
impl<T: ApiCaller + ?Sized> ApiCaller for Arc<T> {
    async fn call(&self, method: &str, params: Option<Value>) -> ApiResult<Value> {
        (**self).call(method, params).await
    }
}

/// Serializes `params`, performs the call and decodes the result into `R`.
pub async fn request<P, R>(caller: &dyn ApiCaller, method: &str, params: Option<&P>) -> ApiResult<R>
where
    P: Serialize + ?Sized,
    R: DeserializeOwned,
{
    let params = params.map(serde_json::to_value).transpose()?;
    trace!(method = %method, params = ?params, "API request");

    let result = caller.call(method, params).await?;
    decode(method, result)
}

/// Decodes a call result, tagging failures with the method name.
pub fn decode<R: DeserializeOwned>(method: &str, result: Value) -> ApiResult<R> {
    serde_json::from_value(result).map_err(|e| ApiError::Decode {
        method: method.to_string(),
        reason: e.to_string(),
    })
}
