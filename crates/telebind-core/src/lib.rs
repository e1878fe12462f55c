//! # telebind core
//!
//! Foundation types shared by every telebind crate:
//!
//! - [`ApiError`] / [`TransportError`]: the failure taxonomy of a remote call
//! - [`ApiResponse`]: the `{ok, result, description, error_code, parameters}` envelope
//! - [`ApiCaller`]: the seam a transport implements
//! - [`request`]: typed parameters in, typed result out
//! - [`HttpClientConfig`]: where and how to reach the Bot API
//!
//! ```text
//! ┌──────────┐   request::<P, R>   ┌────────────┐   POST JSON   ┌─────────┐
//! │   Bot    │────────────────────▶│ ApiCaller  │──────────────▶│ Bot API │
//! │ (typed)  │◀────────────────────│ (opaque)   │◀──────────────│         │
//! └──────────┘      ApiResult<R>   └────────────┘   envelope    └─────────┘
//! ```

pub mod caller;
pub mod config;
pub mod envelope;
pub mod error;

pub use caller::{ApiCaller, BoxedCaller, decode, request};
pub use config::{DEFAULT_API_URL, HttpClientConfig, mask_token};
pub use envelope::{ApiResponse, ResponseParameters};
pub use error::{ApiError, ApiResult, TransportError, TransportResult};
