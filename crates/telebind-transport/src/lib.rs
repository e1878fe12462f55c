//! # telebind transport
//!
//! Concrete [`ApiCaller`](telebind_core::ApiCaller) implementations.
//!
//! ## Features
//!
//! - `http-client` (default): [`HttpApiCaller`], a reqwest client that POSTs
//!   JSON parameters to `{api_url}/bot{token}/{method}`
//!
//! ```rust,ignore
//! use telebind_core::HttpClientConfig;
//! use telebind_transport::HttpApiCaller;
//!
//! let caller = HttpApiCaller::new(HttpClientConfig::new(token))?;
//! let me: serde_json::Value = caller.call("getMe", None).await?;
//! ```

#[cfg(feature = "http-client")]
pub mod http;

#[cfg(feature = "http-client")]
pub use http::HttpApiCaller;
