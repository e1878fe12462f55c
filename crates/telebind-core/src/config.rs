//! Transport configuration shared between the client and its transports.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default Bot API endpoint.
pub const DEFAULT_API_URL: &str = "https://api.telegram.org";

/// HTTP client configuration.
///
/// The remote method URL is `{api_url}/bot{token}/{method}`.
#[derive(Clone, Serialize, Deserialize)]
pub struct HttpClientConfig {
    /// Base URL of the Bot API server.
    #[serde(default = "default_api_url")]
    pub api_url: String,
    /// Bot token issued by BotFather.
    pub token: String,
    /// Whole-request timeout. Must exceed the long-poll timeout.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

impl HttpClientConfig {
    /// Creates a configuration for `token` against the public endpoint.
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            api_url: default_api_url(),
            token: token.into(),
            timeout_secs: default_timeout_secs(),
        }
    }

    /// Points the client at another server (a local Bot API server, a test double).
    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }

    /// Sets the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_secs = timeout.as_secs();
        self
    }

    /// Returns the request timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Builds the endpoint URL for a remote method.
    pub fn method_url(&self, method: &str) -> String {
        format!(
            "{}/bot{}/{}",
            self.api_url.trim_end_matches('/'),
            self.token,
            method
        )
    }
}

// The token is a credential; keep it out of logs.
impl fmt::Debug for HttpClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpClientConfig")
            .field("api_url", &self.api_url)
            .field("token", &mask_token(&self.token))
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

/// Masks everything after the numeric bot id of a token.
pub fn mask_token(token: &str) -> String {
    match token.split_once(':') {
        Some((id, _)) => format!("{id}:***"),
        None if token.is_empty() => String::new(),
        None => "***".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_url_joins_base_token_and_method() {
        let config = HttpClientConfig::new("123:abc").with_api_url("http://localhost:8081/");
        assert_eq!(
            config.method_url("getUpdates"),
            "http://localhost:8081/bot123:abc/getUpdates"
        );
    }

    #[test]
    fn debug_output_hides_the_secret() {
        let config = HttpClientConfig::new("123456:SECRET-PART");
        let rendered = format!("{config:?}");
        assert!(rendered.contains("123456:***"));
        assert!(!rendered.contains("SECRET-PART"));
    }

    #[test]
    fn defaults_apply_when_deserializing() {
        let config: HttpClientConfig = serde_json::from_str(r#"{"token":"1:x"}"#).unwrap();
        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert_eq!(config.timeout(), Duration::from_secs(30));
    }
}
