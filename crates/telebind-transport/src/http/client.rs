//! reqwest-backed [`ApiCaller`].

use async_trait::async_trait;
use reqwest::{Client, ClientBuilder};
use serde_json::{Map, Value};
use tracing::{debug, trace};

use telebind_core::{
    ApiCaller, ApiResponse, ApiResult, HttpClientConfig, TransportError, TransportResult,
};

/// Longest body excerpt kept in a [`TransportError::Status`].
const MAX_ERROR_BODY: usize = 512;

/// Performs one HTTP POST per remote call.
#[derive(Debug, Clone)]
pub struct HttpApiCaller {
    client: Client,
    config: HttpClientConfig,
}

impl HttpApiCaller {
    /// Creates a caller with its own connection pool.
    pub fn new(config: HttpClientConfig) -> TransportResult<Self> {
        let client = ClientBuilder::new()
            .timeout(config.timeout())
            .build()
            .map_err(|e| TransportError::InvalidConfig(e.to_string()))?;

        Ok(Self { client, config })
    }

    /// Creates a caller sharing an existing reqwest client.
    ///
    /// The client's own timeout applies; `config.timeout_secs` is ignored.
    pub fn with_client(client: Client, config: HttpClientConfig) -> Self {
        Self { client, config }
    }

    /// Returns the configuration this caller was built from.
    pub fn config(&self) -> &HttpClientConfig {
        &self.config
    }
}

#[async_trait]
impl ApiCaller for HttpApiCaller {
    async fn call(&self, method: &str, params: Option<Value>) -> ApiResult<Value> {
        let url = self.config.method_url(method);
        let body = params.unwrap_or_else(|| Value::Object(Map::new()));

        let resp = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| TransportError::Io(e.without_url().to_string()))?;

        let status = resp.status();
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| TransportError::Io(e.without_url().to_string()))?;
        trace!(method = %method, status = status.as_u16(), len = bytes.len(), "API response");

        if status.is_success() {
            return ApiResponse::from_slice(&bytes)?.into_result();
        }

        // The Bot API answers most failures with 4xx plus a regular envelope.
        match ApiResponse::from_slice(&bytes) {
            Ok(envelope) => envelope.into_result(),
            Err(_) => {
                debug!(method = %method, status = status.as_u16(), "Non-success status without envelope");
                let mut text = String::from_utf8_lossy(&bytes).into_owned();
                if text.len() > MAX_ERROR_BODY {
                    let cut = (0..=MAX_ERROR_BODY)
                        .rev()
                        .find(|&i| text.is_char_boundary(i))
                        .unwrap_or(0);
                    text.truncate(cut);
                }
                Err(TransportError::Status {
                    status: status.as_u16(),
                    body: text,
                }
                .into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;
    use telebind_core::ApiError;

    const TOKEN: &str = "123456:TEST";

    fn caller_for(server: &mockito::ServerGuard) -> HttpApiCaller {
        HttpApiCaller::new(HttpClientConfig::new(TOKEN).with_api_url(server.url())).unwrap()
    }

    #[tokio::test]
    async fn posts_json_params_and_returns_result() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/bot123456:TEST/sendMessage")
            .match_header("content-type", "application/json")
            .match_body(Matcher::Json(json!({"chat_id": 5, "text": "hi"})))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"ok":true,"result":{"message_id":9}}"#)
            .create_async()
            .await;

        let result = caller_for(&server)
            .call("sendMessage", Some(json!({"chat_id": 5, "text": "hi"})))
            .await
            .unwrap();

        assert_eq!(result, json!({"message_id": 9}));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn missing_params_send_an_empty_object() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/bot123456:TEST/getMe")
            .match_body(Matcher::Json(json!({})))
            .with_status(200)
            .with_body(r#"{"ok":true,"result":{"id":1,"is_bot":true,"first_name":"b"}}"#)
            .create_async()
            .await;

        caller_for(&server).call("getMe", None).await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn error_status_with_envelope_is_remote() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/bot123456:TEST/sendMessage")
            .with_status(400)
            .with_body(r#"{"ok":false,"error_code":400,"description":"Bad Request: chat not found"}"#)
            .create_async()
            .await;

        let err = caller_for(&server)
            .call("sendMessage", Some(json!({"chat_id": 0, "text": "x"})))
            .await
            .unwrap_err();

        match err {
            ApiError::Remote {
                description,
                error_code,
                ..
            } => {
                assert_eq!(description, "Bad Request: chat not found");
                assert_eq!(error_code, 400);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn error_status_without_envelope_is_transport() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/bot123456:TEST/getUpdates")
            .with_status(502)
            .with_body("<html>Bad Gateway</html>")
            .create_async()
            .await;

        let err = caller_for(&server).call("getUpdates", None).await.unwrap_err();
        match err {
            ApiError::Transport(TransportError::Status { status, body }) => {
                assert_eq!(status, 502);
                assert!(body.contains("Bad Gateway"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn success_status_with_garbage_is_malformed() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/bot123456:TEST/getMe")
            .with_status(200)
            .with_body("not json")
            .create_async()
            .await;

        let err = caller_for(&server).call("getMe", None).await.unwrap_err();
        assert!(matches!(err, ApiError::MalformedEnvelope(_)));
    }

    #[tokio::test]
    async fn unreachable_server_is_transport_io() {
        let config = HttpClientConfig::new(TOKEN).with_api_url("http://127.0.0.1:1");
        let err = HttpApiCaller::new(config)
            .unwrap()
            .call("getMe", None)
            .await
            .unwrap_err();

        assert!(matches!(err, ApiError::Transport(TransportError::Io(_))));
    }
}
