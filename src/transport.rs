use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, InvalidHeaderValue, CONTENT_TYPE, USER_AGENT};
use serde_json::Value;
use tracing::debug;

use crate::error::TransportError;

pub const API_KEY_HEADER: &str = "x-api-key";

/// Everything needed for one outbound POST.
#[derive(Debug, Clone)]
pub struct TransportRequest {
    pub url: String,
    pub body: Value,
    pub headers: HeaderMap,
    pub timeout: Duration,
}

/// The network seam between the client and the matching service.
#[async_trait]
pub trait Transport: Send + Sync {
    /// POST `request.body` as JSON and return the decoded JSON response.
    /// Timeouts, connection failures and non-2xx statuses are errors.
    async fn post_json(&self, request: TransportRequest) -> Result<Value, TransportError>;
}

/// Build the header set for a batch request.
pub fn request_headers(api_key: &str) -> Result<HeaderMap, InvalidHeaderValue> {
    let mut headers = HeaderMap::new();
    let mut key = HeaderValue::from_str(api_key)?;
    key.set_sensitive(true);
    headers.insert(API_KEY_HEADER, key);
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(
        USER_AGENT,
        HeaderValue::from_static(concat!("admatch-client/", env!("CARGO_PKG_VERSION"))),
    );
    Ok(headers)
}

/// [`Transport`] backed by `reqwest`.
#[derive(Clone, Default)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn post_json(&self, request: TransportRequest) -> Result<Value, TransportError> {
        let timeout = request.timeout;
        let response = self
            .client
            .post(&request.url)
            .headers(request.headers)
            .timeout(timeout)
            .json(&request.body)
            .send()
            .await
            .map_err(|e| classify(e, timeout))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let text = response.text().await.map_err(|e| classify(e, timeout))?;
        debug!("Received response from matching service: {}", text);
        serde_json::from_str(&text).map_err(|e| TransportError::Body(e.to_string()))
    }
}

fn classify(err: reqwest::Error, timeout: Duration) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout(timeout)
    } else {
        TransportError::Network(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headers_carry_api_key() {
        let headers = request_headers("secret-key").unwrap();
        assert_eq!(headers.get(API_KEY_HEADER).unwrap(), "secret-key");
        assert_eq!(headers.get(CONTENT_TYPE).unwrap(), "application/json");
        assert!(headers
            .get(USER_AGENT)
            .unwrap()
            .to_str()
            .unwrap()
            .starts_with("admatch-client/"));
    }

    #[test]
    fn rejects_key_with_control_characters() {
        assert!(request_headers("bad\nkey").is_err());
    }

    #[tokio::test]
    async fn unreachable_host_is_a_network_error() {
        let transport = HttpTransport::new();
        let request = TransportRequest {
            url: "http://127.0.0.1:9/match".to_string(),
            body: serde_json::json!({}),
            headers: request_headers("k").unwrap(),
            timeout: Duration::from_secs(2),
        };
        let err = transport.post_json(request).await.unwrap_err();
        assert!(matches!(err, TransportError::Network(_) | TransportError::Timeout(_)));
    }
}
