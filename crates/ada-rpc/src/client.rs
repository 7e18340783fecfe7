//! Base HTTP client.
//!
//! Provides `get()` and `post()` for JSON endpoints. Supports Basic auth,
//! configurable timeout, and retry with exponential backoff.

use crate::error::RpcError;
use base64::Engine;
use log::{debug, warn};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde_json::Value;
use std::future::Future;
use std::time::Duration;

/// Configuration for a backend client.
#[derive(Debug, Clone)]
pub struct RpcConfig {
    /// Base URL (e.g., `https://api.yoroiwallet.com`).
    pub url: String,
    /// Optional username for Basic auth.
    pub username: Option<String>,
    /// Optional password for Basic auth.
    pub password: Option<String>,
    /// Request timeout.
    pub timeout: Duration,
    /// Number of retry attempts on transient failure.
    pub retries: u32,
    /// Initial delay between retries (doubles each attempt).
    pub retry_delay: Duration,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8080".to_string(),
            username: None,
            password: None,
            timeout: Duration::from_secs(30),
            retries: 2,
            retry_delay: Duration::from_millis(500),
        }
    }
}

/// Async client for the backend's JSON endpoints.
pub struct RpcClient {
    client: reqwest::Client,
    config: RpcConfig,
}

impl RpcClient {
    /// Create a new client with the given URL.
    pub fn new(url: &str) -> Self {
        Self::with_config(RpcConfig {
            url: url.to_string(),
            ..Default::default()
        })
    }

    /// Create a new client with full configuration.
    pub fn with_config(mut config: RpcConfig) -> Self {
        config.url = config.url.trim_end_matches('/').to_string();
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .pool_max_idle_per_host(4)
            .build()
            .unwrap_or_else(|e| {
                warn!("falling back to default HTTP client: {}", e);
                reqwest::Client::new()
            });

        Self { client, config }
    }

    /// Get the configured base URL.
    pub fn url(&self) -> &str {
        &self.config.url
    }

    fn auth_header(&self) -> Option<HeaderValue> {
        match (&self.config.username, &self.config.password) {
            (Some(user), Some(pass)) => {
                let creds = format!("{}:{}", user, pass);
                let encoded = base64::engine::general_purpose::STANDARD.encode(creds);
                HeaderValue::from_str(&format!("Basic {}", encoded)).ok()
            }
            _ => None,
        }
    }

    fn build_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(auth) = self.auth_header() {
            headers.insert(AUTHORIZATION, auth);
        }
        headers
    }

    async fn with_retry<F, Fut>(&self, context: &str, mut op: F) -> Result<Value, RpcError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Value, RpcError>>,
    {
        let attempts = self.config.retries + 1;
        let mut last_err = RpcError::NoResult {
            context: context.to_string(),
        };

        for attempt in 0..attempts {
            if attempt > 0 {
                let delay = self.config.retry_delay * 2u32.saturating_pow(attempt - 1);
                debug!("retrying {} in {:?} (attempt {})", context, delay, attempt + 1);
                tokio::time::sleep(delay).await;
            }

            match op().await {
                Ok(val) => return Ok(val),
                Err(e) => {
                    let should_retry = e.is_transient() && attempt + 1 < attempts;
                    if !should_retry {
                        return Err(e);
                    }
                    last_err = e;
                }
            }
        }

        Err(last_err)
    }

    /// POST JSON to `endpoint`.
    pub async fn post(&self, endpoint: &str, body: &Value) -> Result<Value, RpcError> {
        let url = format!("{}{}", self.config.url, endpoint);
        self.with_retry(endpoint, || self.do_request("POST", &url, Some(body)))
            .await
    }

    /// GET `endpoint`.
    pub async fn get(&self, endpoint: &str) -> Result<Value, RpcError> {
        let url = format!("{}{}", self.config.url, endpoint);
        self.with_retry(endpoint, || self.do_request("GET", &url, None))
            .await
    }

    async fn do_request(&self, method: &str, url: &str, body: Option<&Value>) -> Result<Value, RpcError> {
        let http_err = |e| RpcError::Http {
            method: method.to_string(),
            url: url.to_string(),
            source: e,
        };

        let req = match body {
            Some(b) => self.client.post(url).json(b),
            None => self.client.get(url),
        };
        let resp = req.headers(self.build_headers()).send().await.map_err(http_err)?;

        let status = resp.status().as_u16();

        if status == 401 {
            return Err(RpcError::AuthFailed {
                url: url.to_string(),
            });
        }

        if status >= 400 {
            let body = resp.text().await.unwrap_or_default();
            return Err(RpcError::HttpStatus {
                method: method.to_string(),
                url: url.to_string(),
                status,
                body: body.chars().take(500).collect(),
            });
        }

        resp.json::<Value>().await.map_err(http_err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = RpcConfig::default();
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.retries, 2);
        assert!(config.username.is_none());
    }

    #[test]
    fn test_client_url_trimmed() {
        let client = RpcClient::new("https://backend.example.com/");
        assert_eq!(client.url(), "https://backend.example.com");
    }

    #[test]
    fn test_basic_auth_header() {
        let client = RpcClient::with_config(RpcConfig {
            username: Some("u".into()),
            password: Some("p".into()),
            ..Default::default()
        });
        let headers = client.build_headers();
        assert_eq!(headers.get(AUTHORIZATION).unwrap().to_str().unwrap(), "Basic dTpw");
    }

    #[tokio::test]
    async fn test_unreachable_host_errors() {
        let client = RpcClient::with_config(RpcConfig {
            url: "http://127.0.0.1:1".into(),
            retries: 0,
            timeout: Duration::from_millis(200),
            ..Default::default()
        });
        let err = client.get("/api/v2/bestblock").await.unwrap_err();
        assert!(matches!(err, RpcError::Http { .. }));
    }
}
