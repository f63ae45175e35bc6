use std::collections::HashMap;
use std::time::Duration;

use serde::de::DeserializeOwned;

use crate::error::PortalError;

/// HTTP method enum
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HttpMethod::Get => write!(f, "GET"),
            HttpMethod::Post => write!(f, "POST"),
        }
    }
}

/// A decoded HTTP response: status code plus body text.
///
/// Only status semantics matter to the transport; bodies are opaque JSON
/// deserialized by the caller.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    status_code: u16,
    body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status_code: status,
            body: body.into(),
        }
    }

    pub fn status(&self) -> u16 {
        self.status_code
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    /// Check if successful (2xx status)
    pub fn is_success(&self) -> bool {
        self.status_code >= 200 && self.status_code < 300
    }

    /// Parse the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, PortalError> {
        serde_json::from_str(&self.body).map_err(|e| PortalError::Transport {
            status: Some(self.status_code),
            message: format!("invalid response body: {e}"),
        })
    }
}

/// Trait for HTTP senders, allowing the transport to be exercised against a
/// scripted fake in tests.
#[async_trait::async_trait]
pub trait HttpClient: Send + Sync {
    async fn get(
        &self,
        url: &str,
        headers: HashMap<String, String>,
    ) -> Result<HttpResponse, PortalError>;

    async fn post(
        &self,
        url: &str,
        headers: HashMap<String, String>,
        body: String,
    ) -> Result<HttpResponse, PortalError>;
}

/// Implementation of [`HttpClient`] using reqwest.
pub struct ReqwestHttpClient {
    client: reqwest::Client,
}

impl ReqwestHttpClient {
    /// Create a client enforcing the given per-request timeout.
    pub fn new(timeout: Duration) -> Result<Self, PortalError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PortalError::Transport {
                status: None,
                message: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self { client })
    }

    /// Wrap an already-configured reqwest client.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    fn map_error(url: &str, e: reqwest::Error) -> PortalError {
        if e.is_timeout() {
            PortalError::Timeout {
                operation: url.to_string(),
            }
        } else {
            PortalError::Transport {
                status: e.status().map(|s| s.as_u16()),
                message: e.to_string(),
            }
        }
    }
}

#[async_trait::async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn get(
        &self,
        url: &str,
        headers: HashMap<String, String>,
    ) -> Result<HttpResponse, PortalError> {
        let mut request = self.client.get(url);
        for (key, value) in headers {
            request = request.header(key, value);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Self::map_error(url, e))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| Self::map_error(url, e))?;

        Ok(HttpResponse::new(status, body))
    }

    async fn post(
        &self,
        url: &str,
        headers: HashMap<String, String>,
        body: String,
    ) -> Result<HttpResponse, PortalError> {
        let mut request = self
            .client
            .post(url)
            .header("content-type", "application/json")
            .body(body);
        for (key, value) in headers {
            request = request.header(key, value);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Self::map_error(url, e))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| Self::map_error(url, e))?;

        Ok(HttpResponse::new(status, body))
    }
}
