//! HTTP client: talks to a running `covermate serve`.
//!
//! Used by the CLI `status` command.

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use covermate_config::AppConfig;

use super::types::*;
use crate::process::ProcessResult;

/// Errors from the HTTP client.
#[derive(Debug, thiserror::Error)]
pub enum HttpClientError {
    #[error("server is not running at {0}")]
    NotRunning(String),

    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("server returned {status}: {message}")]
    Server { status: u16, message: String },
}

/// Client for the covermate HTTP API.
pub struct HttpClient {
    base_url: String,
    client: reqwest::Client,
}

impl HttpClient {
    /// Create a client targeting `base_url` (e.g. `http://127.0.0.1:8000`).
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// Target the address the server in `config` listens on.
    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(format!(
            "http://{}:{}",
            config.server.listen_addr, config.server.listen_port
        ))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn send<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, HttpClientError> {
        let resp = request.send().await.map_err(|e| {
            if e.is_connect() {
                HttpClientError::NotRunning(self.base_url.clone())
            } else {
                HttpClientError::Request(e)
            }
        })?;

        let status = resp.status();
        debug!(status = status.as_u16(), url = %resp.url(), "HTTP response");
        if !status.is_success() {
            let message = match resp.json::<ErrorResponse>().await {
                Ok(err) => err.error,
                Err(_) => status.to_string(),
            };
            return Err(HttpClientError::Server {
                status: status.as_u16(),
                message,
            });
        }
        Ok(resp.json().await?)
    }

    // ── Typed API methods ──────────────────────────────────────────────

    /// Health check.
    pub async fn health(&self) -> Result<HealthResponse, HttpClientError> {
        let url = format!("{}/healthz", self.base_url);
        self.send(self.client.get(url)).await
    }

    pub async fn echo(&self, text: &str) -> Result<String, HttpClientError> {
        let url = format!("{}/echo", self.base_url);
        let body = EchoRequest {
            text: text.to_string(),
        };
        let resp: EchoResponse = self.send(self.client.post(url).json(&body)).await?;
        Ok(resp.result)
    }

    pub async fn maven_test(
        &self,
        test_filter: Option<&str>,
    ) -> Result<ProcessResult, HttpClientError> {
        let url = format!("{}/maven/test", self.base_url);
        let body = MavenTestRequest {
            test_filter: test_filter.map(str::to_string),
        };
        self.send(self.client.post(url).json(&body)).await
    }

    pub async fn tools(&self) -> Result<ToolsResponse, HttpClientError> {
        let url = format!("{}/tools", self.base_url);
        self.send(self.client.get(url)).await
    }

    /// Invoke a tool by name and return its JSON result.
    pub async fn call_tool(&self, name: &str, args: &Value) -> Result<Value, HttpClientError> {
        let url = format!("{}/tools/{name}", self.base_url);
        let resp: ToolCallResponse = self.send(self.client.post(url).json(args)).await?;
        Ok(resp.result)
    }
}
