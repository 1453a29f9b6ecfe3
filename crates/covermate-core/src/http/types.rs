//! Request and response bodies for the HTTP surface.
//!
//! Shared by the router and [`HttpClient`](super::HttpClient).

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::tools::ToolDefinition;

/// `GET /healthz`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub ok: bool,
}

/// `POST /echo` body. A missing `text` echoes the empty string.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EchoRequest {
    #[serde(default)]
    pub text: String,
}

/// `POST /echo` response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EchoResponse {
    pub result: String,
}

/// `POST /maven/test` body; the whole body may also be omitted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MavenTestRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_filter: Option<String>,
}

/// `GET /tools`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsResponse {
    pub tools: Vec<ToolDefinition>,
}

/// `POST /tools/{name}` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallResponse {
    pub result: Value,
}

/// Body of every non-2xx response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}
