//! HTTP server: routes and error mapping.

use std::sync::Arc;
use std::time::Instant;

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::{debug, info};

use super::types::*;
use crate::coverage::CoverageError;
use crate::server::ShutdownSignal;
use crate::tools::{ToolError, ToolRegistry};

/// Shared state accessible to all route handlers.
pub struct HttpState {
    pub registry: Arc<ToolRegistry>,
    pub started_at: Instant,
}

impl HttpState {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self {
            registry,
            started_at: Instant::now(),
        }
    }
}

type ApiError = (StatusCode, Json<ErrorResponse>);

/// Build the axum router with all routes.
pub fn router(state: Arc<HttpState>) -> axum::Router {
    axum::Router::new()
        .route("/healthz", get(handle_health))
        .route("/echo", post(handle_echo))
        .route("/maven/test", post(handle_maven_test))
        .route("/tools", get(handle_tools))
        .route("/tools/{name}", post(handle_tool_call))
        .with_state(state)
}

/// Serve on an already-bound listener until a shutdown signal arrives.
pub async fn serve(
    listener: TcpListener,
    state: Arc<HttpState>,
    mut shutdown_rx: broadcast::Receiver<ShutdownSignal>,
) -> Result<(), std::io::Error> {
    info!(addr = %listener.local_addr()?, "HTTP server listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.recv().await;
            info!("HTTP server shutting down");
        })
        .await
}

/// Map a tool failure onto a status code and `{error}` body.
pub fn error_response(err: &ToolError) -> ApiError {
    let status = match err {
        ToolError::NotFound(_) => StatusCode::NOT_FOUND,
        ToolError::InvalidInput(_) | ToolError::Calc(_) => StatusCode::BAD_REQUEST,
        ToolError::Coverage(CoverageError::ReportMissing(_)) => StatusCode::CONFLICT,
        ToolError::Coverage(_) | ToolError::Process(_) | ToolError::Output(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (
        status,
        Json(ErrorResponse {
            error: err.to_string(),
        }),
    )
}

fn bad_request(message: String) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse { error: message }),
    )
}

/// Decode a JSON body without requiring a content type.
/// An empty body (or literal `null`) yields `T::default()`.
fn parse_body<T: DeserializeOwned + Default>(body: &Bytes) -> Result<T, ApiError> {
    let value = parse_value(body)?;
    if value.is_null() {
        return Ok(T::default());
    }
    serde_json::from_value(value).map_err(|e| bad_request(format!("invalid request body: {e}")))
}

/// Decode a body as raw JSON; empty means `null`.
fn parse_value(body: &Bytes) -> Result<Value, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Null);
    }
    serde_json::from_slice(body).map_err(|e| bad_request(format!("invalid JSON body: {e}")))
}

// ── Route handlers ──────────────────────────────────────────────────────

async fn handle_health(State(state): State<Arc<HttpState>>) -> Json<HealthResponse> {
    debug!(
        uptime_secs = state.started_at.elapsed().as_secs(),
        "Health check"
    );
    Json(HealthResponse { ok: true })
}

async fn handle_echo(
    State(state): State<Arc<HttpState>>,
    body: Bytes,
) -> Result<Json<EchoResponse>, ApiError> {
    let req: EchoRequest = parse_body(&body)?;
    let value = state
        .registry
        .call("echo_tool", serde_json::json!({ "text": req.text }))
        .await
        .map_err(|e| error_response(&e))?;
    Ok(Json(EchoResponse {
        result: value.as_str().unwrap_or_default().to_string(),
    }))
}

async fn handle_maven_test(
    State(state): State<Arc<HttpState>>,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let req: MavenTestRequest = parse_body(&body)?;
    let args = serde_json::to_value(req).map_err(|e| error_response(&ToolError::from(e)))?;
    let value = state
        .registry
        .call("maven_test_tool", args)
        .await
        .map_err(|e| error_response(&e))?;
    Ok(Json(value))
}

async fn handle_tools(State(state): State<Arc<HttpState>>) -> Json<ToolsResponse> {
    Json(ToolsResponse {
        tools: state.registry.definitions(),
    })
}

async fn handle_tool_call(
    State(state): State<Arc<HttpState>>,
    Path(name): Path<String>,
    body: Bytes,
) -> Result<Json<ToolCallResponse>, ApiError> {
    let args = parse_value(&body)?;
    let result = state
        .registry
        .call(&name, args)
        .await
        .map_err(|e| error_response(&e))?;
    Ok(Json(ToolCallResponse { result }))
}
