//! Stdio tool protocol (MCP), served with `rmcp`.
//!
//! [`CovermateService`] exposes the built-in tools through rmcp's tool
//! router, with input schemas derived from the typed inputs in
//! [`crate::tools`]. A tool failure is a result with `isError` set, not a
//! protocol error.
//!
//! [`serve`] puts a line guard between the byte stream and the service.
//! rmcp ends a session on the first frame it cannot decode, so lines that are
//! not UTF-8, not JSON, too long, or not a JSON-RPC message are answered here
//! and never reach it.
//!
//! Only protocol frames are written to the writer; logs go to stderr.

use std::sync::Arc;

use rmcp::handler::server::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{
    CallToolResult, ClientJsonRpcMessage, Content, ErrorCode, Implementation, ServerCapabilities,
    ServerInfo, Tool as McpTool,
};
use rmcp::{ErrorData as McpError, ServerHandler, ServiceExt, tool, tool_handler, tool_router};
use serde_json::{Value, json};
use tokio::io::{
    AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, DuplexStream, ReadHalf,
    WriteHalf,
};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::build_info;
use crate::tools::{
    CalcInput, CalcTool, EchoInput, EchoTool, MavenTestAndReportTool, MavenTestInput,
    MavenTestTool, NoInput, Tool, ToolContext, UncoveredClassesTool, UncoveredInput,
};

/// Longest accepted input line in bytes, newline excluded.
pub const MAX_LINE_BYTES: usize = 1 << 20;

const PIPE_CAPACITY: usize = 64 * 1024;

/// Methods the service answers; a rejected request for one of these has bad params.
const SERVICE_METHODS: [&str; 4] = ["initialize", "ping", "tools/list", "tools/call"];

/// Errors that end a stdio session.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("tool protocol handshake failed: {0}")]
    Handshake(String),

    #[error("tool protocol session failed: {0}")]
    Session(String),
}

/// The built-in tools as an MCP server.
#[derive(Clone)]
pub struct CovermateService {
    ctx: Arc<ToolContext>,
    tool_router: ToolRouter<Self>,
}

impl CovermateService {
    pub fn new(ctx: Arc<ToolContext>) -> Self {
        Self {
            ctx,
            tool_router: Self::tool_router(),
        }
    }

    /// Tools advertised by `tools/list`.
    pub fn tools(&self) -> Vec<McpTool> {
        self.tool_router.list_all()
    }
}

#[tool_router]
impl CovermateService {
    #[tool(description = "Evaluate an arithmetic expression, e.g. '1+2*3'.")]
    async fn calc(
        &self,
        Parameters(input): Parameters<CalcInput>,
    ) -> Result<CallToolResult, McpError> {
        respond(&CalcTool, input).await
    }

    #[tool(description = "Echo text back to the caller.")]
    async fn echo_tool(
        &self,
        Parameters(input): Parameters<EchoInput>,
    ) -> Result<CallToolResult, McpError> {
        respond(&EchoTool, input).await
    }

    #[tool(
        description = "Run Maven tests with an optional -Dtest filter and return the tail output."
    )]
    async fn maven_test_tool(
        &self,
        Parameters(input): Parameters<MavenTestInput>,
    ) -> Result<CallToolResult, McpError> {
        respond(&MavenTestTool::new(Arc::clone(&self.ctx)), input).await
    }

    #[tool(
        description = "Run tests and produce a JaCoCo XML report, returning a simple coverage summary."
    )]
    async fn maven_test_and_report(&self) -> Result<CallToolResult, McpError> {
        respond(&MavenTestAndReportTool::new(Arc::clone(&self.ctx)), NoInput {}).await
    }

    #[tool(
        description = "List classes with line coverage below `threshold` percent. Requires that maven_test_and_report has already run."
    )]
    async fn uncovered_classes(
        &self,
        Parameters(input): Parameters<UncoveredInput>,
    ) -> Result<CallToolResult, McpError> {
        respond(&UncoveredClassesTool::new(Arc::clone(&self.ctx)), input).await
    }
}

#[tool_handler]
impl ServerHandler for CovermateService {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "covermate runs Maven tests and reads JaCoCo coverage. Run \
                 'maven_test_and_report' before 'uncovered_classes'."
                    .into(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: build_info::SERVER_NAME.to_string(),
                version: build_info::VERSION.to_string(),
                ..Implementation::from_build_env()
            },
            ..Default::default()
        }
    }
}

/// Run `tool` and wrap its output as text content. Strings are sent as-is,
/// everything else as JSON text.
async fn respond<T: Tool>(tool: &T, input: T::Input) -> Result<CallToolResult, McpError> {
    info!(tool = tool.name(), "Tool invoked");
    let outcome = tool
        .call(input)
        .await
        .and_then(|output| Ok(serde_json::to_value(output)?));

    Ok(match outcome {
        Ok(Value::String(text)) => CallToolResult::success(vec![Content::text(text)]),
        Ok(value) => CallToolResult::success(vec![Content::text(value.to_string())]),
        Err(e) => {
            warn!(tool = tool.name(), error = %e, "Tool failed");
            CallToolResult::error(vec![Content::text(e.to_string())])
        }
    })
}

// ── Transport ───────────────────────────────────────────────────────────

/// Serve `service` on newline-delimited JSON-RPC until `reader` reaches EOF.
pub async fn serve<R, W>(
    service: CovermateService,
    reader: R,
    writer: W,
) -> Result<(), ProtocolError>
where
    R: AsyncBufRead + Send + Unpin + 'static,
    W: AsyncWrite + Send + Unpin + 'static,
{
    let (service_end, guard_end) = tokio::io::duplex(PIPE_CAPACITY);
    let (from_service, to_service) = tokio::io::split(guard_end);
    let (frames_tx, frames_rx) = mpsc::unbounded_channel();

    let inbound = tokio::spawn(forward_requests(reader, to_service, frames_tx.clone()));
    let outbound = tokio::spawn(forward_responses(from_service, frames_tx));
    let output = tokio::spawn(write_frames(writer, frames_rx));

    info!("Tool protocol ready on stdio");
    let result = run_service(service, service_end).await;

    // A live terminal never reaches EOF on its own.
    inbound.abort();
    let _ = outbound.await;
    let _ = output.await;
    info!("Tool protocol stopped");
    result
}

/// Serve on the process's stdin and stdout.
pub async fn serve_stdio(service: CovermateService) -> Result<(), ProtocolError> {
    serve(
        service,
        BufReader::new(tokio::io::stdin()),
        tokio::io::stdout(),
    )
    .await
}

async fn run_service(service: CovermateService, io: DuplexStream) -> Result<(), ProtocolError> {
    let running = service
        .serve(tokio::io::split(io))
        .await
        .map_err(|e| ProtocolError::Handshake(e.to_string()))?;
    running
        .waiting()
        .await
        .map_err(|e| ProtocolError::Session(e.to_string()))?;
    Ok(())
}

async fn forward_requests<R>(
    mut reader: R,
    mut to_service: WriteHalf<DuplexStream>,
    frames: mpsc::UnboundedSender<Vec<u8>>,
) where
    R: AsyncBufRead + Unpin,
{
    let mut line = Vec::new();
    loop {
        let fits = match read_line_capped(&mut reader, &mut line, MAX_LINE_BYTES).await {
            Ok(Some(fits)) => fits,
            Ok(None) => break,
            Err(e) => {
                warn!(error = %e, "Failed reading tool protocol input");
                break;
            }
        };

        match screen(&line, fits) {
            Screened::Skip => {}
            Screened::Forward => {
                line.push(b'\n');
                if to_service.write_all(&line).await.is_err() {
                    break;
                }
            }
            Screened::Reject(reply) => {
                let _ = frames.send(reply.to_string().into_bytes());
            }
        }
    }
    debug!("Input closed");
    let _ = to_service.shutdown().await;
}

async fn forward_responses(
    from_service: ReadHalf<DuplexStream>,
    frames: mpsc::UnboundedSender<Vec<u8>>,
) {
    let mut lines = BufReader::new(from_service).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        // Keep draining so the service never blocks on a dead writer.
        if frames.send(line.into_bytes()).is_err() {
            debug!("Output closed, dropping response");
        }
    }
}

async fn write_frames<W>(mut writer: W, mut frames: mpsc::UnboundedReceiver<Vec<u8>>)
where
    W: AsyncWrite + Unpin,
{
    while let Some(frame) = frames.recv().await {
        if let Err(e) = write_frame(&mut writer, frame).await {
            warn!(error = %e, "Failed writing tool protocol output");
            break;
        }
    }
}

async fn write_frame<W>(writer: &mut W, mut frame: Vec<u8>) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    frame.push(b'\n');
    writer.write_all(&frame).await?;
    writer.flush().await
}

/// Read one line into `buf` without its newline, keeping at most `max`
/// bytes and discarding the rest. `None` at EOF, otherwise whether the
/// whole line fit.
async fn read_line_capped<R>(
    reader: &mut R,
    buf: &mut Vec<u8>,
    max: usize,
) -> std::io::Result<Option<bool>>
where
    R: AsyncBufRead + Unpin,
{
    buf.clear();
    let mut fits = true;
    let mut read_any = false;
    loop {
        let available = reader.fill_buf().await?;
        if available.is_empty() {
            return Ok(read_any.then_some(fits));
        }
        read_any = true;

        let newline = available.iter().position(|&b| b == b'\n');
        let chunk = &available[..newline.unwrap_or(available.len())];
        let room = max.saturating_sub(buf.len());
        if chunk.len() > room {
            fits = false;
        }
        buf.extend_from_slice(&chunk[..chunk.len().min(room)]);

        let consumed = newline.map_or(available.len(), |i| i + 1);
        reader.consume(consumed);
        if newline.is_some() {
            return Ok(Some(fits));
        }
    }
}

/// What the guard does with one input line.
#[derive(Debug, PartialEq)]
enum Screened {
    Skip,
    Forward,
    Reject(Value),
}

fn screen(line: &[u8], fits: bool) -> Screened {
    if !fits {
        warn!(max = MAX_LINE_BYTES, "Oversized input line");
        return Screened::Reject(error_frame(
            Value::Null,
            ErrorCode::PARSE_ERROR,
            format!("Parse error: line exceeds {MAX_LINE_BYTES} bytes"),
        ));
    }
    let Ok(text) = std::str::from_utf8(line) else {
        warn!("Input line is not UTF-8");
        return Screened::Reject(error_frame(
            Value::Null,
            ErrorCode::PARSE_ERROR,
            "Parse error: line is not valid UTF-8".to_string(),
        ));
    };
    if text.trim().is_empty() {
        return Screened::Skip;
    }

    let value: Value = match serde_json::from_str(text) {
        Ok(value) => value,
        Err(e) => {
            warn!(error = %e, "Unparsable message");
            return Screened::Reject(error_frame(
                Value::Null,
                ErrorCode::PARSE_ERROR,
                format!("Parse error: {e}"),
            ));
        }
    };
    if serde_json::from_value::<ClientJsonRpcMessage>(value.clone()).is_ok() {
        return Screened::Forward;
    }

    let id = value.get("id").cloned();
    let is_v2 = value.get("jsonrpc").and_then(Value::as_str) == Some("2.0");
    let Some(method) = value
        .get("method")
        .and_then(Value::as_str)
        .filter(|_| is_v2)
    else {
        return Screened::Reject(error_frame(
            id.unwrap_or(Value::Null),
            ErrorCode::INVALID_REQUEST,
            "Invalid Request".to_string(),
        ));
    };
    // A notification gets no reply, not even an error.
    let Some(id) = id else {
        debug!(method, "Dropping malformed notification");
        return Screened::Skip;
    };

    if SERVICE_METHODS.contains(&method) {
        Screened::Reject(error_frame(
            id,
            ErrorCode::INVALID_PARAMS,
            format!("Invalid params for {method}"),
        ))
    } else {
        Screened::Reject(error_frame(
            id,
            ErrorCode::METHOD_NOT_FOUND,
            format!("Method not found: {method}"),
        ))
    }
}

fn error_frame(id: Value, code: ErrorCode, message: String) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": { "code": code.0, "message": message }
    })
}
