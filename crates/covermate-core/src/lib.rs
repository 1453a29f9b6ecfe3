#![deny(unsafe_code)]

//! covermate core runtime.
//!
//! Exposes a small set of developer tools (arithmetic, echo, Maven test runs,
//! JaCoCo coverage summaries), served over HTTP through a tool registry or
//! over the MCP tool protocol on stdio.

use std::future::Future;
use std::pin::Pin;

/// A type-erased, `Send`-safe, boxed future, used as the return type for async
/// trait methods that require dynamic dispatch (`dyn Trait`).
///
/// Native `async fn` in traits produces opaque return types that are not
/// object-safe, so traits consumed via `&dyn Trait` return this instead.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Compile-time build metadata (version, git hash, profile).
pub mod build_info;
/// Restricted arithmetic expression evaluator.
pub mod calc;
/// JaCoCo XML report parsing and aggregation.
pub mod coverage;
/// HTTP router, server, and client.
pub mod http;
/// Maven command-line construction.
pub mod maven;
/// MCP tool protocol over stdio.
pub mod mcp;
/// External process execution.
pub mod process;
/// Server runtime and graceful shutdown.
pub mod server;
/// Tool trait and registry.
pub mod tools;

pub use calc::{CalcError, evaluate};
pub use coverage::{ClassCoverage, CoverageError, CoverageReport, CoverageSummary};
pub use maven::Maven;
pub use mcp::{CovermateService, ProtocolError};
pub use process::{CommandRunner, CommandSpec, HostRunner, ProcessError, ProcessResult, RawOutput};
pub use server::{Server, ServerError, ShutdownSignal};
pub use tools::{Tool, ToolContext, ToolDefinition, ToolError, ToolRegistry};
