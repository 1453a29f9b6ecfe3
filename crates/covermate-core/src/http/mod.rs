//! HTTP surface: axum router over TCP.
//!
//! Exposes a health check, the echo and Maven test shortcuts, and generic
//! access to every registered tool. All handlers dispatch through the shared
//! [`ToolRegistry`](crate::tools::ToolRegistry).
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐        HTTP/1.1 + JSON      ┌──────────────┐
//! │  client  │────────────────────────────▶│  axum router │
//! │  (CLI)   │                             └──────┬───────┘
//! └──────────┘                                    │
//!                                          ┌──────▼───────┐
//!                                          │ ToolRegistry │
//!                                          └──────────────┘
//! ```

pub mod client;
pub mod server;
pub mod types;

pub use client::{HttpClient, HttpClientError};
pub use server::{HttpState, router, serve};
pub use types::*;
