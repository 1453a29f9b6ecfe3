#![deny(unsafe_code)]

//! Shared test utilities for the covermate workspace.
//!
//! Provides config builders, a temporary project with a JaCoCo report, a
//! recording command runner, and tracing helpers so that individual crate
//! tests stay concise and consistent.
//!
//! Add this crate as a `[dev-dependency]` in any workspace member:
//!
//! ```toml
//! [dev-dependencies]
//! covermate-test-utils = { workspace = true }
//! ```

pub mod config;
pub mod project;
pub mod runner;
pub mod tracing_setup;
