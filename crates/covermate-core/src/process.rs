//! External process execution.
//!
//! [`CommandRunner`] abstracts over how a [`CommandSpec`] is launched so the
//! tool facade can be driven without a real build tool. [`HostRunner`] runs
//! the command directly on the host, blocking the calling task until the
//! process exits. There is no timeout: the build runs to completion.
//!
//! A nonzero exit code is data, not an error. Only failing to launch or
//! wait on the process is a [`ProcessError`].

use std::path::PathBuf;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::BoxFuture;

/// Number of trailing characters of stdout/stderr kept in a [`ProcessResult`].
pub const TAIL_CHARS: usize = 2000;

/// Errors launching or waiting on a process.
#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("command must not be empty")]
    EmptyCommand,

    #[error("failed to launch `{program}`: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    #[error("failed waiting for `{program}`: {source}")]
    Wait {
        program: String,
        source: std::io::Error,
    },
}

/// A command line plus the directory it runs in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: PathBuf,
}

impl CommandSpec {
    /// Build a spec from a full argv; the first element is the program.
    pub fn from_argv(argv: Vec<String>, cwd: impl Into<PathBuf>) -> Result<Self, ProcessError> {
        let mut argv = argv.into_iter();
        let program = argv.next().ok_or(ProcessError::EmptyCommand)?;
        Ok(Self {
            program,
            args: argv.collect(),
            cwd: cwd.into(),
        })
    }

    /// The command line joined with single spaces.
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Everything captured from a finished process.
#[derive(Debug, Clone)]
pub struct RawOutput {
    /// Exit code; `-signal` when killed by a signal on Unix.
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl RawOutput {
    /// Whether the process exited successfully.
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Bounded, serializable summary of a process run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessResult {
    pub command: String,
    pub cwd: String,
    pub returncode: i32,
    pub stdout_tail: String,
    pub stderr_tail: String,
}

impl ProcessResult {
    /// Keep the last [`TAIL_CHARS`] characters of each stream.
    pub fn from_output(spec: &CommandSpec, output: &RawOutput) -> Self {
        Self {
            command: spec.display(),
            cwd: spec.cwd.display().to_string(),
            returncode: output.exit_code,
            stdout_tail: tail(&output.stdout, TAIL_CHARS).to_string(),
            stderr_tail: tail(&output.stderr, TAIL_CHARS).to_string(),
        }
    }
}

/// The last `max_chars` characters of `text`.
pub fn tail(text: &str, max_chars: usize) -> &str {
    if max_chars == 0 {
        return "";
    }
    match text.char_indices().rev().nth(max_chars - 1) {
        Some((start, _)) => &text[start..],
        None => text,
    }
}

/// Launches commands and captures their output.
pub trait CommandRunner: Send + Sync {
    /// Run the command to completion.
    fn execute<'a>(&'a self, spec: &'a CommandSpec)
    -> BoxFuture<'a, Result<RawOutput, ProcessError>>;
}

/// Runs commands directly on the host with piped stdout/stderr.
///
/// The child's stdin is closed so it can never read from a stdio transport.
#[derive(Debug, Default, Clone, Copy)]
pub struct HostRunner;

impl CommandRunner for HostRunner {
    fn execute<'a>(
        &'a self,
        spec: &'a CommandSpec,
    ) -> BoxFuture<'a, Result<RawOutput, ProcessError>> {
        Box::pin(async move {
            info!(command = %spec.display(), cwd = %spec.cwd.display(), "Running command");
            let start = Instant::now();

            let child = tokio::process::Command::new(&spec.program)
                .args(&spec.args)
                .current_dir(&spec.cwd)
                .stdin(std::process::Stdio::null())
                .stdout(std::process::Stdio::piped())
                .stderr(std::process::Stdio::piped())
                .spawn()
                .map_err(|source| ProcessError::Spawn {
                    program: spec.program.clone(),
                    source,
                })?;

            let output = child
                .wait_with_output()
                .await
                .map_err(|source| ProcessError::Wait {
                    program: spec.program.clone(),
                    source,
                })?;

            let exit_code = exit_code(&output.status);
            debug!(
                exit_code,
                elapsed_ms = start.elapsed().as_millis() as u64,
                "Command finished"
            );

            Ok(RawOutput {
                exit_code,
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            })
        })
    }
}

#[cfg(unix)]
fn exit_code(status: &std::process::ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;
    status
        .code()
        .or_else(|| status.signal().map(|sig| -sig))
        .unwrap_or(-1)
}

#[cfg(not(unix))]
fn exit_code(status: &std::process::ExitStatus) -> i32 {
    status.code().unwrap_or(-1)
}
