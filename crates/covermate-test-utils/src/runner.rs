//! A [`CommandRunner`] that never spawns anything.
//!
//! [`RecordingRunner`] remembers every command it was asked to run, answers
//! with canned output, and can drop a coverage report on disk the way a real
//! `mvn jacoco:report` would.

use std::path::PathBuf;
use std::sync::Mutex;

use covermate_core::BoxFuture;
use covermate_core::process::{CommandRunner, CommandSpec, ProcessError, RawOutput};

/// Scripted command runner for tests.
pub struct RecordingRunner {
    exit_code: i32,
    stdout: String,
    stderr: String,
    report: Option<(PathBuf, String)>,
    calls: Mutex<Vec<CommandSpec>>,
}

impl RecordingRunner {
    /// Succeeds with empty output.
    pub fn new() -> Self {
        Self {
            exit_code: 0,
            stdout: String::new(),
            stderr: String::new(),
            report: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn exit_code(mut self, code: i32) -> Self {
        self.exit_code = code;
        self
    }

    pub fn stdout(mut self, text: impl Into<String>) -> Self {
        self.stdout = text.into();
        self
    }

    pub fn stderr(mut self, text: impl Into<String>) -> Self {
        self.stderr = text.into();
        self
    }

    /// Write `xml` to `path` on every run.
    pub fn writes_report(mut self, path: impl Into<PathBuf>, xml: impl Into<String>) -> Self {
        self.report = Some((path.into(), xml.into()));
        self
    }

    /// Commands run so far, oldest first.
    pub fn calls(&self) -> Vec<CommandSpec> {
        self.calls.lock().expect("calls lock poisoned").clone()
    }
}

impl Default for RecordingRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandRunner for RecordingRunner {
    fn execute<'a>(
        &'a self,
        spec: &'a CommandSpec,
    ) -> BoxFuture<'a, Result<RawOutput, ProcessError>> {
        Box::pin(async move {
            tracing::debug!(command = %spec.display(), "Recorded command");
            self.calls
                .lock()
                .expect("calls lock poisoned")
                .push(spec.clone());

            if let Some((path, xml)) = &self.report {
                if let Some(parent) = path.parent() {
                    tokio::fs::create_dir_all(parent)
                        .await
                        .expect("failed to create report dir");
                }
                tokio::fs::write(path, xml)
                    .await
                    .expect("failed to write report");
            }

            Ok(RawOutput {
                exit_code: self.exit_code,
                stdout: self.stdout.clone(),
                stderr: self.stderr.clone(),
            })
        })
    }
}
