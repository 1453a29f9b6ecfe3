//! Temporary Maven project fixtures.
//!
//! A [`TestProject`] owns a temp directory laid out like a Maven checkout
//! and an [`AppConfig`] pointing at it. The directory is deleted when the
//! value is dropped, even on panic.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use covermate_config::AppConfig;
use covermate_core::mcp::CovermateService;
use covermate_core::process::CommandRunner;
use covermate_core::tools::{ToolContext, ToolRegistry};
use tempfile::TempDir;

use crate::config::TestConfigBuilder;

/// Report location relative to the project root.
pub const REPORT_RELATIVE: &str = "target/site/jacoco/jacoco.xml";

/// JaCoCo report with three classes at 95%, 60%, and 80% line coverage.
///
/// Summed over every scope, LINE is 60/70 covered and BRANCH 5/8.
pub const SAMPLE_REPORT: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<!DOCTYPE report PUBLIC "-//JACOCO//DTD Report 1.1//EN" "report.dtd">
<report name="sample">
  <sessioninfo id="test" start="0" dump="1"/>
  <package name="com/acme">
    <class name="com/acme/Calculator" sourcefilename="Calculator.java">
      <counter type="LINE" missed="1" covered="19"/>
      <counter type="BRANCH" missed="1" covered="3"/>
    </class>
    <class name="com/acme/Parser" sourcefilename="Parser.java">
      <counter type="LINE" missed="2" covered="3"/>
    </class>
    <class name="com/acme/Util" sourcefilename="Util.java">
      <counter type="LINE" missed="2" covered="8"/>
    </class>
  </package>
  <counter type="LINE" missed="5" covered="30"/>
  <counter type="BRANCH" missed="2" covered="2"/>
</report>
"#;

/// A throwaway project directory plus a config rooted at it.
pub struct TestProject {
    config: AppConfig,
    dir: TempDir,
}

impl TestProject {
    pub fn new() -> Self {
        let dir = TempDir::new().expect("failed to create temp dir");
        let config = TestConfigBuilder::new()
            .project_root(dir.path())
            .pom("pom.xml")
            .report(REPORT_RELATIVE)
            .build();
        Self { config, dir }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Mutable access for tests that tweak the config before building.
    pub fn config_mut(&mut self) -> &mut AppConfig {
        &mut self.config
    }

    pub fn report_path(&self) -> PathBuf {
        self.dir.path().join(REPORT_RELATIVE)
    }

    /// Write `xml` where the config expects the report.
    pub async fn write_report(&self, xml: &str) {
        let path = self.report_path();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .expect("failed to create report dir");
        }
        tokio::fs::write(&path, xml)
            .await
            .expect("failed to write report");
    }

    /// Write a TOML config file into the project and return its path.
    pub async fn write_config_file(&self, toml_content: &str) -> PathBuf {
        let path = self.dir.path().join("covermate.toml");
        tokio::fs::write(&path, toml_content)
            .await
            .expect("failed to write config file");
        path
    }

    pub fn context(&self, runner: Arc<dyn CommandRunner>) -> Arc<ToolContext> {
        Arc::new(ToolContext::from_config(&self.config, runner).expect("invalid test config"))
    }

    /// A registry with the built-in tools wired to `runner`.
    pub fn registry(&self, runner: Arc<dyn CommandRunner>) -> ToolRegistry {
        ToolRegistry::with_defaults(self.context(runner))
    }

    /// The MCP service wired to `runner`.
    pub fn mcp_service(&self, runner: Arc<dyn CommandRunner>) -> CovermateService {
        CovermateService::new(self.context(runner))
    }
}

impl Default for TestProject {
    fn default() -> Self {
        Self::new()
    }
}
