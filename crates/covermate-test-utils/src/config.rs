//! Configuration builders for tests.
//!
//! Use [`TestConfigBuilder`] to create customised [`AppConfig`] values without
//! repeating boilerplate across crate boundaries.

use std::path::Path;

use covermate_config::AppConfig;

/// Fluent builder for [`AppConfig`] in tests.
///
/// # Example
///
/// ```ignore
/// let config = TestConfigBuilder::new()
///     .project_root(dir.path())
///     .report("build/jacoco.xml")
///     .build();
/// ```
pub struct TestConfigBuilder {
    config: AppConfig,
}

impl TestConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: AppConfig::default(),
        }
    }

    pub fn project_root(mut self, root: &Path) -> Self {
        self.config.project.root = root.display().to_string();
        self
    }

    pub fn pom(mut self, pom: &str) -> Self {
        self.config.project.pom = pom.to_string();
        self
    }

    pub fn report(mut self, report: &str) -> Self {
        self.config.project.report = report.to_string();
        self
    }

    pub fn build(self) -> AppConfig {
        self.config
    }
}

impl Default for TestConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
