//! Maven command lines.

use covermate_config::{MavenConfig, ProjectPaths};

use crate::process::{CommandSpec, ProcessError};

/// Builds `mvn` invocations for one project.
#[derive(Debug, Clone)]
pub struct Maven {
    config: MavenConfig,
    paths: ProjectPaths,
}

impl Maven {
    pub fn new(config: MavenConfig, paths: ProjectPaths) -> Self {
        Self { config, paths }
    }

    pub fn paths(&self) -> &ProjectPaths {
        &self.paths
    }

    /// `mvn -f <pom> [-Dtest=<filter>] <test goals>`.
    ///
    /// An empty filter runs every test.
    pub fn test_command(&self, test_filter: Option<&str>) -> Result<CommandSpec, ProcessError> {
        let mut extra = Vec::new();
        if let Some(filter) = test_filter.filter(|f| !f.is_empty()) {
            extra.push(format!("-Dtest={filter}"));
        }
        self.command(extra, &self.config.test_goals)
    }

    /// `mvn -f <pom> <report goals>`, producing the JaCoCo report.
    pub fn report_command(&self) -> Result<CommandSpec, ProcessError> {
        self.command(Vec::new(), &self.config.report_goals)
    }

    fn command(&self, extra: Vec<String>, goals: &[String]) -> Result<CommandSpec, ProcessError> {
        let argv: Vec<String> = self
            .config
            .launcher
            .iter()
            .cloned()
            .chain([
                self.config.executable.clone(),
                "-f".to_string(),
                self.paths.pom.display().to_string(),
            ])
            .chain(extra)
            .chain(goals.iter().cloned())
            .collect();
        CommandSpec::from_argv(argv, &self.paths.root)
    }
}
