#![deny(unsafe_code)]

//! Configuration loading and validation for covermate.
//!
//! Loads TOML configuration files and validates them. [`AppConfig`] is the
//! central configuration structure; [`ProjectPaths`] is the resolved view of
//! the Maven project that every tool handler receives at construction time.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Errors that can occur during configuration loading and validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("validation error: {0}")]
    Validation(String),
}

/// Top-level application configuration.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// HTTP server configuration.
    #[serde(default)]
    pub server: ServerConfig,

    /// Location of the Maven project and its coverage report.
    #[serde(default)]
    pub project: ProjectConfig,

    /// How Maven is invoked.
    #[serde(default)]
    pub maven: MavenConfig,

    /// Coverage listing defaults.
    #[serde(default)]
    pub coverage: CoverageConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Configuration for the HTTP surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address the HTTP server binds to.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Port the HTTP server binds to.
    #[serde(default = "default_listen_port")]
    pub listen_port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            listen_port: default_listen_port(),
        }
    }
}

fn default_listen_addr() -> String {
    "127.0.0.1".to_string()
}

fn default_listen_port() -> u16 {
    8000
}

/// Maven project layout.
///
/// `pom` and `report` are resolved relative to `root` unless absolute.
///
/// ## TOML Example
///
/// ```toml
/// [project]
/// root = "/home/me/se333"
/// pom = "codebase/pom.xml"
/// report = "codebase/target/site/jacoco/jacoco.xml"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Project root; also the working directory for every Maven run.
    #[serde(default = "default_project_root")]
    pub root: String,

    /// Build descriptor passed to `mvn -f`.
    #[serde(default = "default_pom")]
    pub pom: String,

    /// JaCoCo XML report produced by the `jacoco:report` goal.
    #[serde(default = "default_report")]
    pub report: String,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            root: default_project_root(),
            pom: default_pom(),
            report: default_report(),
        }
    }
}

fn default_project_root() -> String {
    ".".to_string()
}

fn default_pom() -> String {
    "codebase/pom.xml".to_string()
}

fn default_report() -> String {
    "codebase/target/site/jacoco/jacoco.xml".to_string()
}

/// Maven invocation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MavenConfig {
    /// Maven executable name or path.
    #[serde(default = "default_maven_executable")]
    pub executable: String,

    /// Argv prefix placed before the executable (e.g. `["cmd", "/c"]`).
    #[serde(default = "default_maven_launcher")]
    pub launcher: Vec<String>,

    /// Goals for a plain test run.
    #[serde(default = "default_test_goals")]
    pub test_goals: Vec<String>,

    /// Goals for a test run that produces the coverage report.
    #[serde(default = "default_report_goals")]
    pub report_goals: Vec<String>,
}

impl Default for MavenConfig {
    fn default() -> Self {
        Self {
            executable: default_maven_executable(),
            launcher: default_maven_launcher(),
            test_goals: default_test_goals(),
            report_goals: default_report_goals(),
        }
    }
}

fn default_maven_executable() -> String {
    "mvn".to_string()
}

fn default_maven_launcher() -> Vec<String> {
    // mvn is a .cmd script on Windows and cannot be spawned directly
    if cfg!(windows) {
        vec!["cmd".to_string(), "/c".to_string()]
    } else {
        Vec::new()
    }
}

fn default_test_goals() -> Vec<String> {
    vec!["test".to_string()]
}

fn default_report_goals() -> Vec<String> {
    vec![
        "clean".to_string(),
        "test".to_string(),
        "jacoco:report".to_string(),
    ]
}

/// Coverage listing defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoverageConfig {
    /// Threshold used by `uncovered_classes` when the caller omits one.
    #[serde(default = "default_threshold")]
    pub default_threshold: f64,
}

impl Default for CoverageConfig {
    fn default() -> Self {
        Self {
            default_threshold: default_threshold(),
        }
    }
}

fn default_threshold() -> f64 {
    80.0
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g. "info", "debug", "trace").
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Absolute paths derived from [`ProjectConfig`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectPaths {
    pub root: PathBuf,
    pub pom: PathBuf,
    pub report: PathBuf,
}

impl ProjectPaths {
    /// Resolve `pom` and `report` against `root`.
    pub fn new(root: impl Into<PathBuf>, pom: impl AsRef<Path>, report: impl AsRef<Path>) -> Self {
        let root = root.into();
        Self {
            pom: root.join(pom),
            report: root.join(report),
            root,
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file at the given path using async I/O.
    pub async fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = tokio::fs::read_to_string(path).await?;
        debug!(path = %path.display(), "Loaded config file");
        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.listen_port == 0 {
            return Err(ConfigError::Validation(
                "server.listen_port must be non-zero".to_string(),
            ));
        }
        if self.server.listen_addr.is_empty() {
            return Err(ConfigError::Validation(
                "server.listen_addr must not be empty".to_string(),
            ));
        }

        if self.project.root.is_empty() {
            return Err(ConfigError::Validation(
                "project.root must not be empty".to_string(),
            ));
        }
        if self.project.pom.is_empty() {
            return Err(ConfigError::Validation(
                "project.pom must not be empty".to_string(),
            ));
        }
        if self.project.report.is_empty() {
            return Err(ConfigError::Validation(
                "project.report must not be empty".to_string(),
            ));
        }

        if self.maven.executable.is_empty() {
            return Err(ConfigError::Validation(
                "maven.executable must not be empty".to_string(),
            ));
        }
        if self.maven.test_goals.is_empty() {
            return Err(ConfigError::Validation(
                "maven.test_goals must list at least one goal".to_string(),
            ));
        }
        if self.maven.report_goals.is_empty() {
            return Err(ConfigError::Validation(
                "maven.report_goals must list at least one goal".to_string(),
            ));
        }
        for (i, arg) in self.maven.launcher.iter().enumerate() {
            if arg.is_empty() {
                return Err(ConfigError::Validation(format!(
                    "maven.launcher[{i}] must not be empty"
                )));
            }
        }

        let threshold = self.coverage.default_threshold;
        if !(0.0..=100.0).contains(&threshold) {
            return Err(ConfigError::Validation(format!(
                "coverage.default_threshold must be in [0.0, 100.0], got {threshold}"
            )));
        }

        let valid_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(ConfigError::Validation(format!(
                "logging.level must be one of {:?}, got {:?}",
                valid_levels, self.logging.level
            )));
        }

        Ok(())
    }

    /// Resolve the project layout to absolute paths.
    ///
    /// A relative `project.root` is taken relative to the current directory.
    pub fn project_paths(&self) -> Result<ProjectPaths, ConfigError> {
        let root = std::path::absolute(&self.project.root)?;
        Ok(ProjectPaths::new(root, &self.project.pom, &self.project.report))
    }
}
