//! Tool registry: named operations with typed inputs and outputs.
//!
//! Each tool implements [`Tool`] with its own input and output types; input
//! schemas are derived with `schemars`. The [`ToolRegistry`] erases those
//! types behind JSON for the HTTP API and one-shot CLI calls. The stdio
//! protocol in [`crate::mcp`] calls the typed tools directly.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{info, warn};

use covermate_config::{AppConfig, ConfigError};

use crate::BoxFuture;
use crate::calc::{self, CalcError};
use crate::coverage::{ClassCoverage, CoverageError, CoverageReport, CoverageSummary};
use crate::maven::Maven;
use crate::process::{CommandRunner, ProcessError, ProcessResult};

/// Errors from tool dispatch and execution.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("unknown tool: {0}")]
    NotFound(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Calc(#[from] CalcError),

    #[error(transparent)]
    Coverage(#[from] CoverageError),

    #[error(transparent)]
    Process(#[from] ProcessError),

    #[error("failed to serialize tool output: {0}")]
    Output(#[from] serde_json::Error),
}

/// Name, description, and JSON Schema of a tool's input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

/// Everything a tool handler needs, resolved from configuration up front.
pub struct ToolContext {
    pub maven: Maven,
    pub default_threshold: f64,
    pub runner: Arc<dyn CommandRunner>,
}

impl ToolContext {
    /// Resolve project paths from `config` and pair them with `runner`.
    pub fn from_config(
        config: &AppConfig,
        runner: Arc<dyn CommandRunner>,
    ) -> Result<Self, ConfigError> {
        let paths = config.project_paths()?;
        Ok(Self {
            maven: Maven::new(config.maven.clone(), paths),
            default_threshold: config.coverage.default_threshold,
            runner,
        })
    }

    /// Where the JaCoCo report is expected.
    pub fn report_path(&self) -> &Path {
        &self.maven.paths().report
    }
}

/// A named operation with typed input and output.
pub trait Tool: Send + Sync + 'static {
    type Input: DeserializeOwned + JsonSchema + Send;
    type Output: Serialize + Send;

    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    fn call(&self, input: Self::Input) -> BoxFuture<'_, Result<Self::Output, ToolError>>;
}

/// Object-safe, JSON-in/JSON-out view of a [`Tool`].
pub trait ErasedTool: Send + Sync {
    fn definition(&self) -> ToolDefinition;

    /// Deserialize `args` (`null` means no arguments), run, serialize.
    fn call_json(&self, args: Value) -> BoxFuture<'_, Result<Value, ToolError>>;
}

impl<T: Tool> ErasedTool for T {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            input_schema: schemars::schema_for!(T::Input).to_value(),
        }
    }

    fn call_json(&self, args: Value) -> BoxFuture<'_, Result<Value, ToolError>> {
        let args = if args.is_null() { json!({}) } else { args };
        let input = serde_json::from_value::<T::Input>(args)
            .map_err(|e| ToolError::InvalidInput(e.to_string()));
        Box::pin(async move {
            let output = self.call(input?).await?;
            Ok(serde_json::to_value(output)?)
        })
    }
}

/// Registry of available tools, keyed by name.
pub struct ToolRegistry {
    tools: HashMap<String, Box<dyn ErasedTool>>,
}

impl ToolRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Create a registry with the built-in tools.
    pub fn with_defaults(ctx: Arc<ToolContext>) -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(CalcTool));
        registry.register(Box::new(EchoTool));
        registry.register(Box::new(MavenTestTool::new(Arc::clone(&ctx))));
        registry.register(Box::new(MavenTestAndReportTool::new(Arc::clone(&ctx))));
        registry.register(Box::new(UncoveredClassesTool::new(ctx)));
        registry
    }

    /// Register a tool, replacing any tool with the same name.
    pub fn register(&mut self, tool: Box<dyn ErasedTool>) {
        let name = tool.definition().name;
        self.tools.insert(name, tool);
    }

    /// Look up a tool by name.
    pub fn get(&self, name: &str) -> Option<&dyn ErasedTool> {
        self.tools.get(name).map(|t| t.as_ref())
    }

    /// All registered tool names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.tools.keys().cloned().collect();
        names.sort();
        names
    }

    /// All tool definitions, sorted by name.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        let mut defs: Vec<_> = self.tools.values().map(|t| t.definition()).collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }

    /// Invoke a tool by name with JSON arguments.
    pub async fn call(&self, name: &str, args: Value) -> Result<Value, ToolError> {
        let tool = self
            .get(name)
            .ok_or_else(|| ToolError::NotFound(name.to_string()))?;
        info!(tool = name, "Tool invoked");
        let result = tool.call_json(args).await;
        if let Err(e) = &result {
            warn!(tool = name, error = %e, "Tool failed");
        }
        result
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ── Built-in tools ──────────────────────────────────────────────────────

/// Input for `calc`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CalcInput {
    /// Expression using + - * / ** unary minus and parentheses.
    pub expression: String,
}

/// Evaluates a restricted arithmetic expression.
pub struct CalcTool;

impl Tool for CalcTool {
    type Input = CalcInput;
    type Output = f64;

    fn name(&self) -> &'static str {
        "calc"
    }

    fn description(&self) -> &'static str {
        "Evaluate an arithmetic expression, e.g. '1+2*3'."
    }


    fn call(&self, input: CalcInput) -> BoxFuture<'_, Result<f64, ToolError>> {
        Box::pin(async move { Ok(calc::evaluate(&input.expression)?) })
    }
}

/// Input for `echo_tool`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct EchoInput {
    /// Text to echo.
    pub text: String,
}

/// Returns its input unchanged.
pub struct EchoTool;

impl Tool for EchoTool {
    type Input = EchoInput;
    type Output = String;

    fn name(&self) -> &'static str {
        "echo_tool"
    }

    fn description(&self) -> &'static str {
        "Echo text back to the caller."
    }


    fn call(&self, input: EchoInput) -> BoxFuture<'_, Result<String, ToolError>> {
        Box::pin(async move { Ok(input.text) })
    }
}

/// Input for `maven_test_tool`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct MavenTestInput {
    /// Maven `-Dtest` filter, e.g. `MyTest#method`; empty or absent runs every test.
    #[serde(default)]
    pub test_filter: Option<String>,
}

/// Runs `mvn test`, optionally filtered.
pub struct MavenTestTool {
    ctx: Arc<ToolContext>,
}

impl MavenTestTool {
    pub fn new(ctx: Arc<ToolContext>) -> Self {
        Self { ctx }
    }
}

impl Tool for MavenTestTool {
    type Input = MavenTestInput;
    type Output = ProcessResult;

    fn name(&self) -> &'static str {
        "maven_test_tool"
    }

    fn description(&self) -> &'static str {
        "Run Maven tests with an optional -Dtest filter and return the tail output."
    }


    fn call(&self, input: MavenTestInput) -> BoxFuture<'_, Result<ProcessResult, ToolError>> {
        Box::pin(async move {
            let spec = self.ctx.maven.test_command(input.test_filter.as_deref())?;
            let output = self.ctx.runner.execute(&spec).await?;
            Ok(ProcessResult::from_output(&spec, &output))
        })
    }
}

/// Input for tools that take no arguments.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct NoInput {}

/// Output of `maven_test_and_report`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportRunResult {
    pub returncode: i32,
    pub summary: CoverageSummary,
}

/// Runs the report goals and summarizes the resulting JaCoCo report.
pub struct MavenTestAndReportTool {
    ctx: Arc<ToolContext>,
}

impl MavenTestAndReportTool {
    pub fn new(ctx: Arc<ToolContext>) -> Self {
        Self { ctx }
    }
}

impl Tool for MavenTestAndReportTool {
    type Input = NoInput;
    type Output = ReportRunResult;

    fn name(&self) -> &'static str {
        "maven_test_and_report"
    }

    fn description(&self) -> &'static str {
        "Run tests and produce a JaCoCo XML report, returning a simple coverage summary."
    }


    fn call(&self, _input: NoInput) -> BoxFuture<'_, Result<ReportRunResult, ToolError>> {
        Box::pin(async move {
            let spec = self.ctx.maven.report_command()?;
            let output = self.ctx.runner.execute(&spec).await?;

            // A failed build usually leaves no report; the exit code says why.
            let summary = match CoverageReport::load(self.ctx.report_path()).await {
                Ok(report) => report.summarize(),
                Err(CoverageError::ReportMissing(path)) => {
                    warn!(path = %path.display(), "No coverage report after build");
                    CoverageSummary::default()
                }
                Err(e) => return Err(e.into()),
            };

            Ok(ReportRunResult {
                returncode: output.exit_code,
                summary,
            })
        })
    }
}

/// Input for `uncovered_classes`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct UncoveredInput {
    /// Line coverage percentage in [0, 100]; classes strictly below it are
    /// listed. The configured default when absent.
    #[serde(default)]
    #[schemars(range(min = 0, max = 100))]
    pub threshold: Option<f64>,
}

/// Lists classes whose line coverage is below a threshold.
pub struct UncoveredClassesTool {
    ctx: Arc<ToolContext>,
}

impl UncoveredClassesTool {
    pub fn new(ctx: Arc<ToolContext>) -> Self {
        Self { ctx }
    }
}

impl Tool for UncoveredClassesTool {
    type Input = UncoveredInput;
    type Output = Vec<ClassCoverage>;

    fn name(&self) -> &'static str {
        "uncovered_classes"
    }

    fn description(&self) -> &'static str {
        "List classes with line coverage below `threshold` percent. \
         Requires that maven_test_and_report has already run."
    }


    fn call(&self, input: UncoveredInput) -> BoxFuture<'_, Result<Vec<ClassCoverage>, ToolError>> {
        Box::pin(async move {
            let threshold = input.threshold.unwrap_or(self.ctx.default_threshold);
            if !(0.0..=100.0).contains(&threshold) {
                return Err(ToolError::InvalidInput(format!(
                    "threshold must be in [0, 100], got {threshold}"
                )));
            }
            let report = CoverageReport::load(self.ctx.report_path()).await?;
            Ok(report.list_low_coverage(threshold))
        })
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::sync::Mutex;

    use covermate_config::{MavenConfig, ProjectPaths};
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    use super::*;
    use crate::process::{CommandSpec, RawOutput};

    const REPORT: &str = r#"<report name="r">
        <package name="org/example">
          <class name="org/example/Good"><counter type="LINE" missed="1" covered="19"/></class>
          <class name="org/example/Bad"><counter type="LINE" missed="2" covered="3"/></class>
        </package>
        <counter type="LINE" missed="3" covered="22"/>
        <counter type="BRANCH" missed="1" covered="1"/>
    </report>"#;

    /// Records commands and optionally writes a report, like a build would.
    struct FakeRunner {
        exit_code: i32,
        writes_report: Option<PathBuf>,
        calls: Mutex<Vec<CommandSpec>>,
    }

    impl CommandRunner for FakeRunner {
        fn execute<'a>(
            &'a self,
            spec: &'a CommandSpec,
        ) -> BoxFuture<'a, Result<RawOutput, ProcessError>> {
            Box::pin(async move {
                self.calls.lock().unwrap().push(spec.clone());
                if let Some(path) = &self.writes_report {
                    tokio::fs::create_dir_all(path.parent().unwrap()).await.unwrap();
                    tokio::fs::write(path, REPORT).await.unwrap();
                }
                Ok(RawOutput {
                    exit_code: self.exit_code,
                    stdout: "[INFO] BUILD".to_string(),
                    stderr: String::new(),
                })
            })
        }
    }

    struct Fixture {
        registry: ToolRegistry,
        runner: Arc<FakeRunner>,
        report: PathBuf,
        _dir: TempDir,
    }

    fn fixture(exit_code: i32, writes_report: bool) -> Fixture {
        let dir = TempDir::new().unwrap();
        let paths = ProjectPaths::new(dir.path(), "pom.xml", "target/site/jacoco/jacoco.xml");
        let report = paths.report.clone();
        let runner = Arc::new(FakeRunner {
            exit_code,
            writes_report: writes_report.then(|| report.clone()),
            calls: Mutex::new(Vec::new()),
        });
        let ctx = Arc::new(ToolContext {
            maven: Maven::new(MavenConfig::default(), paths),
            default_threshold: 80.0,
            runner: runner.clone(),
        });
        Fixture {
            registry: ToolRegistry::with_defaults(ctx),
            runner,
            report,
            _dir: dir,
        }
    }

    #[test]
    fn test_empty_registry() {
        let reg = ToolRegistry::new();
        assert!(reg.names().is_empty());
        assert!(reg.get("calc").is_none());
    }

    #[test]
    fn test_defaults_registered() {
        let fx = fixture(0, false);
        assert_eq!(
            fx.registry.names(),
            vec![
                "calc",
                "echo_tool",
                "maven_test_and_report",
                "maven_test_tool",
                "uncovered_classes"
            ]
        );
        let defs = fx.registry.definitions();
        assert_eq!(defs.len(), 5);
        assert!(defs.iter().all(|d| d.input_schema["type"] == "object"));

        let calc = defs.iter().find(|d| d.name == "calc").unwrap();
        assert_eq!(calc.input_schema["required"], json!(["expression"]));
        let maven = defs.iter().find(|d| d.name == "maven_test_tool").unwrap();
        assert!(maven.input_schema["properties"]["test_filter"].is_object());
        assert!(maven.input_schema.get("required").is_none_or(|r| r == &json!([])));
    }

    #[tokio::test]
    async fn test_calc_tool() {
        let fx = fixture(0, false);
        let value = fx
            .registry
            .call("calc", json!({"expression": "1+2*3"}))
            .await
            .unwrap();
        assert_eq!(value, json!(7.0));
    }

    #[tokio::test]
    async fn test_calc_tool_rejects_names() {
        let fx = fixture(0, false);
        let err = fx
            .registry
            .call("calc", json!({"expression": "__import__('os')"}))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ToolError::Calc(CalcError::UnsupportedExpression(_))
        ));
    }

    #[tokio::test]
    async fn test_echo_tool() {
        let fx = fixture(0, false);
        let value = fx
            .registry
            .call("echo_tool", json!({"text": "hi there"}))
            .await
            .unwrap();
        assert_eq!(value, json!("hi there"));
    }

    #[tokio::test]
    async fn test_missing_required_argument() {
        let fx = fixture(0, false);
        let err = fx.registry.call("echo_tool", Value::Null).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_unknown_tool() {
        let fx = fixture(0, false);
        let err = fx.registry.call("rm_rf", json!({})).await.unwrap_err();
        assert!(matches!(err, ToolError::NotFound(ref n) if n == "rm_rf"));
    }

    #[tokio::test]
    async fn test_maven_test_tool_passes_filter() {
        let fx = fixture(1, false);
        let value = fx
            .registry
            .call("maven_test_tool", json!({"test_filter": "CalcTest"}))
            .await
            .unwrap();
        let result: ProcessResult = serde_json::from_value(value).unwrap();
        assert_eq!(result.returncode, 1);
        assert!(result.command.contains("-Dtest=CalcTest"));
        assert_eq!(result.stdout_tail, "[INFO] BUILD");

        let calls = fx.runner.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].args.last().unwrap(), "test");
    }

    #[tokio::test]
    async fn test_maven_test_tool_without_arguments() {
        let fx = fixture(0, false);
        let value = fx
            .registry
            .call("maven_test_tool", Value::Null)
            .await
            .unwrap();
        assert!(!value["command"].as_str().unwrap().contains("-Dtest"));
    }

    #[tokio::test]
    async fn test_report_tool_summarizes() {
        let fx = fixture(0, true);
        let value = fx
            .registry
            .call("maven_test_and_report", json!({}))
            .await
            .unwrap();
        let result: ReportRunResult = serde_json::from_value(value).unwrap();
        assert_eq!(result.returncode, 0);
        // LINE: (19 + 3 + 22) / (20 + 5 + 25)
        assert_eq!(result.summary.line_coverage_pct, 88.0);
        assert_eq!(result.summary.branch_coverage_pct, 50.0);

        let calls = fx.runner.calls.lock().unwrap();
        assert!(calls[0].display().ends_with("clean test jacoco:report"));
    }

    #[tokio::test]
    async fn test_report_tool_without_report_returns_zero_summary() {
        let fx = fixture(1, false);
        let value = fx
            .registry
            .call("maven_test_and_report", json!({}))
            .await
            .unwrap();
        assert_eq!(
            value,
            json!({
                "returncode": 1,
                "summary": {"line_coverage_pct": 0.0, "branch_coverage_pct": 0.0}
            })
        );
    }

    #[tokio::test]
    async fn test_uncovered_classes_requires_report() {
        let fx = fixture(0, false);
        let err = fx
            .registry
            .call("uncovered_classes", json!({}))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ToolError::Coverage(CoverageError::ReportMissing(_))
        ));
        assert!(fx.runner.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_uncovered_classes_default_threshold() {
        let fx = fixture(0, false);
        tokio::fs::create_dir_all(fx.report.parent().unwrap())
            .await
            .unwrap();
        tokio::fs::write(&fx.report, REPORT).await.unwrap();

        let value = fx
            .registry
            .call("uncovered_classes", json!({}))
            .await
            .unwrap();
        assert_eq!(
            value,
            json!([{"class": "org.example.Bad", "line_coverage_pct": 60.0}])
        );

        let value = fx
            .registry
            .call("uncovered_classes", json!({"threshold": 96.0}))
            .await
            .unwrap();
        assert_eq!(value.as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_uncovered_classes_rejects_bad_threshold() {
        let fx = fixture(0, false);
        let err = fx
            .registry
            .call("uncovered_classes", json!({"threshold": 101}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidInput(_)));
    }
}
