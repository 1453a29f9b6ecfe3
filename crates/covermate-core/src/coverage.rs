//! JaCoCo XML coverage report parsing and aggregation.
//!
//! A report nests `counter` elements at every scope (method, class,
//! sourcefile, package, report). [`CoverageReport::summarize`] sums every
//! LINE and BRANCH counter in the document regardless of scope, so totals
//! count each line once per enclosing level.
//! [`CoverageReport::list_low_coverage`] looks only at the first LINE
//! counter directly under each `class` element; method counters nested
//! inside the class are never consulted.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Errors from loading or parsing a coverage report.
#[derive(Debug, thiserror::Error)]
pub enum CoverageError {
    #[error("coverage report not found at {}; run maven_test_and_report first", .0.display())]
    ReportMissing(PathBuf),

    #[error("failed to read coverage report: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid coverage report XML: {0}")]
    Xml(#[from] roxmltree::Error),

    #[error("malformed coverage report: {0}")]
    Malformed(String),
}

/// JaCoCo counter types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CounterKind {
    Instruction,
    Branch,
    Line,
    Complexity,
    Method,
    Class,
}

impl CounterKind {
    /// Parse the `type` attribute of a `counter` element.
    pub fn from_attr(value: &str) -> Option<Self> {
        match value {
            "INSTRUCTION" => Some(Self::Instruction),
            "BRANCH" => Some(Self::Branch),
            "LINE" => Some(Self::Line),
            "COMPLEXITY" => Some(Self::Complexity),
            "METHOD" => Some(Self::Method),
            "CLASS" => Some(Self::Class),
            _ => None,
        }
    }
}

/// A covered/missed pair at some scope of the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Counter {
    pub kind: CounterKind,
    pub covered: u64,
    pub missed: u64,
}

impl Counter {
    /// Coverage of this counter alone, see [`percentage`].
    pub fn percentage(&self) -> f64 {
        percentage(self.covered, self.missed)
    }
}

/// `covered / (covered + missed)` as a percentage rounded to two decimals,
/// or `0.0` when both are zero.
pub fn percentage(covered: u64, missed: u64) -> f64 {
    if covered == 0 && missed == 0 {
        return 0.0;
    }
    let pct = 100.0 * covered as f64 / (covered as f64 + missed as f64);
    (pct * 100.0).round_ties_even() / 100.0
}

/// Whole-report coverage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CoverageSummary {
    pub line_coverage_pct: f64,
    pub branch_coverage_pct: f64,
}

/// Line coverage of a single class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassCoverage {
    /// Dotted qualified name (`org.example.Foo`).
    #[serde(rename = "class")]
    pub class_name: String,
    pub line_coverage_pct: f64,
}

/// A `class` element: its dotted name and first direct LINE counter.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassEntry {
    pub name: String,
    pub line: Option<Counter>,
}

/// Counters and classes extracted from a JaCoCo XML report.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CoverageReport {
    counters: Vec<Counter>,
    classes: Vec<ClassEntry>,
}

impl CoverageReport {
    /// Read and parse the report at `path`.
    ///
    /// A missing file is [`CoverageError::ReportMissing`].
    pub async fn load(path: &Path) -> Result<Self, CoverageError> {
        let xml = match tokio::fs::read_to_string(path).await {
            Ok(xml) => xml,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(CoverageError::ReportMissing(path.to_path_buf()));
            }
            Err(e) => return Err(e.into()),
        };
        let report = Self::parse(&xml)?;
        debug!(
            path = %path.display(),
            counters = report.counters.len(),
            classes = report.classes.len(),
            "Parsed coverage report"
        );
        Ok(report)
    }

    /// Parse report XML. The JaCoCo DOCTYPE is accepted but never resolved.
    pub fn parse(xml: &str) -> Result<Self, CoverageError> {
        let options = roxmltree::ParsingOptions {
            allow_dtd: true,
            ..roxmltree::ParsingOptions::default()
        };
        let doc = roxmltree::Document::parse_with_options(xml, options)?;

        let mut counters = Vec::new();
        let mut classes = Vec::new();
        for node in doc.descendants().filter(|n| n.is_element()) {
            match node.tag_name().name() {
                "counter" => {
                    if let Some(counter) = parse_counter(node)? {
                        counters.push(counter);
                    }
                }
                "class" => classes.push(parse_class(node)?),
                _ => {}
            }
        }

        Ok(Self { counters, classes })
    }

    /// Every recognised counter, in document order.
    pub fn counters(&self) -> &[Counter] {
        &self.counters
    }

    /// Every class element, in document order.
    pub fn classes(&self) -> &[ClassEntry] {
        &self.classes
    }

    /// Line and branch coverage summed over every counter in the report.
    pub fn summarize(&self) -> CoverageSummary {
        let (mut line_covered, mut line_missed) = (0u64, 0u64);
        let (mut branch_covered, mut branch_missed) = (0u64, 0u64);
        for counter in &self.counters {
            match counter.kind {
                CounterKind::Line => {
                    line_covered = line_covered.saturating_add(counter.covered);
                    line_missed = line_missed.saturating_add(counter.missed);
                }
                CounterKind::Branch => {
                    branch_covered = branch_covered.saturating_add(counter.covered);
                    branch_missed = branch_missed.saturating_add(counter.missed);
                }
                _ => {}
            }
        }
        CoverageSummary {
            line_coverage_pct: percentage(line_covered, line_missed),
            branch_coverage_pct: percentage(branch_covered, branch_missed),
        }
    }

    /// Classes whose line coverage is strictly below `threshold`, in
    /// document order. A class without a LINE counter counts as 0%.
    pub fn list_low_coverage(&self, threshold: f64) -> Vec<ClassCoverage> {
        self.classes
            .iter()
            .map(|class| ClassCoverage {
                class_name: class.name.clone(),
                line_coverage_pct: class.line.map(|c| c.percentage()).unwrap_or(0.0),
            })
            .filter(|c| c.line_coverage_pct < threshold)
            .collect()
    }
}

fn required_attr<'a>(node: roxmltree::Node<'a, '_>, name: &str) -> Result<&'a str, CoverageError> {
    node.attribute(name).ok_or_else(|| {
        CoverageError::Malformed(format!(
            "<{}> at byte {} is missing the `{name}` attribute",
            node.tag_name().name(),
            node.range().start
        ))
    })
}

fn count_attr(node: roxmltree::Node<'_, '_>, name: &str) -> Result<u64, CoverageError> {
    let raw = required_attr(node, name)?;
    raw.trim().parse().map_err(|_| {
        CoverageError::Malformed(format!(
            "counter at byte {} has non-integer `{name}` value {raw:?}",
            node.range().start
        ))
    })
}

/// `Ok(None)` for counter types outside [`CounterKind`].
fn parse_counter(node: roxmltree::Node<'_, '_>) -> Result<Option<Counter>, CoverageError> {
    let kind_attr = required_attr(node, "type")?;
    let Some(kind) = CounterKind::from_attr(kind_attr) else {
        debug!(kind = kind_attr, "Ignoring unknown counter type");
        return Ok(None);
    };
    Ok(Some(Counter {
        kind,
        covered: count_attr(node, "covered")?,
        missed: count_attr(node, "missed")?,
    }))
}

fn parse_class(node: roxmltree::Node<'_, '_>) -> Result<ClassEntry, CoverageError> {
    let name = required_attr(node, "name")?.replace('/', ".");

    let mut line = None;
    for child in node.children().filter(|c| c.has_tag_name("counter")) {
        if let Some(counter) = parse_counter(child)?
            && counter.kind == CounterKind::Line
        {
            line = Some(counter);
            break;
        }
    }

    Ok(ClassEntry { name, line })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    /// A trimmed JaCoCo report with counters at method, class, sourcefile,
    /// package, and report scope.
    const SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<!DOCTYPE report PUBLIC "-//JACOCO//DTD Report 1.1//EN" "report.dtd">
<report name="codebase">
  <sessioninfo id="host-1" start="1700000000000" dump="1700000001000"/>
  <package name="org/example">
    <class name="org/example/Calculator" sourcefilename="Calculator.java">
      <method name="add" desc="(II)I" line="5">
        <counter type="INSTRUCTION" missed="0" covered="4"/>
        <counter type="LINE" missed="0" covered="1"/>
      </method>
      <counter type="INSTRUCTION" missed="2" covered="38"/>
      <counter type="BRANCH" missed="1" covered="3"/>
      <counter type="LINE" missed="1" covered="19"/>
    </class>
    <class name="org/example/Parser" sourcefilename="Parser.java">
      <counter type="LINE" missed="2" covered="3"/>
      <counter type="BRANCH" missed="2" covered="2"/>
    </class>
    <class name="org/example/Util" sourcefilename="Util.java">
      <counter type="LINE" missed="2" covered="8"/>
    </class>
    <sourcefile name="Calculator.java">
      <line nr="5" mi="0" ci="4" mb="0" cb="0"/>
      <counter type="LINE" missed="1" covered="19"/>
    </sourcefile>
    <counter type="LINE" missed="5" covered="30"/>
  </package>
  <counter type="LINE" missed="5" covered="30"/>
  <counter type="BRANCH" missed="3" covered="5"/>
</report>"#;

    #[test]
    fn test_percentage_rounding() {
        assert_eq!(percentage(8, 2), 80.0);
        assert_eq!(percentage(1, 2), 33.33);
        assert_eq!(percentage(2, 1), 66.67);
        assert_eq!(percentage(0, 0), 0.0);
        assert_eq!(percentage(0, 7), 0.0);
        assert_eq!(percentage(7, 0), 100.0);
    }

    #[test]
    fn test_single_line_counter_summary() {
        let report =
            CoverageReport::parse(r#"<report><counter type="LINE" covered="8" missed="2"/></report>"#)
                .unwrap();
        let summary = report.summarize();
        assert_eq!(summary.line_coverage_pct, 80.0);
        assert_eq!(summary.branch_coverage_pct, 0.0);
    }

    #[test]
    fn test_empty_report_summary_is_zero() {
        let report = CoverageReport::parse("<report name=\"empty\"/>").unwrap();
        assert_eq!(report.summarize(), CoverageSummary::default());
        assert!(report.list_low_coverage(80.0).is_empty());
    }

    #[test]
    fn test_summary_sums_every_scope() {
        let report = CoverageReport::parse(SAMPLE).unwrap();
        let summary = report.summarize();
        // LINE: 1 + 19 + 3 + 8 + 19 + 30 + 30 covered, 0 + 1 + 2 + 2 + 1 + 5 + 5 missed
        assert_eq!(summary.line_coverage_pct, percentage(110, 16));
        // BRANCH: 3 + 2 + 5 covered, 1 + 2 + 3 missed
        assert_eq!(summary.branch_coverage_pct, percentage(10, 6));
    }

    #[test]
    fn test_summary_is_idempotent() {
        let report = CoverageReport::parse(SAMPLE).unwrap();
        assert_eq!(report.summarize(), report.summarize());
        assert_eq!(
            CoverageReport::parse(SAMPLE).unwrap().summarize(),
            report.summarize()
        );
    }

    #[test]
    fn test_low_coverage_threshold_is_strict() {
        let report = CoverageReport::parse(SAMPLE).unwrap();
        // Calculator 95.0, Parser 60.0, Util 80.0
        let low = report.list_low_coverage(80.0);
        assert_eq!(
            low,
            vec![ClassCoverage {
                class_name: "org.example.Parser".to_string(),
                line_coverage_pct: 60.0,
            }]
        );
    }

    #[test]
    fn test_low_coverage_preserves_document_order() {
        let report = CoverageReport::parse(SAMPLE).unwrap();
        let names: Vec<_> = report
            .list_low_coverage(100.0)
            .into_iter()
            .map(|c| c.class_name)
            .collect();
        assert_eq!(
            names,
            vec![
                "org.example.Calculator",
                "org.example.Parser",
                "org.example.Util"
            ]
        );
        assert!(report.list_low_coverage(0.0).is_empty());
    }

    #[test]
    fn test_class_uses_direct_counter_not_method_counter() {
        let report = CoverageReport::parse(SAMPLE).unwrap();
        let calculator = &report.classes()[0];
        assert_eq!(calculator.name, "org.example.Calculator");
        assert_eq!(
            calculator.line,
            Some(Counter {
                kind: CounterKind::Line,
                covered: 19,
                missed: 1,
            })
        );
    }

    #[test]
    fn test_method_counter_does_not_rate_class() {
        let xml = r#"<report><package name="p"><class name="p/A">
            <method name="m" desc="()V"><counter type="LINE" missed="0" covered="1"/></method>
            <counter type="LINE" missed="3" covered="1"/>
        </class></package></report>"#;
        let report = CoverageReport::parse(xml).unwrap();
        assert_eq!(
            report.list_low_coverage(80.0),
            vec![ClassCoverage {
                class_name: "p.A".to_string(),
                line_coverage_pct: 25.0,
            }]
        );
    }

    #[test]
    fn test_class_without_line_counter_counts_as_zero() {
        let xml = r#"<report><package name="p"><class name="p/Empty">
            <counter type="INSTRUCTION" covered="0" missed="0"/>
        </class></package></report>"#;
        let report = CoverageReport::parse(xml).unwrap();
        let low = report.list_low_coverage(50.0);
        assert_eq!(low.len(), 1);
        assert_eq!(low[0].class_name, "p.Empty");
        assert_eq!(low[0].line_coverage_pct, 0.0);
    }

    #[test]
    fn test_unknown_counter_types_ignored() {
        let xml = r#"<report>
            <counter type="SOMETHING" covered="x" missed="y"/>
            <counter type="LINE" covered="1" missed="1"/>
        </report>"#;
        let report = CoverageReport::parse(xml).unwrap();
        assert_eq!(report.counters().len(), 1);
        assert_eq!(report.summarize().line_coverage_pct, 50.0);
    }

    #[test]
    fn test_malformed_counters_rejected() {
        let missing = r#"<report><counter type="LINE" covered="1"/></report>"#;
        assert!(matches!(
            CoverageReport::parse(missing),
            Err(CoverageError::Malformed(_))
        ));

        let non_numeric = r#"<report><counter type="LINE" covered="one" missed="0"/></report>"#;
        assert!(matches!(
            CoverageReport::parse(non_numeric),
            Err(CoverageError::Malformed(_))
        ));

        let untyped = r#"<report><counter covered="1" missed="0"/></report>"#;
        assert!(matches!(
            CoverageReport::parse(untyped),
            Err(CoverageError::Malformed(_))
        ));

        let nameless = r#"<report><class><counter type="LINE" covered="1" missed="0"/></class></report>"#;
        assert!(matches!(
            CoverageReport::parse(nameless),
            Err(CoverageError::Malformed(_))
        ));
    }

    #[test]
    fn test_invalid_xml_rejected() {
        assert!(matches!(
            CoverageReport::parse("<report><counter"),
            Err(CoverageError::Xml(_))
        ));
    }

    #[test]
    fn test_class_coverage_serializes_with_class_key() {
        let record = ClassCoverage {
            class_name: "a.B".to_string(),
            line_coverage_pct: 12.5,
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"class": "a.B", "line_coverage_pct": 12.5})
        );
    }

    #[tokio::test]
    async fn test_load_missing_report() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("jacoco.xml");
        let err = CoverageReport::load(&path).await.unwrap_err();
        assert!(matches!(err, CoverageError::ReportMissing(ref p) if *p == path));
        assert!(err.to_string().contains("maven_test_and_report"));
    }

    #[tokio::test]
    async fn test_load_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("jacoco.xml");
        tokio::fs::write(&path, SAMPLE).await.unwrap();

        let report = CoverageReport::load(&path).await.unwrap();
        assert_eq!(report.classes().len(), 3);
    }
}
