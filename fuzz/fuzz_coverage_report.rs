//! Fuzz target for the JaCoCo report parser.
//!
//! Run with: cargo +nightly fuzz run fuzz_coverage_report
//!
//! Percentages derived from any report that parses must stay in [0, 100].

#![no_main]

use covermate_core::coverage::CoverageReport;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(xml) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(report) = CoverageReport::parse(xml) else {
        return;
    };

    let summary = report.summarize();
    for pct in [summary.line_coverage_pct, summary.branch_coverage_pct] {
        assert!((0.0..=100.0).contains(&pct));
    }
    for class in report.list_low_coverage(100.0) {
        assert!((0.0..=100.0).contains(&class.line_coverage_pct));
    }
});
