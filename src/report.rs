//! Report Generator: flat text (and JSON) summaries of a run.
//!
//! The text layout is a header block followed by four lines per step:
//!
//! ```text
//! time:03-14-2026, 09:26:53
//! passes:1
//! failures:1
//! untested:0
//!
//! 1__CMVCore__IMVCore__Init
//! /res/1__CMVCore__IMVCore__Init/init.xml
//! 1
//! 42
//!
//! ...
//! ```

use std::{fmt::Write as _, fs, path::Path};

use serde::Serialize;
use tracing::info;

use crate::step::{RunSummary, Step};
use crate::TorsoError;

pub const TIME_FORMAT: &str = "%m-%d-%Y, %H:%M:%S";

/// Renders the text report.
pub fn render(summary: &RunSummary, steps: &[Step]) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail.
    let _ = writeln!(out, "time:{}", summary.started_at.format(TIME_FORMAT));
    let _ = writeln!(out, "passes:{}", summary.passed);
    let _ = writeln!(out, "failures:{}", summary.failed);
    let _ = writeln!(out, "untested:{}", summary.skipped());
    out.push('\n');

    for step in steps {
        let _ = writeln!(out, "{}", step.name);
        let _ = writeln!(out, "{}", step.config_arg());
        let _ = writeln!(out, "{}", if step.passed { 1 } else { 0 });
        let _ = writeln!(out, "{}", step.elapsed.as_millis());
        out.push('\n');
    }
    out
}

/// Writes the text report to `path`, replacing any existing file.
pub fn write(path: &Path, summary: &RunSummary, steps: &[Step]) -> Result<(), TorsoError> {
    info!(report = %path.display(), "dumping report");
    fs::write(path, render(summary, steps)).map_err(|e| TorsoError::io("write", path, e))
}

#[derive(Debug, Serialize)]
struct JsonReport<'a> {
    time: String,
    passes: usize,
    failures: usize,
    untested: usize,
    steps: &'a [Step],
}

/// Writes the same data as [`write`] as pretty-printed JSON.
pub fn write_json(path: &Path, summary: &RunSummary, steps: &[Step]) -> Result<(), TorsoError> {
    let report = JsonReport {
        time: summary.started_at.to_rfc3339(),
        passes: summary.passed,
        failures: summary.failed,
        untested: summary.skipped(),
        steps,
    };
    let json = serde_json::to_string_pretty(&report).map_err(|e| TorsoError::Io {
        message: format!("Could not serialize report: {}", e),
        ctx: crate::ErrorContext::none(),
        source: Some(Box::new(e)),
    })?;
    fs::write(path, json).map_err(|e| TorsoError::io("write", path, e))
}
