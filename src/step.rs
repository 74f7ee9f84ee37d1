//! Compiled steps and the counts accumulated while running them.

use std::{path::PathBuf, time::Duration};

use chrono::{DateTime, Local};
use serde::Serialize;

/// Delimiter between the four parts of a step name.
pub const NAME_DELIMITER: &str = "__";

/// One executable unit compiled from a run-file line.
///
/// Created by the compiler, then updated exactly once by the executor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Step {
    /// Full symbolic name, e.g. `12__CMVCore__IMVCore__SaveTillDone`.
    pub name: String,
    pub class_name: String,
    pub interface_name: String,
    pub function_name: String,
    /// Resolved configuration file, `None` when the step takes none.
    pub config_file: Option<PathBuf>,
    /// Additional repetitions beyond the first run.
    pub repeat: u32,
    pub passed: bool,
    #[serde(serialize_with = "serialize_millis")]
    pub elapsed: Duration,
    /// Repetitions actually attempted.
    pub attempts: u32,
}

impl Step {
    /// The configuration path as handed to the native module (empty for none).
    pub fn config_arg(&self) -> String {
        self.config_file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_default()
    }

    /// Records the outcome of running this step.
    pub fn record(&mut self, passed: bool, elapsed: Duration, attempts: u32) {
        self.passed = passed;
        self.elapsed = elapsed;
        self.attempts = attempts;
    }
}

fn serialize_millis<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
}

/// Pass/fail counts for one run. `skipped` is always derived.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub started_at: DateTime<Local>,
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
}

impl RunSummary {
    pub fn new(total: usize) -> Self {
        Self {
            started_at: Local::now(),
            total,
            passed: 0,
            failed: 0,
        }
    }

    /// Steps never reached, non-zero only when a run stopped early.
    pub fn skipped(&self) -> usize {
        self.total.saturating_sub(self.passed + self.failed)
    }

    pub fn record(&mut self, passed: bool) {
        if passed {
            self.passed += 1;
        } else {
            self.failed += 1;
        }
    }
}
