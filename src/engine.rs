//! Run sessions: the common surface of native and script runs, and the native
//! session that ties the parser, compiler, binding and run controller together.

use std::path::{Path, PathBuf};

use tracing::{error, info};

use crate::binding::Binding;
use crate::compiler::StepCompiler;
use crate::config::RunConfig;
use crate::interrupt::InterruptFlag;
use crate::runner::RunController;
use crate::step::{RunSummary, Step};
use crate::syntax::parse_file;
use crate::{err_msg, report, TorsoError};

/// Extension that selects the scripting backend.
pub const SCRIPT_EXTENSION: &str = "py";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counts {
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
}

/// What the front end needs from any kind of run.
pub trait TestSuite {
    fn counts(&self) -> Counts;
    fn run_all(&mut self) -> Result<(), TorsoError>;
    fn write_report(&self, path: &Path) -> Result<(), TorsoError>;
}

/// Whether `run_file` should go to a scripting backend instead of the native one.
pub fn is_script(run_file: &Path) -> bool {
    run_file
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case(SCRIPT_EXTENSION))
}

/// A run-file compiled against an open stub module.
pub struct NativeRun {
    config: RunConfig,
    run_file: PathBuf,
    steps: Vec<Step>,
    summary: RunSummary,
    interrupt: InterruptFlag,
    binding: Binding,
}

impl NativeRun {
    /// Opens the stub module at `module`, then parses and compiles `run_file`.
    pub fn open(run_file: &Path, module: &Path, config: RunConfig) -> Result<Self, TorsoError> {
        if !run_file.is_file() {
            return Err(err_msg!(Io, "Run file '{}' does not exist", run_file.display()));
        }
        let binding = Binding::open(module)?;
        Self::with_binding(run_file, binding, config)
    }

    /// Parses and compiles `run_file` for an already open binding. On failure the
    /// binding is dropped, which shuts the module down.
    pub fn with_binding(
        run_file: &Path,
        binding: Binding,
        config: RunConfig,
    ) -> Result<Self, TorsoError> {
        config.validate()?;
        let instructions = parse_file(run_file)?;
        let steps = StepCompiler::new(&config.resources_root).compile(&instructions)?;
        info!(run_file = %run_file.display(), steps = steps.len(), "run-file compiled");

        Ok(Self {
            summary: RunSummary::new(steps.len()),
            config,
            run_file: run_file.to_path_buf(),
            steps,
            interrupt: InterruptFlag::new(),
            binding,
        })
    }

    pub fn with_interrupt(mut self, interrupt: InterruptFlag) -> Self {
        self.interrupt = interrupt;
        self
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn summary(&self) -> &RunSummary {
        &self.summary
    }

    pub fn run_file(&self) -> &Path {
        &self.run_file
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    pub fn write_json_report(&self, path: &Path) -> Result<(), TorsoError> {
        report::write_json(path, &self.summary, &self.steps)
    }

    /// Shuts the stub module down. Also happens on drop.
    pub fn close(&mut self) {
        self.binding.close();
    }
}

impl TestSuite for NativeRun {
    fn counts(&self) -> Counts {
        Counts {
            passed: self.summary.passed,
            failed: self.summary.failed,
            skipped: self.summary.skipped(),
        }
    }

    fn run_all(&mut self) -> Result<(), TorsoError> {
        let table = self.binding.table()?;
        RunController::new(&self.config)
            .with_interrupt(self.interrupt.clone())
            .run_into(&mut self.steps, table, &mut self.summary)
    }

    fn write_report(&self, path: &Path) -> Result<(), TorsoError> {
        report::write(path, &self.summary, &self.steps)
    }
}

/// Runs the suite, logs the counts and writes the report whether or not the run
/// completed. A fatal run fault takes precedence over a report failure.
pub fn run_and_report(suite: &mut dyn TestSuite, report_path: &Path) -> Result<Counts, TorsoError> {
    let run = suite.run_all();
    if let Err(e) = &run {
        error!(error = %e, "torso terminated");
    }

    let counts = suite.counts();
    info!(
        "Passes {}, Failures {}, Untested {}",
        counts.passed, counts.failed, counts.skipped
    );

    let written = suite.write_report(report_path);
    if let Err(e) = &written {
        error!(error = %e, "could not write report");
    }
    run?;
    written?;
    Ok(counts)
}
