//! Run Controller: executes compiled steps strictly one after another.

use tracing::{error, info, warn};

use crate::binding::BindingTable;
use crate::config::{FaultPolicy, RunConfig};
use crate::executor::StepExecutor;
use crate::interrupt::InterruptFlag;
use crate::step::{RunSummary, Step};
use crate::TorsoError;

#[derive(Debug, Clone)]
pub struct RunController<'a> {
    executor: StepExecutor<'a>,
    policy: FaultPolicy,
    interrupt: InterruptFlag,
}

impl<'a> RunController<'a> {
    pub fn new(config: &'a RunConfig) -> Self {
        Self {
            executor: StepExecutor::new(config),
            policy: config.fault_policy,
            interrupt: InterruptFlag::new(),
        }
    }

    pub fn with_interrupt(mut self, interrupt: InterruptFlag) -> Self {
        self.executor = self.executor.with_interrupt(interrupt.clone());
        self.interrupt = interrupt;
        self
    }

    /// Runs every step and returns the counts.
    pub fn run_all(
        &self,
        steps: &mut [Step],
        table: &BindingTable,
    ) -> Result<RunSummary, TorsoError> {
        let mut summary = RunSummary::new(steps.len());
        self.run_into(steps, table, &mut summary)?;
        Ok(summary)
    }

    /// Runs every step, accumulating into `summary` so the counts survive a fatal
    /// fault. Steps never reached show up as `summary.skipped()`.
    pub fn run_into(
        &self,
        steps: &mut [Step],
        table: &BindingTable,
        summary: &mut RunSummary,
    ) -> Result<(), TorsoError> {
        for step in steps.iter_mut() {
            self.interrupt.check()?;
            let outcome = self.executor.execute(step, table).inspect_err(|e| {
                error!(step = %step.name, error = %e, "run terminated");
            })?;
            summary.record(outcome.passed);

            if let (Some(fault), FaultPolicy::Abort) = (outcome.fault, self.policy) {
                warn!(step = %step.name, "aborting run on step fault");
                return Err(fault);
            }
        }
        info!(
            passed = summary.passed,
            failed = summary.failed,
            skipped = summary.skipped(),
            "run complete"
        );
        Ok(())
    }
}
