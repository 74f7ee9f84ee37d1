//! Step Executor: runs one [`Step`] against the bound stub module.
//!
//! Two strategies exist. Ordinary steps call the blocking execute entry point.
//! Steps whose name carries a long-running marker start the test asynchronously
//! and poll for its result until the configured timeout.
//!
//! Timeouts are advisory: when the deadline passes the executor stops waiting and
//! reports [`TorsoError::Timeout`], but the module offers no cancel entry point,
//! so the native operation may keep running in the background.

use std::{
    thread,
    time::{Duration, Instant},
};

use tracing::{debug, info, warn};

use crate::binding::{BindingTable, Handle, TestStubs};
use crate::config::RunConfig;
use crate::interrupt::InterruptFlag;
use crate::step::Step;
use crate::{err_msg, TorsoError};

/// What happened to a step that ran to a verdict.
#[derive(Debug)]
pub struct StepOutcome {
    pub passed: bool,
    pub elapsed: Duration,
    /// The recoverable fault that failed the step, if any.
    pub fault: Option<TorsoError>,
}

#[derive(Debug, Clone)]
pub struct StepExecutor<'a> {
    config: &'a RunConfig,
    interrupt: InterruptFlag,
}

impl<'a> StepExecutor<'a> {
    pub fn new(config: &'a RunConfig) -> Self {
        Self {
            config,
            interrupt: InterruptFlag::new(),
        }
    }

    pub fn with_interrupt(mut self, interrupt: InterruptFlag) -> Self {
        self.interrupt = interrupt;
        self
    }

    /// Runs `step` and records its verdict and elapsed time on it.
    ///
    /// Unknown tests, non-executable handlers and timeouts fail the step and are
    /// returned in [`StepOutcome::fault`]. Only faults that must end the run, such as
    /// an operator interrupt, come back as `Err`.
    pub fn execute(&self, step: &mut Step, table: &BindingTable) -> Result<StepOutcome, TorsoError> {
        info!(step = %step.name, repeat = step.repeat, "running step");
        let started = Instant::now();
        let mut attempts = 0;
        let result = self.run_repetitions(step, table, &mut attempts);
        let elapsed = started.elapsed();

        let (passed, fault) = match result {
            Ok(code) => (code > 0, None),
            Err(e) if e.is_step_fault() => {
                warn!(step = %step.name, error = %e, "exception caught during step");
                (false, Some(e))
            }
            Err(e) => {
                step.record(false, elapsed, attempts);
                return Err(e);
            }
        };

        step.record(passed, elapsed, attempts);
        info!(
            step = %step.name,
            passed,
            attempts,
            elapsed_ms = elapsed.as_millis() as u64,
            "step finished"
        );
        Ok(StepOutcome {
            passed,
            elapsed,
            fault,
        })
    }

    /// Runs the step `1 + repeat` times, stopping at the first non-positive result.
    fn run_repetitions(
        &self,
        step: &Step,
        table: &BindingTable,
        attempts: &mut u32,
    ) -> Result<i32, TorsoError> {
        let stubs = table.stubs();
        let context = table.context();

        let test_id = stubs.resolve_test_id(&step.name);
        if test_id < 0 {
            return Err(err_msg!(UnknownTest, "Test stub not found for {}", step.name));
        }

        // Past this point every repetition returns the handler to the context.
        self.interrupt.check()?;
        let handler = stubs.get_handler(&step.class_name, context);
        if handler.is_null() || !stubs.can_execute(handler, test_id) {
            return Err(err_msg!(
                NotExecutable,
                "Cannot get class object {} for test {}",
                step.class_name,
                test_id
            ));
        }

        let config = step.config_arg();
        let long_running = self.config.is_long_running(&step.name);
        let mut result = 0;
        for repetition in 0..=step.repeat {
            if repetition > 0 {
                self.interrupt.check()?;
            }
            *attempts += 1;

            let run = if long_running {
                self.run_polled(stubs, handler, test_id, &config)
            } else {
                Ok(stubs.execute_sync(handler, test_id, &config))
            };
            stubs.release_handler(&step.class_name, handler, context);

            result = run?;
            if result <= 0 {
                debug!(step = %step.name, repetition, result, "repetition failed, skipping the rest");
                break;
            }
            if repetition < step.repeat {
                thread::sleep(self.config.repeat_pause());
            }
        }
        Ok(result)
    }

    /// Starts the test asynchronously and polls until a result or the deadline.
    fn run_polled(
        &self,
        stubs: &dyn TestStubs,
        handler: Handle,
        test_id: i32,
        config: &str,
    ) -> Result<i32, TorsoError> {
        let token = stubs.execute_async_start(handler, test_id, config);
        debug!(%token, test_id, "started long-running test");

        let timeout = self.config.timeout();
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(result) = stubs.poll_async_result() {
                return Ok(result);
            }
            self.interrupt.check()?;
            let now = Instant::now();
            if now >= deadline {
                return Err(err_msg!(Timeout, "{} seconds reached", timeout.as_secs())
                    .with_help("The native operation was not cancelled and may still be running"));
            }
            thread::sleep(self.config.poll_interval().min(deadline - now));
        }
    }
}
