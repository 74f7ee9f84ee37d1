//! Operator abort (Ctrl-C, SIGTERM) as a flag polled at safe points.
//!
//! The flag is checked between steps, between repetitions, and on every tick of
//! the long-running poll loop. A raised flag surfaces as
//! [`TorsoError::Interrupted`], which unwinds to the session so the stub module is
//! shut down before the process exits.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use signal_hook::consts::TERM_SIGNALS;

use crate::{err_msg, TorsoError};

#[derive(Debug, Clone, Default)]
pub struct InterruptFlag(Arc<AtomicBool>);

impl InterruptFlag {
    /// A flag that only [`InterruptFlag::raise`] can set.
    pub fn new() -> Self {
        Self::default()
    }

    /// A flag raised by the process termination signals.
    pub fn install() -> Result<Self, TorsoError> {
        let flag = Self::new();
        for &signal in TERM_SIGNALS {
            signal_hook::flag::register(signal, Arc::clone(&flag.0)).map_err(|e| {
                TorsoError::Io {
                    message: format!("Could not register handler for signal {}: {}", signal, e),
                    ctx: crate::ErrorContext::none(),
                    source: Some(Box::new(e)),
                }
            })?;
        }
        Ok(flag)
    }

    pub fn raise(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn check(&self) -> Result<(), TorsoError> {
        if self.is_raised() {
            return Err(err_msg!(Interrupted, "Run aborted by operator"));
        }
        Ok(())
    }
}
