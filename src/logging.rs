//! Process-wide `tracing` setup.

use std::{
    fs::{self, OpenOptions},
    sync::{Mutex, OnceLock},
};

use tracing_subscriber::EnvFilter;

use crate::config::RunConfig;
use crate::TorsoError;

static LOGGING_INIT: OnceLock<()> = OnceLock::new();

/// Installs a `fmt` subscriber filtered by `RUST_LOG` (default `info`).
///
/// With `log_file` configured, records are appended to `<debug_dir>/<log_file>`
/// without ANSI colors; otherwise they go to stderr. Only the first call installs
/// anything.
pub fn init_logging(config: &RunConfig) -> Result<(), TorsoError> {
    if LOGGING_INIT.get().is_some() {
        return Ok(());
    }

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    match config.log_path() {
        Some(path) => {
            fs::create_dir_all(&config.debug_dir)
                .map_err(|e| TorsoError::io("create", &config.debug_dir, e))?;
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .map_err(|e| TorsoError::io("open", &path, e))?;
            let _ = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init();
        }
        None => {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .try_init();
        }
    }

    let _ = LOGGING_INIT.set(());
    Ok(())
}
