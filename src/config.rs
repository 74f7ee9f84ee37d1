//! The run context threaded through parsing, execution and reporting.
//!
//! Values come from an optional YAML file and are then overridden by command-line
//! flags. Nothing in the engine reads fixed paths or ambient global state; it is
//! all here.

use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::Deserialize;

use crate::{err_msg, TorsoError};

pub const DEFAULT_TIMEOUT_SECS: u64 = 7200;
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;
pub const DEFAULT_REPEAT_PAUSE_MS: u64 = 1000;

/// Step names containing one of these are run through the polled path.
pub const DEFAULT_LONG_RUNNING_MARKERS: [&str; 3] =
    ["SaveTillDone", "PreviewTillDone", "AnalyseTillDone"];

/// What the run controller does when a step hits a recoverable fault.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FaultPolicy {
    /// Mark the step failed and continue with the next one.
    #[default]
    Tolerate,
    /// Stop the run; remaining steps count as skipped.
    Abort,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunConfig {
    /// Root under which `<step name>/<config file>` is looked up.
    pub resources_root: PathBuf,
    /// Where reports and the log file go.
    pub debug_dir: PathBuf,
    /// Log file name inside `debug_dir`; stderr when unset.
    pub log_file: Option<String>,
    pub timeout_secs: u64,
    pub poll_interval_ms: u64,
    pub repeat_pause_ms: u64,
    pub long_running_markers: Vec<String>,
    pub fault_policy: FaultPolicy,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            resources_root: PathBuf::from("mufat_resources/sdkruntime"),
            debug_dir: PathBuf::from("muveeDebug"),
            log_file: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            repeat_pause_ms: DEFAULT_REPEAT_PAUSE_MS,
            long_running_markers: DEFAULT_LONG_RUNNING_MARKERS
                .iter()
                .map(|m| m.to_string())
                .collect(),
            fault_policy: FaultPolicy::Tolerate,
        }
    }
}

impl RunConfig {
    /// Loads and validates a YAML configuration file.
    pub fn from_yaml_file(path: &Path) -> Result<Self, TorsoError> {
        let text = fs::read_to_string(path).map_err(|e| TorsoError::io("read", path, e))?;
        let config = Self::from_yaml_str(&text).map_err(|e| {
            err_msg!(Config, "{}: {}", path.display(), e.message())
        })?;
        Ok(config)
    }

    pub fn from_yaml_str(text: &str) -> Result<Self, TorsoError> {
        let config: RunConfig = serde_yaml::from_str(text).map_err(|e| TorsoError::Config {
            message: format!("Invalid configuration: {}", e),
            ctx: crate::ErrorContext::none(),
            source: Some(Box::new(e)),
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), TorsoError> {
        if self.timeout_secs == 0 {
            return Err(err_msg!(Config, "Timeout must be at least 1 second"));
        }
        if self.poll_interval_ms == 0 {
            return Err(err_msg!(Config, "Poll interval must be at least 1 millisecond"));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn repeat_pause(&self) -> Duration {
        Duration::from_millis(self.repeat_pause_ms)
    }

    /// Whether `step_name` is monitored by polling rather than a blocking call.
    pub fn is_long_running(&self, step_name: &str) -> bool {
        self.long_running_markers
            .iter()
            .any(|marker| step_name.contains(marker.as_str()))
    }

    /// Full path of the log file, if one is configured.
    pub fn log_path(&self) -> Option<PathBuf> {
        self.log_file.as_ref().map(|name| self.debug_dir.join(name))
    }

    /// Default report location for a run-file: `<debug_dir>/<stem>.txt`.
    pub fn report_path_for(&self, run_file: &Path) -> PathBuf {
        let stem = run_file
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "torso".to_string());
        self.debug_dir.join(format!("{}.txt", stem))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::ErrorType;

    #[test]
    fn test_default_timeouts_and_markers() {
        let config = RunConfig::default();
        assert_eq!(config.timeout(), Duration::from_secs(7200));
        assert_eq!(config.poll_interval(), Duration::from_secs(1));
        assert!(config.is_long_running("5__CMVCore__IMVCore__SaveTillDone"));
        assert!(!config.is_long_running("5__CMVCore__IMVCore__Save"));
    }

    #[test]
    fn test_yaml_overrides_and_defaults() {
        let config = RunConfig::from_yaml_str(
            "timeout_secs: 30\nfault_policy: abort\nlong_running_markers: [Render]\n",
        )
        .unwrap();
        assert_eq!(config.timeout_secs, 30);
        assert_eq!(config.fault_policy, FaultPolicy::Abort);
        assert!(config.is_long_running("x__A__B__RenderAll"));
        assert_eq!(config.poll_interval_ms, DEFAULT_POLL_INTERVAL_MS);
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let err = RunConfig::from_yaml_str("timeout_secs: 0\n").unwrap_err();
        assert_eq!(err.error_type(), ErrorType::Config);
    }

    #[test]
    fn test_unknown_key_rejected() {
        assert!(RunConfig::from_yaml_str("timeout: 5\n").is_err());
    }

    #[test]
    fn test_report_path_uses_run_file_stem() {
        let config = RunConfig {
            debug_dir: PathBuf::from("out"),
            ..RunConfig::default()
        };
        assert_eq!(
            config.report_path_for(Path::new("suites/smoke.run")),
            PathBuf::from("out/smoke.txt")
        );
    }
}
