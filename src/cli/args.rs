//! Command-line arguments and subcommands for the Torso CLI.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// The main CLI argument structure.
#[derive(Debug, Parser)]
#[command(
    name = "torso",
    version,
    about = "Runs run-files step by step against a native test stub module."
)]
pub struct TorsoArgs {
    #[command(subcommand)]
    pub command: Command,
}

/// An enumeration of all available CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Parse, compile and run a run-file, then write its report.
    Run {
        /// The run-file to execute (`.py` selects the scripting backend).
        #[arg(required = true)]
        file: PathBuf,
        /// Native stub module exposing the test entry points.
        #[arg(long)]
        proxy: Option<PathBuf>,
        /// Per-step timeout for long-running steps, in seconds.
        #[arg(long)]
        timeout: Option<u64>,
        /// Root directory for per-step configuration files.
        #[arg(long)]
        resources: Option<PathBuf>,
        /// Directory receiving reports and the log file.
        #[arg(long)]
        debug_dir: Option<PathBuf>,
        /// YAML run configuration.
        #[arg(long)]
        config: Option<PathBuf>,
        /// Report path, instead of `<debug-dir>/<run-file stem>.txt`.
        #[arg(long)]
        report: Option<PathBuf>,
        /// Also write a JSON report to this path.
        #[arg(long)]
        json_report: Option<PathBuf>,
        /// Stop at the first step fault instead of continuing.
        #[arg(long)]
        abort_on_fault: bool,
        /// Log to this file inside the debug directory instead of stderr.
        #[arg(long)]
        log_file: Option<String>,
    },
    /// Print the flattened instruction sequence of a run-file.
    Parse {
        #[arg(required = true)]
        file: PathBuf,
    },
    /// Print the compiled steps of a run-file.
    Compile {
        #[arg(required = true)]
        file: PathBuf,
        /// Root directory for per-step configuration files.
        #[arg(long)]
        resources: Option<PathBuf>,
        /// YAML run configuration.
        #[arg(long)]
        config: Option<PathBuf>,
    },
}
