//! The Torso Command-Line Interface.
//!
//! This module is the entry point for all CLI commands and orchestrates the
//! library: configuration, logging, the run session and its reports.

use std::{
    fs,
    path::{Path, PathBuf},
    process,
};

use clap::Parser;
use tracing::info;

use crate::{
    cli::args::{Command, TorsoArgs},
    compiler::StepCompiler,
    config::{FaultPolicy, RunConfig},
    diagnostics::ErrorType,
    engine::{self, NativeRun, TestSuite},
    err_msg,
    interrupt::InterruptFlag,
    logging,
    syntax::parse_file,
    TorsoError,
};

pub mod args;
pub mod output;

/// Process exit status when every step passed.
pub const EXIT_OK: i32 = 0;
/// Process exit status for failed steps or a fatal error.
pub const EXIT_FAILURE: i32 = 1;
/// Process exit status after an operator interrupt.
pub const EXIT_INTERRUPTED: i32 = 130;

/// Overrides from the `run` subcommand, applied on top of the YAML config.
#[derive(Debug, Default)]
struct Overrides {
    timeout: Option<u64>,
    resources: Option<PathBuf>,
    debug_dir: Option<PathBuf>,
    log_file: Option<String>,
    abort_on_fault: bool,
}

/// The main entry point for the CLI.
pub fn run() {
    let args = TorsoArgs::parse();

    let result = match args.command {
        Command::Run {
            file,
            proxy,
            timeout,
            resources,
            debug_dir,
            config,
            report,
            json_report,
            abort_on_fault,
            log_file,
        } => {
            let overrides = Overrides {
                timeout,
                resources,
                debug_dir,
                log_file,
                abort_on_fault,
            };
            load_config(config.as_deref(), overrides).and_then(|config| {
                handle_run(
                    &file,
                    proxy.as_deref(),
                    config,
                    report,
                    json_report.as_deref(),
                )
            })
        }

        Command::Parse { file } => parse_file(&file).map(|instructions| {
            output::print_instructions(&instructions);
            EXIT_OK
        }),

        Command::Compile {
            file,
            resources,
            config,
        } => {
            let overrides = Overrides {
                resources,
                ..Overrides::default()
            };
            load_config(config.as_deref(), overrides).and_then(|config| handle_compile(&file, &config))
        }
    };

    match result {
        Ok(code) => process::exit(code),
        Err(e) => {
            let code = exit_code_for(&e);
            output::print_error(e);
            process::exit(code);
        }
    }
}

/// Exit status for a fatal error.
pub fn exit_code_for(error: &TorsoError) -> i32 {
    match error.error_type() {
        ErrorType::Interrupted => EXIT_INTERRUPTED,
        _ => EXIT_FAILURE,
    }
}

fn load_config(path: Option<&Path>, overrides: Overrides) -> Result<RunConfig, TorsoError> {
    let mut config = match path {
        Some(path) => RunConfig::from_yaml_file(path)?,
        None => RunConfig::default(),
    };
    if let Some(timeout) = overrides.timeout {
        config.timeout_secs = timeout;
    }
    if let Some(resources) = overrides.resources {
        config.resources_root = resources;
    }
    if let Some(debug_dir) = overrides.debug_dir {
        config.debug_dir = debug_dir;
    }
    if overrides.log_file.is_some() {
        config.log_file = overrides.log_file;
    }
    if overrides.abort_on_fault {
        config.fault_policy = FaultPolicy::Abort;
    }
    config.validate()?;
    Ok(config)
}

fn handle_run(
    file: &Path,
    proxy: Option<&Path>,
    config: RunConfig,
    report: Option<PathBuf>,
    json_report: Option<&Path>,
) -> Result<i32, TorsoError> {
    logging::init_logging(&config)?;
    fs::create_dir_all(&config.debug_dir)
        .map_err(|e| TorsoError::io("create", &config.debug_dir, e))?;

    if engine::is_script(file) {
        return Err(err_msg!(
            Script,
            "No scripting backend is available for '{}'",
            file.display()
        )
        .with_help("Script run-files need an embedder that provides a ScriptBackend"));
    }

    let proxy = proxy.ok_or_else(|| {
        err_msg!(Config, "Stub module is not set").with_help("Pass the module with --proxy <PATH>")
    })?;
    let report = report.unwrap_or_else(|| config.report_path_for(file));

    let interrupt = InterruptFlag::install()?;
    let mut session = NativeRun::open(file, proxy, config)?.with_interrupt(interrupt);
    info!(run_file = %file.display(), module = %proxy.display(), "session started");

    let result = engine::run_and_report(&mut session, &report);
    if let Some(path) = json_report {
        session.write_json_report(path)?;
    }
    session.close();
    output::print_summary(&session.counts());

    let counts = result?;
    Ok(if counts.failed > 0 { EXIT_FAILURE } else { EXIT_OK })
}

fn handle_compile(file: &Path, config: &RunConfig) -> Result<i32, TorsoError> {
    let instructions = parse_file(file)?;
    let steps = StepCompiler::new(&config.resources_root).compile(&instructions)?;
    output::print_steps(&steps);
    Ok(EXIT_OK)
}
