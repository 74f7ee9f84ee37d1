//! Alternative scripting backend.
//!
//! A script backend runs a whole script file on its own and exposes its results in
//! a scope afterwards: `passed`, `failed` and `skipped` counts plus a `logfile`
//! path. The engine reads those values post hoc instead of driving steps. No
//! interpreter ships with this crate; embedders implement [`ScriptBackend`].

use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};

use tracing::info;

use crate::engine::{Counts, TestSuite};
use crate::{err_msg, TorsoError};

pub const PASSED_VAR: &str = "passed";
pub const FAILED_VAR: &str = "failed";
pub const SKIPPED_VAR: &str = "skipped";
pub const LOGFILE_VAR: &str = "logfile";

/// A value left in the script's result scope.
#[derive(Debug, Clone, PartialEq)]
pub enum ScopeValue {
    Int(i64),
    Str(String),
    /// A collection whose length is the count (e.g. a list of failures).
    List(Vec<ScopeValue>),
}

impl ScopeValue {
    /// The count this value stands for, if it is integer-like.
    pub fn as_count(&self) -> Option<usize> {
        match self {
            ScopeValue::Int(n) => usize::try_from(*n).ok(),
            ScopeValue::List(items) => Some(items.len()),
            ScopeValue::Str(_) => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScriptScope {
    vars: HashMap<String, ScopeValue>,
}

impl ScriptScope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, name: impl Into<String>, value: ScopeValue) {
        self.vars.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&ScopeValue> {
        self.vars.get(name)
    }

    /// Integer-like value of `name`, zero when absent.
    pub fn count(&self, name: &str) -> usize {
        self.get(name).and_then(ScopeValue::as_count).unwrap_or(0)
    }

    pub fn logfile(&self) -> Option<PathBuf> {
        match self.get(LOGFILE_VAR) {
            Some(ScopeValue::Str(path)) => Some(PathBuf::from(path)),
            _ => None,
        }
    }
}

pub trait ScriptBackend {
    /// Runs `path` to completion and returns the scope it left behind.
    fn run_file(&mut self, path: &Path) -> Result<ScriptScope, TorsoError>;
}

/// A [`TestSuite`] over a script backend.
pub struct ScriptSuite<B: ScriptBackend> {
    backend: B,
    file: PathBuf,
    scope: Option<ScriptScope>,
}

impl<B: ScriptBackend> ScriptSuite<B> {
    pub fn new(backend: B, file: impl Into<PathBuf>) -> Self {
        Self {
            backend,
            file: file.into(),
            scope: None,
        }
    }

    pub fn has_run(&self) -> bool {
        self.scope.is_some()
    }
}

impl<B: ScriptBackend> TestSuite for ScriptSuite<B> {
    fn counts(&self) -> Counts {
        let Some(scope) = &self.scope else {
            return Counts::default();
        };
        Counts {
            passed: scope.count(PASSED_VAR),
            failed: scope.count(FAILED_VAR),
            skipped: scope.count(SKIPPED_VAR),
        }
    }

    fn run_all(&mut self) -> Result<(), TorsoError> {
        if !self.file.is_file() {
            return Err(err_msg!(Io, "Script '{}' does not exist", self.file.display()));
        }
        let scope = self.backend.run_file(&self.file)?;
        if scope.get(PASSED_VAR).is_none() && scope.get(FAILED_VAR).is_none() {
            return Err(err_msg!(Script, "Script did not return a valid result")
                .with_help("The script must leave 'passed' and 'failed' in its scope"));
        }
        self.scope = Some(scope);
        Ok(())
    }

    /// The script writes its own log; the report is a copy of it.
    fn write_report(&self, path: &Path) -> Result<(), TorsoError> {
        let logfile = self
            .scope
            .as_ref()
            .and_then(ScriptScope::logfile)
            .ok_or_else(|| err_msg!(Script, "No results available"))?;
        info!(from = %logfile.display(), report = %path.display(), "copying script log as report");
        fs::copy(&logfile, path).map_err(|e| TorsoError::io("copy", &logfile, e))?;
        Ok(())
    }
}
