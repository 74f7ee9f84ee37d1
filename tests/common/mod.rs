//! Shared fixtures: a scripted in-process stub module and run-file helpers.

#![allow(dead_code)]

use std::{
    cell::RefCell,
    collections::{HashMap, VecDeque},
    fs,
    path::{Path, PathBuf},
    rc::Rc,
};

use torso::binding::{Handle, StubModule, TestStubs};
use torso::compiler::StepCompiler;
use torso::config::RunConfig;
use torso::step::Step;
use torso::syntax::RunFileParser;
use torso::{err_msg, TorsoError};

pub const CONTEXT: Handle = Handle(0x1000);
pub const HANDLER: Handle = Handle(0x2000);

#[derive(Debug, Default)]
pub struct FakeState {
    pub init_fails: bool,
    pub null_context: bool,
    pub missing_entry_point: Option<&'static str>,
    pub unknown: Vec<String>,
    pub null_handler_classes: Vec<String>,
    pub refused: Vec<String>,
    pub results: HashMap<String, VecDeque<i32>>,
    pub async_hangs: bool,
    pub calls: Vec<String>,
    ids: Vec<String>,
    pending: Option<i32>,
}

impl FakeState {
    fn name_of(&self, test_id: i32) -> String {
        usize::try_from(test_id)
            .ok()
            .and_then(|i| self.ids.get(i).cloned())
            .unwrap_or_default()
    }

    /// Next scripted result for `name`; a pass once the script runs out.
    fn next_result(&mut self, name: &str) -> i32 {
        self.results
            .get_mut(name)
            .and_then(VecDeque::pop_front)
            .unwrap_or(1)
    }
}

/// A stub module whose behavior is scripted per step name and which records
/// every entry point call.
#[derive(Debug, Clone, Default)]
pub struct FakeModule(pub Rc<RefCell<FakeState>>);

impl FakeModule {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_init(self) -> Self {
        self.0.borrow_mut().init_fails = true;
        self
    }

    pub fn null_context(self) -> Self {
        self.0.borrow_mut().null_context = true;
        self
    }

    pub fn missing(self, symbol: &'static str) -> Self {
        self.0.borrow_mut().missing_entry_point = Some(symbol);
        self
    }

    pub fn unknown(self, name: &str) -> Self {
        self.0.borrow_mut().unknown.push(name.to_string());
        self
    }

    pub fn null_handler(self, class_name: &str) -> Self {
        self.0.borrow_mut().null_handler_classes.push(class_name.to_string());
        self
    }

    pub fn refuse(self, name: &str) -> Self {
        self.0.borrow_mut().refused.push(name.to_string());
        self
    }

    pub fn results(self, name: &str, results: &[i32]) -> Self {
        self.0
            .borrow_mut()
            .results
            .insert(name.to_string(), results.iter().copied().collect());
        self
    }

    pub fn hang_async(self) -> Self {
        self.0.borrow_mut().async_hangs = true;
        self
    }

    pub fn boxed(&self) -> Box<dyn StubModule> {
        Box::new(self.clone())
    }

    pub fn calls(&self) -> Vec<String> {
        self.0.borrow().calls.clone()
    }

    /// Number of recorded calls starting with `prefix`.
    pub fn count(&self, prefix: &str) -> usize {
        self.0
            .borrow()
            .calls
            .iter()
            .filter(|c| c.starts_with(prefix))
            .count()
    }

    fn log(&self, call: String) {
        self.0.borrow_mut().calls.push(call);
    }
}

impl StubModule for FakeModule {
    fn initialize(&self) -> bool {
        self.log("initialize".to_string());
        !self.0.borrow().init_fails
    }

    fn shutdown(&self) {
        self.log("shutdown".to_string());
    }

    fn base_context(&self) -> Handle {
        self.log("base_context".to_string());
        if self.0.borrow().null_context {
            Handle::NULL
        } else {
            CONTEXT
        }
    }

    fn bind(&self) -> Result<Box<dyn TestStubs>, TorsoError> {
        self.log("bind".to_string());
        if let Some(symbol) = self.0.borrow().missing_entry_point {
            return Err(err_msg!(Binding, "Could not resolve entry point {}", symbol));
        }
        Ok(Box::new(self.clone()))
    }
}

impl TestStubs for FakeModule {
    fn resolve_test_id(&self, name: &str) -> i32 {
        self.log(format!("resolve {}", name));
        let mut state = self.0.borrow_mut();
        if state.unknown.iter().any(|u| u == name) {
            return -1;
        }
        let index = match state.ids.iter().position(|n| n == name) {
            Some(index) => index,
            None => {
                state.ids.push(name.to_string());
                state.ids.len() - 1
            }
        };
        i32::try_from(index).unwrap()
    }

    fn get_handler(&self, class_name: &str, context: Handle) -> Handle {
        self.log(format!("get_handler {} {}", class_name, context));
        if self.0.borrow().null_handler_classes.iter().any(|c| c == class_name) {
            Handle::NULL
        } else {
            HANDLER
        }
    }

    fn can_execute(&self, _handler: Handle, test_id: i32) -> bool {
        let state = self.0.borrow();
        let name = state.name_of(test_id);
        !state.refused.contains(&name)
    }

    fn execute_sync(&self, _handler: Handle, test_id: i32, config: &str) -> i32 {
        let mut state = self.0.borrow_mut();
        let name = state.name_of(test_id);
        state.calls.push(format!("execute {} [{}]", name, config));
        state.next_result(&name)
    }

    fn execute_async_start(&self, _handler: Handle, test_id: i32, config: &str) -> Handle {
        let mut state = self.0.borrow_mut();
        let name = state.name_of(test_id);
        state.calls.push(format!("start {} [{}]", name, config));
        state.pending = if state.async_hangs {
            None
        } else {
            Some(state.next_result(&name))
        };
        Handle(0x3000)
    }

    fn poll_async_result(&self) -> Option<i32> {
        self.0.borrow_mut().pending.take()
    }

    fn release_handler(&self, class_name: &str, _handler: Handle, _context: Handle) {
        self.log(format!("release {}", class_name));
    }
}

/// Writes `contents` to `dir/name`, creating parent directories.
pub fn write_file(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, contents).unwrap();
    path
}

/// A config that does not sleep between repetitions and polls quickly.
pub fn fast_config() -> RunConfig {
    RunConfig {
        repeat_pause_ms: 0,
        poll_interval_ms: 10,
        ..RunConfig::default()
    }
}

/// Parses and compiles run-file text without touching the filesystem.
pub fn compile_text(text: &str) -> Vec<Step> {
    let instructions = RunFileParser::new()
        .parse_text(Path::new("inline.run"), text)
        .unwrap();
    StepCompiler::new("no-resources").compile(&instructions).unwrap()
}
