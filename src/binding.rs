//! Binding Resolver: the capability surface of a native test-stub module.
//!
//! A module is opened in two phases. [`StubModule`] covers the lifecycle entry
//! points (initialize, base context, shutdown); once the module reports itself
//! initialized, [`StubModule::bind`] resolves every remaining entry point into a
//! [`TestStubs`] value. A missing entry point fails the open before any step runs.
//!
//! [`Binding`] owns both halves and guarantees the shutdown entry point is called
//! exactly once, whether the run finishes, fails, or is interrupted.

use std::fmt;
use std::path::Path;

use tracing::{debug, info};

use crate::{err_msg, TorsoError};

pub mod native;

pub use native::NativeModule;

/// Opaque native pointer-sized value (context, handler, or async token).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Handle(pub usize);

impl Handle {
    pub const NULL: Handle = Handle(0);

    pub fn is_null(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Lifecycle entry points of a loaded module.
pub trait StubModule {
    /// Returns false if the module could not initialize.
    fn initialize(&self) -> bool;
    fn shutdown(&self);
    /// The shared execution context all steps run against. Null on failure.
    fn base_context(&self) -> Handle;
    /// Resolves the remaining entry points. Called once, after initialization.
    fn bind(&self) -> Result<Box<dyn TestStubs>, TorsoError>;
}

/// Per-step entry points of a loaded module.
pub trait TestStubs {
    /// Internal id for a step name, `-1` if unknown.
    fn resolve_test_id(&self, name: &str) -> i32;
    fn get_handler(&self, class_name: &str, context: Handle) -> Handle;
    fn can_execute(&self, handler: Handle, test_id: i32) -> bool;
    /// Runs the test to completion; a positive result means pass.
    fn execute_sync(&self, handler: Handle, test_id: i32, config: &str) -> i32;
    /// Starts the test and returns immediately.
    fn execute_async_start(&self, handler: Handle, test_id: i32, config: &str) -> Handle;
    /// The result of the last started async test, once available.
    fn poll_async_result(&self) -> Option<i32>;
    fn release_handler(&self, class_name: &str, handler: Handle, context: Handle);
}

/// Resolved entry points plus the base context, immutable for the run.
pub struct BindingTable {
    stubs: Box<dyn TestStubs>,
    context: Handle,
}

impl BindingTable {
    pub fn stubs(&self) -> &dyn TestStubs {
        self.stubs.as_ref()
    }

    pub fn context(&self) -> Handle {
        self.context
    }
}

impl fmt::Debug for BindingTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BindingTable")
            .field("context", &self.context)
            .finish_non_exhaustive()
    }
}

/// Exclusively owned, opened stub module.
pub struct Binding {
    // Declared before `module`: resolved entry points must go before the
    // library that backs them.
    table: Option<BindingTable>,
    module: Option<Box<dyn StubModule>>,
}

impl Binding {
    /// Loads the shared library at `path` and binds it.
    pub fn open(path: &Path) -> Result<Self, TorsoError> {
        let module = NativeModule::load(path)?;
        Self::attach(Box::new(module))
    }

    /// Initializes an already loaded module and resolves its entry points.
    pub fn attach(module: Box<dyn StubModule>) -> Result<Self, TorsoError> {
        if !module.initialize() {
            return Err(err_msg!(Init, "Could not initialize stub module"));
        }
        // From here on the module is initialized, so every exit path must shut it down.
        let mut binding = Binding {
            table: None,
            module: Some(module),
        };

        let module = binding.module()?;
        let context = module.base_context();
        if context.is_null() {
            return Err(err_msg!(Context, "Could not get base context"));
        }
        let stubs = module.bind()?;
        debug!(%context, "stub module bound");

        binding.table = Some(BindingTable { stubs, context });
        Ok(binding)
    }

    pub fn is_open(&self) -> bool {
        self.module.is_some()
    }

    /// The resolved entry points, or an error once the module has been released.
    pub fn table(&self) -> Result<&BindingTable, TorsoError> {
        self.table
            .as_ref()
            .ok_or_else(|| err_msg!(Binding, "Stub module has already been released"))
    }

    fn module(&self) -> Result<&dyn StubModule, TorsoError> {
        self.module
            .as_deref()
            .ok_or_else(|| err_msg!(Binding, "Stub module has already been released"))
    }

    /// Calls the shutdown entry point and releases the module. Idempotent.
    pub fn close(&mut self) {
        self.table = None;
        if let Some(module) = self.module.take() {
            module.shutdown();
            info!("stub module shut down");
        }
    }
}

impl Drop for Binding {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binding")
            .field("open", &self.is_open())
            .field("table", &self.table)
            .finish()
    }
}
