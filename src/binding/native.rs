//! Stub module backed by a shared library loaded with `libloading`.
//!
//! Strings cross the boundary as NUL-terminated UTF-16 buffers together with their
//! buffer size in code units (terminator included). Booleans come back as one byte.

use std::ffi::c_void;
use std::path::{Path, PathBuf};

use libloading::Library;

use crate::binding::{Handle, StubModule, TestStubs};
use crate::{err_msg, TorsoError};

type InitFn = unsafe extern "C" fn() -> u8;
type ShutdownFn = unsafe extern "C" fn();
type GetBaseObjectFn = unsafe extern "C" fn() -> *mut c_void;
type GetTestIdFn = unsafe extern "C" fn(*const u16, i32) -> i32;
type CanExecuteFn = unsafe extern "C" fn(*mut c_void, i32) -> u8;
type ExecuteFn = unsafe extern "C" fn(*mut c_void, i32, *const u16, i32) -> i32;
type ThreadedExecuteFn = unsafe extern "C" fn(*mut c_void, i32, *const u16, i32) -> *mut c_void;
type ThreadedResultFn = unsafe extern "C" fn(*mut i32) -> u8;
type SubmitClassFn = unsafe extern "C" fn(*const u16, i32, *mut c_void, *mut c_void);
type GetClassFn = unsafe extern "C" fn(*const u16, i32, *mut c_void) -> *mut c_void;

/// Exported symbol names, in the order they are resolved.
pub mod symbols {
    pub const INIT: &str = "Init";
    pub const SHUTDOWN: &str = "Shutdown";
    pub const GET_BASE_OBJECT: &str = "GetBaseObject";
    pub const GET_TEST_ID: &str = "GetUTID";
    pub const CAN_EXECUTE: &str = "GenericCanExecute";
    pub const EXECUTE: &str = "GenericExecute";
    pub const THREADED_EXECUTE: &str = "ThreadedExecute";
    pub const THREADED_RESULT: &str = "GetThreadedExecuteResult";
    pub const SUBMIT_CLASS: &str = "SubmitClass";
    pub const GET_CLASS: &str = "GetClass";
}

/// A loaded library with its lifecycle entry points resolved.
pub struct NativeModule {
    path: PathBuf,
    init: InitFn,
    shutdown: ShutdownFn,
    get_base_object: GetBaseObjectFn,
    library: Library,
}

impl NativeModule {
    pub fn load(path: &Path) -> Result<Self, TorsoError> {
        if !path.is_file() {
            return Err(err_msg!(
                ModuleLoad,
                "Stub module '{}' does not exist",
                path.display()
            ));
        }
        // SAFETY: loading runs the library's initializers; the module is trusted test
        // infrastructure supplied by the operator.
        let library = unsafe { Library::new(path) }.map_err(|e| TorsoError::ModuleLoad {
            message: format!("Could not load '{}': {}", path.display(), e),
            ctx: crate::ErrorContext::none(),
            source: Some(Box::new(e)),
        })?;

        Ok(Self {
            path: path.to_path_buf(),
            init: resolve(&library, symbols::INIT)?,
            shutdown: resolve(&library, symbols::SHUTDOWN)?,
            get_base_object: resolve(&library, symbols::GET_BASE_OBJECT)?,
            library,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StubModule for NativeModule {
    fn initialize(&self) -> bool {
        // SAFETY: signature matches the exported `Init`.
        unsafe { (self.init)() != 0 }
    }

    fn shutdown(&self) {
        // SAFETY: signature matches the exported `Shutdown`.
        unsafe { (self.shutdown)() }
    }

    fn base_context(&self) -> Handle {
        // SAFETY: signature matches the exported `GetBaseObject`.
        Handle(unsafe { (self.get_base_object)() } as usize)
    }

    fn bind(&self) -> Result<Box<dyn TestStubs>, TorsoError> {
        let lib = &self.library;
        Ok(Box::new(NativeStubs {
            get_test_id: resolve(lib, symbols::GET_TEST_ID)?,
            can_execute: resolve(lib, symbols::CAN_EXECUTE)?,
            execute: resolve(lib, symbols::EXECUTE)?,
            threaded_execute: resolve(lib, symbols::THREADED_EXECUTE)?,
            threaded_result: resolve(lib, symbols::THREADED_RESULT)?,
            submit_class: resolve(lib, symbols::SUBMIT_CLASS)?,
            get_class: resolve(lib, symbols::GET_CLASS)?,
        }))
    }
}

/// Raw entry points copied out of the library. Only valid while the owning
/// [`NativeModule`] is loaded; [`crate::binding::Binding`] drops them first.
struct NativeStubs {
    get_test_id: GetTestIdFn,
    can_execute: CanExecuteFn,
    execute: ExecuteFn,
    threaded_execute: ThreadedExecuteFn,
    threaded_result: ThreadedResultFn,
    submit_class: SubmitClassFn,
    get_class: GetClassFn,
}

impl TestStubs for NativeStubs {
    fn resolve_test_id(&self, name: &str) -> i32 {
        let buf = WideString::new(name);
        // SAFETY: `buf` outlives the call and carries its own terminator.
        unsafe { (self.get_test_id)(buf.as_ptr(), buf.len()) }
    }

    fn get_handler(&self, class_name: &str, context: Handle) -> Handle {
        let buf = WideString::new(class_name);
        // SAFETY: see `resolve_test_id`; `context` came from `GetBaseObject`.
        let raw = unsafe { (self.get_class)(buf.as_ptr(), buf.len(), as_ptr(context)) };
        Handle(raw as usize)
    }

    fn can_execute(&self, handler: Handle, test_id: i32) -> bool {
        // SAFETY: `handler` came from `GetClass`.
        unsafe { (self.can_execute)(as_ptr(handler), test_id) != 0 }
    }

    fn execute_sync(&self, handler: Handle, test_id: i32, config: &str) -> i32 {
        let buf = WideString::new(config);
        // SAFETY: see `resolve_test_id`.
        unsafe { (self.execute)(as_ptr(handler), test_id, buf.as_ptr(), buf.len()) }
    }

    fn execute_async_start(&self, handler: Handle, test_id: i32, config: &str) -> Handle {
        let buf = WideString::new(config);
        // SAFETY: see `resolve_test_id`.
        let token =
            unsafe { (self.threaded_execute)(as_ptr(handler), test_id, buf.as_ptr(), buf.len()) };
        Handle(token as usize)
    }

    fn poll_async_result(&self) -> Option<i32> {
        let mut result = 0i32;
        // SAFETY: `result` is a valid out-pointer for the duration of the call.
        let ready = unsafe { (self.threaded_result)(&mut result) } != 0;
        ready.then_some(result)
    }

    fn release_handler(&self, class_name: &str, handler: Handle, context: Handle) {
        let buf = WideString::new(class_name);
        // SAFETY: see `get_handler`.
        unsafe {
            (self.submit_class)(buf.as_ptr(), buf.len(), as_ptr(handler), as_ptr(context))
        }
    }
}

fn resolve<T: Copy>(library: &Library, name: &str) -> Result<T, TorsoError> {
    // SAFETY: each call site names the type alias declared for that export.
    let symbol = unsafe { library.get::<T>(name.as_bytes()) }.map_err(|e| TorsoError::Binding {
        message: format!("Could not resolve entry point '{}'", name),
        ctx: crate::ErrorContext::none(),
        source: Some(Box::new(e)),
    })?;
    Ok(*symbol)
}

fn as_ptr(handle: Handle) -> *mut c_void {
    handle.0 as *mut c_void
}

/// NUL-terminated UTF-16 copy of a string.
struct WideString(Vec<u16>);

impl WideString {
    fn new(s: &str) -> Self {
        Self(s.encode_utf16().chain(std::iter::once(0)).collect())
    }

    fn as_ptr(&self) -> *const u16 {
        self.0.as_ptr()
    }

    /// Buffer size in code units, terminator included.
    fn len(&self) -> i32 {
        i32::try_from(self.0.len()).unwrap_or(i32::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::ErrorType;

    #[test]
    fn test_wide_string_is_terminated() {
        let buf = WideString::new("Ab");
        assert_eq!(buf.0, vec![u16::from(b'A'), u16::from(b'b'), 0]);
        assert_eq!(buf.len(), 3);
    }

    #[test]
    fn test_missing_library_is_load_error() {
        let err = NativeModule::load(Path::new("no/such/stubs.dll")).err().unwrap();
        assert!(matches!(err, TorsoError::ModuleLoad { .. }));
        assert_eq!(err.error_type(), ErrorType::Binding);
    }

    #[test]
    fn test_non_library_file_is_load_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("not-a-library.so");
        std::fs::write(&path, "plain text").unwrap();
        let err = NativeModule::load(&path).err().unwrap();
        assert!(matches!(err, TorsoError::ModuleLoad { .. }));
    }
}
