//! Host process services: termination and shared-library loading

#[cfg(unix)]
use std::ffi::{CStr, CString};

use parking_lot::Mutex;

/// Process-level services the VM delegates to
pub trait Host: Send + Sync {
    /// Terminate the process with `status`
    ///
    /// Implementations used for embedding may return instead.
    fn exit(&self, status: i32);

    /// Load the shared library at `path`; `true` on success
    fn load_library(&self, path: &str) -> bool;
}

/// Host backed by the running process
#[derive(Default)]
pub struct ProcessHost {
    libraries: Mutex<Vec<Library>>,
}

impl ProcessHost {
    /// Create a process host
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of libraries loaded so far
    pub fn loaded(&self) -> usize {
        self.libraries.lock().len()
    }
}

impl Host for ProcessHost {
    fn exit(&self, status: i32) {
        tracing::info!(status, "exit requested");
        std::process::exit(status);
    }

    fn load_library(&self, path: &str) -> bool {
        match Library::open(path) {
            Ok(lib) => {
                tracing::debug!(path, "library loaded");
                self.libraries.lock().push(lib);
                true
            }
            Err(reason) => {
                tracing::debug!(path, %reason, "library load failed");
                false
            }
        }
    }
}

/// Platform file name of library `name` (`libfoo.so`, `foo.dll`)
pub fn map_library_name(name: &str) -> String {
    format!(
        "{}{}{}",
        std::env::consts::DLL_PREFIX,
        name,
        std::env::consts::DLL_SUFFIX
    )
}

/// Open library handle; libraries stay loaded until the host is dropped
struct Library {
    #[cfg(unix)]
    handle: *mut std::ffi::c_void,
}

// The handle is only passed back to dlclose
unsafe impl Send for Library {}

impl Library {
    #[cfg(unix)]
    fn open(path: &str) -> Result<Self, String> {
        let c_path = CString::new(path).map_err(|e| e.to_string())?;
        // RTLD_LAZY: symbols are bound when native methods are first linked
        let handle = unsafe { libc::dlopen(c_path.as_ptr(), libc::RTLD_LAZY | libc::RTLD_GLOBAL) };
        if handle.is_null() {
            return Err(last_dl_error());
        }
        Ok(Library { handle })
    }

    #[cfg(not(unix))]
    fn open(path: &str) -> Result<Self, String> {
        Err(format!("dynamic loading unsupported on this platform: {}", path))
    }
}

#[cfg(unix)]
fn last_dl_error() -> String {
    let err = unsafe { libc::dlerror() };
    if err.is_null() {
        "unknown error".to_string()
    } else {
        unsafe { CStr::from_ptr(err) }.to_string_lossy().into_owned()
    }
}

#[cfg(unix)]
impl Drop for Library {
    fn drop(&mut self) {
        unsafe {
            libc::dlclose(self.handle);
        }
    }
}
