//! Process-wide loader for the TDengine client library.
//!
//! The client library is externally compiled and installed; this module
//! locates it, loads it once, and resolves the ABI into an [`Api`] the rest
//! of the crate calls through.
//!
//! ## Environment variables
//!
//! - `TAOS_LIBRARY_PATH` *(optional)*: load the client library directly from
//!   this path instead of probing the platform default names.
//!
//! ## Initialization semantics
//!
//! The library is loaded lazily on first use and stored in a global
//! `OnceLock`. A failed load is cached too; subsequent calls report the same
//! failure without probing again.

use std::env;
use std::path::PathBuf;
use std::sync::OnceLock;

use libloading::Library;

use crate::api::Api;
use crate::error::{Result, TaosError};

static CLIENT: OnceLock<std::result::Result<ClientLibrary, String>> = OnceLock::new();

/// Loaded client library and resolved ABI.
///
/// `_lib` is intentionally kept alive for the lifetime of the process so the
/// resolved function pointers in `api` stay valid.
pub(crate) struct ClientLibrary {
    _lib: Library,
    pub(crate) api: Api,
}

/// Returns the process-wide client library, loading it on first call.
pub(crate) fn client() -> Result<&'static ClientLibrary> {
    match CLIENT.get_or_init(ClientLibrary::init) {
        Ok(lib) => Ok(lib),
        Err(msg) => Err(TaosError::database(-1, msg.clone())),
    }
}

/// Returns true if the native client library can be loaded.
///
/// Useful for tests and tooling that want to skip gracefully on hosts
/// without a TDengine client installation.
pub fn client_available() -> bool {
    client().is_ok()
}

impl ClientLibrary {
    fn init() -> std::result::Result<Self, String> {
        if let Ok(p) = env::var("TAOS_LIBRARY_PATH") {
            let path = PathBuf::from(p);
            return unsafe { Self::load_from_path(path) };
        }

        let mut failures = Vec::new();
        for name in candidate_names() {
            match unsafe { Self::load_from_path(PathBuf::from(name)) } {
                Ok(lib) => return Ok(lib),
                Err(e) => failures.push(e),
            }
        }
        Err(format!(
            "unable to load the TDengine client library (tried {}): {}",
            candidate_names().join(", "),
            failures.join("; ")
        ))
    }

    /// Loads the client library from `path` and resolves its ABI.
    ///
    /// # Safety
    ///
    /// `path` must name a TDengine client library compatible with the
    /// declarations in [`crate::sys`]; loading an arbitrary library and
    /// calling its symbols through the resolved pointers is undefined
    /// behavior.
    unsafe fn load_from_path(path: PathBuf) -> std::result::Result<Self, String> {
        let lib = Library::new(&path)
            .map_err(|e| format!("failed to load '{}': {}", path.display(), e))?;
        let api = Api::load(&lib)
            .map_err(|e| format!("failed to resolve symbols from '{}': {}", path.display(), e))?;
        tracing::debug!(path = %path.display(), "client library loaded");
        Ok(Self { _lib: lib, api })
    }
}

fn candidate_names() -> &'static [&'static str] {
    #[cfg(target_os = "macos")]
    {
        &["libtaos.dylib"]
    }
    #[cfg(target_os = "windows")]
    {
        &["taos.dll"]
    }
    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    {
        &["libtaos.so", "libtaos.so.1"]
    }
}

/// Reads a NUL-terminated native string into an owned `String`.
///
/// Returns an empty string for a null pointer; the native layer sometimes
/// reports errors with no message attached.
pub(crate) unsafe fn cstr_to_string(ptr: *const std::os::raw::c_char) -> String {
    if ptr.is_null() {
        return String::new();
    }
    std::ffi::CStr::from_ptr(ptr).to_string_lossy().into_owned()
}
