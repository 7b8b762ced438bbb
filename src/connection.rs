//! Connection establishment and lifetime management.

use std::ffi::CString;
use std::ptr::NonNull;
use std::sync::Arc;

use tracing::debug;

use crate::cursor::TaosCursor;
use crate::error::{Result, TaosError};
use crate::library::{self, ClientLibrary};
use crate::sys;

/// Connection parameters. Defaults match the native client's conventions.
#[derive(Debug, Clone)]
pub struct ConnectConfig {
    pub host: String,
    pub user: String,
    pub password: String,
    /// Database to select on connect; `None` connects without one.
    pub database: Option<String>,
    pub port: u16,
}

impl Default for ConnectConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            user: "root".to_string(),
            password: "taosdata".to_string(),
            database: None,
            port: 6030,
        }
    }
}

/// Owns the native connection handle and closes it exactly once on drop.
pub(crate) struct ConnHandle {
    ptr: NonNull<sys::TAOS>,
}

impl ConnHandle {
    pub(crate) fn as_ptr(&self) -> *mut sys::TAOS {
        self.ptr.as_ptr()
    }
}

// The native client serializes access to a connection internally; the
// handle itself is a plain pointer we only pass back to the library.
unsafe impl Send for ConnHandle {}
unsafe impl Sync for ConnHandle {}

impl Drop for ConnHandle {
    fn drop(&mut self) {
        if let Ok(client) = library::client() {
            unsafe { (client.api.taos_close)(self.ptr.as_ptr()) };
            debug!("connection closed");
        }
    }
}

/// A live connection to a TDengine server.
///
/// Cursors created from this connection share ownership of the native
/// handle, so the connection stays open until the last cursor is dropped.
pub struct TaosConnection {
    inner: Arc<ConnHandle>,
}

impl TaosConnection {
    /// Connects using `config`. Fails with a database error if the native
    /// library cannot be loaded or the server rejects the connection.
    pub fn connect(config: &ConnectConfig) -> Result<Self> {
        let client = library::client()?;

        let host = make_cstring("host", &config.host)?;
        let user = make_cstring("user", &config.user)?;
        let password = make_cstring("password", &config.password)?;
        let database = match &config.database {
            Some(db) => Some(make_cstring("database", db)?),
            None => None,
        };

        let ptr = unsafe {
            (client.api.taos_connect)(
                host.as_ptr(),
                user.as_ptr(),
                password.as_ptr(),
                database.as_ref().map_or(std::ptr::null(), |db| db.as_ptr()),
                config.port,
            )
        };

        let Some(ptr) = NonNull::new(ptr) else {
            let (code, message) = last_error(client);
            return Err(TaosError::database(code, message));
        };

        debug!(host = %config.host, port = config.port, "connected");
        Ok(Self {
            inner: Arc::new(ConnHandle { ptr }),
        })
    }

    /// Creates a cursor bound to this connection.
    pub fn cursor(&self) -> TaosCursor {
        TaosCursor::new(Arc::clone(&self.inner))
    }

    /// Server version string, e.g. `"3.0.4.1"`.
    pub fn server_version(&self) -> Result<String> {
        let client = library::client()?;
        let ptr = unsafe { (client.api.taos_get_server_info)(self.inner.as_ptr()) };
        Ok(unsafe { library::cstr_to_string(ptr) })
    }

    /// Native client library version string.
    pub fn client_version(&self) -> Result<String> {
        let client = library::client()?;
        let ptr = unsafe { (client.api.taos_get_client_info)() };
        Ok(unsafe { library::cstr_to_string(ptr) })
    }
}

/// Reads the client-global errno/errstr pair, used when an API returns a
/// null handle and no result set exists to carry the error.
fn last_error(client: &ClientLibrary) -> (i32, String) {
    unsafe {
        let code = (client.api.taos_errno)(std::ptr::null_mut());
        let message = library::cstr_to_string((client.api.taos_errstr)(std::ptr::null_mut()));
        if message.is_empty() {
            (code, "unable to establish connection".to_string())
        } else {
            (code, message)
        }
    }
}

fn make_cstring(what: &str, value: &str) -> Result<CString> {
    CString::new(value)
        .map_err(|_| TaosError::programming(format!("{} contains an interior NUL byte", what)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ConnectConfig::default();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.user, "root");
        assert_eq!(config.password, "taosdata");
        assert_eq!(config.database, None);
        assert_eq!(config.port, 6030);
    }

    #[test]
    fn test_interior_nul_is_programming_error() {
        let err = make_cstring("host", "bad\0host").unwrap_err();
        assert!(err.is_programming());
    }
}
