//! Continuous-query subscriptions.
//!
//! A subscription registers a query topic with the server and polls for
//! incremental results with `taos_consume`. Result sets handed out by the
//! native consume call belong to the subscription session and are released
//! by `taos_unsubscribe`, never freed individually.

use std::ffi::CString;
use std::os::raw::c_int;
use std::ptr::NonNull;
use std::sync::Arc;

use tracing::debug;

use crate::connection::ConnHandle;
use crate::cursor;
use crate::error::{Result, TaosError};
use crate::library;
use crate::sys;
use crate::types::{Field, Value};

/// Subscription parameters.
#[derive(Debug, Clone)]
pub struct SubscribeConfig {
    /// Server-side name identifying this subscription's progress record.
    pub topic: String,
    /// Query whose incremental results the subscription delivers.
    pub sql: String,
    /// Restart from the beginning instead of resuming saved progress.
    pub restart: bool,
    /// Polling interval the server enforces between consumes, in
    /// milliseconds. `0` lets the client poll freely.
    pub poll_interval_ms: u32,
    /// Keep the progress record when unsubscribing, so a later
    /// subscription on the same topic resumes where this one stopped.
    pub keep_progress: bool,
}

impl Default for SubscribeConfig {
    fn default() -> Self {
        Self {
            topic: String::new(),
            sql: String::new(),
            restart: true,
            poll_interval_ms: 1000,
            keep_progress: false,
        }
    }
}

/// One batch of rows delivered by [`Subscription::consume`].
#[derive(Debug)]
pub struct ConsumedRows {
    pub fields: Vec<Field>,
    pub rows: Vec<Vec<Value>>,
}

/// An open subscription session.
///
/// Dropping the subscription unsubscribes with the configured progress
/// policy; [`unsubscribe`](Self::unsubscribe) does the same explicitly and
/// is a no-op the second time.
pub struct Subscription {
    sub: Option<NonNull<sys::TAOS_SUB>>,
    keep_progress: bool,
    _conn: Arc<ConnHandle>,
}

unsafe impl Send for Subscription {}

impl Subscription {
    pub(crate) fn open(conn: Arc<ConnHandle>, config: &SubscribeConfig) -> Result<Self> {
        if config.topic.is_empty() || config.sql.is_empty() {
            return Err(TaosError::programming(
                "subscription requires both a topic and a query",
            ));
        }
        let topic = CString::new(config.topic.as_str())
            .map_err(|_| TaosError::programming("topic contains an interior NUL byte"))?;
        let sql = CString::new(config.sql.as_str())
            .map_err(|_| TaosError::programming("query contains an interior NUL byte"))?;

        let client = library::client()?;
        let ptr = unsafe {
            (client.api.taos_subscribe)(
                conn.as_ptr(),
                config.restart as c_int,
                topic.as_ptr(),
                sql.as_ptr(),
                None,
                std::ptr::null_mut(),
                config.poll_interval_ms as c_int,
            )
        };
        let Some(sub) = NonNull::new(ptr) else {
            let code = unsafe { (client.api.taos_errno)(std::ptr::null_mut()) };
            let message =
                unsafe { library::cstr_to_string((client.api.taos_errstr)(std::ptr::null_mut())) };
            return Err(TaosError::database(code, message));
        };

        debug!(topic = %config.topic, "subscription opened");
        Ok(Self {
            sub: Some(sub),
            keep_progress: config.keep_progress,
            _conn: conn,
        })
    }

    /// Polls for the next batch of rows. Blocks until the server's poll
    /// interval allows a consume; an empty batch means no new rows.
    pub fn consume(&mut self) -> Result<ConsumedRows> {
        let sub = self
            .sub
            .ok_or_else(|| TaosError::operational("subscription is closed"))?;
        let client = library::client()?;

        // Consume results are owned by the subscription session; the
        // final unsubscribe releases them.
        let res = unsafe { (client.api.taos_consume)(sub.as_ptr()) };
        let code = unsafe { (client.api.taos_errno)(res) };
        if code != 0 {
            let message = unsafe { library::cstr_to_string((client.api.taos_errstr)(res)) };
            return Err(TaosError::database(code, message));
        }

        let field_count = unsafe { (client.api.taos_field_count)(res) } as usize;
        let fields = unsafe { cursor::read_fields(client, res, field_count)? };
        let mut rows = Vec::new();
        loop {
            let mut block: sys::TAOS_ROW = std::ptr::null_mut();
            let nrows = unsafe { (client.api.taos_fetch_block)(res, &mut block) };
            if nrows == 0 {
                break;
            }
            let errno = unsafe { (client.api.taos_errno)(res) };
            if let Some(code) = cursor::fetch_error_code(nrows, errno) {
                let message = unsafe { library::cstr_to_string((client.api.taos_errstr)(res)) };
                return Err(TaosError::database(code, message));
            }
            let columns = unsafe { cursor::decode_block(&fields, block, nrows as usize)? };
            rows.extend(crate::types::transpose_block(&columns));
        }
        Ok(ConsumedRows { fields, rows })
    }

    /// Polls forever, handing every batch to `handler`.
    ///
    /// There is no built-in termination: the loop runs until `handler` or a
    /// consume returns an error, which is then propagated.
    pub fn consume_each<F>(&mut self, mut handler: F) -> Result<()>
    where
        F: FnMut(ConsumedRows) -> Result<()>,
    {
        loop {
            let batch = self.consume()?;
            handler(batch)?;
        }
    }

    /// Closes the subscription. Safe to call more than once.
    pub fn unsubscribe(&mut self) {
        let Some(sub) = self.sub.take() else {
            return;
        };
        if let Ok(client) = library::client() {
            unsafe { (client.api.taos_unsubscribe)(sub.as_ptr(), self.keep_progress as c_int) };
            debug!("subscription closed");
        }
    }

    /// Returns true until [`unsubscribe`](Self::unsubscribe) runs.
    pub fn is_open(&self) -> bool {
        self.sub.is_some()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = SubscribeConfig::default();
        assert!(config.restart);
        assert_eq!(config.poll_interval_ms, 1000);
        assert!(!config.keep_progress);
    }
}
