//! Cursor over a connection: statement execution and result retrieval.
//!
//! A cursor owns at most one native result set at a time. Executing a new
//! statement, closing the cursor, or dropping it releases the previous
//! result; error paths release it as well, so a failed call never leaks a
//! native handle.
//!
//! The async paths (`execute_async`, `fetch_all_async`) bridge the native
//! completion callbacks onto `tokio::sync::oneshot` channels. The callback
//! state is a boxed value round-tripped through the `param` pointer; the
//! terminal invocation consumes it, so completion is delivered exactly once.

use std::ffi::CString;
use std::os::raw::{c_char, c_int, c_void};
use std::ptr::NonNull;
use std::sync::Arc;

use tokio::sync::oneshot;
use tracing::debug;

use crate::connection::ConnHandle;
use crate::error::{Result, TaosError};
use crate::library::{self, ClientLibrary};
use crate::stmt::{states, Stmt};
use crate::subscription::{SubscribeConfig, Subscription};
use crate::sys;
use crate::types::{self, Field, Precision, Value};

/// Outcome of executing one SQL statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Executed {
    /// The statement produced no result set; carries the affected row count.
    Affected(i64),
    /// The statement produced a result set; fetch it with
    /// [`TaosCursor::fetch_all`] or [`TaosCursor::fetch_all_async`].
    ResultSet,
}

/// Owns a native result-set handle and frees it exactly once.
struct ResultGuard {
    ptr: NonNull<sys::TAOS_RES>,
}

impl ResultGuard {
    fn as_ptr(&self) -> *mut sys::TAOS_RES {
        self.ptr.as_ptr()
    }

    /// Releases ownership without freeing; the caller becomes responsible
    /// for the handle.
    fn into_raw(self) -> *mut sys::TAOS_RES {
        let ptr = self.ptr.as_ptr();
        std::mem::forget(self);
        ptr
    }
}

// Result handles are only ever passed back to the native library.
unsafe impl Send for ResultGuard {}

impl Drop for ResultGuard {
    fn drop(&mut self) {
        if let Ok(client) = library::client() {
            unsafe { (client.api.taos_free_result)(self.ptr.as_ptr()) };
        }
    }
}

/// Line protocol accepted by [`TaosCursor::schemaless_insert`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemalessProtocol {
    /// InfluxDB line protocol.
    Line,
    /// OpenTSDB telnet protocol.
    Telnet,
    /// OpenTSDB JSON protocol.
    Json,
}

impl SchemalessProtocol {
    fn as_native(self) -> c_int {
        match self {
            SchemalessProtocol::Line => 1,
            SchemalessProtocol::Telnet => 2,
            SchemalessProtocol::Json => 3,
        }
    }
}

/// Timestamp precision of schemaless lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemalessPrecision {
    /// Infer the precision from the timestamp's digit count.
    NotConfigured,
    Hours,
    Minutes,
    Seconds,
    Milliseconds,
    Microseconds,
    Nanoseconds,
}

impl SchemalessPrecision {
    fn as_native(self) -> c_int {
        match self {
            SchemalessPrecision::NotConfigured => 0,
            SchemalessPrecision::Hours => 1,
            SchemalessPrecision::Minutes => 2,
            SchemalessPrecision::Seconds => 3,
            SchemalessPrecision::Milliseconds => 4,
            SchemalessPrecision::Microseconds => 5,
            SchemalessPrecision::Nanoseconds => 6,
        }
    }
}

/// Cursor bound to one connection.
///
/// After a statement that yields a result set, [`fields`](Self::fields),
/// [`data`](Self::data) and [`row_count`](Self::row_count) expose the state
/// of the last fetch. `row_count` is `-1` until a statement has executed.
pub struct TaosCursor {
    conn: Option<Arc<ConnHandle>>,
    result: Option<ResultGuard>,
    fields: Vec<Field>,
    data: Vec<Vec<Value>>,
    row_count: i64,
}

impl TaosCursor {
    pub(crate) fn new(conn: Arc<ConnHandle>) -> Self {
        Self {
            conn: Some(conn),
            result: None,
            fields: Vec::new(),
            data: Vec::new(),
            row_count: -1,
        }
    }

    /// Field descriptors of the last result set.
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Rows retrieved by the last fetch.
    pub fn data(&self) -> &[Vec<Value>] {
        &self.data
    }

    /// Rows affected by the last statement, or rows fetched by the last
    /// fetch. `-1` before the first statement.
    pub fn row_count(&self) -> i64 {
        self.row_count
    }

    /// Timestamp precision of the current result set.
    pub fn precision(&self) -> Result<Precision> {
        let client = library::client()?;
        let result = self
            .result
            .as_ref()
            .ok_or_else(|| TaosError::operational("no open result set"))?;
        let raw = unsafe { (client.api.taos_result_precision)(result.as_ptr()) };
        Precision::try_from(raw)
    }

    /// Executes one SQL statement synchronously.
    ///
    /// Any previously open result set is released first. On
    /// [`Executed::ResultSet`] the native handle stays open until the rows
    /// are fetched, another statement executes, or the cursor closes.
    pub fn execute(&mut self, sql: &str) -> Result<Executed> {
        let conn = Arc::clone(self.require_conn()?);
        let csql = prepare_sql(sql)?;
        let client = library::client()?;
        self.reset_result();

        let res = unsafe { (client.api.taos_query)(conn.as_ptr(), csql.as_ptr()) };
        let code = unsafe { (client.api.taos_errno)(res) };
        if code != 0 {
            let message = unsafe { library::cstr_to_string((client.api.taos_errstr)(res)) };
            unsafe { (client.api.taos_free_result)(res) };
            return Err(TaosError::database(code, message));
        }
        self.complete_execute(client, res)
    }

    /// Executes one SQL statement via the native async API.
    ///
    /// Semantics match [`execute`](Self::execute); the calling task is
    /// suspended instead of the thread while the server works.
    pub async fn execute_async(&mut self, sql: &str) -> Result<Executed> {
        let conn = Arc::clone(self.require_conn()?);
        let csql = prepare_sql(sql)?;
        let client = library::client()?;
        self.reset_result();

        let (tx, rx) = oneshot::channel();
        let state = Box::new(QueryState { tx });
        unsafe {
            (client.api.taos_query_a)(
                conn.as_ptr(),
                csql.as_ptr(),
                query_trampoline,
                Box::into_raw(state) as *mut c_void,
            );
        }
        let (code, res) = rx
            .await
            .map_err(|_| TaosError::operational("query completion channel closed"))?;
        let res = res.take();
        if code != 0 {
            let message = unsafe { library::cstr_to_string((client.api.taos_errstr)(res)) };
            unsafe { (client.api.taos_free_result)(res) };
            return Err(TaosError::database(code, message));
        }
        self.complete_execute(client, res)
    }

    /// Fetches every remaining row of the current result set.
    ///
    /// Errors with an operational error if no result set is open. Rows stay
    /// available through [`data`](Self::data) afterwards.
    pub fn fetch_all(&mut self) -> Result<&[Vec<Value>]> {
        let client = library::client()?;
        let result = self
            .result
            .as_ref()
            .ok_or_else(|| TaosError::operational("no result set to fetch from"))?;

        let mut rows = Vec::new();
        loop {
            let mut block: sys::TAOS_ROW = std::ptr::null_mut();
            let nrows =
                unsafe { (client.api.taos_fetch_block)(result.as_ptr(), &mut block) };
            if nrows == 0 {
                break;
            }
            let errno = unsafe { (client.api.taos_errno)(result.as_ptr()) };
            if let Some(code) = fetch_error_code(nrows, errno) {
                let message =
                    unsafe { library::cstr_to_string((client.api.taos_errstr)(result.as_ptr())) };
                self.reset_result();
                return Err(TaosError::database(code, message));
            }
            match unsafe { decode_block(&self.fields, block, nrows as usize) } {
                Ok(columns) => rows.extend(types::transpose_block(&columns)),
                Err(e) => {
                    self.reset_result();
                    return Err(e);
                }
            }
        }

        self.row_count = rows.len() as i64;
        self.data = rows;
        debug!(rows = self.row_count, "fetched result set");
        Ok(&self.data)
    }

    /// Fetches every remaining row via the native async API.
    ///
    /// Blocks arrive through repeated completion callbacks and are appended
    /// in arrival order, so the rows equal what [`fetch_all`](Self::fetch_all)
    /// would return for the same statement. The native result handle is
    /// released when the last block arrives.
    pub async fn fetch_all_async(&mut self) -> Result<&[Vec<Value>]> {
        let client = library::client()?;
        let result = self
            .result
            .take()
            .ok_or_else(|| TaosError::operational("no result set to fetch from"))?;

        let (tx, rx) = oneshot::channel();
        let state = Box::new(FetchState {
            fields: self.fields.clone(),
            blocks: Vec::new(),
            tx,
        });
        // The callback owns the result handle from here on and frees it on
        // the terminal invocation.
        let res = result.into_raw();
        unsafe {
            (client.api.taos_fetch_rows_a)(
                res,
                fetch_trampoline,
                Box::into_raw(state) as *mut c_void,
            );
        }
        let rows = rx
            .await
            .map_err(|_| TaosError::operational("fetch completion channel closed"))??;

        self.row_count = rows.len() as i64;
        self.data = rows;
        debug!(rows = self.row_count, "fetched result set");
        Ok(&self.data)
    }

    /// Asks the server to abort the statement behind the current result set.
    pub fn stop_query(&mut self) -> Result<()> {
        let client = library::client()?;
        let result = self
            .result
            .as_ref()
            .ok_or_else(|| TaosError::operational("no query running"))?;
        unsafe { (client.api.taos_stop_query)(result.as_ptr()) };
        Ok(())
    }

    /// Inserts schemaless lines. Returns the number of rows written.
    pub fn schemaless_insert(
        &mut self,
        lines: &[&str],
        protocol: SchemalessProtocol,
        precision: SchemalessPrecision,
    ) -> Result<i64> {
        let conn = self.require_conn()?;
        let client = library::client()?;

        let clines = lines
            .iter()
            .map(|line| {
                CString::new(*line).map_err(|_| {
                    TaosError::programming("schemaless line contains an interior NUL byte")
                })
            })
            .collect::<Result<Vec<_>>>()?;
        let mut ptrs: Vec<*mut c_char> =
            clines.iter().map(|l| l.as_ptr() as *mut c_char).collect();

        let res = unsafe {
            (client.api.taos_schemaless_insert)(
                conn.as_ptr(),
                ptrs.as_mut_ptr(),
                ptrs.len() as c_int,
                protocol.as_native(),
                precision.as_native(),
            )
        };
        let code = unsafe { (client.api.taos_errno)(res) };
        if code != 0 {
            let message = unsafe { library::cstr_to_string((client.api.taos_errstr)(res)) };
            unsafe { (client.api.taos_free_result)(res) };
            return Err(TaosError::database(code, message));
        }
        let affected = unsafe { (client.api.taos_affected_rows)(res) } as i64;
        unsafe { (client.api.taos_free_result)(res) };
        debug!(rows = affected, "schemaless insert");
        Ok(affected)
    }

    /// Preloads table metadata into the client cache, one round trip for
    /// the whole list.
    pub fn load_table_info(&self, tables: &[&str]) -> Result<()> {
        let conn = self.require_conn()?;
        let client = library::client()?;
        let list = CString::new(tables.join(","))
            .map_err(|_| TaosError::programming("table name contains an interior NUL byte"))?;
        let code =
            unsafe { (client.api.taos_load_table_info)(conn.as_ptr(), list.as_ptr()) };
        if code != 0 {
            return Err(TaosError::database(
                code,
                format!("failed to load table info for [{}]", tables.join(",")),
            ));
        }
        Ok(())
    }

    /// Creates a prepared statement on this cursor's connection.
    pub fn stmt_init(&self) -> Result<Stmt<states::Initialized>> {
        let conn = self.require_conn()?;
        Stmt::init(Arc::clone(conn))
    }

    /// Opens a subscription on this cursor's connection.
    pub fn subscribe(&self, config: &SubscribeConfig) -> Result<Subscription> {
        let conn = self.require_conn()?;
        Subscription::open(Arc::clone(conn), config)
    }

    /// Releases the current result set and detaches from the connection.
    /// Returns `false` if the cursor was already closed.
    pub fn close(&mut self) -> bool {
        if self.conn.is_none() {
            return false;
        }
        self.reset_result();
        self.conn = None;
        true
    }

    fn require_conn(&self) -> Result<&Arc<ConnHandle>> {
        self.conn
            .as_ref()
            .ok_or_else(|| TaosError::programming("cursor is not connected"))
    }

    fn reset_result(&mut self) {
        self.result = None;
        self.fields.clear();
        self.data.clear();
        self.row_count = -1;
    }

    /// Shared tail of the sync and async execute paths; `res` has already
    /// passed the errno check.
    fn complete_execute(
        &mut self,
        client: &'static ClientLibrary,
        res: *mut sys::TAOS_RES,
    ) -> Result<Executed> {
        let ptr = require_result(res)?;
        let res = ptr.as_ptr();

        let field_count = unsafe { (client.api.taos_field_count)(res) };
        if field_count == 0 {
            let affected = unsafe { (client.api.taos_affected_rows)(res) } as i64;
            unsafe { (client.api.taos_free_result)(res) };
            self.row_count = affected;
            debug!(rows = affected, "statement affected rows");
            return Ok(Executed::Affected(affected));
        }

        match unsafe { read_fields(client, res, field_count as usize) } {
            Ok(fields) => {
                self.fields = fields;
                self.result = Some(ResultGuard { ptr });
                Ok(Executed::ResultSet)
            }
            Err(e) => {
                unsafe { (client.api.taos_free_result)(res) };
                Err(e)
            }
        }
    }
}

impl Drop for TaosCursor {
    fn drop(&mut self) {
        self.close();
    }
}

fn prepare_sql(sql: &str) -> Result<CString> {
    if sql.trim().is_empty() {
        return Err(TaosError::programming("no statement passed to execute"));
    }
    CString::new(sql)
        .map_err(|_| TaosError::programming("statement contains an interior NUL byte"))
}

/// Reads the field descriptors of a result set.
///
/// # Safety
///
/// `res` must be a live result-set handle with at least `count` fields.
pub(crate) unsafe fn read_fields(
    client: &ClientLibrary,
    res: *mut sys::TAOS_RES,
    count: usize,
) -> Result<Vec<Field>> {
    let raw = (client.api.taos_fetch_fields)(res);
    if raw.is_null() {
        return Err(TaosError::operational("result set has no field metadata"));
    }
    let mut fields = Vec::with_capacity(count);
    for i in 0..count {
        fields.push(Field::from_raw(&*raw.add(i))?);
    }
    Ok(fields)
}

/// A query that reports success must still hand back a handle; a null here
/// means the client library is in a degenerate state (e.g. out of memory)
/// without an errno to show for it.
fn require_result(res: *mut sys::TAOS_RES) -> Result<NonNull<sys::TAOS_RES>> {
    NonNull::new(res)
        .ok_or_else(|| TaosError::database(-1, "query returned a null result handle"))
}

/// Failure check for a block-drain step: a nonzero errno or a negative
/// block count is a fetch failure, reported with whichever native code is
/// set. Must run before the count is used as a length.
pub(crate) fn fetch_error_code(nrows: c_int, errno: c_int) -> Option<i32> {
    if errno != 0 {
        Some(errno)
    } else if nrows < 0 {
        Some(nrows)
    } else {
        None
    }
}

/// Decodes one column-major block into per-column values.
///
/// # Safety
///
/// `block` must point to `fields.len()` column pointers, each covering
/// `nrows` cells of the field's slot width.
pub(crate) unsafe fn decode_block(
    fields: &[Field],
    block: sys::TAOS_ROW,
    nrows: usize,
) -> Result<Vec<Vec<Value>>> {
    if block.is_null() {
        return Err(TaosError::operational("fetch returned rows but no block"));
    }
    let mut columns = Vec::with_capacity(fields.len());
    for (i, field) in fields.iter().enumerate() {
        let col = *block.add(i) as *const u8;
        if col.is_null() {
            return Err(TaosError::operational(format!(
                "missing column data for '{}'",
                field.name
            )));
        }
        let bytes = std::slice::from_raw_parts(col, field.cell_width() * nrows);
        columns.push(types::decode_column(field, bytes, nrows)?);
    }
    Ok(columns)
}

/// Result pointer carried through a oneshot channel.
///
/// If the receiving future is dropped before the callback fires, the send
/// fails and this value is dropped with the handle still inside; the `Drop`
/// impl frees it so cancellation cannot leak.
struct RawRes(*mut sys::TAOS_RES);

unsafe impl Send for RawRes {}

impl RawRes {
    /// Hands the pointer to the caller; the guard no longer frees it.
    fn take(mut self) -> *mut sys::TAOS_RES {
        std::mem::replace(&mut self.0, std::ptr::null_mut())
    }
}

impl Drop for RawRes {
    fn drop(&mut self) {
        if self.0.is_null() {
            return;
        }
        if let Ok(client) = library::client() {
            unsafe { (client.api.taos_free_result)(self.0) };
        }
    }
}

struct QueryState {
    tx: oneshot::Sender<(i32, RawRes)>,
}

/// Completion callback for `taos_query_a`. Fires once; consuming the boxed
/// sender enforces the single delivery.
unsafe extern "C" fn query_trampoline(param: *mut c_void, res: *mut sys::TAOS_RES, code: c_int) {
    let state = Box::from_raw(param as *mut QueryState);
    let _ = state.tx.send((code, RawRes(res)));
}

struct FetchState {
    fields: Vec<Field>,
    blocks: Vec<Vec<Vec<Value>>>,
    tx: oneshot::Sender<Result<Vec<Vec<Value>>>>,
}

/// Completion callback for `taos_fetch_rows_a`.
///
/// `num` is the row count of the ready block, negative on failure. A
/// positive count decodes the block and re-issues the fetch with the same
/// state; zero or negative terminates, frees the result handle exactly
/// once, and delivers through the channel.
unsafe extern "C" fn fetch_trampoline(param: *mut c_void, res: *mut sys::TAOS_RES, num: c_int) {
    let mut state = Box::from_raw(param as *mut FetchState);
    let client = match library::client() {
        Ok(client) => client,
        Err(e) => {
            let _ = state.tx.send(Err(e));
            return;
        }
    };

    if num < 0 {
        let message = library::cstr_to_string((client.api.taos_errstr)(res));
        (client.api.taos_free_result)(res);
        let _ = state
            .tx
            .send(Err(TaosError::database(num as i32, message)));
        return;
    }

    if num == 0 {
        (client.api.taos_free_result)(res);
        let rows = types::flatten_blocks(&state.blocks);
        let _ = state.tx.send(Ok(rows));
        return;
    }

    let block = (client.api.taos_result_block)(res);
    let block = if block.is_null() {
        std::ptr::null_mut()
    } else {
        *block
    };
    match decode_block(&state.fields, block, num as usize) {
        Ok(columns) => {
            state.blocks.push(columns);
            (client.api.taos_fetch_rows_a)(res, fetch_trampoline, Box::into_raw(state) as *mut c_void);
        }
        Err(e) => {
            (client.api.taos_free_result)(res);
            let _ = state.tx.send(Err(e));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prepare_sql_rejects_empty() {
        assert!(prepare_sql("").unwrap_err().is_programming());
        assert!(prepare_sql("   ").unwrap_err().is_programming());
        assert!(prepare_sql("select 1").is_ok());
    }

    #[test]
    fn test_prepare_sql_rejects_interior_nul() {
        assert!(prepare_sql("select\0 1").unwrap_err().is_programming());
    }

    #[test]
    fn test_negative_block_count_is_a_fetch_failure() {
        // a failing fetch must be caught before the count is used as a
        // slice length
        assert_eq!(fetch_error_code(-1, 0), Some(-1));
        assert_eq!(fetch_error_code(-1, 0x216), Some(0x216));
        assert_eq!(fetch_error_code(3, 0x216), Some(0x216));
        assert_eq!(fetch_error_code(3, 0), None);
    }

    #[test]
    fn test_null_result_handle_is_a_database_error() {
        let err = require_result(std::ptr::null_mut()).unwrap_err();
        assert!(err.is_database());
        assert_eq!(err.code(), Some(-1));
    }

    #[test]
    fn test_raw_res_take_disarms_the_guard() {
        let res = RawRes(std::ptr::null_mut());
        assert!(res.take().is_null());
    }

    #[test]
    fn test_schemaless_enums_map_to_native_tags() {
        assert_eq!(SchemalessProtocol::Line.as_native(), 1);
        assert_eq!(SchemalessProtocol::Telnet.as_native(), 2);
        assert_eq!(SchemalessProtocol::Json.as_native(), 3);
        assert_eq!(SchemalessPrecision::NotConfigured.as_native(), 0);
        assert_eq!(SchemalessPrecision::Nanoseconds.as_native(), 6);
    }
}
