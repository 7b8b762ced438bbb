//! Prepared statements with a typestate lifecycle.
//!
//! The native statement API is order-sensitive: prepare, then name the
//! target table, then bind, then batch, then execute. Each step here
//! consumes the statement and returns it in the next state, so an
//! out-of-order call is a compile error rather than a native crash.
//!
//! ```ignore
//! let stmt = cursor
//!     .stmt_init()?
//!     .prepare("insert into ? values (?, ?)")?
//!     .set_tbname("d0")?
//!     .bind_param(&mut BindArray::from_values(&row))?
//!     .add_batch()?
//!     .execute()?;
//! stmt.close()?;
//! ```

use std::ffi::CString;
use std::marker::PhantomData;
use std::os::raw::c_int;
use std::ptr::NonNull;
use std::sync::Arc;

use tracing::debug;

use crate::bind::{BindArray, MultiBind};
use crate::connection::ConnHandle;
use crate::cursor;
use crate::error::{Result, TaosError};
use crate::library;
use crate::sys;
use crate::types::{Field, Value};

/// Lifecycle marker types for [`Stmt`].
pub mod states {
    /// Fresh statement; only `prepare` is available.
    pub struct Initialized;
    /// SQL template installed; awaiting table name and parameters.
    pub struct Prepared;
    /// Parameters bound for the pending row or column batch.
    pub struct Bound;
    /// Pending rows staged into the execution batch.
    pub struct Batched;
    /// Batch executed; results and reuse are available.
    pub struct Executed;
}

/// Owns the native statement handle and closes it exactly once.
struct RawStmt {
    ptr: Option<NonNull<sys::TAOS_STMT>>,
}

impl RawStmt {
    fn as_ptr(&self) -> *mut sys::TAOS_STMT {
        // invariant: ptr is Some until close() or drop takes it
        self.ptr.map_or(std::ptr::null_mut(), NonNull::as_ptr)
    }

    fn close(&mut self) -> Result<()> {
        let Some(ptr) = self.ptr.take() else {
            return Ok(());
        };
        let client = library::client()?;
        let code = unsafe { (client.api.taos_stmt_close)(ptr.as_ptr()) };
        if code != 0 {
            return Err(TaosError::database(code, "failed to close statement"));
        }
        Ok(())
    }
}

unsafe impl Send for RawStmt {}

impl Drop for RawStmt {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

/// A prepared statement in lifecycle state `S`.
///
/// Holds the connection alive for as long as the statement exists.
pub struct Stmt<S> {
    raw: RawStmt,
    conn: Arc<ConnHandle>,
    _state: PhantomData<S>,
}

impl<S> Stmt<S> {
    fn transition<T>(self) -> Stmt<T> {
        Stmt {
            raw: self.raw,
            conn: self.conn,
            _state: PhantomData,
        }
    }

    /// Translates a nonzero native return into a database error carrying
    /// the statement's own error string.
    fn check(&self, code: c_int) -> Result<()> {
        if code == 0 {
            return Ok(());
        }
        let message = match library::client() {
            Ok(client) => unsafe {
                library::cstr_to_string((client.api.taos_stmt_errstr)(self.raw.as_ptr()))
            },
            Err(_) => String::new(),
        };
        Err(TaosError::database(code, message))
    }

    /// Closes the statement, releasing the native handle.
    pub fn close(mut self) -> Result<()> {
        self.raw.close()
    }
}

impl Stmt<states::Initialized> {
    pub(crate) fn init(conn: Arc<ConnHandle>) -> Result<Self> {
        let client = library::client()?;
        let ptr = unsafe { (client.api.taos_stmt_init)(conn.as_ptr()) };
        let Some(ptr) = NonNull::new(ptr) else {
            let code = unsafe { (client.api.taos_errno)(std::ptr::null_mut()) };
            let message =
                unsafe { library::cstr_to_string((client.api.taos_errstr)(std::ptr::null_mut())) };
            return Err(TaosError::database(code, message));
        };
        Ok(Self {
            raw: RawStmt { ptr: Some(ptr) },
            conn,
            _state: PhantomData,
        })
    }

    /// Installs the SQL template. Placeholders are written as `?`.
    pub fn prepare(self, sql: &str) -> Result<Stmt<states::Prepared>> {
        let csql = CString::new(sql)
            .map_err(|_| TaosError::programming("statement contains an interior NUL byte"))?;
        let client = library::client()?;
        let code = unsafe {
            (client.api.taos_stmt_prepare)(
                self.raw.as_ptr(),
                csql.as_ptr(),
                csql.as_bytes().len() as u64,
            )
        };
        self.check(code)?;
        debug!(sql, "statement prepared");
        Ok(self.transition())
    }
}

impl Stmt<states::Prepared> {
    /// Names the target table for a template with a `?` table placeholder.
    pub fn set_tbname(self, name: &str) -> Result<Self> {
        name_table(&self, name, false)?;
        Ok(self)
    }

    /// Names an auto-created subtable and binds its tag values.
    pub fn set_tbname_tags(self, name: &str, tags: &mut BindArray) -> Result<Self> {
        let cname = table_name(name)?;
        let client = library::client()?;
        let code = unsafe {
            (client.api.taos_stmt_set_tbname_tags)(
                self.raw.as_ptr(),
                cname.as_ptr(),
                tags.as_mut_ptr(),
            )
        };
        self.check(code)?;
        Ok(self)
    }

    /// Names an existing subtable of a super table. Requires the client's
    /// table cache to know the subtable, see
    /// [`TaosCursor::load_table_info`](crate::TaosCursor::load_table_info).
    pub fn set_sub_tbname(self, name: &str) -> Result<Self> {
        name_table(&self, name, true)?;
        Ok(self)
    }

    /// Binds one row of parameters.
    pub fn bind_param(self, params: &mut BindArray) -> Result<Stmt<states::Bound>> {
        let client = library::client()?;
        let code =
            unsafe { (client.api.taos_stmt_bind_param)(self.raw.as_ptr(), params.as_mut_ptr()) };
        self.check(code)?;
        Ok(self.transition())
    }

    /// Binds one column of a column-wise batch.
    pub fn bind_single_param_batch(
        self,
        column: &mut MultiBind,
        col_idx: usize,
    ) -> Result<Stmt<states::Bound>> {
        bind_single(&self, column, col_idx)?;
        Ok(self.transition())
    }

    /// Binds every column of a column-wise batch in one call.
    pub fn bind_param_batch(self, columns: &mut [MultiBind]) -> Result<Stmt<states::Bound>> {
        bind_batch(&self, columns)?;
        Ok(self.transition())
    }
}

impl Stmt<states::Bound> {
    /// Binds a further column of the current column-wise batch.
    pub fn bind_single_param_batch(self, column: &mut MultiBind, col_idx: usize) -> Result<Self> {
        bind_single(&self, column, col_idx)?;
        Ok(self)
    }

    /// Stages the bound parameters into the execution batch.
    pub fn add_batch(self) -> Result<Stmt<states::Batched>> {
        let client = library::client()?;
        let code = unsafe { (client.api.taos_stmt_add_batch)(self.raw.as_ptr()) };
        self.check(code)?;
        Ok(self.transition())
    }
}

impl Stmt<states::Batched> {
    /// Names the target table for the next batch entry, for inserts that
    /// span several subtables.
    pub fn set_tbname(self, name: &str) -> Result<Self> {
        name_table(&self, name, false)?;
        Ok(self)
    }

    /// Names an existing subtable for the next batch entry.
    pub fn set_sub_tbname(self, name: &str) -> Result<Self> {
        name_table(&self, name, true)?;
        Ok(self)
    }

    /// Names an auto-created subtable for the next batch entry and binds
    /// its tag values.
    pub fn set_tbname_tags(self, name: &str, tags: &mut BindArray) -> Result<Self> {
        let cname = table_name(name)?;
        let client = library::client()?;
        let code = unsafe {
            (client.api.taos_stmt_set_tbname_tags)(
                self.raw.as_ptr(),
                cname.as_ptr(),
                tags.as_mut_ptr(),
            )
        };
        self.check(code)?;
        Ok(self)
    }

    /// Binds another row of parameters for a further batch entry.
    pub fn bind_param(self, params: &mut BindArray) -> Result<Stmt<states::Bound>> {
        let client = library::client()?;
        let code =
            unsafe { (client.api.taos_stmt_bind_param)(self.raw.as_ptr(), params.as_mut_ptr()) };
        self.check(code)?;
        Ok(self.transition())
    }

    /// Executes everything staged so far.
    pub fn execute(self) -> Result<Stmt<states::Executed>> {
        let client = library::client()?;
        let code = unsafe { (client.api.taos_stmt_execute)(self.raw.as_ptr()) };
        self.check(code)?;
        debug!("statement executed");
        Ok(self.transition())
    }
}

impl Stmt<states::Executed> {
    /// Drains the statement's result set, for templates that query.
    ///
    /// Returns the field descriptors and all rows. The statement can be
    /// closed or re-prepared afterwards.
    pub fn use_result(&mut self) -> Result<(Vec<Field>, Vec<Vec<Value>>)> {
        let client = library::client()?;
        let res = unsafe { (client.api.taos_stmt_use_result)(self.raw.as_ptr()) };
        if res.is_null() {
            let code = unsafe { (client.api.taos_errno)(res) };
            let message = unsafe {
                library::cstr_to_string((client.api.taos_stmt_errstr)(self.raw.as_ptr()))
            };
            return Err(TaosError::database(code, message));
        }

        let drain = || -> Result<(Vec<Field>, Vec<Vec<Value>>)> {
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
                    let message =
                        unsafe { library::cstr_to_string((client.api.taos_errstr)(res)) };
                    return Err(TaosError::database(code, message));
                }
                let columns = unsafe { cursor::decode_block(&fields, block, nrows as usize)? };
                rows.extend(crate::types::transpose_block(&columns));
            }
            Ok((fields, rows))
        };
        let out = drain();
        unsafe { (client.api.taos_free_result)(res) };
        out
    }

    /// Returns to the prepared state so further tables and rows can be
    /// bound and executed against the same template.
    pub fn reuse(self) -> Stmt<states::Prepared> {
        self.transition()
    }

    /// Reinstalls a new SQL template on the same native statement.
    pub fn prepare(self, sql: &str) -> Result<Stmt<states::Prepared>> {
        self.transition::<states::Initialized>().prepare(sql)
    }
}

fn name_table<S>(stmt: &Stmt<S>, name: &str, sub: bool) -> Result<()> {
    let cname = table_name(name)?;
    let client = library::client()?;
    let code = unsafe {
        if sub {
            (client.api.taos_stmt_set_sub_tbname)(stmt.raw.as_ptr(), cname.as_ptr())
        } else {
            (client.api.taos_stmt_set_tbname)(stmt.raw.as_ptr(), cname.as_ptr())
        }
    };
    stmt.check(code)
}

fn bind_single<S>(stmt: &Stmt<S>, column: &mut MultiBind, col_idx: usize) -> Result<()> {
    let client = library::client()?;
    let mut raw = column.as_raw();
    let code = unsafe {
        (client.api.taos_stmt_bind_single_param_batch)(
            stmt.raw.as_ptr(),
            &mut raw,
            col_idx as c_int,
        )
    };
    stmt.check(code)
}

fn bind_batch<S>(stmt: &Stmt<S>, columns: &mut [MultiBind]) -> Result<()> {
    if columns.is_empty() {
        return Err(TaosError::programming("no columns passed to bind_param_batch"));
    }
    let client = library::client()?;
    let mut raw: Vec<sys::TAOS_MULTI_BIND> = columns.iter_mut().map(MultiBind::as_raw).collect();
    let code = unsafe {
        (client.api.taos_stmt_bind_param_batch)(stmt.raw.as_ptr(), raw.as_mut_ptr())
    };
    stmt.check(code)
}

fn table_name(name: &str) -> Result<CString> {
    CString::new(name)
        .map_err(|_| TaosError::programming("table name contains an interior NUL byte"))
}
