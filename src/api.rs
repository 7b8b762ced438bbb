//! Resolved symbol table of the TDengine client library.
//!
//! The binding never links against `libtaos` at build time; all entry points
//! are resolved from the dynamically loaded library into an [`Api`] value and
//! called through plain function pointers from then on.

use std::os::raw::{c_char, c_int, c_void};

use libloading::{Library, Symbol};

use crate::sys::*;

/// Every native entry point the binding forwards to, resolved once at load.
pub struct Api {
    pub taos_connect: unsafe extern "C" fn(
        ip: *const c_char,
        user: *const c_char,
        pass: *const c_char,
        db: *const c_char,
        port: u16,
    ) -> *mut TAOS,
    pub taos_close: unsafe extern "C" fn(taos: *mut TAOS),

    pub taos_errno: unsafe extern "C" fn(res: *mut TAOS_RES) -> c_int,
    pub taos_errstr: unsafe extern "C" fn(res: *mut TAOS_RES) -> *const c_char,

    pub taos_query: unsafe extern "C" fn(taos: *mut TAOS, sql: *const c_char) -> *mut TAOS_RES,
    pub taos_query_a: unsafe extern "C" fn(
        taos: *mut TAOS,
        sql: *const c_char,
        fp: taos_async_cb,
        param: *mut c_void,
    ),

    pub taos_field_count: unsafe extern "C" fn(res: *mut TAOS_RES) -> c_int,
    pub taos_fetch_fields: unsafe extern "C" fn(res: *mut TAOS_RES) -> *mut TAOS_FIELD,
    pub taos_affected_rows: unsafe extern "C" fn(res: *mut TAOS_RES) -> c_int,
    pub taos_result_precision: unsafe extern "C" fn(res: *mut TAOS_RES) -> c_int,

    pub taos_fetch_block:
        unsafe extern "C" fn(res: *mut TAOS_RES, rows: *mut TAOS_ROW) -> c_int,
    pub taos_fetch_rows_a:
        unsafe extern "C" fn(res: *mut TAOS_RES, fp: taos_async_cb, param: *mut c_void),
    pub taos_result_block: unsafe extern "C" fn(res: *mut TAOS_RES) -> *mut TAOS_ROW,

    pub taos_free_result: unsafe extern "C" fn(res: *mut TAOS_RES),
    pub taos_stop_query: unsafe extern "C" fn(res: *mut TAOS_RES),

    pub taos_get_server_info: unsafe extern "C" fn(taos: *mut TAOS) -> *const c_char,
    pub taos_get_client_info: unsafe extern "C" fn() -> *const c_char,

    pub taos_load_table_info:
        unsafe extern "C" fn(taos: *mut TAOS, table_name_list: *const c_char) -> c_int,

    pub taos_schemaless_insert: unsafe extern "C" fn(
        taos: *mut TAOS,
        lines: *mut *mut c_char,
        num_lines: c_int,
        protocol: c_int,
        precision: c_int,
    ) -> *mut TAOS_RES,

    pub taos_subscribe: unsafe extern "C" fn(
        taos: *mut TAOS,
        restart: c_int,
        topic: *const c_char,
        sql: *const c_char,
        fp: Option<taos_subscribe_cb>,
        param: *mut c_void,
        interval: c_int,
    ) -> *mut TAOS_SUB,
    pub taos_consume: unsafe extern "C" fn(sub: *mut TAOS_SUB) -> *mut TAOS_RES,
    pub taos_unsubscribe: unsafe extern "C" fn(sub: *mut TAOS_SUB, keep_progress: c_int),

    pub taos_stmt_init: unsafe extern "C" fn(taos: *mut TAOS) -> *mut TAOS_STMT,
    pub taos_stmt_prepare:
        unsafe extern "C" fn(stmt: *mut TAOS_STMT, sql: *const c_char, length: u64) -> c_int,
    pub taos_stmt_set_tbname:
        unsafe extern "C" fn(stmt: *mut TAOS_STMT, name: *const c_char) -> c_int,
    pub taos_stmt_set_tbname_tags: unsafe extern "C" fn(
        stmt: *mut TAOS_STMT,
        name: *const c_char,
        tags: *mut TAOS_BIND,
    ) -> c_int,
    pub taos_stmt_set_sub_tbname:
        unsafe extern "C" fn(stmt: *mut TAOS_STMT, name: *const c_char) -> c_int,
    pub taos_stmt_bind_param:
        unsafe extern "C" fn(stmt: *mut TAOS_STMT, bind: *mut TAOS_BIND) -> c_int,
    pub taos_stmt_bind_single_param_batch: unsafe extern "C" fn(
        stmt: *mut TAOS_STMT,
        bind: *mut TAOS_MULTI_BIND,
        col_idx: c_int,
    ) -> c_int,
    pub taos_stmt_bind_param_batch:
        unsafe extern "C" fn(stmt: *mut TAOS_STMT, bind: *mut TAOS_MULTI_BIND) -> c_int,
    pub taos_stmt_add_batch: unsafe extern "C" fn(stmt: *mut TAOS_STMT) -> c_int,
    pub taos_stmt_execute: unsafe extern "C" fn(stmt: *mut TAOS_STMT) -> c_int,
    pub taos_stmt_use_result: unsafe extern "C" fn(stmt: *mut TAOS_STMT) -> *mut TAOS_RES,
    pub taos_stmt_close: unsafe extern "C" fn(stmt: *mut TAOS_STMT) -> c_int,
    pub taos_stmt_errstr: unsafe extern "C" fn(stmt: *mut TAOS_STMT) -> *const c_char,
}

macro_rules! resolve {
    ($lib:expr, $name:ident) => {
        get($lib, concat!(stringify!($name), "\0").as_bytes())?
    };
}

impl Api {
    /// Resolves every entry point from an already-loaded client library.
    ///
    /// # Safety
    ///
    /// The library must be a TDengine client library exporting the declared
    /// symbols with matching signatures; a mismatched library leads to
    /// undefined behavior when the resolved pointers are called.
    pub unsafe fn load(lib: &Library) -> Result<Self, libloading::Error> {
        unsafe fn get<T: Copy>(
            lib: &Library,
            name: &'static [u8],
        ) -> Result<T, libloading::Error> {
            let sym: Symbol<T> = lib.get::<T>(name)?;
            Ok(*sym)
        }

        Ok(Self {
            taos_connect: resolve!(lib, taos_connect),
            taos_close: resolve!(lib, taos_close),
            taos_errno: resolve!(lib, taos_errno),
            taos_errstr: resolve!(lib, taos_errstr),
            taos_query: resolve!(lib, taos_query),
            taos_query_a: resolve!(lib, taos_query_a),
            taos_field_count: resolve!(lib, taos_field_count),
            taos_fetch_fields: resolve!(lib, taos_fetch_fields),
            taos_affected_rows: resolve!(lib, taos_affected_rows),
            taos_result_precision: resolve!(lib, taos_result_precision),
            taos_fetch_block: resolve!(lib, taos_fetch_block),
            taos_fetch_rows_a: resolve!(lib, taos_fetch_rows_a),
            taos_result_block: resolve!(lib, taos_result_block),
            taos_free_result: resolve!(lib, taos_free_result),
            taos_stop_query: resolve!(lib, taos_stop_query),
            taos_get_server_info: resolve!(lib, taos_get_server_info),
            taos_get_client_info: resolve!(lib, taos_get_client_info),
            taos_load_table_info: resolve!(lib, taos_load_table_info),
            taos_schemaless_insert: resolve!(lib, taos_schemaless_insert),
            taos_subscribe: resolve!(lib, taos_subscribe),
            taos_consume: resolve!(lib, taos_consume),
            taos_unsubscribe: resolve!(lib, taos_unsubscribe),
            taos_stmt_init: resolve!(lib, taos_stmt_init),
            taos_stmt_prepare: resolve!(lib, taos_stmt_prepare),
            taos_stmt_set_tbname: resolve!(lib, taos_stmt_set_tbname),
            taos_stmt_set_tbname_tags: resolve!(lib, taos_stmt_set_tbname_tags),
            taos_stmt_set_sub_tbname: resolve!(lib, taos_stmt_set_sub_tbname),
            taos_stmt_bind_param: resolve!(lib, taos_stmt_bind_param),
            taos_stmt_bind_single_param_batch: resolve!(lib, taos_stmt_bind_single_param_batch),
            taos_stmt_bind_param_batch: resolve!(lib, taos_stmt_bind_param_batch),
            taos_stmt_add_batch: resolve!(lib, taos_stmt_add_batch),
            taos_stmt_execute: resolve!(lib, taos_stmt_execute),
            taos_stmt_use_result: resolve!(lib, taos_stmt_use_result),
            taos_stmt_close: resolve!(lib, taos_stmt_close),
            taos_stmt_errstr: resolve!(lib, taos_stmt_errstr),
        })
    }
}
