//! C ABI declarations for the TDengine client library.
//!
//! Everything in this module mirrors `taos.h`. The binding never interprets
//! the bytes behind the opaque handles; it only forwards them to the native
//! entry points resolved in [`crate::api`].

#![allow(non_camel_case_types)]

use std::os::raw::{c_char, c_int, c_uint, c_void};

/// Opaque connection handle (`TAOS*`).
#[repr(C)]
pub struct TAOS {
    _private: [u8; 0],
}

/// Opaque result-set handle (`TAOS_RES*`).
#[repr(C)]
pub struct TAOS_RES {
    _private: [u8; 0],
}

/// Opaque prepared-statement handle (`TAOS_STMT*`).
#[repr(C)]
pub struct TAOS_STMT {
    _private: [u8; 0],
}

/// Opaque subscription-session handle (`TAOS_SUB*`).
#[repr(C)]
pub struct TAOS_SUB {
    _private: [u8; 0],
}

/// One fetched row: an array of per-column cell pointers.
pub type TAOS_ROW = *mut *mut c_void;

/// Field descriptor returned by `taos_fetch_fields`.
///
/// `name` is NUL-terminated inside the fixed buffer; `bytes` is the declared
/// byte width of a cell (for VARCHAR/NCHAR the payload width, excluding the
/// 2-byte length prefix each block cell carries).
#[repr(C)]
#[derive(Copy, Clone)]
pub struct TAOS_FIELD {
    pub name: [c_char; 65],
    pub r#type: u8,
    pub bytes: i16,
}

/// Parameter cell for `taos_stmt_bind_param` / `taos_stmt_set_tbname_tags`.
///
/// Layout follows the MYSQL_BIND-alike structure in `taos.h`; `u` and
/// `allocated` exist only to keep the struct size in sync with the header.
#[repr(C)]
pub struct TAOS_BIND {
    pub buffer_type: c_int,
    pub buffer: *mut c_void,
    pub buffer_length: usize,
    pub length: *mut usize,
    pub is_null: *mut c_int,
    pub is_unsigned: c_int,
    pub error: *mut c_int,
    pub u: i64,
    pub allocated: c_uint,
}

/// Column-batch parameter for `taos_stmt_bind_single_param_batch` and
/// `taos_stmt_bind_param_batch`.
///
/// `buffer` holds `num` cells of `buffer_length` bytes each, column-major;
/// `length` and `is_null` are per-row arrays of the same `num` entries.
#[repr(C)]
pub struct TAOS_MULTI_BIND {
    pub buffer_type: c_int,
    pub buffer: *mut c_void,
    pub buffer_length: usize,
    pub length: *mut i32,
    pub is_null: *mut c_char,
    pub num: c_int,
}

/// Completion callback for `taos_query_a` (`code` is the native status) and
/// for `taos_fetch_rows_a` (`code` is the row count of the ready block,
/// negative on failure).
pub type taos_async_cb = unsafe extern "C" fn(param: *mut c_void, res: *mut TAOS_RES, code: c_int);

/// Per-batch callback slot of `taos_subscribe`; the binding polls with
/// `taos_consume` instead and always passes a null callback.
pub type taos_subscribe_cb =
    unsafe extern "C" fn(sub: *mut TAOS_SUB, res: *mut TAOS_RES, param: *mut c_void, code: c_int);

// TSDB_DATA_TYPE_* tags.
pub const TSDB_DATA_TYPE_NULL: u8 = 0;
pub const TSDB_DATA_TYPE_BOOL: u8 = 1;
pub const TSDB_DATA_TYPE_TINYINT: u8 = 2;
pub const TSDB_DATA_TYPE_SMALLINT: u8 = 3;
pub const TSDB_DATA_TYPE_INT: u8 = 4;
pub const TSDB_DATA_TYPE_BIGINT: u8 = 5;
pub const TSDB_DATA_TYPE_FLOAT: u8 = 6;
pub const TSDB_DATA_TYPE_DOUBLE: u8 = 7;
pub const TSDB_DATA_TYPE_BINARY: u8 = 8;
pub const TSDB_DATA_TYPE_TIMESTAMP: u8 = 9;
pub const TSDB_DATA_TYPE_NCHAR: u8 = 10;
pub const TSDB_DATA_TYPE_UTINYINT: u8 = 11;
pub const TSDB_DATA_TYPE_USMALLINT: u8 = 12;
pub const TSDB_DATA_TYPE_UINT: u8 = 13;
pub const TSDB_DATA_TYPE_UBIGINT: u8 = 14;
pub const TSDB_DATA_TYPE_JSON: u8 = 15;

// Null sentinels used inside fixed-width block cells.
pub const TSDB_DATA_BOOL_NULL: u8 = 0x02;
pub const TSDB_DATA_TINYINT_NULL: i8 = i8::MIN;
pub const TSDB_DATA_SMALLINT_NULL: i16 = i16::MIN;
pub const TSDB_DATA_INT_NULL: i32 = i32::MIN;
pub const TSDB_DATA_BIGINT_NULL: i64 = i64::MIN;
pub const TSDB_DATA_UTINYINT_NULL: u8 = u8::MAX;
pub const TSDB_DATA_USMALLINT_NULL: u16 = u16::MAX;
pub const TSDB_DATA_UINT_NULL: u32 = u32::MAX;
pub const TSDB_DATA_UBIGINT_NULL: u64 = u64::MAX;
pub const TSDB_DATA_FLOAT_NULL: u32 = 0x7FF0_0000;
pub const TSDB_DATA_DOUBLE_NULL: u64 = 0x7FFF_FF00_0000_0000;

/// Variable-width block cells carry a little-endian `u16` length prefix;
/// this value in the prefix marks a NULL cell.
pub const VAR_DATA_NULL_LEN: u16 = u16::MAX;

/// Size of the length prefix in front of every VARCHAR/NCHAR/JSON cell.
pub const VAR_DATA_HEADER_SIZE: usize = 2;
