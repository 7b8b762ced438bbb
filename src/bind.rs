//! Owned parameter buffers for prepared statements.
//!
//! The native bind structures carry raw pointers into caller-owned memory
//! that must stay valid until the statement executes. [`BindArray`] and
//! [`MultiBind`] own that memory behind stable heap allocations, so the
//! pointers handed to the native layer cannot dangle while the value lives.

use std::os::raw::{c_char, c_int};

use crate::sys;

/// One parameter value for row-wise binding and tag binding.
#[derive(Debug, Clone, PartialEq)]
pub enum BindValue {
    Null,
    Bool(bool),
    TinyInt(i8),
    SmallInt(i16),
    Int(i32),
    BigInt(i64),
    UTinyInt(u8),
    USmallInt(u16),
    UInt(u32),
    UBigInt(u64),
    Float(f32),
    Double(f64),
    /// Raw epoch value in the target table's precision.
    Timestamp(i64),
    VarChar(String),
    NChar(String),
    Binary(Vec<u8>),
}

impl BindValue {
    fn tag(&self) -> u8 {
        match self {
            BindValue::Null => sys::TSDB_DATA_TYPE_NULL,
            BindValue::Bool(_) => sys::TSDB_DATA_TYPE_BOOL,
            BindValue::TinyInt(_) => sys::TSDB_DATA_TYPE_TINYINT,
            BindValue::SmallInt(_) => sys::TSDB_DATA_TYPE_SMALLINT,
            BindValue::Int(_) => sys::TSDB_DATA_TYPE_INT,
            BindValue::BigInt(_) => sys::TSDB_DATA_TYPE_BIGINT,
            BindValue::UTinyInt(_) => sys::TSDB_DATA_TYPE_UTINYINT,
            BindValue::USmallInt(_) => sys::TSDB_DATA_TYPE_USMALLINT,
            BindValue::UInt(_) => sys::TSDB_DATA_TYPE_UINT,
            BindValue::UBigInt(_) => sys::TSDB_DATA_TYPE_UBIGINT,
            BindValue::Float(_) => sys::TSDB_DATA_TYPE_FLOAT,
            BindValue::Double(_) => sys::TSDB_DATA_TYPE_DOUBLE,
            BindValue::Timestamp(_) => sys::TSDB_DATA_TYPE_TIMESTAMP,
            BindValue::VarChar(_) => sys::TSDB_DATA_TYPE_BINARY,
            BindValue::NChar(_) => sys::TSDB_DATA_TYPE_NCHAR,
            BindValue::Binary(_) => sys::TSDB_DATA_TYPE_BINARY,
        }
    }

    fn is_unsigned(&self) -> bool {
        matches!(
            self,
            BindValue::UTinyInt(_)
                | BindValue::USmallInt(_)
                | BindValue::UInt(_)
                | BindValue::UBigInt(_)
        )
    }

    fn to_bytes(&self) -> Vec<u8> {
        match self {
            BindValue::Null => Vec::new(),
            BindValue::Bool(v) => vec![*v as u8],
            BindValue::TinyInt(v) => v.to_ne_bytes().to_vec(),
            BindValue::SmallInt(v) => v.to_ne_bytes().to_vec(),
            BindValue::Int(v) => v.to_ne_bytes().to_vec(),
            BindValue::BigInt(v) | BindValue::Timestamp(v) => v.to_ne_bytes().to_vec(),
            BindValue::UTinyInt(v) => vec![*v],
            BindValue::USmallInt(v) => v.to_ne_bytes().to_vec(),
            BindValue::UInt(v) => v.to_ne_bytes().to_vec(),
            BindValue::UBigInt(v) => v.to_ne_bytes().to_vec(),
            BindValue::Float(v) => v.to_ne_bytes().to_vec(),
            BindValue::Double(v) => v.to_ne_bytes().to_vec(),
            BindValue::VarChar(s) | BindValue::NChar(s) => s.as_bytes().to_vec(),
            BindValue::Binary(b) => b.clone(),
        }
    }
}

/// One row (or tag set) of bind parameters with stable backing storage.
pub struct BindArray {
    binds: Vec<sys::TAOS_BIND>,
    _buffers: Vec<Box<[u8]>>,
    _lengths: Vec<Box<usize>>,
    _nulls: Vec<Box<c_int>>,
}

impl BindArray {
    pub fn from_values(values: &[BindValue]) -> Self {
        let mut binds = Vec::with_capacity(values.len());
        let mut buffers = Vec::with_capacity(values.len());
        let mut lengths = Vec::with_capacity(values.len());
        let mut nulls = Vec::with_capacity(values.len());

        for value in values {
            let mut buffer: Box<[u8]> = value.to_bytes().into_boxed_slice();
            let mut length = Box::new(buffer.len());
            let mut is_null = Box::new(matches!(value, BindValue::Null) as c_int);

            binds.push(sys::TAOS_BIND {
                buffer_type: value.tag() as c_int,
                buffer: if buffer.is_empty() {
                    std::ptr::null_mut()
                } else {
                    buffer.as_mut_ptr() as *mut _
                },
                buffer_length: buffer.len(),
                length: &mut *length,
                is_null: &mut *is_null,
                is_unsigned: value.is_unsigned() as c_int,
                error: std::ptr::null_mut(),
                u: 0,
                allocated: 0,
            });
            buffers.push(buffer);
            lengths.push(length);
            nulls.push(is_null);
        }

        Self {
            binds,
            _buffers: buffers,
            _lengths: lengths,
            _nulls: nulls,
        }
    }

    pub fn len(&self) -> usize {
        self.binds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.binds.is_empty()
    }

    pub(crate) fn as_mut_ptr(&mut self) -> *mut sys::TAOS_BIND {
        self.binds.as_mut_ptr()
    }
}

/// One column of bind parameters for batch binding.
///
/// Cells are laid out back to back in `buffer_length`-byte slots; NULL
/// cells are flagged through the `is_null` array rather than sentinels.
pub struct MultiBind {
    buffer_type: c_int,
    buffer: Box<[u8]>,
    buffer_length: usize,
    lengths: Box<[i32]>,
    nulls: Box<[c_char]>,
    num: usize,
}

macro_rules! multi_bind_fixed {
    ($fn_name:ident, $rust_ty:ty, $tag:expr) => {
        pub fn $fn_name(values: &[Option<$rust_ty>]) -> Self {
            let width = std::mem::size_of::<$rust_ty>();
            let mut buffer = vec![0u8; width * values.len()];
            let mut lengths = vec![width as i32; values.len()];
            let mut nulls = vec![0 as c_char; values.len()];
            for (i, value) in values.iter().enumerate() {
                match value {
                    Some(v) => {
                        buffer[i * width..(i + 1) * width].copy_from_slice(&v.to_ne_bytes())
                    }
                    None => {
                        nulls[i] = 1;
                        lengths[i] = 0;
                    }
                }
            }
            Self {
                buffer_type: $tag as c_int,
                buffer: buffer.into_boxed_slice(),
                buffer_length: width,
                lengths: lengths.into_boxed_slice(),
                nulls: nulls.into_boxed_slice(),
                num: values.len(),
            }
        }
    };
}

impl MultiBind {
    multi_bind_fixed!(from_tiny_ints, i8, sys::TSDB_DATA_TYPE_TINYINT);
    multi_bind_fixed!(from_small_ints, i16, sys::TSDB_DATA_TYPE_SMALLINT);
    multi_bind_fixed!(from_ints, i32, sys::TSDB_DATA_TYPE_INT);
    multi_bind_fixed!(from_big_ints, i64, sys::TSDB_DATA_TYPE_BIGINT);
    multi_bind_fixed!(from_utiny_ints, u8, sys::TSDB_DATA_TYPE_UTINYINT);
    multi_bind_fixed!(from_usmall_ints, u16, sys::TSDB_DATA_TYPE_USMALLINT);
    multi_bind_fixed!(from_uints, u32, sys::TSDB_DATA_TYPE_UINT);
    multi_bind_fixed!(from_ubig_ints, u64, sys::TSDB_DATA_TYPE_UBIGINT);
    multi_bind_fixed!(from_floats, f32, sys::TSDB_DATA_TYPE_FLOAT);
    multi_bind_fixed!(from_doubles, f64, sys::TSDB_DATA_TYPE_DOUBLE);

    pub fn from_bools(values: &[Option<bool>]) -> Self {
        let cells: Vec<Option<u8>> = values.iter().map(|v| v.map(u8::from)).collect();
        let mut bind = Self::from_utiny_ints(&cells);
        bind.buffer_type = sys::TSDB_DATA_TYPE_BOOL as c_int;
        bind
    }

    /// Epoch values in the target table's precision.
    pub fn from_timestamps(values: &[Option<i64>]) -> Self {
        let mut bind = Self::from_big_ints(values);
        bind.buffer_type = sys::TSDB_DATA_TYPE_TIMESTAMP as c_int;
        bind
    }

    pub fn from_varchar(values: &[Option<&str>]) -> Self {
        Self::var(
            sys::TSDB_DATA_TYPE_BINARY,
            values.iter().map(|v| v.map(str::as_bytes)),
            values.len(),
        )
    }

    pub fn from_nchar(values: &[Option<&str>]) -> Self {
        Self::var(
            sys::TSDB_DATA_TYPE_NCHAR,
            values.iter().map(|v| v.map(str::as_bytes)),
            values.len(),
        )
    }

    pub fn from_binary(values: &[Option<&[u8]>]) -> Self {
        Self::var(sys::TSDB_DATA_TYPE_BINARY, values.iter().copied(), values.len())
    }

    fn var<'a>(tag: u8, values: impl Iterator<Item = Option<&'a [u8]>> + Clone, num: usize) -> Self {
        let slot = values
            .clone()
            .filter_map(|v| v.map(<[u8]>::len))
            .max()
            .unwrap_or(0)
            .max(1);
        let mut buffer = vec![0u8; slot * num];
        let mut lengths = vec![0i32; num];
        let mut nulls = vec![0 as c_char; num];
        for (i, value) in values.enumerate() {
            match value {
                Some(bytes) => {
                    buffer[i * slot..i * slot + bytes.len()].copy_from_slice(bytes);
                    lengths[i] = bytes.len() as i32;
                }
                None => nulls[i] = 1,
            }
        }
        Self {
            buffer_type: tag as c_int,
            buffer: buffer.into_boxed_slice(),
            buffer_length: slot,
            lengths: lengths.into_boxed_slice(),
            nulls: nulls.into_boxed_slice(),
            num,
        }
    }

    pub fn len(&self) -> usize {
        self.num
    }

    pub fn is_empty(&self) -> bool {
        self.num == 0
    }

    /// Native view of this column; valid while `self` is alive and unmoved.
    pub(crate) fn as_raw(&mut self) -> sys::TAOS_MULTI_BIND {
        sys::TAOS_MULTI_BIND {
            buffer_type: self.buffer_type,
            buffer: self.buffer.as_mut_ptr() as *mut _,
            buffer_length: self.buffer_length,
            length: self.lengths.as_mut_ptr(),
            is_null: self.nulls.as_mut_ptr(),
            num: self.num as c_int,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bind_array_layout() {
        let mut array = BindArray::from_values(&[
            BindValue::Timestamp(1_700_000_000_000),
            BindValue::Int(42),
            BindValue::Null,
            BindValue::VarChar("abc".to_string()),
        ]);
        assert_eq!(array.len(), 4);
        assert!(!array.is_empty());

        let binds = unsafe { std::slice::from_raw_parts(array.as_mut_ptr(), 4) };
        assert_eq!(binds[0].buffer_type, sys::TSDB_DATA_TYPE_TIMESTAMP as c_int);
        assert_eq!(binds[0].buffer_length, 8);
        assert_eq!(binds[1].buffer_type, sys::TSDB_DATA_TYPE_INT as c_int);
        assert_eq!(unsafe { *binds[1].length }, 4);
        assert_eq!(unsafe { *binds[2].is_null }, 1);
        assert!(binds[2].buffer.is_null());
        assert_eq!(binds[3].buffer_length, 3);
        assert_eq!(unsafe { *binds[3].is_null }, 0);
    }

    #[test]
    fn test_bind_value_unsigned_flag() {
        let mut array =
            BindArray::from_values(&[BindValue::UInt(7), BindValue::Int(7)]);
        let binds = unsafe { std::slice::from_raw_parts(array.as_mut_ptr(), 2) };
        assert_eq!(binds[0].is_unsigned, 1);
        assert_eq!(binds[1].is_unsigned, 0);
    }

    #[test]
    fn test_multi_bind_fixed_column() {
        let mut bind = MultiBind::from_ints(&[Some(1), None, Some(3)]);
        assert_eq!(bind.len(), 3);
        let raw = bind.as_raw();
        assert_eq!(raw.buffer_type, sys::TSDB_DATA_TYPE_INT as c_int);
        assert_eq!(raw.buffer_length, 4);
        assert_eq!(raw.num, 3);
        let nulls = unsafe { std::slice::from_raw_parts(raw.is_null, 3) };
        assert_eq!(nulls, &[0, 1, 0]);
        let cells = unsafe { std::slice::from_raw_parts(raw.buffer as *const i32, 3) };
        assert_eq!(cells[0], 1);
        assert_eq!(cells[2], 3);
    }

    #[test]
    fn test_multi_bind_varchar_column() {
        let mut bind = MultiBind::from_varchar(&[Some("hello"), None, Some("hi")]);
        let raw = bind.as_raw();
        assert_eq!(raw.buffer_type, sys::TSDB_DATA_TYPE_BINARY as c_int);
        // slot width equals the longest payload
        assert_eq!(raw.buffer_length, 5);
        let lengths = unsafe { std::slice::from_raw_parts(raw.length, 3) };
        assert_eq!(lengths, &[5, 0, 2]);
        let nulls = unsafe { std::slice::from_raw_parts(raw.is_null, 3) };
        assert_eq!(nulls, &[0, 1, 0]);
        let first = unsafe { std::slice::from_raw_parts(raw.buffer as *const u8, 5) };
        assert_eq!(first, b"hello");
    }

    #[test]
    fn test_multi_bind_timestamp_retags_bigint() {
        let mut bind = MultiBind::from_timestamps(&[Some(1_700_000_000_000), None]);
        let raw = bind.as_raw();
        assert_eq!(raw.buffer_type, sys::TSDB_DATA_TYPE_TIMESTAMP as c_int);
        assert_eq!(raw.buffer_length, 8);
    }
}
