//! Field metadata, cell values, and block decoding.
//!
//! The native layer returns query results as column-major blocks; this
//! module decodes them into row-major `Vec<Vec<Value>>` using the field
//! descriptors supplied verbatim by `taos_fetch_fields`. Fixed-width NULLs
//! are detected via the native sentinel encodings; variable-width cells
//! carry a little-endian `u16` length prefix.

use std::ffi::CStr;

use crate::error::{Result, TaosError};
use crate::sys;

/// TDengine column type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ty {
    Bool,
    TinyInt,
    SmallInt,
    Int,
    BigInt,
    Float,
    Double,
    VarChar,
    Timestamp,
    NChar,
    UTinyInt,
    USmallInt,
    UInt,
    UBigInt,
    Json,
}

impl Ty {
    /// Native `TSDB_DATA_TYPE_*` tag for this type.
    pub(crate) fn as_tag(self) -> u8 {
        match self {
            Ty::Bool => sys::TSDB_DATA_TYPE_BOOL,
            Ty::TinyInt => sys::TSDB_DATA_TYPE_TINYINT,
            Ty::SmallInt => sys::TSDB_DATA_TYPE_SMALLINT,
            Ty::Int => sys::TSDB_DATA_TYPE_INT,
            Ty::BigInt => sys::TSDB_DATA_TYPE_BIGINT,
            Ty::Float => sys::TSDB_DATA_TYPE_FLOAT,
            Ty::Double => sys::TSDB_DATA_TYPE_DOUBLE,
            Ty::VarChar => sys::TSDB_DATA_TYPE_BINARY,
            Ty::Timestamp => sys::TSDB_DATA_TYPE_TIMESTAMP,
            Ty::NChar => sys::TSDB_DATA_TYPE_NCHAR,
            Ty::UTinyInt => sys::TSDB_DATA_TYPE_UTINYINT,
            Ty::USmallInt => sys::TSDB_DATA_TYPE_USMALLINT,
            Ty::UInt => sys::TSDB_DATA_TYPE_UINT,
            Ty::UBigInt => sys::TSDB_DATA_TYPE_UBIGINT,
            Ty::Json => sys::TSDB_DATA_TYPE_JSON,
        }
    }

    /// Fixed cell width in bytes, or `None` for variable-width types.
    pub(crate) fn fixed_width(self) -> Option<usize> {
        match self {
            Ty::Bool | Ty::TinyInt | Ty::UTinyInt => Some(1),
            Ty::SmallInt | Ty::USmallInt => Some(2),
            Ty::Int | Ty::UInt | Ty::Float => Some(4),
            Ty::BigInt | Ty::UBigInt | Ty::Double | Ty::Timestamp => Some(8),
            Ty::VarChar | Ty::NChar | Ty::Json => None,
        }
    }

    /// Returns true for VARCHAR/NCHAR/JSON columns.
    pub fn is_var_type(self) -> bool {
        self.fixed_width().is_none()
    }
}

impl TryFrom<u8> for Ty {
    type Error = TaosError;

    fn try_from(tag: u8) -> Result<Self> {
        Ok(match tag {
            sys::TSDB_DATA_TYPE_BOOL => Ty::Bool,
            sys::TSDB_DATA_TYPE_TINYINT => Ty::TinyInt,
            sys::TSDB_DATA_TYPE_SMALLINT => Ty::SmallInt,
            sys::TSDB_DATA_TYPE_INT => Ty::Int,
            sys::TSDB_DATA_TYPE_BIGINT => Ty::BigInt,
            sys::TSDB_DATA_TYPE_FLOAT => Ty::Float,
            sys::TSDB_DATA_TYPE_DOUBLE => Ty::Double,
            sys::TSDB_DATA_TYPE_BINARY => Ty::VarChar,
            sys::TSDB_DATA_TYPE_TIMESTAMP => Ty::Timestamp,
            sys::TSDB_DATA_TYPE_NCHAR => Ty::NChar,
            sys::TSDB_DATA_TYPE_UTINYINT => Ty::UTinyInt,
            sys::TSDB_DATA_TYPE_USMALLINT => Ty::USmallInt,
            sys::TSDB_DATA_TYPE_UINT => Ty::UInt,
            sys::TSDB_DATA_TYPE_UBIGINT => Ty::UBigInt,
            sys::TSDB_DATA_TYPE_JSON => Ty::Json,
            other => {
                return Err(TaosError::programming(format!(
                    "unknown column type tag: {}",
                    other
                )))
            }
        })
    }
}

/// Timestamp precision of a result set, as reported by
/// `taos_result_precision`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precision {
    Millisecond,
    Microsecond,
    Nanosecond,
}

impl TryFrom<i32> for Precision {
    type Error = TaosError;

    fn try_from(value: i32) -> Result<Self> {
        match value {
            0 => Ok(Precision::Millisecond),
            1 => Ok(Precision::Microsecond),
            2 => Ok(Precision::Nanosecond),
            _ => Err(TaosError::programming(format!(
                "invalid timestamp precision: {}",
                value
            ))),
        }
    }
}

/// Field descriptor supplied by the native layer: name, type tag, and the
/// declared byte width used to size row decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub name: String,
    pub ty: Ty,
    pub bytes: i16,
}

impl Field {
    pub(crate) fn from_raw(raw: &sys::TAOS_FIELD) -> Result<Self> {
        // name is NUL-terminated inside the fixed 65-byte buffer.
        let name = unsafe { CStr::from_ptr(raw.name.as_ptr()) }
            .to_string_lossy()
            .into_owned();
        Ok(Self {
            name,
            ty: Ty::try_from(raw.r#type)?,
            bytes: raw.bytes,
        })
    }

    /// Width in bytes of one cell slot inside a fetched block.
    pub(crate) fn cell_width(&self) -> usize {
        self.ty
            .fixed_width()
            .unwrap_or(self.bytes as usize + sys::VAR_DATA_HEADER_SIZE)
    }
}

/// One decoded cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
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
    /// Raw epoch value; unit depends on the result set's [`Precision`].
    Timestamp(i64),
    VarChar(String),
    NChar(String),
    Json(String),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Signed integer view of integer and timestamp cells.
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Value::TinyInt(v) => Some(v as i64),
            Value::SmallInt(v) => Some(v as i64),
            Value::Int(v) => Some(v as i64),
            Value::BigInt(v) | Value::Timestamp(v) => Some(v),
            Value::UTinyInt(v) => Some(v as i64),
            Value::USmallInt(v) => Some(v as i64),
            Value::UInt(v) => Some(v as i64),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Value::Float(v) => Some(v as f64),
            Value::Double(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::VarChar(s) | Value::NChar(s) | Value::Json(s) => Some(s),
            _ => None,
        }
    }
}

/// Decodes one column block (`nrows` cells laid out back to back) into
/// values, mapping native null sentinels to [`Value::Null`].
pub fn decode_column(field: &Field, data: &[u8], nrows: usize) -> Result<Vec<Value>> {
    let width = field.cell_width();
    if data.len() < width * nrows {
        return Err(TaosError::operational(format!(
            "column block for '{}' truncated: need {} bytes, got {}",
            field.name,
            width * nrows,
            data.len()
        )));
    }

    let mut out = Vec::with_capacity(nrows);
    for row in 0..nrows {
        let cell = &data[row * width..(row + 1) * width];
        out.push(decode_cell(field.ty, cell));
    }
    Ok(out)
}

fn decode_cell(ty: Ty, cell: &[u8]) -> Value {
    match ty {
        Ty::Bool => match cell[0] {
            sys::TSDB_DATA_BOOL_NULL => Value::Null,
            v => Value::Bool(v != 0),
        },
        Ty::TinyInt => match cell[0] as i8 {
            sys::TSDB_DATA_TINYINT_NULL => Value::Null,
            v => Value::TinyInt(v),
        },
        Ty::SmallInt => match i16::from_le_bytes([cell[0], cell[1]]) {
            sys::TSDB_DATA_SMALLINT_NULL => Value::Null,
            v => Value::SmallInt(v),
        },
        Ty::Int => match i32::from_le_bytes([cell[0], cell[1], cell[2], cell[3]]) {
            sys::TSDB_DATA_INT_NULL => Value::Null,
            v => Value::Int(v),
        },
        Ty::BigInt => match i64::from_le_bytes(read8(cell)) {
            sys::TSDB_DATA_BIGINT_NULL => Value::Null,
            v => Value::BigInt(v),
        },
        Ty::Timestamp => match i64::from_le_bytes(read8(cell)) {
            sys::TSDB_DATA_BIGINT_NULL => Value::Null,
            v => Value::Timestamp(v),
        },
        Ty::UTinyInt => match cell[0] {
            sys::TSDB_DATA_UTINYINT_NULL => Value::Null,
            v => Value::UTinyInt(v),
        },
        Ty::USmallInt => match u16::from_le_bytes([cell[0], cell[1]]) {
            sys::TSDB_DATA_USMALLINT_NULL => Value::Null,
            v => Value::USmallInt(v),
        },
        Ty::UInt => match u32::from_le_bytes([cell[0], cell[1], cell[2], cell[3]]) {
            sys::TSDB_DATA_UINT_NULL => Value::Null,
            v => Value::UInt(v),
        },
        Ty::UBigInt => match u64::from_le_bytes(read8(cell)) {
            sys::TSDB_DATA_UBIGINT_NULL => Value::Null,
            v => Value::UBigInt(v),
        },
        Ty::Float => {
            let bits = u32::from_le_bytes([cell[0], cell[1], cell[2], cell[3]]);
            if bits == sys::TSDB_DATA_FLOAT_NULL {
                Value::Null
            } else {
                Value::Float(f32::from_bits(bits))
            }
        }
        Ty::Double => {
            let bits = u64::from_le_bytes(read8(cell));
            if bits == sys::TSDB_DATA_DOUBLE_NULL {
                Value::Null
            } else {
                Value::Double(f64::from_bits(bits))
            }
        }
        Ty::VarChar | Ty::NChar | Ty::Json => {
            let len = u16::from_le_bytes([cell[0], cell[1]]);
            if len == sys::VAR_DATA_NULL_LEN {
                return Value::Null;
            }
            let end = sys::VAR_DATA_HEADER_SIZE + (len as usize).min(cell.len() - sys::VAR_DATA_HEADER_SIZE);
            let text = String::from_utf8_lossy(&cell[sys::VAR_DATA_HEADER_SIZE..end]).into_owned();
            match ty {
                Ty::NChar => Value::NChar(text),
                Ty::Json => Value::Json(text),
                _ => Value::VarChar(text),
            }
        }
    }
}

// cell length is checked against the slot width before decode_cell runs
fn read8(cell: &[u8]) -> [u8; 8] {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&cell[..8]);
    buf
}

/// Transposes one decoded block (columns of equal length) into rows.
pub fn transpose_block(columns: &[Vec<Value>]) -> Vec<Vec<Value>> {
    let nrows = columns.first().map_or(0, Vec::len);
    let mut rows = Vec::with_capacity(nrows);
    for i in 0..nrows {
        let mut row = Vec::with_capacity(columns.len());
        for col in columns {
            row.push(col[i].clone());
        }
        rows.push(row);
    }
    rows
}

/// Flattens accumulated column-major blocks into row-major form, preserving
/// block arrival order. Both fetch paths route through this so their output
/// is identical for the same block sequence.
pub fn flatten_blocks(blocks: &[Vec<Vec<Value>>]) -> Vec<Vec<Value>> {
    let mut rows = Vec::new();
    for block in blocks {
        rows.extend(transpose_block(block));
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(name: &str, ty: Ty, bytes: i16) -> Field {
        Field {
            name: name.to_string(),
            ty,
            bytes,
        }
    }

    #[test]
    fn test_ty_round_trip() {
        for ty in [
            Ty::Bool,
            Ty::TinyInt,
            Ty::SmallInt,
            Ty::Int,
            Ty::BigInt,
            Ty::Float,
            Ty::Double,
            Ty::VarChar,
            Ty::Timestamp,
            Ty::NChar,
            Ty::UTinyInt,
            Ty::USmallInt,
            Ty::UInt,
            Ty::UBigInt,
            Ty::Json,
        ] {
            assert_eq!(Ty::try_from(ty.as_tag()).unwrap(), ty);
        }
        assert!(Ty::try_from(200).is_err());
    }

    #[test]
    fn test_precision_try_from() {
        assert_eq!(Precision::try_from(0).unwrap(), Precision::Millisecond);
        assert_eq!(Precision::try_from(1).unwrap(), Precision::Microsecond);
        assert_eq!(Precision::try_from(2).unwrap(), Precision::Nanosecond);
        assert!(Precision::try_from(3).is_err());
    }

    #[test]
    fn test_decode_int_column_with_null() {
        let f = field("v", Ty::Int, 4);
        let mut data = Vec::new();
        data.extend_from_slice(&7i32.to_le_bytes());
        data.extend_from_slice(&crate::sys::TSDB_DATA_INT_NULL.to_le_bytes());
        data.extend_from_slice(&(-3i32).to_le_bytes());
        let col = decode_column(&f, &data, 3).unwrap();
        assert_eq!(col, vec![Value::Int(7), Value::Null, Value::Int(-3)]);
    }

    #[test]
    fn test_decode_bool_and_tinyint_sentinels() {
        let f = field("b", Ty::Bool, 1);
        let col = decode_column(&f, &[1, 0, crate::sys::TSDB_DATA_BOOL_NULL], 3).unwrap();
        assert_eq!(col, vec![Value::Bool(true), Value::Bool(false), Value::Null]);

        let f = field("t", Ty::TinyInt, 1);
        let col = decode_column(&f, &[5, 0x80], 2).unwrap();
        assert_eq!(col, vec![Value::TinyInt(5), Value::Null]);
    }

    #[test]
    fn test_decode_float_double_sentinels() {
        let f = field("f", Ty::Float, 4);
        let mut data = Vec::new();
        data.extend_from_slice(&1.5f32.to_le_bytes());
        data.extend_from_slice(&crate::sys::TSDB_DATA_FLOAT_NULL.to_le_bytes());
        let col = decode_column(&f, &data, 2).unwrap();
        assert_eq!(col, vec![Value::Float(1.5), Value::Null]);

        let f = field("d", Ty::Double, 8);
        let mut data = Vec::new();
        data.extend_from_slice(&2.25f64.to_le_bytes());
        data.extend_from_slice(&crate::sys::TSDB_DATA_DOUBLE_NULL.to_le_bytes());
        let col = decode_column(&f, &data, 2).unwrap();
        assert_eq!(col, vec![Value::Double(2.25), Value::Null]);
    }

    #[test]
    fn test_decode_timestamp_column() {
        let f = field("ts", Ty::Timestamp, 8);
        let mut data = Vec::new();
        data.extend_from_slice(&1_700_000_000_000i64.to_le_bytes());
        data.extend_from_slice(&crate::sys::TSDB_DATA_BIGINT_NULL.to_le_bytes());
        let col = decode_column(&f, &data, 2).unwrap();
        assert_eq!(
            col,
            vec![Value::Timestamp(1_700_000_000_000), Value::Null]
        );
    }

    #[test]
    fn test_decode_varchar_column() {
        // two cells, declared payload width 8 (+2-byte length prefix)
        let f = field("s", Ty::VarChar, 8);
        let mut data = vec![0u8; 20];
        data[0..2].copy_from_slice(&5u16.to_le_bytes());
        data[2..7].copy_from_slice(b"hello");
        data[10..12].copy_from_slice(&crate::sys::VAR_DATA_NULL_LEN.to_le_bytes());
        let col = decode_column(&f, &data, 2).unwrap();
        assert_eq!(col, vec![Value::VarChar("hello".to_string()), Value::Null]);
    }

    #[test]
    fn test_decode_truncated_block_errors() {
        let f = field("v", Ty::BigInt, 8);
        let err = decode_column(&f, &[0u8; 12], 2).unwrap_err();
        assert!(err.is_operational());
    }

    #[test]
    fn test_transpose_preserves_row_order() {
        let cols = vec![
            vec![Value::Int(1), Value::Int(2)],
            vec![Value::VarChar("a".into()), Value::VarChar("b".into())],
        ];
        let rows = transpose_block(&cols);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], vec![Value::Int(1), Value::VarChar("a".into())]);
        assert_eq!(rows[1], vec![Value::Int(2), Value::VarChar("b".into())]);
    }

    #[test]
    fn test_flatten_preserves_block_arrival_order() {
        let block1 = vec![vec![Value::Int(1), Value::Int(2)]];
        let block2 = vec![vec![Value::Int(3)]];
        let rows = flatten_blocks(&[block1.clone(), block2.clone()]);
        assert_eq!(
            rows,
            vec![vec![Value::Int(1)], vec![Value::Int(2)], vec![Value::Int(3)]]
        );

        // equivalence with fetching blocks one at a time (the sync path)
        let mut sequential = Vec::new();
        sequential.extend(transpose_block(&block1));
        sequential.extend(transpose_block(&block2));
        assert_eq!(rows, sequential);
    }

    #[test]
    fn test_value_accessors() {
        assert!(Value::Null.is_null());
        assert_eq!(Value::Int(5).as_i64(), Some(5));
        assert_eq!(Value::Timestamp(9).as_i64(), Some(9));
        assert_eq!(Value::Double(1.5).as_f64(), Some(1.5));
        assert_eq!(Value::VarChar("x".into()).as_str(), Some("x"));
        assert_eq!(Value::Bool(true).as_i64(), None);
    }
}
