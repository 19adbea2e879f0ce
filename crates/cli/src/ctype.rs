//! C buffer types and byte conversions.
//!
//! A bound parameter or fetched column crosses the binding surface as raw
//! bytes tagged with a [`CType`]. Fixed-width types are little-endian.
//! `CHAR` carries strings, binary data and raw 4/16-byte IP addresses.
//!
//! | CType | Code | Width |
//! |-------|------|-------|
//! | `Int16` | 101 | 2 |
//! | `Int32` | 102 | 4 |
//! | `Int64` | 103 | 8 |
//! | `Float` | 104 | 4 |
//! | `Double` | 105 | 8 |
//! | `Char` | 106 | variable |

use std::fmt;

use byteorder::{ByteOrder, LittleEndian, WriteBytesExt};
use veneer_core::time::from_nanos;
use veneer_core::{
    copy_into, decode, encode_with, ip_from_raw, CodecOptions, ColumnType, NativeValue, TimeFormat,
    WireValue,
};
use veneer_executor::{Error, Result};

/// Buffer type of a bound parameter or `get_data` target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum CType {
    /// `i16`
    Int16 = 101,
    /// `i32`
    Int32 = 102,
    /// `i64`
    Int64 = 103,
    /// `f32`
    Float = 104,
    /// `f64`
    Double = 105,
    /// Bytes or text
    Char = 106,
}

impl CType {
    /// Numeric code.
    pub fn code(self) -> i32 {
        self as i32
    }

    /// Resolve a numeric code.
    pub fn from_code(code: i32) -> Option<CType> {
        match code {
            101 => Some(CType::Int16),
            102 => Some(CType::Int32),
            103 => Some(CType::Int64),
            104 => Some(CType::Float),
            105 => Some(CType::Double),
            106 => Some(CType::Char),
            _ => None,
        }
    }

    /// Byte width, `None` for `Char`.
    pub fn width(self) -> Option<usize> {
        match self {
            CType::Int16 => Some(2),
            CType::Int32 | CType::Float => Some(4),
            CType::Int64 | CType::Double => Some(8),
            CType::Char => None,
        }
    }

    /// Column type a fixed-width buffer holds.
    fn column_type(self) -> ColumnType {
        match self {
            CType::Int16 => ColumnType::Int16,
            CType::Int32 => ColumnType::Int32,
            CType::Int64 => ColumnType::Int64,
            CType::Float => ColumnType::Float32,
            CType::Double => ColumnType::Float64,
            CType::Char => ColumnType::String,
        }
    }
}

impl fmt::Display for CType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CType::Int16 => "INT16",
            CType::Int32 => "INT32",
            CType::Int64 => "INT64",
            CType::Float => "FLOAT",
            CType::Double => "DOUBLE",
            CType::Char => "CHAR",
        };
        f.write_str(name)
    }
}

// ============================================================================
// Parameters
// ============================================================================

/// Read a parameter buffer.
///
/// `sql_type` tells how `Char` bytes are read: 4 or 16 bytes for an IP
/// column are a raw address, bytes for a binary column are kept as is, and
/// anything else must be UTF-8 text. `None` binds null.
pub fn read_param(ctype: CType, sql_type: ColumnType, data: Option<&[u8]>) -> Result<NativeValue> {
    let data = match data {
        Some(data) => data,
        None => return Ok(NativeValue::Null),
    };
    if let Some(width) = ctype.width() {
        if data.len() != width {
            return Err(Error::InvalidInput {
                reason: format!("{} parameter needs {} bytes, got {}", ctype, width, data.len()),
            });
        }
    }
    let value = match ctype {
        CType::Int16 => NativeValue::Int16(LittleEndian::read_i16(data)),
        CType::Int32 => NativeValue::Int32(LittleEndian::read_i32(data)),
        CType::Int64 => NativeValue::Int64(LittleEndian::read_i64(data)),
        CType::Float => NativeValue::Float32(LittleEndian::read_f32(data)),
        CType::Double => NativeValue::Float64(LittleEndian::read_f64(data)),
        CType::Char => match sql_type {
            ColumnType::IPv4 | ColumnType::IPv6 if data.len() == 4 || data.len() == 16 => {
                NativeValue::Ip(ip_from_raw(data)?)
            }
            ColumnType::Binary => NativeValue::Bytes(data.to_vec()),
            _ => NativeValue::Str(String::from_utf8(data.to_vec()).map_err(|_| Error::InvalidInput {
                reason: format!("CHAR parameter for a {} column is not UTF-8", sql_type),
            })?),
        },
    };
    Ok(value)
}

/// Convert a caller value to the declared type of a parameter.
///
/// Integers bound to a datetime parameter are nanoseconds since the epoch.
pub fn to_param(column: ColumnType, value: NativeValue, opts: &CodecOptions) -> Result<NativeValue> {
    let value = match (column, value) {
        (ColumnType::DateTime, NativeValue::Int64(ns)) => NativeValue::Time(from_nanos(ns)),
        (_, value) => value,
    };
    let wire = encode_with(column, value, opts)?;
    Ok(decode(&wire, column)?)
}

// ============================================================================
// Columns
// ============================================================================

/// Write a fetched value into a caller buffer.
///
/// Returns the number of bytes written, or `None` for null. Fixed-width
/// targets accept only the value's own type or a widening; datetimes fit an
/// `Int64` buffer as nanoseconds. A `Char` buffer receives strings, binary
/// data and IP addresses as raw bytes and every other type as text.
pub fn write_value(
    value: &WireValue,
    ctype: CType,
    buf: &mut [u8],
    opts: &CodecOptions,
) -> Result<Option<usize>> {
    if value.is_null() {
        return Ok(None);
    }
    if ctype == CType::Char {
        return write_char(value, buf, opts);
    }

    let mut bytes = Vec::with_capacity(8);
    let written = match (ctype, value) {
        (CType::Int64, WireValue::DateTime(ns)) => bytes.write_i64::<LittleEndian>(*ns),
        _ => match decode(value, ctype.column_type())? {
            NativeValue::Int16(v) => bytes.write_i16::<LittleEndian>(v),
            NativeValue::Int32(v) => bytes.write_i32::<LittleEndian>(v),
            NativeValue::Int64(v) => bytes.write_i64::<LittleEndian>(v),
            NativeValue::Float32(v) => bytes.write_f32::<LittleEndian>(v),
            NativeValue::Float64(v) => bytes.write_f64::<LittleEndian>(v),
            other => {
                return Err(Error::TypeMismatch {
                    from_type: other.type_name().to_string(),
                    to_type: ctype.to_string(),
                })
            }
        },
    };
    written.map_err(|e| Error::Internal {
        reason: format!("encoding {} buffer: {}", ctype, e),
    })?;
    Ok(copy_into(&WireValue::Binary(bytes), buf)?)
}

fn write_char(value: &WireValue, buf: &mut [u8], opts: &CodecOptions) -> Result<Option<usize>> {
    let text = match value {
        WireValue::String(_) | WireValue::Binary(_) | WireValue::IPv4(_) | WireValue::IPv6(_) => {
            return Ok(copy_into(value, buf)?)
        }
        WireValue::Null => return Ok(None),
        WireValue::Int16(v) => v.to_string(),
        WireValue::Int32(v) => v.to_string(),
        WireValue::Int64(v) => v.to_string(),
        WireValue::Float32(v) => v.to_string(),
        WireValue::Float64(v) => v.to_string(),
        WireValue::DateTime(ns) => match &opts.time_format {
            TimeFormat::Pattern(pattern) => opts.zone.format(*ns, pattern)?,
            unit => unit.from_nanos(*ns).to_string(),
        },
    };
    Ok(copy_into(&WireValue::String(text), buf)?)
}
