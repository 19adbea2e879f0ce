//! Value types for Veneer
//!
//! This module defines:
//! - WireValue: The self-describing value that crosses the RPC boundary
//! - NativeValue: The typed values callers and the engine produce and consume
//!
//! ## Type Rules
//!
//! - A `WireValue` carries exactly one [`ColumnType`] tag, or is `Null`
//! - `Null` is representable for every column type
//! - Different tags are NEVER equal: `Int32(1) != Int64(1)`
//! - Float equality follows IEEE-754: `NaN != NaN`, `-0.0 == 0.0`

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use crate::types::ColumnType;

/// A self-describing, column-type tagged value.
///
/// This is what every bound parameter and every result column is carried as,
/// so heterogeneous column types can share one transport envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WireValue {
    /// Explicit null marker
    Null,
    /// 16-bit signed integer
    Int16(i16),
    /// 32-bit signed integer
    Int32(i32),
    /// 64-bit signed integer
    Int64(i64),
    /// Nanoseconds since the Unix epoch
    DateTime(i64),
    /// 32-bit float
    Float32(f32),
    /// 64-bit float
    Float64(f64),
    /// IPv4 address octets
    IPv4([u8; 4]),
    /// IPv6 address octets
    IPv6([u8; 16]),
    /// UTF-8 string
    String(String),
    /// Raw bytes
    Binary(Vec<u8>),
}

impl WireValue {
    /// The column type this value is tagged with, `None` for `Null`.
    pub fn column_type(&self) -> Option<ColumnType> {
        match self {
            WireValue::Null => None,
            WireValue::Int16(_) => Some(ColumnType::Int16),
            WireValue::Int32(_) => Some(ColumnType::Int32),
            WireValue::Int64(_) => Some(ColumnType::Int64),
            WireValue::DateTime(_) => Some(ColumnType::DateTime),
            WireValue::Float32(_) => Some(ColumnType::Float32),
            WireValue::Float64(_) => Some(ColumnType::Float64),
            WireValue::IPv4(_) => Some(ColumnType::IPv4),
            WireValue::IPv6(_) => Some(ColumnType::IPv6),
            WireValue::String(_) => Some(ColumnType::String),
            WireValue::Binary(_) => Some(ColumnType::Binary),
        }
    }

    /// Tag name for error reasons ("null" for `Null`).
    pub fn type_name(&self) -> &'static str {
        self.column_type().map(ColumnType::name).unwrap_or("null")
    }

    /// Check if this is the null marker
    pub fn is_null(&self) -> bool {
        matches!(self, WireValue::Null)
    }

    /// Get as &str if this is a String value
    pub fn as_str(&self) -> Option<&str> {
        match self {
            WireValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Get as i64 if this is any integer value (widening)
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            WireValue::Int16(v) => Some(*v as i64),
            WireValue::Int32(v) => Some(*v as i64),
            WireValue::Int64(v) => Some(*v),
            _ => None,
        }
    }
}

/// A native typed value, as produced by callers binding parameters or by the
/// engine fetching a row.
///
/// This is a superset of what the codec accepts: `Bool` and out-of-range
/// unsigned values exist so that unsupported inputs fail with a type
/// mismatch instead of being unrepresentable.
#[derive(Debug, Clone, PartialEq)]
pub enum NativeValue {
    /// No value
    Null,
    /// Boolean (no column type accepts it)
    Bool(bool),
    /// 16-bit signed integer
    Int16(i16),
    /// 32-bit signed integer
    Int32(i32),
    /// 64-bit signed integer
    Int64(i64),
    /// 16-bit unsigned integer
    UInt16(u16),
    /// 32-bit unsigned integer
    UInt32(u32),
    /// 64-bit unsigned integer
    UInt64(u64),
    /// 32-bit float
    Float32(f32),
    /// 64-bit float
    Float64(f64),
    /// Point in time
    Time(DateTime<Utc>),
    /// IP address
    Ip(IpAddr),
    /// Engine-native IP bytes: a version byte (4 or 6) followed by the address
    VersionedIp(Vec<u8>),
    /// UTF-8 string
    Str(String),
    /// Raw bytes
    Bytes(Vec<u8>),
}

impl NativeValue {
    /// Get the type name as a string
    pub fn type_name(&self) -> &'static str {
        match self {
            NativeValue::Null => "null",
            NativeValue::Bool(_) => "bool",
            NativeValue::Int16(_) => "int16",
            NativeValue::Int32(_) => "int32",
            NativeValue::Int64(_) => "int64",
            NativeValue::UInt16(_) => "uint16",
            NativeValue::UInt32(_) => "uint32",
            NativeValue::UInt64(_) => "uint64",
            NativeValue::Float32(_) => "float",
            NativeValue::Float64(_) => "double",
            NativeValue::Time(_) => "datetime",
            NativeValue::Ip(IpAddr::V4(_)) => "ipv4",
            NativeValue::Ip(IpAddr::V6(_)) => "ipv6",
            NativeValue::VersionedIp(_) => "ip",
            NativeValue::Str(_) => "string",
            NativeValue::Bytes(_) => "binary",
        }
    }

    /// Check if this is a null value
    pub fn is_null(&self) -> bool {
        matches!(self, NativeValue::Null)
    }
}

// ============================================================================
// From implementations for ergonomic API usage
// ============================================================================

macro_rules! native_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for NativeValue {
                fn from(v: $ty) -> Self {
                    NativeValue::$variant(v)
                }
            }
        )*
    };
}

native_from! {
    bool => Bool,
    i16 => Int16,
    i32 => Int32,
    i64 => Int64,
    u16 => UInt16,
    u32 => UInt32,
    u64 => UInt64,
    f32 => Float32,
    f64 => Float64,
    DateTime<Utc> => Time,
    IpAddr => Ip,
    String => Str,
    Vec<u8> => Bytes,
}

impl From<&str> for NativeValue {
    fn from(s: &str) -> Self {
        NativeValue::Str(s.to_string())
    }
}

impl From<&[u8]> for NativeValue {
    fn from(b: &[u8]) -> Self {
        NativeValue::Bytes(b.to_vec())
    }
}

impl From<Ipv4Addr> for NativeValue {
    fn from(ip: Ipv4Addr) -> Self {
        NativeValue::Ip(IpAddr::V4(ip))
    }
}

impl From<Ipv6Addr> for NativeValue {
    fn from(ip: Ipv6Addr) -> Self {
        NativeValue::Ip(IpAddr::V6(ip))
    }
}

impl<T: Into<NativeValue>> From<Option<T>> for NativeValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(NativeValue::Null)
    }
}
