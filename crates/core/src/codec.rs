//! Value codec
//!
//! Converts between [`NativeValue`]s and column-type tagged [`WireValue`]s.
//!
//! ## Conversion Rules
//!
//! - Integer widening is always legal (Int16 → Int32 → Int64). Encoding a
//!   wider signed native into a narrower column is a type mismatch; unsigned
//!   natives are range-checked instead.
//! - Narrowing only happens on [`decode_into`] when the caller explicitly asks
//!   for a smaller integer, and truncates like an `as` cast.
//! - Float32 ↔ Float64 is always legal. Precision loss is not an error.
//! - DateTime is canonically `i64` nanoseconds. Integer and string forms are
//!   scaled or formatted by [`CodecOptions::time_format`].
//! - IPv4 is exactly 4 bytes and IPv6 exactly 16. Engine IP bytes prefixed
//!   with a version byte are stripped on encode.
//! - `Null` is valid for every column type.

use chrono::{DateTime, Utc};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use crate::error::{CodecError, Result};
use crate::time::{from_nanos, to_nanos, DisplayZone, TimeFormat};
use crate::types::ColumnType;
use crate::value::{NativeValue, WireValue};

/// Options shared by encode (time parsing) and decode (time rendering).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CodecOptions {
    /// Unit or pattern for integer and string timestamp forms
    pub time_format: TimeFormat,
    /// Zone used with pattern formats
    pub zone: DisplayZone,
}

impl CodecOptions {
    /// Options with the given time format and zone.
    pub fn new(time_format: TimeFormat, zone: DisplayZone) -> Self {
        CodecOptions { time_format, zone }
    }

    /// Options with the given time format in UTC.
    pub fn with_time_format(time_format: TimeFormat) -> Self {
        CodecOptions {
            time_format,
            zone: DisplayZone::Utc,
        }
    }
}

// ============================================================================
// Encode
// ============================================================================

/// Encode a native value for a column using default options.
pub fn encode(column: ColumnType, value: NativeValue) -> Result<WireValue> {
    encode_with(column, value, &CodecOptions::default())
}

/// Encode a native value for a column.
pub fn encode_with(column: ColumnType, value: NativeValue, opts: &CodecOptions) -> Result<WireValue> {
    if value.is_null() {
        return Ok(WireValue::Null);
    }
    match column {
        ColumnType::Int16 | ColumnType::Int32 | ColumnType::Int64 => encode_integer(column, value),
        ColumnType::DateTime => encode_datetime(value, opts).map(WireValue::DateTime),
        ColumnType::Float32 => match value {
            NativeValue::Float32(v) => Ok(WireValue::Float32(v)),
            NativeValue::Float64(v) => Ok(WireValue::Float32(v as f32)),
            other => integer_of(&other)
                .map(|v| WireValue::Float32(v as f32))
                .ok_or_else(|| CodecError::mismatch(other.type_name(), column.name())),
        },
        ColumnType::Float64 => match value {
            NativeValue::Float32(v) => Ok(WireValue::Float64(v as f64)),
            NativeValue::Float64(v) => Ok(WireValue::Float64(v)),
            other => integer_of(&other)
                .map(|v| WireValue::Float64(v as f64))
                .ok_or_else(|| CodecError::mismatch(other.type_name(), column.name())),
        },
        ColumnType::IPv4 => match ip_of(value, column)? {
            IpAddr::V4(ip) => Ok(WireValue::IPv4(ip.octets())),
            IpAddr::V6(ip) => ip
                .to_ipv4_mapped()
                .map(|v4| WireValue::IPv4(v4.octets()))
                .ok_or_else(|| CodecError::mismatch("ipv6", column.name())),
        },
        ColumnType::IPv6 => match ip_of(value, column)? {
            IpAddr::V4(ip) => Ok(WireValue::IPv6(ip.to_ipv6_mapped().octets())),
            IpAddr::V6(ip) => Ok(WireValue::IPv6(ip.octets())),
        },
        ColumnType::String => match value {
            NativeValue::Str(s) => Ok(WireValue::String(s)),
            other => Err(CodecError::mismatch(other.type_name(), column.name())),
        },
        ColumnType::Binary => match value {
            NativeValue::Bytes(b) => Ok(WireValue::Binary(b)),
            NativeValue::Str(s) => Ok(WireValue::Binary(s.into_bytes())),
            other => Err(CodecError::mismatch(other.type_name(), column.name())),
        },
    }
}

/// Any integer native widened to i64, unsigned values range-checked.
fn integer_of(value: &NativeValue) -> Option<i64> {
    match value {
        NativeValue::Int16(v) => Some(*v as i64),
        NativeValue::Int32(v) => Some(*v as i64),
        NativeValue::Int64(v) => Some(*v),
        NativeValue::UInt16(v) => Some(*v as i64),
        NativeValue::UInt32(v) => Some(*v as i64),
        NativeValue::UInt64(v) => i64::try_from(*v).ok(),
        _ => None,
    }
}

fn encode_integer(column: ColumnType, value: NativeValue) -> Result<WireValue> {
    let rank = column.integer_rank().unwrap_or(0);
    let v = match value {
        NativeValue::Int16(v) => v as i64,
        NativeValue::Int32(v) if rank >= 1 => v as i64,
        NativeValue::Int64(v) if rank >= 2 => v,
        NativeValue::UInt16(v) => v as i64,
        NativeValue::UInt32(v) => v as i64,
        NativeValue::UInt64(v) => i64::try_from(v).map_err(|_| out_of_range(column, v))?,
        other => return Err(CodecError::mismatch(other.type_name(), column.name())),
    };
    match column {
        ColumnType::Int16 => i16::try_from(v)
            .map(WireValue::Int16)
            .map_err(|_| out_of_range(column, v)),
        ColumnType::Int32 => i32::try_from(v)
            .map(WireValue::Int32)
            .map_err(|_| out_of_range(column, v)),
        _ => Ok(WireValue::Int64(v)),
    }
}

fn out_of_range(column: ColumnType, v: impl std::fmt::Display) -> CodecError {
    CodecError::invalid(column.name(), format!("{} is out of range", v))
}

fn encode_datetime(value: NativeValue, opts: &CodecOptions) -> Result<i64> {
    match value {
        NativeValue::Time(t) => to_nanos(&t),
        NativeValue::Str(s) => match &opts.time_format {
            TimeFormat::Pattern(p) => opts.zone.parse(&s, p),
            unit => {
                let v = s.trim().parse::<i64>().map_err(|_| {
                    CodecError::invalid("datetime", format!("'{}' is not an integer {} timestamp", s, unit))
                })?;
                unit.to_nanos(v)
            }
        },
        other => match integer_of(&other) {
            Some(v) => opts.time_format.to_nanos(v),
            None => Err(CodecError::mismatch(other.type_name(), "datetime")),
        },
    }
}

fn ip_of(value: NativeValue, column: ColumnType) -> Result<IpAddr> {
    match value {
        NativeValue::Ip(ip) => Ok(ip),
        NativeValue::VersionedIp(bytes) => ip_from_raw(&bytes),
        NativeValue::Str(s) => s
            .trim()
            .parse::<IpAddr>()
            .map_err(|_| CodecError::invalid(column.name(), format!("'{}' is not an IP address", s))),
        other => Err(CodecError::mismatch(other.type_name(), column.name())),
    }
}

/// Parse engine IP bytes: `[4, a, b, c, d]`, `[6, 16 bytes]`, or bare 4/16
/// byte addresses.
pub fn ip_from_raw(bytes: &[u8]) -> Result<IpAddr> {
    match bytes {
        [4, rest @ ..] if rest.len() == 4 => Ok(IpAddr::V4(Ipv4Addr::new(rest[0], rest[1], rest[2], rest[3]))),
        [6, rest @ ..] if rest.len() == 16 => Ok(IpAddr::V6(Ipv6Addr::from(octets16(rest)))),
        _ if bytes.len() == 4 => Ok(IpAddr::V4(Ipv4Addr::new(bytes[0], bytes[1], bytes[2], bytes[3]))),
        _ if bytes.len() == 16 => Ok(IpAddr::V6(Ipv6Addr::from(octets16(bytes)))),
        _ => Err(CodecError::invalid(
            "ip",
            format!("{} bytes is not an IP address", bytes.len()),
        )),
    }
}

/// Engine representation of an IP address: version byte then octets.
pub fn versioned_ip(ip: &IpAddr) -> Vec<u8> {
    match ip {
        IpAddr::V4(v4) => {
            let mut out = vec![4u8];
            out.extend_from_slice(&v4.octets());
            out
        }
        IpAddr::V6(v6) => {
            let mut out = vec![6u8];
            out.extend_from_slice(&v6.octets());
            out
        }
    }
}

fn octets16(bytes: &[u8]) -> [u8; 16] {
    let mut out = [0u8; 16];
    out.copy_from_slice(&bytes[..16]);
    out
}

// ============================================================================
// Decode
// ============================================================================

/// Decode a wire value for a declared column into its canonical native form.
///
/// Only exact tag matches and the always-legal widenings are accepted.
pub fn decode(value: &WireValue, column: ColumnType) -> Result<NativeValue> {
    use ColumnType as C;
    use WireValue as W;

    let native = match (value, column) {
        (W::Null, _) => NativeValue::Null,
        (W::Int16(v), C::Int16) => NativeValue::Int16(*v),
        (W::Int16(v), C::Int32) => NativeValue::Int32(*v as i32),
        (W::Int16(v), C::Int64) => NativeValue::Int64(*v as i64),
        (W::Int32(v), C::Int32) => NativeValue::Int32(*v),
        (W::Int32(v), C::Int64) => NativeValue::Int64(*v as i64),
        (W::Int64(v), C::Int64) => NativeValue::Int64(*v),
        (W::DateTime(ns), C::DateTime) => NativeValue::Time(from_nanos(*ns)),
        (W::Float32(v), C::Float32) => NativeValue::Float32(*v),
        (W::Float32(v), C::Float64) => NativeValue::Float64(*v as f64),
        (W::Float64(v), C::Float64) => NativeValue::Float64(*v),
        (W::Float64(v), C::Float32) => NativeValue::Float32(*v as f32),
        (W::IPv4(o), C::IPv4) => NativeValue::Ip(IpAddr::V4(Ipv4Addr::from(*o))),
        (W::IPv4(o), C::IPv6) => NativeValue::Ip(IpAddr::V6(Ipv4Addr::from(*o).to_ipv6_mapped())),
        (W::IPv6(o), C::IPv6) => NativeValue::Ip(IpAddr::V6(Ipv6Addr::from(*o))),
        (W::String(s), C::String) => NativeValue::Str(s.clone()),
        (W::Binary(b), C::Binary) => NativeValue::Bytes(b.clone()),
        (other, column) => return Err(CodecError::mismatch(other.type_name(), column.name())),
    };
    Ok(native)
}

/// Canonical native form of a wire value under its own tag.
pub fn to_native(value: &WireValue) -> NativeValue {
    match value {
        WireValue::Null => NativeValue::Null,
        WireValue::Int16(v) => NativeValue::Int16(*v),
        WireValue::Int32(v) => NativeValue::Int32(*v),
        WireValue::Int64(v) => NativeValue::Int64(*v),
        WireValue::DateTime(ns) => NativeValue::Time(from_nanos(*ns)),
        WireValue::Float32(v) => NativeValue::Float32(*v),
        WireValue::Float64(v) => NativeValue::Float64(*v),
        WireValue::IPv4(o) => NativeValue::Ip(IpAddr::V4(Ipv4Addr::from(*o))),
        WireValue::IPv6(o) => NativeValue::Ip(IpAddr::V6(Ipv6Addr::from(*o))),
        WireValue::String(s) => NativeValue::Str(s.clone()),
        WireValue::Binary(b) => NativeValue::Bytes(b.clone()),
    }
}

/// Bind a caller's wire value to a declared column.
///
/// The value goes through the encode rules for `column`, so widenings and
/// time-format scaling apply, and narrowing or foreign tags are rejected.
pub fn coerce(value: &WireValue, column: ColumnType, opts: &CodecOptions) -> Result<NativeValue> {
    let encoded = encode_with(column, to_native(value), opts)?;
    decode(&encoded, column)
}

/// A caller-chosen decode target.
pub trait FromWire: Sized {
    /// Target type name used in mismatch reasons
    const TARGET: &'static str;

    /// Convert a wire value into this type.
    fn from_wire(value: &WireValue, opts: &CodecOptions) -> Result<Self>;
}

/// Decode a wire value into a caller-chosen type.
pub fn decode_into<T: FromWire>(value: &WireValue, opts: &CodecOptions) -> Result<T> {
    T::from_wire(value, opts)
}

fn mismatch_for<T: FromWire>(value: &WireValue) -> CodecError {
    CodecError::mismatch(value.type_name(), T::TARGET)
}

macro_rules! integer_from_wire {
    ($($ty:ty => $name:expr),* $(,)?) => {
        $(
            impl FromWire for $ty {
                const TARGET: &'static str = $name;

                fn from_wire(value: &WireValue, opts: &CodecOptions) -> Result<Self> {
                    match value {
                        WireValue::Int16(v) => Ok(*v as $ty),
                        WireValue::Int32(v) => Ok(*v as $ty),
                        WireValue::Int64(v) => Ok(*v as $ty),
                        WireValue::DateTime(ns) => Ok(opts.time_format.from_nanos(*ns) as $ty),
                        other => Err(mismatch_for::<Self>(other)),
                    }
                }
            }
        )*
    };
}

integer_from_wire! {
    i16 => "int16",
    i32 => "int32",
    i64 => "int64",
}

impl FromWire for f64 {
    const TARGET: &'static str = "double";

    fn from_wire(value: &WireValue, _opts: &CodecOptions) -> Result<Self> {
        match value {
            WireValue::Float32(v) => Ok(*v as f64),
            WireValue::Float64(v) => Ok(*v),
            other => other.as_i64().map(|v| v as f64).ok_or_else(|| mismatch_for::<Self>(other)),
        }
    }
}

impl FromWire for f32 {
    const TARGET: &'static str = "float";

    fn from_wire(value: &WireValue, _opts: &CodecOptions) -> Result<Self> {
        match value {
            WireValue::Float32(v) => Ok(*v),
            WireValue::Float64(v) => Ok(*v as f32),
            other => other.as_i64().map(|v| v as f32).ok_or_else(|| mismatch_for::<Self>(other)),
        }
    }
}

impl FromWire for String {
    const TARGET: &'static str = "string";

    fn from_wire(value: &WireValue, opts: &CodecOptions) -> Result<Self> {
        match value {
            WireValue::Int16(v) => Ok(v.to_string()),
            WireValue::Int32(v) => Ok(v.to_string()),
            WireValue::Int64(v) => Ok(v.to_string()),
            WireValue::Float32(v) => Ok(v.to_string()),
            WireValue::Float64(v) => Ok(v.to_string()),
            WireValue::DateTime(ns) => match &opts.time_format {
                TimeFormat::Pattern(p) => opts.zone.format(*ns, p),
                unit => Ok(unit.from_nanos(*ns).to_string()),
            },
            WireValue::IPv4(o) => Ok(Ipv4Addr::from(*o).to_string()),
            WireValue::IPv6(o) => Ok(Ipv6Addr::from(*o).to_string()),
            WireValue::String(s) => Ok(s.clone()),
            WireValue::Binary(b) => String::from_utf8(b.clone())
                .map_err(|_| CodecError::invalid("string", "binary value is not valid UTF-8")),
            WireValue::Null => Err(mismatch_for::<Self>(value)),
        }
    }
}

impl FromWire for Vec<u8> {
    const TARGET: &'static str = "binary";

    fn from_wire(value: &WireValue, _opts: &CodecOptions) -> Result<Self> {
        match value {
            WireValue::Binary(b) => Ok(b.clone()),
            WireValue::String(s) => Ok(s.as_bytes().to_vec()),
            WireValue::IPv4(o) => Ok(o.to_vec()),
            WireValue::IPv6(o) => Ok(o.to_vec()),
            other => Err(mismatch_for::<Self>(other)),
        }
    }
}

impl FromWire for IpAddr {
    const TARGET: &'static str = "ip";

    fn from_wire(value: &WireValue, _opts: &CodecOptions) -> Result<Self> {
        match value {
            WireValue::IPv4(o) => Ok(IpAddr::V4(Ipv4Addr::from(*o))),
            WireValue::IPv6(o) => Ok(IpAddr::V6(Ipv6Addr::from(*o))),
            other => Err(mismatch_for::<Self>(other)),
        }
    }
}

impl FromWire for Ipv4Addr {
    const TARGET: &'static str = "ipv4";

    fn from_wire(value: &WireValue, _opts: &CodecOptions) -> Result<Self> {
        match value {
            WireValue::IPv4(o) => Ok(Ipv4Addr::from(*o)),
            WireValue::IPv6(o) => Ipv6Addr::from(*o)
                .to_ipv4_mapped()
                .ok_or_else(|| mismatch_for::<Self>(value)),
            other => Err(mismatch_for::<Self>(other)),
        }
    }
}

impl FromWire for Ipv6Addr {
    const TARGET: &'static str = "ipv6";

    fn from_wire(value: &WireValue, _opts: &CodecOptions) -> Result<Self> {
        match value {
            WireValue::IPv4(o) => Ok(Ipv4Addr::from(*o).to_ipv6_mapped()),
            WireValue::IPv6(o) => Ok(Ipv6Addr::from(*o)),
            other => Err(mismatch_for::<Self>(other)),
        }
    }
}

impl FromWire for DateTime<Utc> {
    const TARGET: &'static str = "datetime";

    fn from_wire(value: &WireValue, _opts: &CodecOptions) -> Result<Self> {
        match value {
            WireValue::DateTime(ns) => Ok(from_nanos(*ns)),
            other => Err(mismatch_for::<Self>(other)),
        }
    }
}

impl<T: FromWire> FromWire for Option<T> {
    const TARGET: &'static str = T::TARGET;

    fn from_wire(value: &WireValue, opts: &CodecOptions) -> Result<Self> {
        match value {
            WireValue::Null => Ok(None),
            other => T::from_wire(other, opts).map(Some),
        }
    }
}

// ============================================================================
// Buffers
// ============================================================================

/// Copy a String, Binary or IP value into a caller buffer.
///
/// Returns the number of bytes written, or `None` for null. A value longer
/// than the buffer is an error, never a silent truncation.
pub fn copy_into(value: &WireValue, buf: &mut [u8]) -> Result<Option<usize>> {
    let bytes: &[u8] = match value {
        WireValue::Null => return Ok(None),
        WireValue::String(s) => s.as_bytes(),
        WireValue::Binary(b) => b,
        WireValue::IPv4(o) => o,
        WireValue::IPv6(o) => o,
        other => return Err(CodecError::mismatch(other.type_name(), "buffer")),
    };
    if bytes.len() > buf.len() {
        return Err(CodecError::BufferTooSmall {
            needed: bytes.len(),
            capacity: buf.len(),
        });
    }
    buf[..bytes.len()].copy_from_slice(bytes);
    Ok(Some(bytes.len()))
}
