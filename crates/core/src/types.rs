//! Column and table metadata types
//!
//! This module defines:
//! - ColumnType: The closed set of column types a value can carry
//! - ColumnDescriptor: Name, type and declared size of one column
//! - TableKind: The engine's table kinds and which of them accept appends
//!
//! ## Wire Codes (Frozen)
//!
//! Column type codes are a compatibility contract shared with every client
//! and binding. They must never be renumbered:
//!
//! | Code | Type | Name |
//! |------|------|------|
//! | 0 | Int16 | `int16` |
//! | 1 | Int32 | `int32` |
//! | 2 | Int64 | `int64` |
//! | 3 | DateTime | `datetime` |
//! | 4 | Float32 | `float` |
//! | 5 | Float64 | `double` |
//! | 6 | IPv4 | `ipv4` |
//! | 7 | IPv6 | `ipv6` |
//! | 8 | String | `string` |
//! | 9 | Binary | `binary` |

use serde::{Deserialize, Serialize};
use std::fmt;

/// The closed enumeration of column types.
///
/// Every [`WireValue`](crate::WireValue) other than `Null` carries exactly one
/// of these as its tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ColumnType {
    /// 16-bit signed integer
    Int16 = 0,
    /// 32-bit signed integer
    Int32 = 1,
    /// 64-bit signed integer
    Int64 = 2,
    /// Timestamp, canonically nanoseconds since the Unix epoch
    DateTime = 3,
    /// 32-bit float
    Float32 = 4,
    /// 64-bit float
    Float64 = 5,
    /// IPv4 address (4 bytes)
    IPv4 = 6,
    /// IPv6 address (16 bytes)
    IPv6 = 7,
    /// UTF-8 string
    String = 8,
    /// Raw bytes
    Binary = 9,
}

impl ColumnType {
    /// All column types in wire-code order.
    pub const ALL: [ColumnType; 10] = [
        ColumnType::Int16,
        ColumnType::Int32,
        ColumnType::Int64,
        ColumnType::DateTime,
        ColumnType::Float32,
        ColumnType::Float64,
        ColumnType::IPv4,
        ColumnType::IPv6,
        ColumnType::String,
        ColumnType::Binary,
    ];

    /// Fixed wire code of this type.
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Resolve a wire code. Returns `None` for codes outside 0–9.
    pub fn from_code(code: i64) -> Option<ColumnType> {
        if (0..10).contains(&code) {
            Some(Self::ALL[code as usize])
        } else {
            None
        }
    }

    /// Stable lowercase name used in error reasons and descriptors.
    pub fn name(self) -> &'static str {
        match self {
            ColumnType::Int16 => "int16",
            ColumnType::Int32 => "int32",
            ColumnType::Int64 => "int64",
            ColumnType::DateTime => "datetime",
            ColumnType::Float32 => "float",
            ColumnType::Float64 => "double",
            ColumnType::IPv4 => "ipv4",
            ColumnType::IPv6 => "ipv6",
            ColumnType::String => "string",
            ColumnType::Binary => "binary",
        }
    }

    /// Inverse of [`ColumnType::name`].
    pub fn from_name(name: &str) -> Option<ColumnType> {
        Self::ALL.iter().copied().find(|t| t.name() == name)
    }

    /// Byte width of fixed-size types, `None` for String and Binary.
    pub fn fixed_size(self) -> Option<usize> {
        match self {
            ColumnType::Int16 => Some(2),
            ColumnType::Int32 | ColumnType::Float32 | ColumnType::IPv4 => Some(4),
            ColumnType::Int64 | ColumnType::DateTime | ColumnType::Float64 => Some(8),
            ColumnType::IPv6 => Some(16),
            ColumnType::String | ColumnType::Binary => None,
        }
    }

    /// Check if this is one of the integer types
    pub fn is_integer(self) -> bool {
        matches!(self, ColumnType::Int16 | ColumnType::Int32 | ColumnType::Int64)
    }

    /// Check if this is one of the float types
    pub fn is_float(self) -> bool {
        matches!(self, ColumnType::Float32 | ColumnType::Float64)
    }

    /// Integer rank used for widening checks (Int16 < Int32 < Int64).
    pub(crate) fn integer_rank(self) -> Option<u8> {
        match self {
            ColumnType::Int16 => Some(0),
            ColumnType::Int32 => Some(1),
            ColumnType::Int64 => Some(2),
            _ => None,
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Description of one column of a result set, parameter list or append
/// session.
///
/// Produced once per prepared statement and reused for every row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    /// Column name (engine spelling, usually upper case)
    pub name: String,
    /// Declared type
    pub column_type: ColumnType,
    /// Declared size in bytes; the buffer size a reader must allocate
    pub size: usize,
    /// Declared length (characters for strings, equal to `size` otherwise)
    pub length: usize,
}

impl ColumnDescriptor {
    /// Descriptor for a fixed-size type, or a zero-sized variable one.
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        let size = column_type.fixed_size().unwrap_or(0);
        ColumnDescriptor {
            name: name.into(),
            column_type,
            size,
            length: size,
        }
    }

    /// Descriptor with an explicit declared size.
    pub fn sized(name: impl Into<String>, column_type: ColumnType, size: usize) -> Self {
        ColumnDescriptor {
            name: name.into(),
            column_type,
            size,
            length: size,
        }
    }
}

/// Names of a descriptor list, in order.
pub fn column_names(columns: &[ColumnDescriptor]) -> Vec<String> {
    columns.iter().map(|c| c.name.clone()).collect()
}

/// Types of a descriptor list, in order.
pub fn column_types(columns: &[ColumnDescriptor]) -> Vec<ColumnType> {
    columns.iter().map(|c| c.column_type).collect()
}

/// Engine table kinds.
///
/// Codes match the engine's `M$SYS_TABLES.TYPE` column. Code 2 is unused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TableKind {
    /// Append-only log table with a hidden arrival-time column
    Log,
    /// Fixed table
    Fixed,
    /// Volatile (memory) table
    Volatile,
    /// Lookup table
    Lookup,
    /// Key-value table
    KeyValue,
    /// Tag table: rows lead with (name, time)
    Tag,
}

impl TableKind {
    /// Engine code of this kind.
    pub fn code(self) -> i32 {
        match self {
            TableKind::Log => 0,
            TableKind::Fixed => 1,
            TableKind::Volatile => 3,
            TableKind::Lookup => 4,
            TableKind::KeyValue => 5,
            TableKind::Tag => 6,
        }
    }

    /// Resolve an engine code.
    pub fn from_code(code: i64) -> Option<TableKind> {
        match code {
            0 => Some(TableKind::Log),
            1 => Some(TableKind::Fixed),
            3 => Some(TableKind::Volatile),
            4 => Some(TableKind::Lookup),
            5 => Some(TableKind::KeyValue),
            6 => Some(TableKind::Tag),
            _ => None,
        }
    }

    /// Only log and tag tables accept append sessions.
    pub fn is_appendable(self) -> bool {
        matches!(self, TableKind::Log | TableKind::Tag)
    }
}

impl fmt::Display for TableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TableKind::Log => "LogTable",
            TableKind::Fixed => "FixedTable",
            TableKind::Volatile => "VolatileTable",
            TableKind::Lookup => "LookupTable",
            TableKind::KeyValue => "KeyValueTable",
            TableKind::Tag => "TagTable",
        };
        f.write_str(s)
    }
}
