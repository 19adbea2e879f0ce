//! Core types and the value codec for Veneer
//!
//! This crate defines the foundational types used throughout the system:
//! - ColumnType: The closed set of column types, with frozen wire codes
//! - WireValue: Column-type tagged value carried across the RPC boundary
//! - NativeValue: Typed values exchanged with callers and the engine
//! - ColumnDescriptor: Column metadata produced once per statement
//! - TableKind: Engine table kinds and append eligibility
//! - Codec: encode/decode between native and wire values
//! - Time: timestamp units, patterns and display zones

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod codec;
pub mod error;
pub mod time;
pub mod types;
pub mod value;

pub use codec::{
    coerce, copy_into, decode, decode_into, encode, encode_with, ip_from_raw, to_native,
    versioned_ip, CodecOptions, FromWire,
};
pub use error::{CodecError, Result};
pub use time::{DisplayZone, TimeFormat, DEFAULT_TIME_PATTERN};
pub use types::{column_names, column_types, ColumnDescriptor, ColumnType, TableKind};
pub use value::{NativeValue, WireValue};

/// One result row: a wire value per column, in descriptor order.
pub type Row = Vec<WireValue>;
