//! # Veneer CLI binding
//!
//! An in-process, ODBC-style binding surface over a Veneer engine:
//!
//! - [`CliEnv`] - engine, connection string and time settings
//! - [`CliConn`] - statements, convenience queries and appenders
//! - [`CliStmt`] - Prepare → BindParam → Execute → Fetch → GetData → Free
//! - [`CliAppender`] - bulk appends with `(success, fail)` counts
//!
//! Parameters and columns cross as raw little-endian buffers tagged with a
//! [`CType`]; SQL types are the engine's [`ColumnType`] codes 0–9.
//!
//! ```text
//! let env = CliEnv::in_memory();
//! let conn = env.connect()?;
//! let mut stmt = conn.new_stmt();
//! stmt.exec_direct("select v from t")?;
//! while stmt.fetch()? {
//!     let mut buf = [0u8; 4];
//!     stmt.get_data(0, CType::Int32, &mut buf)?;
//! }
//! stmt.free()?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

mod appender;
pub mod conn_str;
pub mod ctype;
mod env;
mod stmt;

pub use appender::CliAppender;
pub use conn_str::ConnectionString;
pub use ctype::CType;
pub use env::{CliConn, CliEnv};
pub use stmt::{CliRow, CliRows, CliStmt};
pub use veneer_core::ColumnType;

/// SQL type of a bound parameter or result column.
pub type SqlType = ColumnType;
