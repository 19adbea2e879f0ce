//! Engine collaborator contract
//!
//! The RPC layer drives the engine only through these traits: prepare a
//! statement, bind parameters, execute, describe and fetch. Bulk loads go
//! through an [`AppendSession`].
//!
//! ## Thread Safety
//!
//! `Engine` is shared across request tasks. Statements and append sessions
//! are owned by one handle at a time and only need to be `Send`.

use veneer_core::{ColumnDescriptor, NativeValue};

use crate::error::Result;

/// A database engine.
pub trait Engine: Send + Sync {
    /// Prepare a statement. Parameters are positional `?` markers.
    fn prepare(&self, sql: &str) -> Result<Box<dyn Statement>>;

    /// Open an append session on a table. Table names are case-insensitive.
    fn open_appender(&self, table: &str) -> Result<Box<dyn AppendSession>>;
}

/// Outcome of [`Statement::execute`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Execution {
    /// Rows inserted, updated or deleted
    pub rows_affected: u64,
    /// Whether the statement produced a result set to fetch from
    pub has_result_set: bool,
}

/// A prepared statement and, after execution, its result cursor.
pub trait Statement: Send {
    /// Descriptors of the `?` parameters, in order.
    fn params(&self) -> &[ColumnDescriptor];

    /// Bind parameter `index` (zero-based).
    fn bind(&mut self, index: usize, value: NativeValue) -> Result<()>;

    /// Execute with the current bindings.
    fn execute(&mut self) -> Result<Execution>;

    /// Result-set column descriptors (empty for non-queries).
    fn columns(&self) -> &[ColumnDescriptor];

    /// Fetch the next row, `None` once exhausted.
    ///
    /// IP addresses come back as [`NativeValue::VersionedIp`].
    fn fetch(&mut self) -> Result<Option<Vec<NativeValue>>>;

    /// Release the cursor. Further calls are no-ops.
    fn close(&mut self) -> Result<()>;
}

/// A bulk-load session on one table.
pub trait AppendSession: Send {
    /// All columns of the table, including engine pseudo-columns.
    fn columns(&self) -> &[ColumnDescriptor];

    /// Validate and buffer one row, positional over [`AppendSession::columns`].
    fn append(&mut self, values: Vec<NativeValue>) -> Result<()>;

    /// Commit buffered rows. A no-op on an empty buffer.
    fn flush(&mut self) -> Result<()>;

    /// Flush and release the session. Further calls are no-ops.
    fn close(&mut self) -> Result<()>;
}
