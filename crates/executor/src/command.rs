//! Command enum defining every RPC operation.
//!
//! Commands are:
//! - **Self-contained**: All parameters needed for execution are in the variant
//! - **Serializable**: Can be converted to/from JSON for the wire transport
//! - **Pure data**: No closures or engine objects
//!
//! Wire values inside commands use the canonical JSON forms of
//! [`crate::json`].

use serde::{Deserialize, Serialize};
use veneer_core::{TimeFormat, WireValue};

/// A self-contained, serializable RPC operation.
///
/// # Command Categories
///
/// | Category | Commands | Description |
/// |----------|----------|-------------|
/// | Statement | `Exec`, `Query`, `QueryRow` | Run SQL with positional parameters |
/// | Cursor | `RowsNext`, `RowsClose` | Drive an open result handle |
/// | Append | `AppendOpen`, `Append`, `AppendFlush`, `AppendClose` | Bulk-load sessions |
/// | Liveness | `Ping` | Round-trip check |
///
/// # Example
///
/// ```ignore
/// use veneer_executor::Command;
/// use veneer_core::WireValue;
///
/// let cmd = Command::Query {
///     sql: "select * from example where name = ?".into(),
///     params: vec![WireValue::String("sensor-1".into())],
///     timeout_ms: None,
/// };
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub enum Command {
    // ==================== Statement ====================
    /// Execute a statement that returns no rows.
    /// Returns: `Output::Exec`
    Exec {
        /// SQL text with `?` parameter markers
        sql: String,
        /// Positional parameter values
        #[serde(default, with = "crate::json::row")]
        params: Vec<WireValue>,
        /// Deadline in milliseconds, overriding the server default
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timeout_ms: Option<u64>,
    },

    /// Execute a query and keep its result set open behind a handle.
    /// Returns: `Output::Query`
    Query {
        /// SQL text with `?` parameter markers
        sql: String,
        /// Positional parameter values
        #[serde(default, with = "crate::json::row")]
        params: Vec<WireValue>,
        /// Deadline in milliseconds, overriding the server default
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timeout_ms: Option<u64>,
    },

    /// Execute a query and return its first row. No handle is created.
    /// Returns: `Output::Row`
    QueryRow {
        /// SQL text with `?` parameter markers
        sql: String,
        /// Positional parameter values
        #[serde(default, with = "crate::json::row")]
        params: Vec<WireValue>,
        /// Deadline in milliseconds, overriding the server default
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timeout_ms: Option<u64>,
    },

    // ==================== Cursor ====================
    /// Fetch the next row of an open result handle.
    /// Returns: `Output::Row`
    RowsNext {
        /// Handle returned by `Query`
        handle: String,
        /// Deadline in milliseconds, overriding the server default
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timeout_ms: Option<u64>,
    },

    /// Close a result handle. Closing twice succeeds.
    /// Returns: `Output::Ack`
    RowsClose {
        /// Handle returned by `Query`
        handle: String,
        /// Deadline in milliseconds, overriding the server default
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timeout_ms: Option<u64>,
    },

    // ==================== Append ====================
    /// Open an append session on a log or tag table.
    /// Returns: `Output::AppendOpened`
    AppendOpen {
        /// Table name, case-insensitive
        table: String,
        /// Consecutive failures before failing fast; 0 disables
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error_check_count: Option<u32>,
        /// Format of timestamp values in appended rows
        #[serde(default, skip_serializing_if = "Option::is_none")]
        time_format: Option<TimeFormat>,
        /// Deadline in milliseconds, overriding the server default
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timeout_ms: Option<u64>,
    },

    /// Append one row.
    /// Returns: `Output::Appended`
    Append {
        /// Handle returned by `AppendOpen`
        handle: String,
        /// Row values, positional over the session's columns
        #[serde(with = "crate::json::row")]
        values: Vec<WireValue>,
        /// Explicit timestamp for the row
        #[serde(
            default,
            skip_serializing_if = "Option::is_none",
            with = "crate::json::optional"
        )]
        timestamp: Option<WireValue>,
        /// Deadline in milliseconds, overriding the server default
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timeout_ms: Option<u64>,
    },

    /// Commit buffered rows.
    /// Returns: `Output::Ack`
    AppendFlush {
        /// Handle returned by `AppendOpen`
        handle: String,
        /// Deadline in milliseconds, overriding the server default
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timeout_ms: Option<u64>,
    },

    /// Close an append session and report its final counts.
    /// Returns: `Output::AppendClosed`
    AppendClose {
        /// Handle returned by `AppendOpen`
        handle: String,
        /// Deadline in milliseconds, overriding the server default
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timeout_ms: Option<u64>,
    },

    // ==================== Liveness ====================
    /// Round-trip check.
    /// Returns: `Output::Pong`
    Ping,
}

impl Command {
    /// Operation name used in logs and timeout errors.
    pub fn name(&self) -> &'static str {
        match self {
            Command::Exec { .. } => "Exec",
            Command::Query { .. } => "Query",
            Command::QueryRow { .. } => "QueryRow",
            Command::RowsNext { .. } => "RowsNext",
            Command::RowsClose { .. } => "RowsClose",
            Command::AppendOpen { .. } => "AppendOpen",
            Command::Append { .. } => "Append",
            Command::AppendFlush { .. } => "AppendFlush",
            Command::AppendClose { .. } => "AppendClose",
            Command::Ping => "Ping",
        }
    }
}
