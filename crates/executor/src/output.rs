//! Output enum for command results.
//!
//! Every response carries a [`Status`]. Operation failures (engine errors,
//! bad values, unknown handles) are reported there with `success = false`;
//! the call itself still succeeds.

use std::time::Instant;

use serde::{Deserialize, Serialize};
use veneer_core::{ColumnDescriptor, TableKind, WireValue};

use crate::Error;

/// Outcome of one operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Status {
    /// Whether the operation succeeded
    pub success: bool,
    /// `"success"`, or the error message
    pub reason: String,
    /// Stable reason code of the failure
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// Time spent serving the request, human-readable
    pub elapsed: String,
}

impl Status {
    /// Successful outcome of a request started at `started`.
    pub fn ok(started: Instant) -> Self {
        Status {
            success: true,
            reason: "success".to_string(),
            code: None,
            elapsed: format!("{:?}", started.elapsed()),
        }
    }

    /// Failed outcome carrying `err`.
    pub fn failed(err: &Error, started: Instant) -> Self {
        Status {
            success: false,
            reason: err.to_string(),
            code: Some(err.code().to_string()),
            elapsed: format!("{:?}", started.elapsed()),
        }
    }
}

/// A response that can stand in for a failed operation.
pub trait Response: Sized {
    /// The response's status.
    fn status(&self) -> &Status;

    /// A response with `status` and every other field empty.
    fn from_failure(status: Status) -> Self;
}

macro_rules! response {
    ($($ty:ident),* $(,)?) => {
        $(
            impl Response for $ty {
                fn status(&self) -> &Status {
                    &self.status
                }

                fn from_failure(status: Status) -> Self {
                    $ty {
                        status,
                        ..Default::default()
                    }
                }
            }
        )*
    };
}

impl Default for Status {
    fn default() -> Self {
        Status {
            success: false,
            reason: String::new(),
            code: None,
            elapsed: String::new(),
        }
    }
}

/// Result of `Exec`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ExecResponse {
    /// Outcome
    pub status: Status,
    /// Rows inserted, updated or deleted
    pub rows_affected: u64,
}

/// Result of `Query`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct QueryResponse {
    /// Outcome
    pub status: Status,
    /// Result handle; absent when the statement produced no result set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handle: Option<String>,
    /// Result-set columns
    #[serde(default)]
    pub columns: Vec<ColumnDescriptor>,
}

/// Result of `QueryRow` and `RowsNext`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RowResponse {
    /// Outcome
    pub status: Status,
    /// Whether `values` holds a row
    pub has_row: bool,
    /// Row values, empty when `has_row` is false
    #[serde(default, with = "crate::json::row")]
    pub values: Vec<WireValue>,
}

/// Result of operations with nothing to return but a status.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AckResponse {
    /// Outcome
    pub status: Status,
}

/// Result of `AppendOpen`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AppendOpenResponse {
    /// Outcome
    pub status: Status,
    /// Append handle
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handle: Option<String>,
    /// Upper-cased table name
    #[serde(default)]
    pub table: String,
    /// Table kind
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<TableKind>,
    /// Caller-visible columns, in append order
    #[serde(default)]
    pub columns: Vec<ColumnDescriptor>,
}

/// Result of `Append` and `AppendClose`: the running counts.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AppendResponse {
    /// Outcome of this call
    pub status: Status,
    /// Rows accepted so far
    pub success_count: u64,
    /// Rows rejected so far
    pub fail_count: u64,
}

response!(
    ExecResponse,
    QueryResponse,
    RowResponse,
    AckResponse,
    AppendOpenResponse,
    AppendResponse,
);

/// Result of executing a [`Command`](crate::Command).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Output {
    /// `Exec`
    Exec(ExecResponse),
    /// `Query`
    Query(QueryResponse),
    /// `QueryRow` and `RowsNext`
    Row(RowResponse),
    /// `RowsClose` and `AppendFlush`
    Ack(AckResponse),
    /// `AppendOpen`
    AppendOpened(AppendOpenResponse),
    /// `Append`
    Appended(AppendResponse),
    /// `AppendClose`
    AppendClosed(AppendResponse),
    /// `Ping`
    Pong {
        /// Server version
        version: String,
    },
}

impl Output {
    /// Status of the operation; `Pong` has none.
    pub fn status(&self) -> Option<&Status> {
        match self {
            Output::Exec(r) => Some(&r.status),
            Output::Query(r) => Some(&r.status),
            Output::Row(r) => Some(&r.status),
            Output::Ack(r) => Some(&r.status),
            Output::AppendOpened(r) => Some(&r.status),
            Output::Appended(r) | Output::AppendClosed(r) => Some(&r.status),
            Output::Pong { .. } => None,
        }
    }
}
