//! # Veneer Executor
//!
//! Stateful cursors over a stateless RPC surface.
//!
//! Every call is an independent request. The executor gives callers the
//! illusion of long-lived result cursors and append sessions by keeping
//! them server-side behind opaque handles:
//!
//! - [`Executor`] - dispatches [`Command`]s and the typed API
//! - [`Registry`] - live handles, scoped to their session
//! - [`SessionGuard`] / [`SessionContext`] - one client's identity
//! - [`AppendState`] - an append session with running counts
//! - [`Error`] - structured, serializable errors with stable codes
//!
//! ## Quick Start
//!
//! ```text
//! use veneer_executor::{Executor, ServerConfig};
//!
//! let executor = Executor::in_memory(ServerConfig::default());
//! let session = executor.begin_session();
//!
//! let rows = executor.query(&session, "select * from example", vec![], None).await?;
//! let handle = rows.handle.unwrap();
//! while executor.rows_next(&session, &handle, None).await?.has_row {}
//! executor.rows_close(&session, &handle, None).await?;
//! ```
//!
//! ## Failure Reporting
//!
//! | Failure | Reported as |
//! |---------|-------------|
//! | Engine, codec and validation errors | `success = false` in the response status |
//! | Unknown handle | `HandleNotFound` in the response status |
//! | Malformed handle, broken invariant | `Err` from the call |

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod appender;
pub mod config;
mod command;
mod convert;
pub mod cursor;
mod error;
mod executor;
pub mod json;
mod output;
pub mod registry;
pub mod session;

// Handler modules
mod handlers;

// Test modules
#[cfg(test)]
mod tests;

// =============================================================================
// Public API
// =============================================================================

pub use appender::{AppendCounts, AppendOptions, AppendState};
pub use command::Command;
pub use config::ServerConfig;
pub use cursor::CursorState;
pub use error::Error;
pub use executor::Executor;
pub use output::{
    AckResponse, AppendOpenResponse, AppendResponse, ExecResponse, Output, QueryResponse,
    Response, RowResponse, Status,
};
pub use registry::{Handle, Lookup, Registry, Resource, ResourceKind};
pub use session::{SessionContext, SessionGuard, SessionId, SessionValue};

/// Result type for executor operations
pub type Result<T> = std::result::Result<T, Error>;
