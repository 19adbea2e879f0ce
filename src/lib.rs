//! Veneer - stateful cursors over a stateless RPC surface
//!
//! Callers issue independent requests (exec, query, fetch the next row,
//! append a row) and the server keeps long-lived result cursors and bulk
//! append sessions behind opaque handles.
//!
//! # Quick Start
//!
//! ```ignore
//! use veneer::{Executor, ServerConfig};
//!
//! let executor = Executor::in_memory(ServerConfig::default());
//! let session = executor.begin_session();
//!
//! executor.exec(&session, "create table t (v integer)", vec![], None).await?;
//! let rows = executor.query(&session, "select v from t", vec![], None).await?;
//! ```
//!
//! # Architecture
//!
//! The [`Executor`] owns the handle registry and dispatches every
//! [`Command`]. Values cross the boundary as [`WireValue`]s produced by the
//! codec in [`codec`]. The [`wire`] transport serves the executor over
//! JSON-lines TCP, and [`cli`] offers an in-process ODBC-style binding.

pub use veneer_executor::*;

pub use veneer_cli as cli;
pub use veneer_core as codec;
pub use veneer_engine as engine;
pub use veneer_wire as wire;

pub use veneer_core::{ColumnDescriptor, ColumnType, NativeValue, Row, TableKind, WireValue};
