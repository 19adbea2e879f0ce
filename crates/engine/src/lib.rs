//! Engine contract and in-memory reference engine for Veneer
//!
//! This crate defines what the RPC layer needs from a database engine:
//! - Engine: prepare statements and open append sessions
//! - Statement: bind, execute, describe and fetch
//! - AppendSession: buffered bulk loads
//! - EngineError: numeric code plus message
//!
//! `MemoryEngine` implements the contract for a small SQL subset so the
//! whole stack can run and be tested without an external database.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod memory;
pub mod sql;
pub mod traits;

pub use error::{EngineError, Result};
pub use memory::{MemoryEngine, MemoryEngineConfig, ARRIVAL_TIME_COLUMN, SYS_TABLES};
pub use traits::{AppendSession, Engine, Execution, Statement};
