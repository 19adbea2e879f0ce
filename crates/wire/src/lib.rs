//! JSON-lines transport for Veneer
//!
//! - [`envelope`]: request/response framing
//! - [`server`]: tokio TCP server, one session per connection
//! - [`Client`]: async client with cursor and appender helpers

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod client;
pub mod envelope;
pub mod error;
pub mod server;

pub use client::{Appender, Client, ClientOptions, Rows};
pub use envelope::{ApiError, Request, Response};
pub use error::{Result, WireError};
pub use server::{handle_connection, serve, serve_with_shutdown};
