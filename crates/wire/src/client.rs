//! Async client for the JSON-lines transport
//!
//! ```ignore
//! let mut client = Client::connect("127.0.0.1:5656").await?;
//! client.exec("create table t (v integer)", vec![]).await?;
//!
//! let mut rows = client.query("select * from t", vec![]).await?;
//! while let Some(row) = rows.next().await? {
//!     println!("{:?}", row);
//! }
//! rows.close().await?;
//! ```
//!
//! Deadlines are per client, not per call:
//!
//! ```ignore
//! let options = ClientOptions::default()
//!     .query_timeout(Duration::from_secs(5))
//!     .close_timeout(Duration::from_millis(500));
//! let mut client = Client::connect_with("127.0.0.1:5656", options).await?;
//! ```
//!
//! # Cancellation
//!
//! A call abandoned after its request was written leaves a reply in flight.
//! Replies carry the request id, and the next call skips any reply whose id
//! is older than its own. A call abandoned mid-write leaves a partial line
//! on the connection; the server answers it with an `InvalidRequest` fault
//! once the next request completes the line, so drop the client instead.

use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpStream, ToSocketAddrs};
use tracing::debug;
use veneer_core::{ColumnDescriptor, Row, TableKind, WireValue};
use veneer_executor::{AppendResponse, Command, Output, Status};

use crate::envelope::{decode_response, encode_request, Request};
use crate::error::{Result, WireError};

/// Server-side deadlines sent with each call as `timeout_ms`.
///
/// `None` leaves the server's configured default in force. A zero duration
/// disables the deadline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClientOptions {
    /// Deadline for `Exec`, `Query`, `QueryRow` and `RowsNext`
    pub query_timeout: Option<Duration>,
    /// Deadline for `AppendOpen`, `Append` and `AppendFlush`
    pub append_timeout: Option<Duration>,
    /// Deadline for `RowsClose` and `AppendClose`
    pub close_timeout: Option<Duration>,
}

impl ClientOptions {
    /// Set the query deadline.
    pub fn query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = Some(timeout);
        self
    }

    /// Set the append deadline.
    pub fn append_timeout(mut self, timeout: Duration) -> Self {
        self.append_timeout = Some(timeout);
        self
    }

    /// Set the close deadline.
    pub fn close_timeout(mut self, timeout: Duration) -> Self {
        self.close_timeout = Some(timeout);
        self
    }
}

/// Wire value of a deadline. Sub-millisecond deadlines round up so they
/// are not mistaken for "no deadline".
fn millis(timeout: Option<Duration>) -> Option<u64> {
    timeout.map(|t| {
        if t.is_zero() {
            0
        } else {
            u64::try_from(t.as_millis()).unwrap_or(u64::MAX).max(1)
        }
    })
}

/// A connection to a server. One connection is one session.
pub struct Client {
    lines: Lines<BufReader<OwnedReadHalf>>,
    writer: OwnedWriteHalf,
    next_id: u64,
    options: ClientOptions,
}

impl Client {
    /// Connect to a server with default options.
    pub async fn connect<A: ToSocketAddrs>(addr: A) -> Result<Self> {
        Self::connect_with(addr, ClientOptions::default()).await
    }

    /// Connect to a server.
    pub async fn connect_with<A: ToSocketAddrs>(addr: A, options: ClientOptions) -> Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        let (read, writer) = stream.into_split();
        Ok(Client {
            lines: BufReader::new(read).lines(),
            writer,
            next_id: 1,
            options,
        })
    }

    /// Deadlines in effect.
    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    /// Replace the deadlines for subsequent calls.
    pub fn set_options(&mut self, options: ClientOptions) {
        self.options = options;
    }

    /// Send one command and wait for its output.
    ///
    /// Transport faults become [`WireError::Fault`]; a failed status inside
    /// the output is returned as-is. Replies to earlier, abandoned calls are
    /// discarded.
    pub async fn call(&mut self, command: Command) -> Result<Output> {
        let seq = self.next_id;
        self.next_id += 1;
        let id = seq.to_string();
        let mut line = encode_request(&Request {
            id: id.clone(),
            command,
        })?;
        line.push('\n');
        self.writer.write_all(line.as_bytes()).await?;
        self.writer.flush().await?;

        let response = loop {
            let reply = self.lines.next_line().await?.ok_or(WireError::Closed)?;
            let response = decode_response(&reply)?;
            if response.id == id {
                break response;
            }
            match response.id.parse::<u64>() {
                Ok(stale) if stale < seq => {
                    debug!(id = %response.id, expected = %id, "Discarding reply to abandoned call");
                }
                _ => {
                    return Err(WireError::Protocol(format!(
                        "response id '{}' for request '{}'",
                        response.id, id
                    )))
                }
            }
        };
        if !response.ok {
            let error = response
                .error
                .ok_or_else(|| WireError::Protocol("fault without error".to_string()))?;
            return Err(WireError::Fault {
                code: error.code,
                message: error.message,
            });
        }
        response
            .output
            .ok_or_else(|| WireError::Protocol("success without output".to_string()))
    }

    /// Round-trip check; returns the server version.
    pub async fn ping(&mut self) -> Result<String> {
        match self.call(Command::Ping).await? {
            Output::Pong { version } => Ok(version),
            other => Err(unexpected("Pong", &other)),
        }
    }

    /// Execute a statement; returns rows affected.
    pub async fn exec(&mut self, sql: &str, params: Vec<WireValue>) -> Result<u64> {
        let command = Command::Exec {
            sql: sql.to_string(),
            params,
            timeout_ms: millis(self.options.query_timeout),
        };
        match self.call(command).await? {
            Output::Exec(r) => checked(r.status).map(|_| r.rows_affected),
            other => Err(unexpected("Exec", &other)),
        }
    }

    /// Execute a query and return a cursor over its rows.
    pub async fn query(&mut self, sql: &str, params: Vec<WireValue>) -> Result<Rows<'_>> {
        let command = Command::Query {
            sql: sql.to_string(),
            params,
            timeout_ms: millis(self.options.query_timeout),
        };
        match self.call(command).await? {
            Output::Query(r) => {
                checked(r.status)?;
                Ok(Rows {
                    handle: r.handle,
                    columns: r.columns,
                    client: self,
                })
            }
            other => Err(unexpected("Query", &other)),
        }
    }

    /// Execute a query and return its first row, if any.
    pub async fn query_row(&mut self, sql: &str, params: Vec<WireValue>) -> Result<Option<Row>> {
        let command = Command::QueryRow {
            sql: sql.to_string(),
            params,
            timeout_ms: millis(self.options.query_timeout),
        };
        match self.call(command).await? {
            Output::Row(r) => {
                checked(r.status)?;
                Ok(r.has_row.then_some(r.values))
            }
            other => Err(unexpected("Row", &other)),
        }
    }

    /// Open an append session.
    pub async fn append_open(&mut self, table: &str, error_check_count: Option<u32>) -> Result<Appender> {
        let command = Command::AppendOpen {
            table: table.to_string(),
            error_check_count,
            time_format: None,
            timeout_ms: millis(self.options.append_timeout),
        };
        match self.call(command).await? {
            Output::AppendOpened(r) => {
                checked(r.status)?;
                let handle = r
                    .handle
                    .ok_or_else(|| WireError::Protocol("append session without handle".to_string()))?;
                Ok(Appender {
                    handle,
                    table: r.table,
                    kind: r.kind,
                    columns: r.columns,
                })
            }
            other => Err(unexpected("AppendOpened", &other)),
        }
    }

    /// Append one row. Returns the running counts even when the row failed.
    pub async fn append(&mut self, appender: &Appender, values: Vec<WireValue>) -> Result<AppendResponse> {
        let command = Command::Append {
            handle: appender.handle.clone(),
            values,
            timestamp: None,
            timeout_ms: millis(self.options.append_timeout),
        };
        match self.call(command).await? {
            Output::Appended(r) => Ok(r),
            other => Err(unexpected("Appended", &other)),
        }
    }

    /// Commit buffered rows.
    pub async fn append_flush(&mut self, appender: &Appender) -> Result<()> {
        let command = Command::AppendFlush {
            handle: appender.handle.clone(),
            timeout_ms: millis(self.options.append_timeout),
        };
        match self.call(command).await? {
            Output::Ack(r) => checked(r.status),
            other => Err(unexpected("Ack", &other)),
        }
    }

    /// Close an append session; returns `(success, fail)`.
    pub async fn append_close(&mut self, appender: &Appender) -> Result<(u64, u64)> {
        let command = Command::AppendClose {
            handle: appender.handle.clone(),
            timeout_ms: millis(self.options.close_timeout),
        };
        match self.call(command).await? {
            Output::AppendClosed(r) => {
                checked(r.status)?;
                Ok((r.success_count, r.fail_count))
            }
            other => Err(unexpected("AppendClosed", &other)),
        }
    }
}

/// An open result set. Borrows the client until dropped.
pub struct Rows<'a> {
    client: &'a mut Client,
    handle: Option<String>,
    columns: Vec<ColumnDescriptor>,
}

impl Rows<'_> {
    /// Result-set columns.
    pub fn columns(&self) -> &[ColumnDescriptor] {
        &self.columns
    }

    /// Server-side handle, `None` for statements without a result set.
    pub fn handle(&self) -> Option<&str> {
        self.handle.as_deref()
    }

    /// Fetch the next row.
    pub async fn next(&mut self) -> Result<Option<Row>> {
        let Some(handle) = self.handle.clone() else {
            return Ok(None);
        };
        let timeout_ms = millis(self.client.options.query_timeout);
        match self
            .client
            .call(Command::RowsNext { handle, timeout_ms })
            .await?
        {
            Output::Row(r) => {
                checked(r.status)?;
                Ok(r.has_row.then_some(r.values))
            }
            other => Err(unexpected("Row", &other)),
        }
    }

    /// Release the server-side cursor.
    pub async fn close(mut self) -> Result<()> {
        let Some(handle) = self.handle.take() else {
            return Ok(());
        };
        let timeout_ms = millis(self.client.options.close_timeout);
        match self.client.call(Command::RowsClose { handle, timeout_ms }).await? {
            Output::Ack(r) => checked(r.status),
            other => Err(unexpected("Ack", &other)),
        }
    }
}

/// An open append session.
#[derive(Debug, Clone)]
pub struct Appender {
    /// Server-side handle
    pub handle: String,
    /// Upper-cased table name
    pub table: String,
    /// Table kind
    pub kind: Option<TableKind>,
    /// Columns in append order
    pub columns: Vec<ColumnDescriptor>,
}

fn checked(status: Status) -> Result<()> {
    if status.success {
        Ok(())
    } else {
        Err(WireError::Failed {
            code: status.code,
            reason: status.reason,
        })
    }
}

fn unexpected(expected: &str, got: &Output) -> WireError {
    WireError::Protocol(format!("expected {}, got {:?}", expected, got))
}
