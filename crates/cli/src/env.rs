//! Environment and connection handles.

use std::sync::Arc;

use tracing::debug;
use veneer_core::{CodecOptions, DisplayZone, NativeValue, TimeFormat, DEFAULT_TIME_PATTERN};
use veneer_engine::{Engine, MemoryEngine};
use veneer_executor::{AppendOptions, Result};

use crate::appender::CliAppender;
use crate::conn_str::ConnectionString;
use crate::stmt::{CliRow, CliRows, CliStmt};

/// Environment handle: the engine plus connection and time settings.
///
/// Timestamps are rendered and parsed with `%Y-%m-%d %H:%M:%S` in the local
/// zone unless configured otherwise.
pub struct CliEnv {
    engine: Arc<dyn Engine>,
    connection: ConnectionString,
    time_format: TimeFormat,
    zone: DisplayZone,
}

impl CliEnv {
    /// Environment over `engine` with default settings.
    pub fn new(engine: Arc<dyn Engine>) -> Self {
        CliEnv {
            engine,
            connection: ConnectionString::default(),
            time_format: TimeFormat::Pattern(DEFAULT_TIME_PATTERN.to_string()),
            zone: DisplayZone::Local,
        }
    }

    /// Environment over a fresh in-memory engine.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryEngine::new()))
    }

    /// Set the server host and port.
    pub fn with_host(mut self, host: impl Into<String>, port: u16) -> Self {
        self.connection.host = host.into();
        self.connection.port = port;
        self
    }

    /// Set the user and password.
    pub fn with_user(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.connection.user = user.into();
        self.connection.password = password.into();
        self
    }

    /// Set the time format.
    pub fn with_time_format(mut self, time_format: TimeFormat) -> Self {
        self.time_format = time_format;
        self
    }

    /// Set the zone used with pattern time formats.
    pub fn with_zone(mut self, zone: DisplayZone) -> Self {
        self.zone = zone;
        self
    }

    /// Change the time format for connections opened afterwards.
    pub fn set_time_format(&mut self, time_format: TimeFormat) {
        self.time_format = time_format;
    }

    /// Change the zone for connections opened afterwards.
    pub fn set_zone(&mut self, zone: DisplayZone) {
        self.zone = zone;
    }

    /// Connection settings.
    pub fn connection(&self) -> &ConnectionString {
        &self.connection
    }

    /// Formatted connection string.
    pub fn connection_string(&self) -> String {
        self.connection.to_string()
    }

    /// Open a connection with the environment's settings.
    pub fn connect(&self) -> Result<CliConn> {
        self.open(self.connection.clone())
    }

    /// Open a connection described by a connection string.
    pub fn connect_with(&self, connection: &str) -> Result<CliConn> {
        self.open(connection.parse()?)
    }

    fn open(&self, connection: ConnectionString) -> Result<CliConn> {
        debug!(server = %connection.host, port = connection.port, user = %connection.user, "Connected");
        Ok(CliConn {
            engine: Arc::clone(&self.engine),
            connection,
            codec: CodecOptions::new(self.time_format.clone(), self.zone),
        })
    }
}

/// Connection handle.
pub struct CliConn {
    engine: Arc<dyn Engine>,
    connection: ConnectionString,
    codec: CodecOptions,
}

impl CliConn {
    /// Connection settings this handle was opened with.
    pub fn connection(&self) -> &ConnectionString {
        &self.connection
    }

    /// Time format and zone used by this connection.
    pub fn codec_options(&self) -> &CodecOptions {
        &self.codec
    }

    /// Allocate a statement.
    pub fn new_stmt(&self) -> CliStmt {
        CliStmt::new(Arc::clone(&self.engine), self.codec.clone())
    }

    /// Execute `sql` without parameters. Returns the rows affected.
    pub fn exec_direct(&self, sql: &str) -> Result<u64> {
        let mut stmt = self.new_stmt();
        let affected = stmt.exec_direct(sql)?;
        stmt.free()?;
        Ok(affected)
    }

    /// Execute `sql` with parameters. Returns the rows affected.
    pub fn exec(&self, sql: &str, params: Vec<NativeValue>) -> Result<u64> {
        let mut stmt = self.prepared(sql, params)?;
        let affected = stmt.execute()?;
        stmt.free()?;
        Ok(affected)
    }

    /// Run a query and return its open result set.
    pub fn query(&self, sql: &str, params: Vec<NativeValue>) -> Result<CliRows> {
        let mut stmt = self.prepared(sql, params)?;
        stmt.execute()?;
        Ok(CliRows::new(stmt))
    }

    /// Run a query and return its first row, `None` if it is empty.
    pub fn query_row(&self, sql: &str, params: Vec<NativeValue>) -> Result<Option<CliRow>> {
        let mut rows = self.query(sql, params)?;
        let row = rows.next_row()?;
        rows.close()?;
        Ok(row)
    }

    /// Open an append session on `table`.
    ///
    /// With `error_check_count = N > 0` the session fails fast after N
    /// consecutive failed rows.
    pub fn appender(&self, table: &str, error_check_count: u32) -> Result<CliAppender> {
        let options = AppendOptions {
            error_check_count,
            time_format: self.codec.time_format.clone(),
            zone: self.codec.zone,
            default_tag_name: None,
        };
        CliAppender::open(self.engine.as_ref(), table, options)
    }

    fn prepared(&self, sql: &str, params: Vec<NativeValue>) -> Result<CliStmt> {
        let mut stmt = self.new_stmt();
        stmt.prepare(sql)?;
        stmt.bind_params(params)?;
        Ok(stmt)
    }
}
