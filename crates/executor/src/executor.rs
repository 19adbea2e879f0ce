//! The Executor - single entry point to the RPC surface.
//!
//! The Executor routes commands to handlers, owns the handle registry and
//! runs engine work on the blocking pool under the request deadline.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use veneer_core::{CodecOptions, TimeFormat, WireValue};
use veneer_engine::{Engine, MemoryEngine};

use crate::config::ServerConfig;
use crate::output::{
    AckResponse, AppendOpenResponse, AppendResponse, ExecResponse, QueryResponse, RowResponse,
};
use crate::registry::Registry;
use crate::session::{SessionContext, SessionGuard};
use crate::{Command, Error, Output, Result};

/// The command executor.
///
/// Cheap to clone; clones share the engine, the registry and the session
/// counter.
///
/// # Thread Safety
///
/// Executor is `Send + Sync` and can be shared across tasks.
///
/// # Example
///
/// ```ignore
/// use veneer_executor::{Command, Executor, ServerConfig};
///
/// let executor = Executor::in_memory(ServerConfig::default());
/// let session = executor.begin_session();
///
/// let out = executor
///     .execute(&session, Command::Exec {
///         sql: "create tag table example (name varchar(20) primary key, time datetime basetime, value double summarized)".into(),
///         params: vec![],
///         timeout_ms: None,
///     })
///     .await?;
/// ```
#[derive(Clone)]
pub struct Executor {
    engine: Arc<dyn Engine>,
    registry: Arc<Registry>,
    config: Arc<ServerConfig>,
    next_session: Arc<AtomicU64>,
}

impl Executor {
    /// Create an executor over `engine`.
    pub fn new(engine: Arc<dyn Engine>, config: ServerConfig) -> Self {
        Executor {
            engine,
            registry: Arc::new(Registry::new()),
            config: Arc::new(config),
            next_session: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Create an executor over a fresh in-memory engine.
    pub fn in_memory(config: ServerConfig) -> Self {
        let engine = MemoryEngine::with_config(config.engine_config());
        Self::new(Arc::new(engine), config)
    }

    /// The engine.
    pub fn engine(&self) -> &Arc<dyn Engine> {
        &self.engine
    }

    /// The handle registry.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Start a session. Dropping the guard releases its handles.
    pub fn begin_session(&self) -> SessionGuard {
        let id = self.next_session.fetch_add(1, Ordering::Relaxed);
        SessionGuard::begin(id, Arc::clone(&self.registry))
    }

    /// Execute a single command.
    ///
    /// Operation failures are reported in the returned output's status.
    ///
    /// # Errors
    ///
    /// Only transport faults: a malformed handle (`HandleInvalid`) or a
    /// broken invariant (`Internal`).
    pub async fn execute(&self, ctx: &SessionContext, cmd: Command) -> Result<Output> {
        match cmd {
            Command::Ping => Ok(Output::Pong {
                version: env!("CARGO_PKG_VERSION").to_string(),
            }),

            // Statement commands
            Command::Exec {
                sql,
                params,
                timeout_ms,
            } => crate::handlers::cursor::exec(self, ctx, sql, params, timeout_ms)
                .await
                .map(Output::Exec),
            Command::Query {
                sql,
                params,
                timeout_ms,
            } => crate::handlers::cursor::query(self, ctx, sql, params, timeout_ms)
                .await
                .map(Output::Query),
            Command::QueryRow {
                sql,
                params,
                timeout_ms,
            } => crate::handlers::cursor::query_row(self, ctx, sql, params, timeout_ms)
                .await
                .map(Output::Row),

            // Cursor commands
            Command::RowsNext { handle, timeout_ms } => {
                crate::handlers::cursor::rows_next(self, ctx, handle, timeout_ms)
                    .await
                    .map(Output::Row)
            }
            Command::RowsClose { handle, timeout_ms } => {
                crate::handlers::cursor::rows_close(self, ctx, handle, timeout_ms)
                    .await
                    .map(Output::Ack)
            }

            // Append commands
            Command::AppendOpen {
                table,
                error_check_count,
                time_format,
                timeout_ms,
            } => crate::handlers::append::append_open(
                self,
                ctx,
                table,
                error_check_count,
                time_format,
                timeout_ms,
            )
            .await
            .map(Output::AppendOpened),
            Command::Append {
                handle,
                values,
                timestamp,
                timeout_ms,
            } => crate::handlers::append::append(self, ctx, handle, values, timestamp, timeout_ms)
                .await
                .map(Output::Appended),
            Command::AppendFlush { handle, timeout_ms } => {
                crate::handlers::append::append_flush(self, ctx, handle, timeout_ms)
                    .await
                    .map(Output::Ack)
            }
            Command::AppendClose { handle, timeout_ms } => {
                crate::handlers::append::append_close(self, ctx, handle, timeout_ms)
                    .await
                    .map(Output::AppendClosed)
            }
        }
    }

    // =========================================================================
    // Typed API
    // =========================================================================

    /// Execute a statement that returns no rows.
    pub async fn exec(
        &self,
        ctx: &SessionContext,
        sql: &str,
        params: Vec<WireValue>,
        timeout_ms: Option<u64>,
    ) -> Result<ExecResponse> {
        crate::handlers::cursor::exec(self, ctx, sql.to_string(), params, timeout_ms).await
    }

    /// Execute a query and register its result set under a handle.
    pub async fn query(
        &self,
        ctx: &SessionContext,
        sql: &str,
        params: Vec<WireValue>,
        timeout_ms: Option<u64>,
    ) -> Result<QueryResponse> {
        crate::handlers::cursor::query(self, ctx, sql.to_string(), params, timeout_ms).await
    }

    /// Execute a query and return its first row.
    pub async fn query_row(
        &self,
        ctx: &SessionContext,
        sql: &str,
        params: Vec<WireValue>,
        timeout_ms: Option<u64>,
    ) -> Result<RowResponse> {
        crate::handlers::cursor::query_row(self, ctx, sql.to_string(), params, timeout_ms).await
    }

    /// Fetch the next row of a result handle.
    pub async fn rows_next(
        &self,
        ctx: &SessionContext,
        handle: &str,
        timeout_ms: Option<u64>,
    ) -> Result<RowResponse> {
        crate::handlers::cursor::rows_next(self, ctx, handle.to_string(), timeout_ms).await
    }

    /// Close a result handle. Idempotent.
    pub async fn rows_close(
        &self,
        ctx: &SessionContext,
        handle: &str,
        timeout_ms: Option<u64>,
    ) -> Result<AckResponse> {
        crate::handlers::cursor::rows_close(self, ctx, handle.to_string(), timeout_ms).await
    }

    /// Open an append session.
    pub async fn append_open(
        &self,
        ctx: &SessionContext,
        table: &str,
        error_check_count: Option<u32>,
        time_format: Option<TimeFormat>,
        timeout_ms: Option<u64>,
    ) -> Result<AppendOpenResponse> {
        crate::handlers::append::append_open(
            self,
            ctx,
            table.to_string(),
            error_check_count,
            time_format,
            timeout_ms,
        )
        .await
    }

    /// Append one row, optionally with an explicit timestamp.
    pub async fn append(
        &self,
        ctx: &SessionContext,
        handle: &str,
        values: Vec<WireValue>,
        timestamp: Option<WireValue>,
        timeout_ms: Option<u64>,
    ) -> Result<AppendResponse> {
        crate::handlers::append::append(self, ctx, handle.to_string(), values, timestamp, timeout_ms).await
    }

    /// Commit an append session's buffered rows.
    pub async fn append_flush(
        &self,
        ctx: &SessionContext,
        handle: &str,
        timeout_ms: Option<u64>,
    ) -> Result<AckResponse> {
        crate::handlers::append::append_flush(self, ctx, handle.to_string(), timeout_ms).await
    }

    /// Close an append session. Idempotent.
    pub async fn append_close(
        &self,
        ctx: &SessionContext,
        handle: &str,
        timeout_ms: Option<u64>,
    ) -> Result<AppendResponse> {
        crate::handlers::append::append_close(self, ctx, handle.to_string(), timeout_ms).await
    }

    /// Open an append session, append every row received on `rows` and
    /// close it once the sender side is dropped.
    pub async fn append_stream(
        &self,
        ctx: &SessionContext,
        table: &str,
        error_check_count: Option<u32>,
        rows: mpsc::Receiver<Vec<WireValue>>,
    ) -> Result<AppendResponse> {
        crate::handlers::append::append_stream(self, ctx, table.to_string(), error_check_count, rows)
            .await
    }

    // =========================================================================
    // Internals
    // =========================================================================

    /// Codec options for `ctx`: server defaults with session overrides.
    pub(crate) fn codec_options(&self, ctx: &SessionContext) -> CodecOptions {
        ctx.codec_options(&self.config.codec_options())
    }

    /// Run engine work on the blocking pool under the request deadline.
    ///
    /// An expired deadline yields `Timeout`; the work itself runs to
    /// completion and keeps its handle locked until then.
    pub(crate) async fn blocking<T, F>(
        &self,
        operation: &'static str,
        timeout_ms: Option<u64>,
        work: F,
    ) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce() -> Result<T> + Send + 'static,
    {
        let task = tokio::task::spawn_blocking(work);
        let timeout_ms = timeout_ms.unwrap_or(self.config.default_timeout_ms);
        let joined = if timeout_ms == 0 {
            task.await
        } else {
            tokio::time::timeout(Duration::from_millis(timeout_ms), task)
                .await
                .map_err(|_| Error::Timeout {
                    operation: operation.to_string(),
                    timeout_ms,
                })?
        };
        joined.map_err(|e| Error::Internal {
            reason: format!("{} task failed: {}", operation, e),
        })?
    }
}
