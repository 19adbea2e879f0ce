//! Statement and cursor command handlers.

use std::sync::Arc;
use std::time::Instant;

use tracing::debug;
use veneer_core::WireValue;

use super::{bind_params, respond, with_cursor};
use crate::cursor::CursorState;
use crate::output::{AckResponse, ExecResponse, QueryResponse, RowResponse, Status};
use crate::registry::{Lookup, Resource, ResourceKind};
use crate::session::SessionContext;
use crate::{Error, Executor, Result};

/// Handle Exec command.
pub async fn exec(
    ex: &Executor,
    ctx: &SessionContext,
    sql: String,
    params: Vec<WireValue>,
    timeout_ms: Option<u64>,
) -> Result<ExecResponse> {
    let started = Instant::now();
    let engine = Arc::clone(ex.engine());
    let opts = ex.codec_options(ctx);
    let result = ex
        .blocking("Exec", timeout_ms, move || {
            let mut stmt = engine.prepare(&sql)?;
            bind_params(stmt.as_mut(), &params, &opts)?;
            let outcome = stmt.execute();
            let closed = stmt.close();
            let execution = outcome?;
            closed?;
            Ok(execution.rows_affected)
        })
        .await
        .map(|rows_affected| ExecResponse {
            status: Status::ok(started),
            rows_affected,
        });
    respond(started, result)
}

/// Handle Query command.
///
/// A statement without a result set succeeds with no handle.
pub async fn query(
    ex: &Executor,
    ctx: &SessionContext,
    sql: String,
    params: Vec<WireValue>,
    timeout_ms: Option<u64>,
) -> Result<QueryResponse> {
    let started = Instant::now();
    let engine = Arc::clone(ex.engine());
    let opts = ex.codec_options(ctx);
    let result = ex
        .blocking("Query", timeout_ms, move || {
            let mut stmt = engine.prepare(&sql)?;
            bind_params(stmt.as_mut(), &params, &opts)?;
            let execution = stmt.execute()?;
            if !execution.has_result_set {
                stmt.close()?;
                return Ok(None);
            }
            Ok(Some(CursorState::new(stmt)))
        })
        .await
        .map(|cursor| match cursor {
            Some(cursor) => {
                let columns = cursor.columns().to_vec();
                let handle = ex.registry().put(ctx.id(), Resource::Cursor(cursor));
                QueryResponse {
                    status: Status::ok(started),
                    handle: Some(handle.id().to_string()),
                    columns,
                }
            }
            None => QueryResponse {
                status: Status::ok(started),
                handle: None,
                columns: Vec::new(),
            },
        });
    respond(started, result)
}

/// Handle QueryRow command: query, one fetch, close. No handle is created.
pub async fn query_row(
    ex: &Executor,
    ctx: &SessionContext,
    sql: String,
    params: Vec<WireValue>,
    timeout_ms: Option<u64>,
) -> Result<RowResponse> {
    let started = Instant::now();
    let engine = Arc::clone(ex.engine());
    let opts = ex.codec_options(ctx);
    let result = ex
        .blocking("QueryRow", timeout_ms, move || {
            let mut stmt = engine.prepare(&sql)?;
            bind_params(stmt.as_mut(), &params, &opts)?;
            let execution = stmt.execute()?;
            if !execution.has_result_set {
                stmt.close()?;
                return Ok(None);
            }
            let mut cursor = CursorState::new(stmt);
            let row = cursor.next_row();
            cursor.close()?;
            row
        })
        .await
        .map(|row| row_response(started, row));
    respond(started, result)
}

/// Handle RowsNext command.
pub async fn rows_next(
    ex: &Executor,
    ctx: &SessionContext,
    handle: String,
    timeout_ms: Option<u64>,
) -> Result<RowResponse> {
    let started = Instant::now();
    let result = async {
        let handle = ex.registry().get(ctx.id(), &handle)?;
        handle.expect_kind(ResourceKind::Cursor)?;
        let row = ex
            .blocking("RowsNext", timeout_ms, move || {
                with_cursor(&handle, |cursor| cursor.next_row())
            })
            .await?;
        Ok(row_response(started, row))
    }
    .await;
    respond(started, result)
}

/// Handle RowsClose command.
///
/// Closing a handle that was already closed succeeds; an ID that was never
/// issued to this session is `HandleNotFound`.
pub async fn rows_close(
    ex: &Executor,
    ctx: &SessionContext,
    handle: String,
    timeout_ms: Option<u64>,
) -> Result<AckResponse> {
    let started = Instant::now();
    let result = async {
        match ex.registry().lookup(ctx.id(), &handle)? {
            Lookup::Live(live) => {
                live.expect_kind(ResourceKind::Cursor)?;
                let target = Arc::clone(&live);
                let closed = ex
                    .blocking("RowsClose", timeout_ms, move || {
                        with_cursor(&target, |cursor| {
                            let fetched = cursor.rows_fetched();
                            cursor.close().map(|_| fetched)
                        })
                    })
                    .await;
                if !matches!(closed, Err(Error::HandleBusy { .. }) | Err(Error::Timeout { .. })) {
                    ex.registry().remove(ctx.id(), live.id());
                }
                let fetched = closed?;
                debug!(handle = %live.id(), rows = fetched, "Cursor closed");
            }
            Lookup::Retired => debug!(handle = %handle, "Cursor already closed"),
            Lookup::Unknown => return Err(Error::HandleNotFound { handle }),
        }
        Ok(AckResponse {
            status: Status::ok(started),
        })
    }
    .await;
    respond(started, result)
}

fn row_response(started: Instant, row: Option<Vec<WireValue>>) -> RowResponse {
    RowResponse {
        status: Status::ok(started),
        has_row: row.is_some(),
        values: row.unwrap_or_default(),
    }
}
