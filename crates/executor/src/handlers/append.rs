//! Append command handlers.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc;
use tracing::{debug, warn};
use veneer_core::{to_native, TimeFormat, WireValue};

use super::{respond, with_appender};
use crate::appender::{AppendCounts, AppendState};
use crate::output::{AckResponse, AppendOpenResponse, AppendResponse, Response, Status};
use crate::registry::{Resource, ResourceKind};
use crate::session::SessionContext;
use crate::{Executor, Result};

/// Handle AppendOpen command.
pub async fn append_open(
    ex: &Executor,
    ctx: &SessionContext,
    table: String,
    error_check_count: Option<u32>,
    time_format: Option<TimeFormat>,
    timeout_ms: Option<u64>,
) -> Result<AppendOpenResponse> {
    let started = Instant::now();
    let mut options = ex.config().append_options();
    if let Some(count) = error_check_count {
        options.error_check_count = count;
    }
    if let Some(format) = time_format {
        options.time_format = format;
    }
    if let Some(zone) = ctx.time_zone() {
        options.zone = zone;
    }
    let engine = Arc::clone(ex.engine());
    let result = ex
        .blocking("AppendOpen", timeout_ms, move || {
            AppendState::open(engine.as_ref(), &table, options)
        })
        .await
        .map(|state| {
            let mut response = AppendOpenResponse {
                status: Status::ok(started),
                handle: None,
                table: state.table().to_string(),
                kind: Some(state.kind()),
                columns: state.columns().to_vec(),
            };
            let handle = ex.registry().put(ctx.id(), Resource::Appender(state));
            response.handle = Some(handle.id().to_string());
            response
        });
    respond(started, result)
}

/// Handle Append command.
///
/// The response carries the running counts whether or not this row was
/// accepted.
pub async fn append(
    ex: &Executor,
    ctx: &SessionContext,
    handle: String,
    values: Vec<WireValue>,
    timestamp: Option<WireValue>,
    timeout_ms: Option<u64>,
) -> Result<AppendResponse> {
    let started = Instant::now();
    let result = async {
        let handle = ex.registry().get(ctx.id(), &handle)?;
        handle.expect_kind(ResourceKind::Appender)?;
        let (outcome, counts) = ex
            .blocking("Append", timeout_ms, move || {
                with_appender(&handle, |state| {
                    let natives = values.iter().map(to_native).collect();
                    let outcome = state.append(natives, timestamp.as_ref().map(to_native));
                    Ok((outcome, state.counts()))
                })
            })
            .await?;
        Ok(counted(started, outcome, counts))
    }
    .await;
    respond(started, result)
}

/// Handle AppendFlush command.
pub async fn append_flush(
    ex: &Executor,
    ctx: &SessionContext,
    handle: String,
    timeout_ms: Option<u64>,
) -> Result<AckResponse> {
    let started = Instant::now();
    let result = async {
        let handle = ex.registry().get(ctx.id(), &handle)?;
        handle.expect_kind(ResourceKind::Appender)?;
        ex.blocking("AppendFlush", timeout_ms, move || {
            with_appender(&handle, |state| state.flush())
        })
        .await?;
        Ok(AckResponse {
            status: Status::ok(started),
        })
    }
    .await;
    respond(started, result)
}

/// Handle AppendClose command.
///
/// The handle stays registered until session end, so a repeated close
/// returns the same final counts.
pub async fn append_close(
    ex: &Executor,
    ctx: &SessionContext,
    handle: String,
    timeout_ms: Option<u64>,
) -> Result<AppendResponse> {
    let started = Instant::now();
    let result = async {
        let handle = ex.registry().get(ctx.id(), &handle)?;
        handle.expect_kind(ResourceKind::Appender)?;
        let (outcome, counts) = ex
            .blocking("AppendClose", timeout_ms, move || {
                with_appender(&handle, |state| {
                    let outcome = state.close().map(|_| ());
                    Ok((outcome, state.counts()))
                })
            })
            .await?;
        Ok(counted(started, outcome, counts))
    }
    .await;
    respond(started, result)
}

/// Open an append session, append every received row, then close it.
///
/// Rows that fail are counted and skipped. Once the session fails fast the
/// rest of the stream is discarded and the close response carries the
/// `AppendAborted` status.
pub async fn append_stream(
    ex: &Executor,
    ctx: &SessionContext,
    table: String,
    error_check_count: Option<u32>,
    mut rows: mpsc::Receiver<Vec<WireValue>>,
) -> Result<AppendResponse> {
    let opened = append_open(ex, ctx, table, error_check_count, None, None).await?;
    let id = match opened.handle {
        Some(id) if opened.status.success => id,
        _ => return Ok(AppendResponse::from_failure(opened.status)),
    };

    let mut aborted = None;
    while let Some(values) = rows.recv().await {
        let response = append(ex, ctx, id.clone(), values, None, None).await?;
        if response.status.code.as_deref() == Some("AppendAborted") {
            warn!(handle = %id, "Append stream aborted");
            aborted = Some(response.status);
            rows.close();
            break;
        }
    }

    let mut closed = append_close(ex, ctx, id.clone(), None).await?;
    if let Some(handle) = ex.registry().remove(ctx.id(), &id) {
        debug!(handle = %handle.id(), "Append stream handle retired");
    }
    if let Some(status) = aborted {
        closed.status = status;
    }
    Ok(closed)
}

fn counted(started: Instant, outcome: Result<()>, counts: AppendCounts) -> AppendResponse {
    let status = match outcome {
        Ok(()) => Status::ok(started),
        Err(e) => {
            debug!(code = e.code(), error = %e, "Append failed");
            Status::failed(&e, started)
        }
    };
    AppendResponse {
        status,
        success_count: counts.success,
        fail_count: counts.fail,
    }
}
