//! Command handlers organized by resource.
//!
//! | Module | Commands |
//! |--------|----------|
//! | `cursor` | Exec, Query, QueryRow, RowsNext, RowsClose |
//! | `append` | AppendOpen, Append, AppendFlush, AppendClose, append streams |

pub mod append;
pub mod cursor;

use std::time::Instant;

use tracing::debug;
use veneer_core::{coerce, CodecOptions, ColumnType, WireValue};
use veneer_engine::Statement;

use crate::appender::AppendState;
use crate::cursor::CursorState;
use crate::output::{Response, Status};
use crate::registry::{Handle, Resource};
use crate::{Error, Result};

/// Turn an operation failure into a failed response. Transport faults pass
/// through as `Err`.
pub(crate) fn respond<R: Response>(started: Instant, result: Result<R>) -> Result<R> {
    match result {
        Ok(response) => Ok(response),
        Err(e) if e.is_transport_fault() => Err(e),
        Err(e) => {
            debug!(code = e.code(), error = %e, "Operation failed");
            Ok(R::from_failure(Status::failed(&e, started)))
        }
    }
}

/// Check the parameter count and bind each value, coerced to its declared
/// type.
pub(crate) fn bind_params(
    stmt: &mut dyn Statement,
    params: &[WireValue],
    opts: &CodecOptions,
) -> Result<()> {
    let types: Vec<ColumnType> = stmt.params().iter().map(|p| p.column_type).collect();
    if types.len() != params.len() {
        return Err(Error::ParamCountMismatch {
            expected: types.len(),
            actual: params.len(),
        });
    }
    for (index, (value, column)) in params.iter().zip(types).enumerate() {
        let native = coerce(value, column, opts)?;
        stmt.bind(index, native)?;
    }
    Ok(())
}

pub(crate) fn with_cursor<T>(
    handle: &Handle,
    f: impl FnOnce(&mut CursorState) -> Result<T>,
) -> Result<T> {
    handle.with(|resource| match resource {
        Resource::Cursor(cursor) => f(cursor),
        Resource::Appender(_) => Err(Error::Internal {
            reason: format!("cursor handle '{}' holds an appender", handle.id()),
        }),
    })
}

pub(crate) fn with_appender<T>(
    handle: &Handle,
    f: impl FnOnce(&mut AppendState) -> Result<T>,
) -> Result<T> {
    handle.with(|resource| match resource {
        Resource::Appender(state) => f(state),
        Resource::Cursor(_) => Err(Error::Internal {
            reason: format!("appender handle '{}' holds a cursor", handle.id()),
        }),
    })
}
