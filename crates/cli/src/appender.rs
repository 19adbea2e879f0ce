//! Appender handle: AppendOpen / AppendData / AppendFlush / AppendClose.

use tracing::warn;
use veneer_core::{ColumnDescriptor, NativeValue, TableKind};
use veneer_engine::Engine;
use veneer_executor::{AppendCounts, AppendOptions, AppendState, Result};

/// A bulk-append session on one log or tag table.
///
/// Dropping an open appender closes it.
#[derive(Debug)]
pub struct CliAppender {
    state: AppendState,
}

impl CliAppender {
    pub(crate) fn open(engine: &dyn Engine, table: &str, options: AppendOptions) -> Result<Self> {
        Ok(CliAppender {
            state: AppendState::open(engine, table, options)?,
        })
    }

    /// Upper-cased table name.
    pub fn table(&self) -> &str {
        self.state.table()
    }

    /// Table kind.
    pub fn kind(&self) -> TableKind {
        self.state.kind()
    }

    /// Columns a row supplies, in order. Log tables omit the arrival time.
    pub fn columns(&self) -> &[ColumnDescriptor] {
        self.state.columns()
    }

    /// Append one row.
    pub fn append(&mut self, values: Vec<NativeValue>) -> Result<()> {
        self.state.append(values, None)
    }

    /// Append one row with an explicit timestamp (tag time or log arrival
    /// time).
    pub fn append_with_timestamp(&mut self, values: Vec<NativeValue>, timestamp: NativeValue) -> Result<()> {
        self.state.append(values, Some(timestamp))
    }

    /// Commit buffered rows.
    pub fn flush(&mut self) -> Result<()> {
        self.state.flush()
    }

    /// Counts so far.
    pub fn counts(&self) -> AppendCounts {
        self.state.counts()
    }

    /// Close the session and return `(success, fail)`.
    pub fn close(&mut self) -> Result<(u64, u64)> {
        let counts = self.state.close()?;
        Ok((counts.success, counts.fail))
    }
}

impl Drop for CliAppender {
    fn drop(&mut self) {
        if self.state.is_closed() {
            return;
        }
        if let Err(e) = self.state.close() {
            warn!(table = %self.state.table(), error = %e, "Appender close failed on drop");
        }
    }
}
