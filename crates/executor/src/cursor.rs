//! Cursor state behind a query handle.

use tracing::warn;
use veneer_core::{encode, ColumnDescriptor, Row};
use veneer_engine::Statement;

use crate::Result;

/// An executed statement with an open result set.
pub struct CursorState {
    stmt: Box<dyn Statement>,
    columns: Vec<ColumnDescriptor>,
    exhausted: bool,
    closed: bool,
    rows_fetched: u64,
}

impl CursorState {
    /// Wrap an executed statement. Column descriptors are captured once.
    pub fn new(stmt: Box<dyn Statement>) -> Self {
        let columns = stmt.columns().to_vec();
        CursorState {
            stmt,
            columns,
            exhausted: false,
            closed: false,
            rows_fetched: 0,
        }
    }

    /// Result-set columns.
    pub fn columns(&self) -> &[ColumnDescriptor] {
        &self.columns
    }

    /// Whether the engine has reported the end of the result set.
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Rows returned so far.
    pub fn rows_fetched(&self) -> u64 {
        self.rows_fetched
    }

    /// Pull one row and encode it against the column descriptors.
    ///
    /// Returns `None` once exhausted, without consulting the engine again.
    pub fn next_row(&mut self) -> Result<Option<Row>> {
        if self.exhausted {
            return Ok(None);
        }
        let natives = match self.stmt.fetch()? {
            Some(natives) => natives,
            None => {
                self.exhausted = true;
                return Ok(None);
            }
        };
        let row = self
            .columns
            .iter()
            .zip(natives)
            .map(|(column, value)| encode(column.column_type, value))
            .collect::<veneer_core::Result<Row>>()?;
        self.rows_fetched += 1;
        Ok(Some(row))
    }

    /// Release the engine cursor. Further calls are no-ops.
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.exhausted = true;
        self.stmt.close()?;
        Ok(())
    }
}

impl Drop for CursorState {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!(rows = self.rows_fetched, error = %e, "Error closing abandoned cursor");
        }
    }
}
