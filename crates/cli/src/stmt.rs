//! Statements, result rows and the Allocate → Prepare → Bind → Execute →
//! Fetch → GetData → Free lifecycle.

use std::sync::Arc;

use tracing::debug;
use veneer_core::{decode_into, CodecOptions, ColumnDescriptor, ColumnType, FromWire, NativeValue, Row};
use veneer_engine::{Engine, Statement};
use veneer_executor::{CursorState, Error, Result};

use crate::ctype::{read_param, to_param, write_value, CType};

enum StmtState {
    Allocated,
    Prepared(Box<dyn Statement>),
    Executed(CursorState),
}

/// A statement handle.
///
/// Dropping an executed statement releases its engine cursor.
pub struct CliStmt {
    engine: Arc<dyn Engine>,
    codec: CodecOptions,
    state: StmtState,
    row: Option<Row>,
}

impl CliStmt {
    pub(crate) fn new(engine: Arc<dyn Engine>, codec: CodecOptions) -> Self {
        CliStmt {
            engine,
            codec,
            state: StmtState::Allocated,
            row: None,
        }
    }

    /// Prepare `sql`, releasing whatever the handle held before.
    pub fn prepare(&mut self, sql: &str) -> Result<()> {
        self.release()?;
        let stmt = self.engine.prepare(sql)?;
        debug!(params = stmt.params().len(), "Statement prepared");
        self.state = StmtState::Prepared(stmt);
        Ok(())
    }

    /// Number of `?` parameters.
    pub fn num_params(&self) -> Result<usize> {
        Ok(self.prepared()?.params().len())
    }

    /// Descriptor of parameter `index` (zero-based).
    pub fn describe_param(&self, index: usize) -> Result<&ColumnDescriptor> {
        let params = self.prepared()?.params();
        params.get(index).ok_or_else(|| out_of_range("parameter", index, params.len()))
    }

    /// Bind parameter `index` from a raw buffer.
    ///
    /// `sql_type` describes how the buffer is read; the value is then
    /// converted to the parameter's declared type. `None` binds null.
    pub fn bind_param(
        &mut self,
        index: usize,
        ctype: CType,
        sql_type: ColumnType,
        data: Option<&[u8]>,
    ) -> Result<()> {
        let declared = self.describe_param(index)?.column_type;
        let value = read_param(ctype, sql_type, data)?;
        let value = to_param(declared, value, &self.codec)?;
        self.prepared_mut()?.bind(index, value)?;
        Ok(())
    }

    /// Bind every parameter from native values.
    ///
    /// # Errors
    ///
    /// `ParamCountMismatch` unless exactly one value is given per parameter.
    pub fn bind_params(&mut self, values: Vec<NativeValue>) -> Result<()> {
        let params = self.prepared()?.params().to_vec();
        if values.len() != params.len() {
            return Err(Error::ParamCountMismatch {
                expected: params.len(),
                actual: values.len(),
            });
        }
        let codec = self.codec.clone();
        let stmt = self.prepared_mut()?;
        for (index, (param, value)) in params.iter().zip(values).enumerate() {
            let value = to_param(param.column_type, value, &codec)?;
            stmt.bind(index, value)?;
        }
        Ok(())
    }

    /// Execute the prepared statement. Returns the rows affected.
    pub fn execute(&mut self) -> Result<u64> {
        let mut stmt = match std::mem::replace(&mut self.state, StmtState::Allocated) {
            StmtState::Prepared(stmt) => stmt,
            other => {
                self.state = other;
                return Err(not_prepared());
            }
        };
        let execution = match stmt.execute() {
            Ok(execution) => execution,
            Err(e) => {
                self.state = StmtState::Prepared(stmt);
                return Err(e.into());
            }
        };
        debug!(
            rows_affected = execution.rows_affected,
            has_result_set = execution.has_result_set,
            "Statement executed"
        );
        self.state = StmtState::Executed(CursorState::new(stmt));
        Ok(execution.rows_affected)
    }

    /// Prepare and execute `sql` without parameters.
    pub fn exec_direct(&mut self, sql: &str) -> Result<u64> {
        self.prepare(sql)?;
        self.execute()
    }

    /// Number of result-set columns; 0 for non-queries.
    pub fn num_result_cols(&self) -> Result<usize> {
        Ok(self.cursor()?.columns().len())
    }

    /// Descriptor of result column `index` (zero-based).
    pub fn describe_col(&self, index: usize) -> Result<&ColumnDescriptor> {
        let columns = self.cursor()?.columns();
        columns.get(index).ok_or_else(|| out_of_range("column", index, columns.len()))
    }

    /// Result-set columns.
    pub fn columns(&self) -> Result<&[ColumnDescriptor]> {
        Ok(self.cursor()?.columns())
    }

    /// Advance to the next row. Returns `false` at the end of the result.
    pub fn fetch(&mut self) -> Result<bool> {
        let cursor = match &mut self.state {
            StmtState::Executed(cursor) => cursor,
            _ => return Err(not_executed()),
        };
        self.row = if cursor.columns().is_empty() {
            None
        } else {
            cursor.next_row()?
        };
        Ok(self.row.is_some())
    }

    /// Current row, after a successful [`CliStmt::fetch`].
    pub fn row(&self) -> Option<&Row> {
        self.row.as_ref()
    }

    /// Copy column `index` of the current row into `buf`.
    ///
    /// Returns the number of bytes written, or `None` for null.
    ///
    /// # Errors
    ///
    /// `BufferTooSmall` if the value does not fit; the buffer is left as it
    /// was.
    pub fn get_data(&self, index: usize, ctype: CType, buf: &mut [u8]) -> Result<Option<usize>> {
        let row = self.row.as_ref().ok_or_else(|| Error::InvalidInput {
            reason: "no current row; call fetch first".to_string(),
        })?;
        let value = row.get(index).ok_or_else(|| out_of_range("column", index, row.len()))?;
        write_value(value, ctype, buf, &self.codec)
    }

    /// Release the statement.
    pub fn free(mut self) -> Result<()> {
        self.release()
    }

    fn release(&mut self) -> Result<()> {
        self.row = None;
        match std::mem::replace(&mut self.state, StmtState::Allocated) {
            StmtState::Allocated => Ok(()),
            StmtState::Prepared(mut stmt) => Ok(stmt.close()?),
            StmtState::Executed(mut cursor) => cursor.close(),
        }
    }

    fn prepared(&self) -> Result<&dyn Statement> {
        match &self.state {
            StmtState::Prepared(stmt) => Ok(&**stmt),
            _ => Err(not_prepared()),
        }
    }

    fn prepared_mut(&mut self) -> Result<&mut Box<dyn Statement>> {
        match &mut self.state {
            StmtState::Prepared(stmt) => Ok(stmt),
            _ => Err(not_prepared()),
        }
    }

    fn cursor(&self) -> Result<&CursorState> {
        match &self.state {
            StmtState::Executed(cursor) => Ok(cursor),
            _ => Err(not_executed()),
        }
    }
}

impl Drop for CliStmt {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            debug!(error = %e, "Statement release failed on drop");
        }
    }
}

fn not_prepared() -> Error {
    Error::InvalidInput {
        reason: "statement is not prepared".to_string(),
    }
}

fn not_executed() -> Error {
    Error::InvalidInput {
        reason: "statement has not been executed".to_string(),
    }
}

fn out_of_range(what: &str, index: usize, len: usize) -> Error {
    Error::InvalidInput {
        reason: format!("{} index {} out of range ({} available)", what, index, len),
    }
}

// ============================================================================
// Rows
// ============================================================================

/// An open result set.
pub struct CliRows {
    stmt: CliStmt,
}

impl CliRows {
    pub(crate) fn new(stmt: CliStmt) -> Self {
        CliRows { stmt }
    }

    /// Result-set columns.
    pub fn columns(&self) -> &[ColumnDescriptor] {
        self.stmt.columns().unwrap_or(&[])
    }

    /// Fetch the next row, `None` at the end.
    pub fn next_row(&mut self) -> Result<Option<CliRow>> {
        if !self.stmt.fetch()? {
            return Ok(None);
        }
        let values = self.stmt.row.take().unwrap_or_default();
        Ok(Some(CliRow::new(values, self.stmt.codec.clone())))
    }

    /// Release the result set.
    pub fn close(self) -> Result<()> {
        self.stmt.free()
    }
}

/// One fetched row.
#[derive(Debug, Clone, PartialEq)]
pub struct CliRow {
    values: Row,
    codec: CodecOptions,
}

impl CliRow {
    pub(crate) fn new(values: Row, codec: CodecOptions) -> Self {
        CliRow { values, codec }
    }

    /// Wire values in column order.
    pub fn values(&self) -> &Row {
        &self.values
    }

    /// Number of columns.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the row has no columns.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Whether column `index` is null. Out-of-range columns are not null.
    pub fn is_null(&self, index: usize) -> bool {
        self.values.get(index).map_or(false, |v| v.is_null())
    }

    /// Convert column `index` into a caller-chosen type.
    ///
    /// Datetimes follow the connection's time format: integer targets get
    /// the configured unit and string targets the configured pattern.
    pub fn get<T: FromWire>(&self, index: usize) -> Result<T> {
        let value = self
            .values
            .get(index)
            .ok_or_else(|| out_of_range("column", index, self.values.len()))?;
        Ok(decode_into(value, &self.codec)?)
    }
}
