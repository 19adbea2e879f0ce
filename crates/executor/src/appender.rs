//! Append sessions
//!
//! An append session bulk-loads rows into one log or tag table. It keeps
//! running success and failure counts; every call to
//! [`AppendState::append`] moves exactly one of them.
//!
//! ## Row shapes
//!
//! | Table | Values given | Row sent to the engine |
//! |-------|--------------|------------------------|
//! | Log | all columns | `[now, values...]` |
//! | Log | all columns + timestamp | `[timestamp, values...]` |
//! | Tag | all columns | `values` |
//! | Tag | all but time + timestamp | `[values[0], timestamp, values[1..]...]` |
//! | Tag | all but name and time | `[default name, now, values...]` |
//!
//! ## Error threshold
//!
//! With `error_check_count = N > 0`, after N consecutive failures every
//! further append fails fast with `AppendAborted` (still counted as a
//! failure) and is not sent to the engine.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use veneer_core::{
    decode, encode_with, CodecOptions, ColumnDescriptor, ColumnType, DisplayZone, NativeValue,
    TableKind, TimeFormat, DEFAULT_TIME_PATTERN,
};
use veneer_engine::{AppendSession, Engine, SYS_TABLES};

use crate::{Error, Result};

/// Per-session append settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppendOptions {
    /// Consecutive failures after which the session fails fast. 0 disables.
    pub error_check_count: u32,
    /// Format of timestamp values passed in rows or as explicit timestamps.
    pub time_format: TimeFormat,
    /// Zone for pattern-formatted timestamps.
    pub zone: DisplayZone,
    /// Name used for tag-table rows that omit name and time.
    pub default_tag_name: Option<String>,
}

impl Default for AppendOptions {
    fn default() -> Self {
        AppendOptions {
            error_check_count: 0,
            time_format: TimeFormat::Pattern(DEFAULT_TIME_PATTERN.to_string()),
            zone: DisplayZone::Utc,
            default_tag_name: None,
        }
    }
}

/// Running counts of an append session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AppendCounts {
    /// Rows accepted
    pub success: u64,
    /// Rows rejected, including fail-fast rejections
    pub fail: u64,
}

/// State of one append session.
pub struct AppendState {
    table: String,
    kind: TableKind,
    session: Box<dyn AppendSession>,
    columns: Vec<ColumnDescriptor>,
    options: AppendOptions,
    codec: CodecOptions,
    counts: AppendCounts,
    consecutive_failures: u32,
    closed: bool,
}

impl std::fmt::Debug for AppendState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppendState")
            .field("table", &self.table)
            .field("kind", &self.kind)
            .field("counts", &self.counts)
            .field("closed", &self.closed)
            .finish()
    }
}

/// Resolve the kind of `table` through the metadata table.
///
/// Returns `None` if the table does not exist.
pub fn table_kind(engine: &dyn Engine, table: &str) -> Result<Option<TableKind>> {
    let mut stmt = engine.prepare(&format!("select type from {} where name = ?", SYS_TABLES))?;
    stmt.bind(0, NativeValue::Str(table.to_string()))?;
    stmt.execute()?;
    let row = stmt.fetch()?;
    stmt.close()?;
    let code = match row.as_ref().and_then(|r| r.first()) {
        Some(NativeValue::Int16(v)) => i64::from(*v),
        Some(NativeValue::Int32(v)) => i64::from(*v),
        Some(NativeValue::Int64(v)) => *v,
        None => return Ok(None),
        Some(other) => {
            return Err(Error::Internal {
                reason: format!("{} returned a {} table type", SYS_TABLES, other.type_name()),
            })
        }
    };
    TableKind::from_code(code).map(Some).ok_or_else(|| Error::Internal {
        reason: format!("unknown table type {} for '{}'", code, table),
    })
}

impl AppendState {
    /// Open an append session on `table` (case-insensitive).
    ///
    /// # Errors
    ///
    /// `TableNotFound` if the table does not exist, `NotAppendable` unless it
    /// is a log or tag table.
    pub fn open(engine: &dyn Engine, table: &str, options: AppendOptions) -> Result<Self> {
        let table = table.to_ascii_uppercase();
        let kind = table_kind(engine, &table)?.ok_or_else(|| Error::TableNotFound {
            table: table.clone(),
        })?;
        if !kind.is_appendable() {
            return Err(Error::NotAppendable {
                table,
                kind: kind.to_string(),
            });
        }

        let session = engine.open_appender(&table)?;
        let mut columns = session.columns().to_vec();
        if kind == TableKind::Log && !columns.is_empty() {
            // leading arrival-time pseudo-column
            columns.remove(0);
        }
        let codec = CodecOptions::new(options.time_format.clone(), options.zone);
        debug!(table = %table, %kind, columns = columns.len(), "Append session opened");
        Ok(AppendState {
            table,
            kind,
            session,
            columns,
            options,
            codec,
            counts: AppendCounts::default(),
            consecutive_failures: 0,
            closed: false,
        })
    }

    /// Upper-cased table name.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Table kind.
    pub fn kind(&self) -> TableKind {
        self.kind
    }

    /// Caller-visible columns.
    pub fn columns(&self) -> &[ColumnDescriptor] {
        &self.columns
    }

    /// Counts so far.
    pub fn counts(&self) -> AppendCounts {
        self.counts
    }

    /// Whether `close` has been called.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Whether the failure threshold has been reached.
    pub fn is_aborted(&self) -> bool {
        let threshold = self.options.error_check_count;
        threshold > 0 && self.consecutive_failures >= threshold
    }

    /// Append one row, optionally with an explicit timestamp.
    pub fn append(&mut self, values: Vec<NativeValue>, timestamp: Option<NativeValue>) -> Result<()> {
        if self.closed {
            return Err(Error::InvalidInput {
                reason: format!("append session on '{}' is closed", self.table),
            });
        }
        if self.is_aborted() {
            self.counts.fail += 1;
            return Err(self.aborted());
        }
        match self.dispatch(values, timestamp) {
            Ok(()) => {
                self.counts.success += 1;
                self.consecutive_failures = 0;
                Ok(())
            }
            Err(e) => {
                self.counts.fail += 1;
                self.consecutive_failures += 1;
                if self.is_aborted() {
                    warn!(
                        table = %self.table,
                        success = self.counts.success,
                        fail = self.counts.fail,
                        "Append error threshold reached; failing fast"
                    );
                }
                Err(e)
            }
        }
    }

    /// Commit buffered rows.
    pub fn flush(&mut self) -> Result<()> {
        if self.closed {
            return Err(Error::InvalidInput {
                reason: format!("append session on '{}' is closed", self.table),
            });
        }
        self.session.flush()?;
        Ok(())
    }

    /// Flush, release the engine session and return the final counts.
    ///
    /// Idempotent: later calls return the same counts without touching the
    /// engine.
    pub fn close(&mut self) -> Result<AppendCounts> {
        if self.closed {
            return Ok(self.counts);
        }
        self.closed = true;
        self.session.close()?;
        info!(
            table = %self.table,
            success = self.counts.success,
            fail = self.counts.fail,
            "Append session closed"
        );
        Ok(self.counts)
    }

    fn aborted(&self) -> Error {
        Error::AppendAborted {
            table: self.table.clone(),
            success: self.counts.success,
            fail: self.counts.fail,
            threshold: self.options.error_check_count,
        }
    }

    fn dispatch(&mut self, values: Vec<NativeValue>, timestamp: Option<NativeValue>) -> Result<()> {
        let (arrival, row) = self.shape(values, timestamp)?;
        let mut natives = Vec::with_capacity(row.len() + 1);
        if self.kind == TableKind::Log {
            let arrival = arrival.unwrap_or_else(|| NativeValue::Time(Utc::now()));
            natives.push(self.bind(ColumnType::DateTime, arrival)?);
        }
        for (column, value) in self.columns.iter().zip(row) {
            natives.push(self.bind(column.column_type, value)?);
        }
        self.session.append(natives)?;
        Ok(())
    }

    fn bind(&self, column: ColumnType, value: NativeValue) -> Result<NativeValue> {
        let wire = encode_with(column, value, &self.codec)?;
        Ok(decode(&wire, column)?)
    }

    fn count_error(&self, given: usize) -> Error {
        Error::InvalidInput {
            reason: format!(
                "value count {}, table '{}' requires {} columns for appending",
                given,
                self.table,
                self.columns.len()
            ),
        }
    }

    /// Split a caller row into the log arrival time and the positional values.
    fn shape(
        &self,
        mut values: Vec<NativeValue>,
        timestamp: Option<NativeValue>,
    ) -> Result<(Option<NativeValue>, Vec<NativeValue>)> {
        let width = self.columns.len();
        if self.kind == TableKind::Log {
            if values.len() != width {
                return Err(self.count_error(values.len()));
            }
            return Ok((timestamp, values));
        }
        match timestamp {
            Some(ts) if !values.is_empty() && values.len() + 1 == width => {
                values.insert(1, ts);
                Ok((None, values))
            }
            Some(_) => Err(self.count_error(values.len() + 1)),
            None if values.len() == width => Ok((None, values)),
            None if values.len() + 2 == width => match &self.options.default_tag_name {
                Some(name) => {
                    let mut row = Vec::with_capacity(width);
                    row.push(NativeValue::Str(name.clone()));
                    row.push(NativeValue::Time(Utc::now()));
                    row.extend(values);
                    Ok((None, row))
                }
                None => Err(self.count_error(values.len())),
            },
            None => Err(self.count_error(values.len())),
        }
    }
}
