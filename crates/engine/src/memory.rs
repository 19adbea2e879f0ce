//! In-memory reference engine
//!
//! ## Design
//!
//! `MemoryEngine` keeps a catalog of tables behind a `parking_lot::RwLock`.
//! Each table stores its rows as column-tagged [`Row`]s. Statements resolve
//! table and column names at prepare time, so parameter types are known
//! before binding, and take a snapshot of matching rows at execute time.
//!
//! ## Table Kinds
//!
//! - Log tables carry a hidden leading `_ARRIVAL_TIME` column, filled with
//!   the current time when not supplied. It is excluded from `SELECT *` and
//!   exposed to append sessions.
//! - Tag tables must lead with a string name column and a datetime column.
//! - `M$SYS_TABLES` is a read-only virtual table with `NAME` and `TYPE`.

use chrono::Utc;
use parking_lot::RwLock;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

use veneer_core::{
    encode, encode_with, time, to_native, versioned_ip, CodecOptions, ColumnDescriptor,
    ColumnType, NativeValue, Row, TableKind, TimeFormat, WireValue, DEFAULT_TIME_PATTERN,
};

use crate::error::{EngineError, Result};
use crate::sql::{self, CompareOp, Condition, Literal, Operand, Projection, SqlStatement};
use crate::traits::{AppendSession, Engine, Execution, Statement};

/// Name of the metadata table listing every user table and its kind.
pub const SYS_TABLES: &str = "M$SYS_TABLES";

/// Name of the hidden arrival-time column of log tables.
pub const ARRIVAL_TIME_COLUMN: &str = "_ARRIVAL_TIME";

/// Memory engine settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryEngineConfig {
    /// Buffered append rows that trigger an automatic commit (0 = only on
    /// flush or close)
    pub append_batch_size: usize,
}

impl Default for MemoryEngineConfig {
    fn default() -> Self {
        MemoryEngineConfig {
            append_batch_size: 512,
        }
    }
}

struct Table {
    name: String,
    kind: TableKind,
    columns: Vec<ColumnDescriptor>,
    /// Number of leading hidden columns
    hidden: usize,
    rows: RwLock<Vec<Row>>,
}

impl Table {
    fn column_index(&self, column: &str) -> Result<usize> {
        self.columns
            .iter()
            .position(|c| c.name == column)
            .ok_or_else(|| EngineError::column_not_found(&self.name, column))
    }

    fn visible(&self) -> std::ops::Range<usize> {
        self.hidden..self.columns.len()
    }
}

#[derive(Default)]
struct Catalog {
    tables: RwLock<BTreeMap<String, Arc<Table>>>,
}

impl Catalog {
    fn table(&self, name: &str) -> Result<Arc<Table>> {
        self.tables
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| EngineError::table_not_found(name))
    }
}

/// In-memory engine for the supported SQL subset.
///
/// Cloning is cheap; clones share the same catalog.
#[derive(Clone, Default)]
pub struct MemoryEngine {
    catalog: Arc<Catalog>,
    config: MemoryEngineConfig,
}

impl MemoryEngine {
    /// Create an empty engine with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty engine with the given settings.
    pub fn with_config(config: MemoryEngineConfig) -> Self {
        MemoryEngine {
            catalog: Arc::default(),
            config,
        }
    }

    /// Committed row count of a table, `None` if it does not exist.
    pub fn row_count(&self, table: &str) -> Option<usize> {
        self.catalog
            .table(&table.to_ascii_uppercase())
            .ok()
            .map(|t| t.rows.read().len())
    }
}

impl Engine for MemoryEngine {
    fn prepare(&self, sql: &str) -> Result<Box<dyn Statement>> {
        let parsed = sql::parse(sql)?;
        let stmt = MemoryStatement::plan(Arc::clone(&self.catalog), parsed)?;
        Ok(Box::new(stmt))
    }

    fn open_appender(&self, table: &str) -> Result<Box<dyn AppendSession>> {
        let table = self.catalog.table(&table.to_ascii_uppercase())?;
        if !table.kind.is_appendable() {
            return Err(EngineError::new(
                EngineError::NOT_APPENDABLE,
                format!("{} is not appendable table", table.name),
            ));
        }
        debug!(table = %table.name, kind = %table.kind, "append session opened");
        Ok(Box::new(MemoryAppender {
            table,
            buffer: Vec::new(),
            batch_size: self.config.append_batch_size,
            closed: false,
        }))
    }
}

// ============================================================================
// Statements
// ============================================================================

enum Source {
    Table(Arc<Table>),
    SysTables,
}

impl Source {
    fn columns(&self) -> Vec<ColumnDescriptor> {
        match self {
            Source::Table(t) => t.columns.clone(),
            Source::SysTables => sys_tables_columns(),
        }
    }

    fn hidden(&self) -> usize {
        match self {
            Source::Table(t) => t.hidden,
            Source::SysTables => 0,
        }
    }
}

fn sys_tables_columns() -> Vec<ColumnDescriptor> {
    vec![
        ColumnDescriptor::sized("NAME", ColumnType::String, 100),
        ColumnDescriptor::new("TYPE", ColumnType::Int32),
    ]
}

struct Filter {
    column: usize,
    column_type: ColumnType,
    op: CompareOp,
    operand: Operand,
}

enum Plan {
    Create {
        name: String,
        kind: TableKind,
        columns: Vec<ColumnDescriptor>,
    },
    Drop {
        name: String,
    },
    Insert {
        table: Arc<Table>,
        targets: Vec<usize>,
        values: Vec<Operand>,
    },
    Select {
        source: Source,
        projection: Vec<usize>,
        filter: Vec<Filter>,
        order_by: Option<(usize, bool)>,
        limit: Option<Operand>,
    },
    Delete {
        table: Arc<Table>,
        filter: Vec<Filter>,
    },
}

struct MemoryStatement {
    catalog: Arc<Catalog>,
    plan: Plan,
    params: Vec<ColumnDescriptor>,
    bound: Vec<Option<WireValue>>,
    columns: Vec<ColumnDescriptor>,
    results: Option<std::vec::IntoIter<Row>>,
}

impl MemoryStatement {
    fn plan(catalog: Arc<Catalog>, parsed: SqlStatement) -> Result<Self> {
        let mut params: BTreeMap<usize, ColumnDescriptor> = BTreeMap::new();
        let mut columns = Vec::new();

        let plan = match parsed {
            SqlStatement::CreateTable { name, kind, columns: defs } => {
                let mut descs: Vec<ColumnDescriptor> = Vec::with_capacity(defs.len() + 1);
                if kind == TableKind::Log {
                    descs.push(ColumnDescriptor::new(ARRIVAL_TIME_COLUMN, ColumnType::DateTime));
                }
                for def in defs {
                    if descs.iter().any(|d| d.name == def.name) {
                        return Err(EngineError::syntax(format!("duplicate column '{}'", def.name)));
                    }
                    descs.push(ColumnDescriptor::sized(def.name, def.column_type, def.size));
                }
                if kind == TableKind::Tag
                    && (descs.len() < 2
                        || descs[0].column_type != ColumnType::String
                        || descs[1].column_type != ColumnType::DateTime)
                {
                    return Err(EngineError::syntax(
                        "tag table requires a leading name (varchar) and time (datetime) column",
                    ));
                }
                Plan::Create {
                    name,
                    kind,
                    columns: descs,
                }
            }
            SqlStatement::DropTable { name } => Plan::Drop { name },
            SqlStatement::Insert {
                table,
                columns: target_names,
                values,
            } => {
                let table = catalog.table(&table)?;
                let targets: Vec<usize> = match target_names {
                    Some(names) => names
                        .iter()
                        .map(|n| table.column_index(n))
                        .collect::<Result<_>>()?,
                    None => table.visible().collect(),
                };
                if targets.len() != values.len() {
                    return Err(EngineError::new(
                        EngineError::COLUMN_COUNT,
                        format!(
                            "value count {}, table '{}' requires {} columns",
                            values.len(),
                            table.name,
                            targets.len()
                        ),
                    ));
                }
                for (target, value) in targets.iter().zip(&values) {
                    if let Operand::Param(i) = value {
                        params.insert(*i, table.columns[*target].clone());
                    }
                }
                Plan::Insert {
                    table,
                    targets,
                    values,
                }
            }
            SqlStatement::Select {
                projection,
                table,
                filter,
                order_by,
                limit,
            } => {
                let source = if table == SYS_TABLES {
                    Source::SysTables
                } else {
                    Source::Table(catalog.table(&table)?)
                };
                let all = source.columns();
                let index_of = |name: &str| {
                    all.iter()
                        .position(|c| c.name == name)
                        .ok_or_else(|| EngineError::column_not_found(&table, name))
                };
                let projection: Vec<usize> = match projection {
                    Projection::All => (source.hidden()..all.len()).collect(),
                    Projection::Columns(names) => names.iter().map(|n| index_of(n)).collect::<Result<_>>()?,
                };
                let filter = resolve_filter(filter, &all, &table, &mut params)?;
                let order_by = match order_by {
                    Some(o) => Some((index_of(&o.column)?, o.descending)),
                    None => None,
                };
                if let Some(Operand::Param(i)) = &limit {
                    params.insert(*i, ColumnDescriptor::new("LIMIT", ColumnType::Int64));
                }
                columns = projection.iter().map(|i| all[*i].clone()).collect();
                Plan::Select {
                    source,
                    projection,
                    filter,
                    order_by,
                    limit,
                }
            }
            SqlStatement::Delete { table, filter } => {
                if table == SYS_TABLES {
                    return Err(EngineError::state(format!("{} is read-only", SYS_TABLES)));
                }
                let table = catalog.table(&table)?;
                let filter = resolve_filter(filter, &table.columns, &table.name, &mut params)?;
                Plan::Delete { table, filter }
            }
        };

        let params: Vec<ColumnDescriptor> = params.into_values().collect();
        let bound = vec![None; params.len()];
        Ok(MemoryStatement {
            catalog,
            plan,
            params,
            bound,
            columns,
            results: None,
        })
    }

    fn resolve(&self, operand: &Operand, column_type: ColumnType) -> Result<WireValue> {
        match operand {
            Operand::Param(i) => self
                .bound
                .get(*i)
                .cloned()
                .flatten()
                .ok_or_else(|| EngineError::new(EngineError::PARAMETER, format!("parameter {} is not bound", i + 1))),
            Operand::Literal(lit) => literal_to_wire(lit, column_type),
        }
    }

    fn matches(&self, row: &Row, filter: &[Filter]) -> Result<bool> {
        for f in filter {
            let rhs = self.resolve(&f.operand, f.column_type)?;
            let hit = match compare(&row[f.column], &rhs) {
                Some(ord) => match f.op {
                    CompareOp::Eq => ord == Ordering::Equal,
                    CompareOp::Ne => ord != Ordering::Equal,
                    CompareOp::Lt => ord == Ordering::Less,
                    CompareOp::Le => ord != Ordering::Greater,
                    CompareOp::Gt => ord == Ordering::Greater,
                    CompareOp::Ge => ord != Ordering::Less,
                },
                None => false,
            };
            if !hit {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn run_select(&self) -> Result<Vec<Row>> {
        let Plan::Select {
            source,
            projection,
            filter,
            order_by,
            limit,
        } = &self.plan
        else {
            return Ok(Vec::new());
        };

        let snapshot: Vec<Row> = match source {
            Source::Table(t) => t.rows.read().clone(),
            Source::SysTables => self
                .catalog
                .tables
                .read()
                .values()
                .map(|t| vec![WireValue::String(t.name.clone()), WireValue::Int32(t.kind.code())])
                .collect(),
        };

        let mut rows = Vec::new();
        for row in snapshot {
            if self.matches(&row, filter)? {
                rows.push(row);
            }
        }
        if let Some((column, descending)) = order_by {
            rows.sort_by(|a, b| {
                let ord = sort_order(&a[*column], &b[*column]);
                if *descending {
                    ord.reverse()
                } else {
                    ord
                }
            });
        }
        if let Some(limit) = limit {
            let n = match self.resolve(limit, ColumnType::Int64)? {
                WireValue::Int64(n) if n >= 0 => n as usize,
                other => {
                    return Err(EngineError::new(
                        EngineError::VALUE,
                        format!("invalid LIMIT {:?}", other),
                    ))
                }
            };
            rows.truncate(n);
        }
        Ok(rows
            .into_iter()
            .map(|row| projection.iter().map(|i| row[*i].clone()).collect())
            .collect())
    }
}

fn resolve_filter(
    conditions: Vec<Condition>,
    columns: &[ColumnDescriptor],
    table: &str,
    params: &mut BTreeMap<usize, ColumnDescriptor>,
) -> Result<Vec<Filter>> {
    conditions
        .into_iter()
        .map(|c| {
            let column = columns
                .iter()
                .position(|d| d.name == c.column)
                .ok_or_else(|| EngineError::column_not_found(table, &c.column))?;
            if let Operand::Param(i) = c.operand {
                params.insert(i, columns[column].clone());
            }
            Ok(Filter {
                column,
                column_type: columns[column].column_type,
                op: c.op,
                operand: c.operand,
            })
        })
        .collect()
}

impl Statement for MemoryStatement {
    fn params(&self) -> &[ColumnDescriptor] {
        &self.params
    }

    fn bind(&mut self, index: usize, value: NativeValue) -> Result<()> {
        let desc = self.params.get(index).ok_or_else(|| {
            EngineError::new(
                EngineError::PARAMETER,
                format!("parameter index {} out of range (0..{})", index, self.params.len()),
            )
        })?;
        let wire = encode(desc.column_type, value)?;
        check_size(desc, &wire)?;
        self.bound[index] = Some(wire);
        Ok(())
    }

    fn execute(&mut self) -> Result<Execution> {
        self.results = None;
        match &self.plan {
            Plan::Create { name, kind, columns } => {
                let mut tables = self.catalog.tables.write();
                if tables.contains_key(name) || name == SYS_TABLES {
                    return Err(EngineError::new(
                        EngineError::TABLE_EXISTS,
                        format!("table '{}' already exists", name),
                    ));
                }
                let hidden = usize::from(*kind == TableKind::Log);
                tables.insert(
                    name.clone(),
                    Arc::new(Table {
                        name: name.clone(),
                        kind: *kind,
                        columns: columns.clone(),
                        hidden,
                        rows: RwLock::new(Vec::new()),
                    }),
                );
                debug!(table = %name, kind = %kind, "table created");
                Ok(Execution::default())
            }
            Plan::Drop { name } => {
                self.catalog
                    .tables
                    .write()
                    .remove(name)
                    .ok_or_else(|| EngineError::table_not_found(name))?;
                debug!(table = %name, "table dropped");
                Ok(Execution::default())
            }
            Plan::Insert {
                table,
                targets,
                values,
            } => {
                let mut row = vec![WireValue::Null; table.columns.len()];
                for (target, value) in targets.iter().zip(values) {
                    let desc = &table.columns[*target];
                    let wire = self.resolve(value, desc.column_type)?;
                    check_size(desc, &wire)?;
                    row[*target] = wire;
                }
                fill_arrival_time(table, &mut row)?;
                table.rows.write().push(row);
                Ok(Execution {
                    rows_affected: 1,
                    has_result_set: false,
                })
            }
            Plan::Select { .. } => {
                let rows = self.run_select()?;
                self.results = Some(rows.into_iter());
                Ok(Execution {
                    rows_affected: 0,
                    has_result_set: true,
                })
            }
            Plan::Delete { table, filter } => {
                // Scan and rewrite under one write lock
                let mut rows = table.rows.write();
                let doomed = rows
                    .iter()
                    .map(|row| self.matches(row, filter))
                    .collect::<Result<Vec<bool>>>()?;
                let before = rows.len();
                let mut flags = doomed.into_iter();
                rows.retain(|_| !flags.next().unwrap_or(false));
                let removed = (before - rows.len()) as u64;
                Ok(Execution {
                    rows_affected: removed,
                    has_result_set: false,
                })
            }
        }
    }

    fn columns(&self) -> &[ColumnDescriptor] {
        &self.columns
    }

    fn fetch(&mut self) -> Result<Option<Vec<NativeValue>>> {
        let results = self
            .results
            .as_mut()
            .ok_or_else(|| EngineError::state("statement has no open result set"))?;
        Ok(results.next().map(|row| row.iter().map(engine_native).collect()))
    }

    fn close(&mut self) -> Result<()> {
        self.results = None;
        Ok(())
    }
}

// ============================================================================
// Append sessions
// ============================================================================

struct MemoryAppender {
    table: Arc<Table>,
    buffer: Vec<Row>,
    batch_size: usize,
    closed: bool,
}

impl MemoryAppender {
    fn commit(&mut self) {
        if self.buffer.is_empty() {
            return;
        }
        let n = self.buffer.len();
        self.table.rows.write().append(&mut self.buffer);
        debug!(table = %self.table.name, rows = n, "append batch committed");
    }
}

impl AppendSession for MemoryAppender {
    fn columns(&self) -> &[ColumnDescriptor] {
        &self.table.columns
    }

    fn append(&mut self, values: Vec<NativeValue>) -> Result<()> {
        if self.closed {
            return Err(EngineError::state(format!(
                "append session on '{}' is closed",
                self.table.name
            )));
        }
        if values.len() != self.table.columns.len() {
            return Err(EngineError::new(
                EngineError::COLUMN_COUNT,
                format!(
                    "value count {}, table '{}' requires {} columns for appending",
                    values.len(),
                    self.table.name,
                    self.table.columns.len()
                ),
            ));
        }
        let mut row = Vec::with_capacity(values.len());
        for (desc, value) in self.table.columns.iter().zip(values) {
            let wire = encode(desc.column_type, value)?;
            check_size(desc, &wire)?;
            row.push(wire);
        }
        fill_arrival_time(&self.table, &mut row)?;
        self.buffer.push(row);
        if self.batch_size > 0 && self.buffer.len() >= self.batch_size {
            self.commit();
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.commit();
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if !self.closed {
            self.commit();
            self.closed = true;
            debug!(table = %self.table.name, "append session closed");
        }
        Ok(())
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn fill_arrival_time(table: &Table, row: &mut Row) -> Result<()> {
    if table.kind == TableKind::Log && row[0].is_null() {
        row[0] = WireValue::DateTime(time::to_nanos(&Utc::now())?);
    }
    Ok(())
}

fn check_size(desc: &ColumnDescriptor, value: &WireValue) -> Result<()> {
    let len = match value {
        WireValue::String(s) => s.len(),
        WireValue::Binary(b) => b.len(),
        _ => return Ok(()),
    };
    if desc.size > 0 && len > desc.size {
        return Err(EngineError::new(
            EngineError::VALUE,
            format!("value of {} bytes exceeds {}({}) column '{}'", len, desc.column_type, desc.size, desc.name),
        ));
    }
    Ok(())
}

fn literal_to_wire(lit: &Literal, column: ColumnType) -> Result<WireValue> {
    let out_of_range = |v: i64| EngineError::new(EngineError::VALUE, format!("{} is out of range for {}", v, column));
    match (lit, column) {
        (Literal::Null, _) => Ok(WireValue::Null),
        (Literal::Int(v), ColumnType::Int16) => i16::try_from(*v).map(WireValue::Int16).map_err(|_| out_of_range(*v)),
        (Literal::Int(v), ColumnType::Int32) => i32::try_from(*v).map(WireValue::Int32).map_err(|_| out_of_range(*v)),
        (Literal::Int(v), ColumnType::Int64) => Ok(WireValue::Int64(*v)),
        (Literal::Int(v), ColumnType::DateTime) => Ok(WireValue::DateTime(*v)),
        (Literal::Int(v), ColumnType::Float32) => Ok(WireValue::Float32(*v as f32)),
        (Literal::Int(v), ColumnType::Float64) => Ok(WireValue::Float64(*v as f64)),
        (Literal::Float(v), ColumnType::Float32) => Ok(WireValue::Float32(*v as f32)),
        (Literal::Float(v), ColumnType::Float64) => Ok(WireValue::Float64(*v)),
        (Literal::Str(s), ColumnType::DateTime) => {
            let opts = CodecOptions::with_time_format(TimeFormat::Pattern(DEFAULT_TIME_PATTERN.to_string()));
            Ok(encode_with(column, NativeValue::Str(s.clone()), &opts)?)
        }
        (Literal::Str(s), _) => Ok(encode(column, NativeValue::Str(s.clone()))?),
        (lit, column) => Err(EngineError::new(
            EngineError::VALUE,
            format!("literal {:?} is not valid for {}", lit, column),
        )),
    }
}

/// Engine-native form of a stored value: IPs carry a version byte.
fn engine_native(value: &WireValue) -> NativeValue {
    match to_native(value) {
        NativeValue::Ip(ip) => NativeValue::VersionedIp(versioned_ip(&ip)),
        other => other,
    }
}

/// Same-type comparison; `None` when either side is null or types differ.
fn compare(a: &WireValue, b: &WireValue) -> Option<Ordering> {
    use WireValue as W;
    match (a, b) {
        (W::DateTime(x), W::DateTime(y)) => Some(x.cmp(y)),
        (W::Float32(x), W::Float32(y)) => x.partial_cmp(y),
        (W::Float64(x), W::Float64(y)) => x.partial_cmp(y),
        (W::IPv4(x), W::IPv4(y)) => Some(x.cmp(y)),
        (W::IPv6(x), W::IPv6(y)) => Some(x.cmp(y)),
        (W::String(x), W::String(y)) => Some(x.cmp(y)),
        (W::Binary(x), W::Binary(y)) => Some(x.cmp(y)),
        (x, y) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => Some(x.cmp(&y)),
            _ => None,
        },
    }
}

/// Total order for ORDER BY: nulls first, unordered pairs equal.
fn sort_order(a: &WireValue, b: &WireValue) -> Ordering {
    match (a.is_null(), b.is_null()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => compare(a, b).unwrap_or(Ordering::Equal),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn exec(engine: &MemoryEngine, sql: &str) -> Execution {
        engine.prepare(sql).unwrap().execute().unwrap()
    }

    fn fetch_all(stmt: &mut Box<dyn Statement>) -> Vec<Vec<NativeValue>> {
        let mut out = Vec::new();
        while let Some(row) = stmt.fetch().unwrap() {
            out.push(row);
        }
        out
    }

    #[test]
    fn test_create_insert_select() {
        let engine = MemoryEngine::new();
        exec(&engine, "CREATE TABLE t (name VARCHAR(16), v INTEGER)");
        let mut ins = engine.prepare("INSERT INTO t VALUES (?, ?)").unwrap();
        assert_eq!(ins.params().len(), 2);
        assert_eq!(ins.params()[1].column_type, ColumnType::Int32);
        for i in 0..5 {
            ins.bind(0, NativeValue::from(format!("n{}", i))).unwrap();
            ins.bind(1, NativeValue::Int32(i)).unwrap();
            assert_eq!(ins.execute().unwrap().rows_affected, 1);
        }

        let mut sel = engine.prepare("SELECT * FROM t WHERE v >= ? ORDER BY v DESC LIMIT 2").unwrap();
        assert_eq!(sel.columns().len(), 2, "arrival time is hidden from *");
        sel.bind(0, NativeValue::Int32(1)).unwrap();
        assert!(sel.execute().unwrap().has_result_set);
        let rows = fetch_all(&mut sel);
        assert_eq!(
            rows,
            vec![
                vec![NativeValue::Str("n4".into()), NativeValue::Int32(4)],
                vec![NativeValue::Str("n3".into()), NativeValue::Int32(3)],
            ]
        );
        assert_eq!(sel.fetch().unwrap(), None);
    }

    #[test]
    fn test_unbound_parameter() {
        let engine = MemoryEngine::new();
        exec(&engine, "CREATE TABLE t (v INTEGER)");
        let mut stmt = engine.prepare("INSERT INTO t VALUES (?)").unwrap();
        assert_eq!(stmt.execute().unwrap_err().code, EngineError::PARAMETER);
        assert_eq!(stmt.bind(3, NativeValue::Int32(1)).unwrap_err().code, EngineError::PARAMETER);
    }

    #[test]
    fn test_bind_type_mismatch_is_value_error() {
        let engine = MemoryEngine::new();
        exec(&engine, "CREATE TABLE t (v LONG)");
        let mut stmt = engine.prepare("INSERT INTO t VALUES (?)").unwrap();
        let err = stmt.bind(0, NativeValue::Str("x".into())).unwrap_err();
        assert_eq!(err.code, EngineError::VALUE);
        assert!(err.message.contains("string"));
    }

    #[test]
    fn test_sys_tables() {
        let engine = MemoryEngine::new();
        exec(&engine, "CREATE TAG TABLE tag (name VARCHAR(20) PRIMARY KEY, time DATETIME BASETIME, value DOUBLE)");
        exec(&engine, "CREATE LOOKUP TABLE lk (k INTEGER)");
        let mut stmt = engine
            .prepare("select type from M$SYS_TABLES where name = ?")
            .unwrap();
        stmt.bind(0, NativeValue::Str("TAG".into())).unwrap();
        stmt.execute().unwrap();
        assert_eq!(fetch_all(&mut stmt), vec![vec![NativeValue::Int32(6)]]);
        stmt.bind(0, NativeValue::Str("NOPE".into())).unwrap();
        stmt.execute().unwrap();
        assert!(fetch_all(&mut stmt).is_empty());
    }

    #[test]
    fn test_tag_table_shape_enforced() {
        let engine = MemoryEngine::new();
        let err = engine.prepare("CREATE TAG TABLE bad (v DOUBLE)").err().unwrap();
        assert_eq!(err.code, EngineError::SYNTAX);
    }

    #[test]
    fn test_duplicate_and_missing_tables() {
        let engine = MemoryEngine::new();
        exec(&engine, "CREATE TABLE t (v INTEGER)");
        let err = engine.prepare("CREATE TABLE t (v INTEGER)").unwrap().execute().unwrap_err();
        assert_eq!(err.code, EngineError::TABLE_EXISTS);
        assert_eq!(
            engine.prepare("SELECT * FROM missing").err().unwrap().code,
            EngineError::TABLE_NOT_FOUND
        );
        exec(&engine, "DROP TABLE t");
        assert_eq!(engine.row_count("t"), None);
    }

    #[test]
    fn test_delete_with_filter() {
        let engine = MemoryEngine::new();
        exec(&engine, "CREATE TABLE t (v INTEGER)");
        for i in 0..4 {
            exec(&engine, &format!("INSERT INTO t VALUES ({})", i));
        }
        assert_eq!(exec(&engine, "DELETE FROM t WHERE v < 2").rows_affected, 2);
        assert_eq!(engine.row_count("T"), Some(2));
    }

    #[test]
    fn test_delete_keeps_concurrent_inserts() {
        let engine = MemoryEngine::new();
        exec(&engine, "CREATE TABLE t (v INTEGER)");
        std::thread::scope(|scope| {
            scope.spawn(|| {
                for _ in 0..500 {
                    exec(&engine, "INSERT INTO t VALUES (1000)");
                }
            });
            scope.spawn(|| {
                for i in 0..500 {
                    exec(&engine, &format!("INSERT INTO t VALUES ({})", i % 10));
                    exec(&engine, "DELETE FROM t WHERE v < 10");
                }
            });
        });
        assert_eq!(engine.row_count("T"), Some(500));
    }

    #[test]
    fn test_ip_fetched_with_version_byte() {
        let engine = MemoryEngine::new();
        exec(&engine, "CREATE TABLE t (addr IPV4)");
        let mut ins = engine.prepare("INSERT INTO t VALUES (?)").unwrap();
        ins.bind(0, NativeValue::from(Ipv4Addr::new(10, 1, 2, 3))).unwrap();
        ins.execute().unwrap();
        let mut sel = engine.prepare("SELECT addr FROM t").unwrap();
        sel.execute().unwrap();
        assert_eq!(
            fetch_all(&mut sel),
            vec![vec![NativeValue::VersionedIp(vec![4, 10, 1, 2, 3])]]
        );
    }

    #[test]
    fn test_varchar_size_enforced() {
        let engine = MemoryEngine::new();
        exec(&engine, "CREATE TABLE t (s VARCHAR(3))");
        let mut ins = engine.prepare("INSERT INTO t VALUES (?)").unwrap();
        assert_eq!(ins.bind(0, NativeValue::from("abcd")).unwrap_err().code, EngineError::VALUE);
    }

    #[test]
    fn test_appender_buffers_until_flush() {
        let engine = MemoryEngine::with_config(MemoryEngineConfig { append_batch_size: 0 });
        exec(&engine, "CREATE TAG TABLE tag (name VARCHAR(20), time DATETIME, value DOUBLE)");
        let mut app = engine.open_appender("tag").unwrap();
        assert_eq!(app.columns().len(), 3);
        app.append(vec!["a".into(), NativeValue::Int64(1), NativeValue::Float64(1.0)])
            .unwrap();
        assert_eq!(engine.row_count("tag"), Some(0));
        app.flush().unwrap();
        assert_eq!(engine.row_count("tag"), Some(1));
        app.flush().unwrap();
        app.close().unwrap();
        app.close().unwrap();
        assert!(app.append(vec!["a".into(), NativeValue::Int64(1), NativeValue::Null]).is_err());
    }

    #[test]
    fn test_appender_batch_commit_and_validation() {
        let engine = MemoryEngine::with_config(MemoryEngineConfig { append_batch_size: 2 });
        exec(&engine, "CREATE LOG TABLE lg (v INTEGER)");
        let mut app = engine.open_appender("LG").unwrap();
        assert_eq!(app.columns()[0].name, ARRIVAL_TIME_COLUMN);
        let err = app.append(vec![NativeValue::Int32(1)]).unwrap_err();
        assert_eq!(err.code, EngineError::COLUMN_COUNT);
        app.append(vec![NativeValue::Null, NativeValue::Int32(1)]).unwrap();
        app.append(vec![NativeValue::Null, NativeValue::Int32(2)]).unwrap();
        assert_eq!(engine.row_count("lg"), Some(2));
    }

    #[test]
    fn test_lookup_not_appendable() {
        let engine = MemoryEngine::new();
        exec(&engine, "CREATE LOOKUP TABLE lk (k INTEGER)");
        assert_eq!(engine.open_appender("lk").err().unwrap().code, EngineError::NOT_APPENDABLE);
        assert_eq!(engine.open_appender("zz").err().unwrap().code, EngineError::TABLE_NOT_FOUND);
    }
}
