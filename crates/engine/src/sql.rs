//! Parser for the SQL subset understood by the memory engine
//!
//! ```text
//! CREATE [LOG|TAG|FIXED|VOLATILE|LOOKUP|KEYVALUE] TABLE name (col TYPE [(n)] [modifiers], ...)
//! DROP TABLE name
//! INSERT INTO name [(col, ...)] VALUES (operand, ...)
//! SELECT *|col, ... FROM name [WHERE col op operand [AND ...]] [ORDER BY col [ASC|DESC]] [LIMIT operand]
//! DELETE FROM name [WHERE ...]
//! ```
//!
//! Identifiers are case-insensitive and normalized to upper case. Operands
//! are `?`, `NULL`, numbers or single-quoted strings.

use veneer_core::{ColumnType, TableKind};

use crate::error::{EngineError, Result};

/// A literal value in statement text
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    /// NULL
    Null,
    /// Integer
    Int(i64),
    /// Floating point
    Float(f64),
    /// Quoted string
    Str(String),
}

/// A value position: a parameter marker or a literal
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// Zero-based parameter index
    Param(usize),
    /// Inline literal
    Literal(Literal),
}

/// Comparison operator in a WHERE clause
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    /// `=`
    Eq,
    /// `!=` or `<>`
    Ne,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
}

/// `column op operand`
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    /// Column name
    pub column: String,
    /// Operator
    pub op: CompareOp,
    /// Right-hand side
    pub operand: Operand,
}

/// Column definition in CREATE TABLE
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDef {
    /// Column name
    pub name: String,
    /// Declared type
    pub column_type: ColumnType,
    /// Declared size for variable-length types
    pub size: usize,
}

/// SELECT list
#[derive(Debug, Clone, PartialEq)]
pub enum Projection {
    /// `*`: every visible column
    All,
    /// Named columns
    Columns(Vec<String>),
}

/// ORDER BY clause
#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    /// Sort column
    pub column: String,
    /// DESC
    pub descending: bool,
}

/// A parsed statement
#[derive(Debug, Clone, PartialEq)]
pub enum SqlStatement {
    /// CREATE TABLE
    CreateTable {
        /// Table name
        name: String,
        /// Table kind
        kind: TableKind,
        /// Column definitions
        columns: Vec<ColumnDef>,
    },
    /// DROP TABLE
    DropTable {
        /// Table name
        name: String,
    },
    /// INSERT
    Insert {
        /// Target table
        table: String,
        /// Explicit column list
        columns: Option<Vec<String>>,
        /// Values, positional over the column list
        values: Vec<Operand>,
    },
    /// SELECT
    Select {
        /// Selected columns
        projection: Projection,
        /// Source table
        table: String,
        /// Conjunctive filter
        filter: Vec<Condition>,
        /// Sort order
        order_by: Option<OrderBy>,
        /// Row limit
        limit: Option<Operand>,
    },
    /// DELETE
    Delete {
        /// Target table
        table: String,
        /// Conjunctive filter
        filter: Vec<Condition>,
    },
}

/// Default declared size of VARCHAR/BINARY columns without `(n)`.
pub const DEFAULT_VARIABLE_SIZE: usize = 255;

/// Declared size of TEXT columns.
pub const TEXT_SIZE: usize = 65_536;

/// Parse one statement.
pub fn parse(sql: &str) -> Result<SqlStatement> {
    let tokens = tokenize(sql)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        params: 0,
    };
    let stmt = parser.statement()?;
    parser.symbol(";");
    if let Some(tok) = parser.peek() {
        return Err(EngineError::syntax(format!("unexpected {:?} after statement", tok)));
    }
    Ok(stmt)
}

// ============================================================================
// Tokenizer
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Word(String),
    Int(i64),
    Float(f64),
    Str(String),
    Param,
    Symbol(&'static str),
}

const SYMBOLS: [&str; 13] = ["<=", ">=", "!=", "<>", "(", ")", ",", "*", "=", "<", ">", ";", "-"];

fn tokenize(sql: &str) -> Result<Vec<Token>> {
    let chars: Vec<char> = sql.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    'outer: while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
            continue;
        }
        if c == '?' {
            tokens.push(Token::Param);
            i += 1;
            continue;
        }
        if c == '\'' {
            let mut s = String::new();
            i += 1;
            loop {
                match chars.get(i) {
                    None => return Err(EngineError::syntax("unterminated string literal")),
                    Some('\'') if chars.get(i + 1) == Some(&'\'') => {
                        s.push('\'');
                        i += 2;
                    }
                    Some('\'') => {
                        i += 1;
                        break;
                    }
                    Some(ch) => {
                        s.push(*ch);
                        i += 1;
                    }
                }
            }
            tokens.push(Token::Str(s));
            continue;
        }
        if c.is_ascii_digit() {
            let start = i;
            let mut is_float = false;
            while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                is_float |= chars[i] == '.';
                i += 1;
            }
            if i < chars.len() && (chars[i] == 'e' || chars[i] == 'E') {
                is_float = true;
                i += 1;
                if i < chars.len() && (chars[i] == '-' || chars[i] == '+') {
                    i += 1;
                }
                while i < chars.len() && chars[i].is_ascii_digit() {
                    i += 1;
                }
            }
            let text: String = chars[start..i].iter().collect();
            let token = if is_float {
                text.parse().map(Token::Float).ok()
            } else {
                text.parse().map(Token::Int).ok()
            };
            tokens.push(token.ok_or_else(|| EngineError::syntax(format!("invalid number '{}'", text)))?);
            continue;
        }
        if c.is_alphanumeric() || c == '_' || c == '$' {
            let start = i;
            while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_' || chars[i] == '$') {
                i += 1;
            }
            tokens.push(Token::Word(chars[start..i].iter().collect()));
            continue;
        }
        for sym in SYMBOLS {
            let len = sym.len();
            if i + len <= chars.len() && chars[i..i + len].iter().copied().eq(sym.chars()) {
                tokens.push(Token::Symbol(sym));
                i += len;
                continue 'outer;
            }
        }
        return Err(EngineError::syntax(format!("unexpected character '{}'", c)));
    }
    Ok(tokens)
}

// ============================================================================
// Parser
// ============================================================================

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    params: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.pos).cloned();
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn is_keyword(&self, kw: &str) -> bool {
        matches!(self.peek(), Some(Token::Word(w)) if w.eq_ignore_ascii_case(kw))
    }

    fn keyword(&mut self, kw: &str) -> bool {
        if self.is_keyword(kw) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect_keyword(&mut self, kw: &str) -> Result<()> {
        if self.keyword(kw) {
            Ok(())
        } else {
            Err(EngineError::syntax(format!("expected {}, found {:?}", kw, self.peek())))
        }
    }

    fn symbol(&mut self, sym: &str) -> bool {
        if matches!(self.peek(), Some(Token::Symbol(s)) if *s == sym) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect_symbol(&mut self, sym: &str) -> Result<()> {
        if self.symbol(sym) {
            Ok(())
        } else {
            Err(EngineError::syntax(format!("expected '{}', found {:?}", sym, self.peek())))
        }
    }

    fn identifier(&mut self) -> Result<String> {
        match self.advance() {
            Some(Token::Word(w)) => Ok(w.to_ascii_uppercase()),
            other => Err(EngineError::syntax(format!("expected identifier, found {:?}", other))),
        }
    }

    fn statement(&mut self) -> Result<SqlStatement> {
        if self.keyword("CREATE") {
            self.create_table()
        } else if self.keyword("DROP") {
            self.expect_keyword("TABLE")?;
            Ok(SqlStatement::DropTable {
                name: self.identifier()?,
            })
        } else if self.keyword("INSERT") {
            self.insert()
        } else if self.keyword("SELECT") {
            self.select()
        } else if self.keyword("DELETE") {
            self.expect_keyword("FROM")?;
            let table = self.identifier()?;
            let filter = self.where_clause()?;
            Ok(SqlStatement::Delete { table, filter })
        } else {
            Err(EngineError::new(
                EngineError::UNSUPPORTED,
                format!("unsupported statement starting with {:?}", self.peek()),
            ))
        }
    }

    fn create_table(&mut self) -> Result<SqlStatement> {
        let kind = if self.keyword("LOG") {
            TableKind::Log
        } else if self.keyword("TAG") {
            TableKind::Tag
        } else if self.keyword("FIXED") {
            TableKind::Fixed
        } else if self.keyword("VOLATILE") {
            TableKind::Volatile
        } else if self.keyword("LOOKUP") {
            TableKind::Lookup
        } else if self.keyword("KEYVALUE") {
            TableKind::KeyValue
        } else {
            TableKind::Log
        };
        self.expect_keyword("TABLE")?;
        let name = self.identifier()?;
        self.expect_symbol("(")?;
        let mut columns = Vec::new();
        loop {
            columns.push(self.column_def()?);
            if !self.symbol(",") {
                break;
            }
        }
        self.expect_symbol(")")?;
        Ok(SqlStatement::CreateTable { name, kind, columns })
    }

    fn column_def(&mut self) -> Result<ColumnDef> {
        let name = self.identifier()?;
        let type_name = self.identifier()?;
        let (column_type, default_size) = match type_name.as_str() {
            "SHORT" | "INT16" | "SMALLINT" => (ColumnType::Int16, 0),
            "INTEGER" | "INT" | "INT32" => (ColumnType::Int32, 0),
            "LONG" | "BIGINT" | "INT64" => (ColumnType::Int64, 0),
            "DATETIME" => (ColumnType::DateTime, 0),
            "FLOAT" => (ColumnType::Float32, 0),
            "DOUBLE" => (ColumnType::Float64, 0),
            "IPV4" => (ColumnType::IPv4, 0),
            "IPV6" => (ColumnType::IPv6, 0),
            "VARCHAR" | "STRING" => (ColumnType::String, DEFAULT_VARIABLE_SIZE),
            "TEXT" => (ColumnType::String, TEXT_SIZE),
            "BINARY" | "BLOB" => (ColumnType::Binary, DEFAULT_VARIABLE_SIZE),
            other => {
                return Err(EngineError::syntax(format!("unknown column type '{}'", other)));
            }
        };
        let mut size = column_type.fixed_size().unwrap_or(default_size);
        if self.symbol("(") {
            match self.advance() {
                Some(Token::Int(n)) if n > 0 && column_type.fixed_size().is_none() => size = n as usize,
                other => {
                    return Err(EngineError::syntax(format!(
                        "invalid size {:?} for {}",
                        other, column_type
                    )))
                }
            }
            self.expect_symbol(")")?;
        }
        // Column modifiers carry no semantics here.
        while self.keyword("PRIMARY") || self.keyword("KEY") || self.keyword("BASETIME") || self.keyword("SUMMARIZED") {}
        Ok(ColumnDef {
            name,
            column_type,
            size,
        })
    }

    fn insert(&mut self) -> Result<SqlStatement> {
        self.expect_keyword("INTO")?;
        let table = self.identifier()?;
        let columns = if self.symbol("(") {
            let mut cols = vec![self.identifier()?];
            while self.symbol(",") {
                cols.push(self.identifier()?);
            }
            self.expect_symbol(")")?;
            Some(cols)
        } else {
            None
        };
        self.expect_keyword("VALUES")?;
        self.expect_symbol("(")?;
        let mut values = vec![self.operand()?];
        while self.symbol(",") {
            values.push(self.operand()?);
        }
        self.expect_symbol(")")?;
        Ok(SqlStatement::Insert {
            table,
            columns,
            values,
        })
    }

    fn select(&mut self) -> Result<SqlStatement> {
        let projection = if self.symbol("*") {
            Projection::All
        } else {
            let mut cols = vec![self.identifier()?];
            while self.symbol(",") {
                cols.push(self.identifier()?);
            }
            Projection::Columns(cols)
        };
        self.expect_keyword("FROM")?;
        let table = self.identifier()?;
        let filter = self.where_clause()?;
        let order_by = if self.keyword("ORDER") {
            self.expect_keyword("BY")?;
            let column = self.identifier()?;
            let descending = if self.keyword("DESC") {
                true
            } else {
                self.keyword("ASC");
                false
            };
            Some(OrderBy { column, descending })
        } else {
            None
        };
        let limit = if self.keyword("LIMIT") {
            Some(self.operand()?)
        } else {
            None
        };
        Ok(SqlStatement::Select {
            projection,
            table,
            filter,
            order_by,
            limit,
        })
    }

    fn where_clause(&mut self) -> Result<Vec<Condition>> {
        let mut filter = Vec::new();
        if !self.keyword("WHERE") {
            return Ok(filter);
        }
        loop {
            let column = self.identifier()?;
            let op = match self.advance() {
                Some(Token::Symbol("=")) => CompareOp::Eq,
                Some(Token::Symbol("!=")) | Some(Token::Symbol("<>")) => CompareOp::Ne,
                Some(Token::Symbol("<")) => CompareOp::Lt,
                Some(Token::Symbol("<=")) => CompareOp::Le,
                Some(Token::Symbol(">")) => CompareOp::Gt,
                Some(Token::Symbol(">=")) => CompareOp::Ge,
                other => {
                    return Err(EngineError::syntax(format!("expected comparison, found {:?}", other)));
                }
            };
            let operand = self.operand()?;
            filter.push(Condition { column, op, operand });
            if !self.keyword("AND") {
                break;
            }
        }
        Ok(filter)
    }

    fn operand(&mut self) -> Result<Operand> {
        let negative = self.symbol("-");
        let literal = match self.advance() {
            Some(Token::Param) if !negative => {
                let index = self.params;
                self.params += 1;
                return Ok(Operand::Param(index));
            }
            Some(Token::Int(v)) => Literal::Int(if negative { -v } else { v }),
            Some(Token::Float(v)) => Literal::Float(if negative { -v } else { v }),
            Some(Token::Str(s)) if !negative => Literal::Str(s),
            Some(Token::Word(w)) if !negative && w.eq_ignore_ascii_case("NULL") => Literal::Null,
            other => return Err(EngineError::syntax(format!("expected value, found {:?}", other))),
        };
        Ok(Operand::Literal(literal))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_tag_table() {
        let stmt = parse(
            "create tag table sensors (name varchar(20) primary key, time datetime basetime, value double summarized)",
        )
        .unwrap();
        match stmt {
            SqlStatement::CreateTable { name, kind, columns } => {
                assert_eq!(name, "SENSORS");
                assert_eq!(kind, TableKind::Tag);
                assert_eq!(columns.len(), 3);
                assert_eq!(columns[0].column_type, ColumnType::String);
                assert_eq!(columns[0].size, 20);
                assert_eq!(columns[1].column_type, ColumnType::DateTime);
                assert_eq!(columns[2].size, 8);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_create_defaults_to_log() {
        match parse("CREATE TABLE t (v INTEGER)").unwrap() {
            SqlStatement::CreateTable { kind, .. } => assert_eq!(kind, TableKind::Log),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_select_full() {
        let stmt = parse("SELECT name, v FROM t WHERE v >= ? AND name <> 'it''s' ORDER BY v DESC LIMIT 10;").unwrap();
        match stmt {
            SqlStatement::Select {
                projection,
                table,
                filter,
                order_by,
                limit,
            } => {
                assert_eq!(projection, Projection::Columns(vec!["NAME".into(), "V".into()]));
                assert_eq!(table, "T");
                assert_eq!(filter.len(), 2);
                assert_eq!(filter[0].op, CompareOp::Ge);
                assert_eq!(filter[0].operand, Operand::Param(0));
                assert_eq!(filter[1].operand, Operand::Literal(Literal::Str("it's".into())));
                assert_eq!(
                    order_by,
                    Some(OrderBy {
                        column: "V".into(),
                        descending: true
                    })
                );
                assert_eq!(limit, Some(Operand::Literal(Literal::Int(10))));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_params_numbered_in_order() {
        match parse("INSERT INTO t VALUES (?, -1.5, ?, NULL)").unwrap() {
            SqlStatement::Insert { values, .. } => {
                assert_eq!(
                    values,
                    vec![
                        Operand::Param(0),
                        Operand::Literal(Literal::Float(-1.5)),
                        Operand::Param(1),
                        Operand::Literal(Literal::Null),
                    ]
                );
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_metadata_table_name() {
        match parse("select type from M$SYS_TABLES where name = ?").unwrap() {
            SqlStatement::Select { table, .. } => assert_eq!(table, "M$SYS_TABLES"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_errors() {
        assert_eq!(parse("UPDATE t SET v = 1").unwrap_err().code, EngineError::UNSUPPORTED);
        assert_eq!(parse("SELECT FROM").unwrap_err().code, EngineError::SYNTAX);
        assert_eq!(parse("SELECT * FROM t extra").unwrap_err().code, EngineError::SYNTAX);
        assert_eq!(parse("INSERT INTO t VALUES ('open").unwrap_err().code, EngineError::SYNTAX);
        assert_eq!(parse("CREATE TABLE t (v WIDGET)").unwrap_err().code, EngineError::SYNTAX);
    }
}
