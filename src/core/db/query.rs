/// Query Results Module
///
/// This module holds the value model for rows coming back from the driver,
/// the materialized [`ResultTable`] and the forward-only [`Reader`] that
/// streams rows straight off an open cursor.

use crate::core::db::backend::{Backend, BackendCursor, CursorOf};
use crate::core::{Error, Result};
use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;
use std::fmt;
use tracing::trace;

/// The kind of value a column holds, derived from the driver's column type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    Bool,
    Integer,
    Float,
    Date,
    Timestamp,
    Text,
}

impl ValueKind {
    /// Converts the textual form of a cell into a typed value.
    ///
    /// Text that does not parse as this kind is kept as [`Value::Text`].
    pub fn parse(self, raw: &[u8]) -> Value {
        let text = String::from_utf8_lossy(raw);
        let trimmed = text.trim();
        let parsed = match self {
            ValueKind::Bool => match trimmed {
                "1" | "t" | "true" | "TRUE" => Some(Value::Bool(true)),
                "0" | "f" | "false" | "FALSE" => Some(Value::Bool(false)),
                _ => None,
            },
            ValueKind::Integer => trimmed.parse().ok().map(Value::Integer),
            ValueKind::Float => trimmed.parse().ok().map(Value::Float),
            ValueKind::Date => NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
                .ok()
                .map(Value::Date),
            ValueKind::Timestamp => NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S%.f")
                .ok()
                .map(Value::Timestamp),
            ValueKind::Text => None,
        };
        parsed.unwrap_or_else(|| Value::Text(text.into_owned()))
    }
}

/// A single cell.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    Date(NaiveDate),
    Timestamp(NaiveDateTime),
    Text(String),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::Date(d) => write!(f, "{}", d),
            Value::Timestamp(ts) => write!(f, "{}", ts),
            Value::Text(s) => f.write_str(s),
        }
    }
}

/// Name and kind of a result column
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Column {
    pub name: String,
    pub kind: ValueKind,
}

impl Column {
    pub fn new(name: impl Into<String>, kind: ValueKind) -> Self {
        Column {
            name: name.into(),
            kind,
        }
    }
}

/// A fully materialized copy of a result set.
///
/// Produced by [`PgConnection::execute`](crate::core::db::PgConnection::execute).
/// Statements that return no result set produce an empty table.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResultTable {
    /// Column descriptions, in result set order
    pub columns: Vec<Column>,
    /// Rows of typed values
    pub rows: Vec<Vec<Value>>,
}

impl ResultTable {
    pub fn new(columns: Vec<Column>, rows: Vec<Vec<Value>>) -> Self {
        ResultTable { columns, rows }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// True when the table holds no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Position of the column with the given name, ignoring case.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.name.eq_ignore_ascii_case(name))
    }

    pub fn get(&self, row: usize, column: usize) -> Option<&Value> {
        self.rows.get(row)?.get(column)
    }

    /// Looks up a cell by row position and column name.
    pub fn value(&self, row: usize, column: &str) -> Option<&Value> {
        self.get(row, self.column_index(column)?)
    }
}

/// Where the wrapper's cursor is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReaderState {
    /// No query has produced a cursor on this connection yet
    #[default]
    Never,
    /// A [`Reader`] is alive and its cursor is open
    Open,
    /// The last cursor has been closed
    Closed,
}

/// Forward-only cursor over the rows of the most recently executed query.
///
/// A reader mutably borrows the connection it came from, so no other
/// statement can run until it is closed or dropped. Dropping it closes the
/// cursor; so does reading past the last row.
pub struct Reader<'c, B>
where
    B: Backend,
    B::Connection: 'c,
{
    cursor: Option<CursorOf<'c, B>>,
    columns: Vec<Column>,
    peeked: Option<Vec<Value>>,
    state: &'c mut ReaderState,
}

impl<'c, B> Reader<'c, B>
where
    B: Backend,
    B::Connection: 'c,
{
    pub(crate) fn new(cursor: Option<CursorOf<'c, B>>, state: &'c mut ReaderState) -> Self {
        let columns = cursor
            .as_ref()
            .map(|c| c.columns().to_vec())
            .unwrap_or_default();
        *state = if cursor.is_some() {
            ReaderState::Open
        } else {
            ReaderState::Closed
        };
        Reader {
            cursor,
            columns,
            peeked: None,
            state,
        }
    }

    /// Columns of the result set. Empty for statements that return no rows.
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn is_closed(&self) -> bool {
        self.cursor.is_none() && self.peeked.is_none()
    }

    /// Whether another row can be read, without consuming it.
    pub fn has_rows(&mut self) -> Result<bool> {
        if self.peeked.is_some() {
            return Ok(true);
        }
        self.peeked = self.fetch()?;
        Ok(self.peeked.is_some())
    }

    /// Reads the next row, or `None` once the result set is exhausted.
    pub fn next_row(&mut self) -> Result<Option<Vec<Value>>> {
        if let Some(row) = self.peeked.take() {
            return Ok(Some(row));
        }
        self.fetch()
    }

    /// Drains the remaining rows into a [`ResultTable`] and closes the cursor.
    pub fn collect_table(mut self) -> Result<ResultTable> {
        let mut rows = Vec::new();
        while let Some(row) = self.next_row()? {
            rows.push(row);
        }
        Ok(ResultTable::new(std::mem::take(&mut self.columns), rows))
    }

    /// Closes the cursor.
    pub fn close(self) {}

    fn fetch(&mut self) -> Result<Option<Vec<Value>>> {
        let Some(cursor) = self.cursor.as_mut() else {
            return Ok(None);
        };
        match cursor.next_row() {
            Ok(Some(row)) => Ok(Some(row)),
            Ok(None) => {
                self.finish();
                Ok(None)
            }
            Err(e) => {
                self.finish();
                Err(Error::Query(e))
            }
        }
    }

    fn finish(&mut self) {
        if self.cursor.take().is_some() {
            trace!("cursor closed");
        }
        *self.state = ReaderState::Closed;
    }
}

impl<'c, B> Iterator for Reader<'c, B>
where
    B: Backend,
    B::Connection: 'c,
{
    type Item = Result<Vec<Value>>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_row().transpose()
    }
}

impl<'c, B> Drop for Reader<'c, B>
where
    B: Backend,
    B::Connection: 'c,
{
    fn drop(&mut self) {
        self.finish();
    }
}

impl<'c, B> fmt::Debug for Reader<'c, B>
where
    B: Backend,
    B::Connection: 'c,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reader")
            .field("columns", &self.columns)
            .field("open", &self.cursor.is_some())
            .finish()
    }
}
