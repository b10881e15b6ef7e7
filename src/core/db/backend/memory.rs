//! Scripted in-process backend.
//!
//! Answers queries from a fixed script instead of a database, and keeps
//! counters of the handles it hands out so tests can check that cursors and
//! connections are released.
use super::{Backend, BackendConnection, BackendCursor};
use crate::core::db::query::{Column, ResultTable, Value};
use crate::core::DriverError;
use std::collections::{HashMap, VecDeque};
use std::marker::PhantomData;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::trace;

/// How the backend answers a query.
#[derive(Debug, Clone, PartialEq)]
pub enum Script {
    /// A result set
    Rows(ResultTable),
    /// A statement with no result set (INSERT, UPDATE, DDL, ...)
    Statement,
    /// A driver error with the given message
    Fail(String),
    /// A result set that fails with `message` once its rows have been read
    FailAfter { rows: ResultTable, message: String },
}

#[derive(Debug, Default)]
struct MemoryState {
    scripts: HashMap<String, Script>,
    refusal: Option<String>,
    dead: bool,
    connection_strings: Vec<String>,
    executed: Vec<String>,
    open_connections: usize,
    open_cursors: usize,
}

/// In-process backend answering queries from a script.
///
/// Clones share state, so a test can keep one handle and give another to
/// the connection under test.
///
/// ```
/// use pgodbc::core::db::{Column, MemoryBackend, PgConnection, ResultTable, Value, ValueKind};
///
/// let backend = MemoryBackend::new().with_rows(
///     "SELECT 1",
///     ResultTable::new(
///         vec![Column::new("?column?", ValueKind::Integer)],
///         vec![vec![Value::Integer(1)]],
///     ),
/// );
/// let mut conn = PgConnection::with_backend(backend.clone(), "mydb").unwrap();
/// let table = conn.execute("SELECT 1").unwrap();
/// assert_eq!(table.get(0, 0), Some(&Value::Integer(1)));
/// assert_eq!(backend.open_cursors(), 0);
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answers `query` with the rows of `table`.
    pub fn with_rows(self, query: &str, table: ResultTable) -> Self {
        self.script(query, Script::Rows(table));
        self
    }

    /// Answers `query` as a statement that returns no result set.
    pub fn with_statement(self, query: &str) -> Self {
        self.script(query, Script::Statement);
        self
    }

    /// Fails `query` with a driver error.
    pub fn with_failure(self, query: &str, message: &str) -> Self {
        self.script(query, Script::Fail(message.to_string()));
        self
    }

    /// Sets or replaces the answer for `query`. Queries are matched on their trimmed text.
    pub fn script(&self, query: &str, script: Script) {
        self.lock().scripts.insert(query.trim().to_string(), script);
    }

    /// Makes every following connect attempt fail with `message`.
    pub fn refuse_connections(&self, message: &str) {
        self.lock().refusal = Some(message.to_string());
    }

    pub fn accept_connections(&self) {
        self.lock().refusal = None;
    }

    /// Makes open connections report themselves as dead to the driver check.
    pub fn set_dead(&self, dead: bool) {
        self.lock().dead = dead;
    }

    /// Number of successful connects so far.
    pub fn connect_count(&self) -> usize {
        self.lock().connection_strings.len()
    }

    pub fn last_connection_string(&self) -> Option<String> {
        self.lock().connection_strings.last().cloned()
    }

    pub fn open_connections(&self) -> usize {
        self.lock().open_connections
    }

    pub fn open_cursors(&self) -> usize {
        self.lock().open_cursors
    }

    /// Every query executed so far, in order.
    pub fn executed(&self) -> Vec<String> {
        self.lock().executed.clone()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        lock(&self.state)
    }
}

fn lock(state: &Mutex<MemoryState>) -> MutexGuard<'_, MemoryState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Backend for MemoryBackend {
    type Connection = MemoryConnection;

    fn connect(&self, connection_string: &str) -> Result<MemoryConnection, DriverError> {
        let mut state = self.lock();
        if let Some(message) = &state.refusal {
            return Err(DriverError::new(message.clone()));
        }
        state.connection_strings.push(connection_string.to_string());
        state.open_connections += 1;
        trace!(connection_string, "memory connection opened");
        Ok(MemoryConnection {
            state: Arc::clone(&self.state),
        })
    }
}

#[derive(Debug)]
pub struct MemoryConnection {
    state: Arc<Mutex<MemoryState>>,
}

impl BackendConnection for MemoryConnection {
    type Cursor<'c> = MemoryCursor<'c> where Self: 'c;

    fn execute(&mut self, query: &str) -> Result<Option<MemoryCursor<'_>>, DriverError> {
        let mut state = lock(&self.state);
        let query = query.trim();
        state.executed.push(query.to_string());
        let script = state.scripts.get(query).cloned().unwrap_or_else(|| {
            Script::Fail(format!("ERROR:  unexpected statement \"{}\"", query))
        });
        match script {
            Script::Rows(table) => Ok(Some(self.open_cursor(&mut state, table, None))),
            Script::FailAfter { rows, message } => {
                Ok(Some(self.open_cursor(&mut state, rows, Some(message))))
            }
            Script::Statement => Ok(None),
            Script::Fail(message) => Err(DriverError::new(message)),
        }
    }

    fn is_dead(&self) -> Result<bool, DriverError> {
        Ok(lock(&self.state).dead)
    }
}

impl MemoryConnection {
    fn open_cursor(
        &self,
        state: &mut MemoryState,
        table: ResultTable,
        failure: Option<String>,
    ) -> MemoryCursor<'_> {
        state.open_cursors += 1;
        MemoryCursor {
            columns: table.columns,
            rows: table.rows.into(),
            failure,
            state: Arc::clone(&self.state),
            _connection: PhantomData,
        }
    }
}

impl Drop for MemoryConnection {
    fn drop(&mut self) {
        let mut state = lock(&self.state);
        state.open_connections = state.open_connections.saturating_sub(1);
    }
}

#[derive(Debug)]
pub struct MemoryCursor<'c> {
    columns: Vec<Column>,
    rows: VecDeque<Vec<Value>>,
    failure: Option<String>,
    state: Arc<Mutex<MemoryState>>,
    _connection: PhantomData<&'c mut MemoryConnection>,
}

impl BackendCursor for MemoryCursor<'_> {
    fn columns(&self) -> &[Column] {
        &self.columns
    }

    fn next_row(&mut self) -> Result<Option<Vec<Value>>, DriverError> {
        match (self.rows.pop_front(), &self.failure) {
            (Some(row), _) => Ok(Some(row)),
            (None, Some(message)) => Err(DriverError::new(message.clone())),
            (None, None) => Ok(None),
        }
    }
}

impl Drop for MemoryCursor<'_> {
    fn drop(&mut self) {
        let mut state = lock(&self.state);
        state.open_cursors = state.open_cursors.saturating_sub(1);
    }
}
