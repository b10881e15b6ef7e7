/// Connection Management Module
///
/// This module provides [`PgConnection`], which owns one database connection
/// and mediates every query through it.

use crate::core::db::backend::{Backend, BackendConnection, OdbcBackend};
use crate::core::db::query::{Reader, ReaderState, ResultTable};
use crate::core::{Error, Result};
use std::fmt;
use tracing::{debug, info, warn};

/// Builds the ODBC connection string for a data source name.
///
/// The DSN is substituted verbatim, without escaping.
pub fn connection_string(dsn: &str) -> String {
    format!("DSN={}", dsn)
}

/// Represents the connection lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// No connection has been opened yet
    #[default]
    Uninitialized,
    /// A connection handle is held
    Open,
    /// The connection was explicitly closed
    Closed,
}

/// A connection to a PostgreSQL data source.
///
/// Construction connects immediately. Queries either come back as a
/// materialized [`ResultTable`] ([`execute`](Self::execute)) or as a
/// [`Reader`] streaming rows off the open cursor
/// ([`execute_reader`](Self::execute_reader)).
///
/// # Examples
///
/// ```no_run
/// use pgodbc::core::db::PgConnection;
///
/// let mut conn = PgConnection::new("mydb")?;
/// let table = conn.execute("SELECT id, name FROM users")?;
/// println!("{} rows", table.row_count());
///
/// let mut reader = conn.execute_reader("SELECT name FROM users")?;
/// while let Some(row) = reader.next_row()? {
///     println!("{}", row[0]);
/// }
/// reader.close();
///
/// conn.close_connection();
/// # Ok::<(), pgodbc::core::Error>(())
/// ```
pub struct PgConnection<B: Backend = OdbcBackend> {
    dsn: String,
    backend: B,
    connection: Option<B::Connection>,
    state: ConnectionState,
    reader: ReaderState,
}

impl PgConnection<OdbcBackend> {
    /// Connects to the ODBC data source named `dsn`.
    ///
    /// # Errors
    ///
    /// Returns `Error::Driver` carrying the driver's message if the
    /// connection cannot be opened.
    pub fn new(dsn: impl Into<String>) -> Result<Self> {
        Self::with_backend(OdbcBackend, dsn)
    }
}

impl<B: Backend> PgConnection<B> {
    /// Connects to `dsn` through the given backend.
    pub fn with_backend(backend: B, dsn: impl Into<String>) -> Result<Self> {
        let mut conn = PgConnection {
            dsn: dsn.into(),
            backend,
            connection: None,
            state: ConnectionState::Uninitialized,
            reader: ReaderState::Never,
        };
        let connection = conn
            .backend
            .connect(&conn.connection_string())
            .map_err(Error::Driver)?;
        conn.connection = Some(connection);
        conn.state = ConnectionState::Open;
        info!(dsn = %conn.dsn, "connection opened");
        Ok(conn)
    }

    pub fn dsn(&self) -> &str {
        &self.dsn
    }

    /// Replaces the data source name. Takes effect on the next open.
    pub fn set_dsn(&mut self, dsn: impl Into<String>) {
        self.dsn = dsn.into();
    }

    pub fn connection_string(&self) -> String {
        connection_string(&self.dsn)
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn reader_state(&self) -> ReaderState {
        self.reader
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Opens the connection again if it is not open.
    ///
    /// # Errors
    ///
    /// - `Error::BlankDsn` if the DSN is empty or whitespace. State is left untouched.
    /// - `Error::Connection` wrapping the driver's message if the open fails.
    pub fn open_connection(&mut self) -> Result<()> {
        if self.dsn.trim().is_empty() {
            warn!("refusing to connect with a blank data source name");
            return Err(Error::BlankDsn);
        }
        if self.is_connected() {
            return Ok(());
        }

        let connection = self
            .backend
            .connect(&self.connection_string())
            .map_err(|e| {
                warn!(dsn = %self.dsn, error = %e, "failed to open connection");
                Error::Connection(e)
            })?;
        self.connection = Some(connection);
        self.state = ConnectionState::Open;
        info!(dsn = %self.dsn, "connection reopened");
        Ok(())
    }

    /// Checks if the connection is open.
    ///
    /// This reflects the tracked state only and does not contact the server,
    /// so a connection severed by the network still reports `true`. See
    /// [`is_alive`](Self::is_alive) for a driver-level check.
    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Open && self.connection.is_some()
    }

    /// Asks the driver whether the open connection is still usable.
    pub fn is_alive(&self) -> bool {
        match (&self.connection, self.state) {
            (Some(connection), ConnectionState::Open) => match connection.is_dead() {
                Ok(dead) => !dead,
                Err(e) => {
                    debug!(error = %e, "connection liveness check failed");
                    false
                }
            },
            _ => false,
        }
    }

    /// Executes `query` and returns all of its rows.
    ///
    /// Works for statements with and without a result set; the latter give
    /// an empty table. A query that matches no rows still returns its
    /// columns, so the table has a schema even when it has no rows. Reconnects first if the connection is closed, but a
    /// failed reconnect is returned as-is and not retried. The cursor is
    /// always closed before this returns.
    ///
    /// The query text is sent verbatim; there is no parameter binding.
    pub fn execute(&mut self, query: &str) -> Result<ResultTable> {
        if !self.is_connected() {
            debug!("connection closed, reopening before execute");
            self.open_connection()?;
        }
        let table = self.execute_reader(query)?.collect_table()?;
        debug!(rows = table.row_count(), columns = table.column_count(), "query materialized");
        Ok(table)
    }

    /// Executes `query` and returns a reader over its rows.
    ///
    /// The reader holds the cursor open until it is closed, dropped or
    /// read to the end. Unlike [`execute`](Self::execute) this does not
    /// reconnect.
    ///
    /// # Errors
    ///
    /// - `Error::NotConnected` if the connection has been closed.
    /// - `Error::Query` if the driver rejects the statement.
    pub fn execute_reader(&mut self, query: &str) -> Result<Reader<'_, B>> {
        let connection = match (self.state, self.connection.as_mut()) {
            (ConnectionState::Open, Some(connection)) => connection,
            _ => return Err(Error::NotConnected),
        };
        debug!(query, "executing");
        let cursor = connection.execute(query).map_err(|e| {
            debug!(error = %e, "statement failed");
            Error::Query(e)
        })?;
        Ok(Reader::new(cursor, &mut self.reader))
    }

    /// Closes the cursor.
    ///
    /// A [`Reader`] closes its cursor when it goes away and borrows the
    /// connection while it lives, so by the time this can be called the
    /// cursor is already closed and there is nothing left to do.
    ///
    /// # Errors
    ///
    /// `Error::NoReader` if no query has created a cursor since the
    /// connection was created or last closed.
    pub fn close_reader(&mut self) -> Result<()> {
        match self.reader {
            ReaderState::Never => Err(Error::NoReader),
            ReaderState::Open | ReaderState::Closed => {
                self.reader = ReaderState::Closed;
                Ok(())
            }
        }
    }

    /// Closes the connection and releases its handle.
    ///
    /// Afterwards [`is_connected`](Self::is_connected) reports `false`.
    /// Calling this on a closed connection does nothing.
    pub fn close_connection(&mut self) {
        if let Some(connection) = self.connection.take() {
            drop(connection);
            info!(dsn = %self.dsn, "connection closed");
        }
        self.state = ConnectionState::Closed;
        self.reader = ReaderState::Never;
    }
}

impl<B: Backend> fmt::Debug for PgConnection<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PgConnection")
            .field("dsn", &self.dsn)
            .field("state", &self.state)
            .field("reader", &self.reader)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::db::backend::MemoryBackend;
    use crate::core::db::query::{Column, Value, ValueKind};
    use crate::core::ErrorKind;

    fn backend() -> MemoryBackend {
        MemoryBackend::new()
            .with_rows(
                "SELECT 1",
                ResultTable::new(
                    vec![Column::new("?column?", ValueKind::Integer)],
                    vec![vec![Value::Integer(1)]],
                ),
            )
            .with_statement("CREATE TABLE t (id integer)")
    }

    #[test]
    fn test_connection_string_format() {
        assert_eq!(connection_string("mydb"), "DSN=mydb");
        assert_eq!(connection_string("my db;x"), "DSN=my db;x");
    }

    #[test]
    fn test_construct_opens_immediately() {
        let backend = backend();
        let conn = PgConnection::with_backend(backend.clone(), "mydb").unwrap();

        assert!(conn.is_connected());
        assert_eq!(conn.state(), ConnectionState::Open);
        assert_eq!(conn.connection_string(), "DSN=mydb");
        assert_eq!(backend.last_connection_string().as_deref(), Some("DSN=mydb"));
        assert_eq!(backend.connect_count(), 1);
    }

    #[test]
    fn test_construct_failure_passes_driver_message_through() {
        let backend = MemoryBackend::new();
        backend.refuse_connections("[unixODBC][Driver Manager]Data source name not found");

        let err = PgConnection::with_backend(backend, "nope").unwrap_err();
        assert!(matches!(err, Error::Driver(_)));
        assert_eq!(
            err.to_string(),
            "[unixODBC][Driver Manager]Data source name not found"
        );
    }

    #[test]
    fn test_open_connection_is_noop_when_connected() {
        let backend = backend();
        let mut conn = PgConnection::with_backend(backend.clone(), "mydb").unwrap();

        conn.open_connection().unwrap();
        assert_eq!(backend.connect_count(), 1);
    }

    #[test]
    fn test_open_connection_rejects_blank_dsn() {
        let backend = backend();
        let mut conn = PgConnection::with_backend(backend.clone(), "mydb").unwrap();
        conn.close_connection();
        conn.set_dsn("   ");

        let err = conn.open_connection().unwrap_err();
        assert!(matches!(err, Error::BlankDsn));
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert_eq!(conn.state(), ConnectionState::Closed);
        assert_eq!(backend.connect_count(), 1);
    }

    #[test]
    fn test_open_connection_wraps_driver_errors() {
        let backend = backend();
        let mut conn = PgConnection::with_backend(backend.clone(), "mydb").unwrap();
        conn.close_connection();
        backend.refuse_connections("server closed the connection unexpectedly");

        let err = conn.open_connection().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Connectivity);
        assert_eq!(
            err.to_string(),
            "An error occurred while opening the connection: server closed the connection unexpectedly"
        );
        assert!(!conn.is_connected());
    }

    #[test]
    fn test_close_connection_is_idempotent() {
        let backend = backend();
        let mut conn = PgConnection::with_backend(backend.clone(), "mydb").unwrap();

        conn.close_connection();
        assert!(!conn.is_connected());
        assert_eq!(backend.open_connections(), 0);

        conn.close_connection();
        assert!(!conn.is_connected());
        assert_eq!(conn.state(), ConnectionState::Closed);
    }

    #[test]
    fn test_execute_materializes_and_closes_cursor() {
        let backend = backend();
        let mut conn = PgConnection::with_backend(backend.clone(), "mydb").unwrap();

        let table = conn.execute("SELECT 1").unwrap();
        assert_eq!(table.row_count(), 1);
        assert_eq!(table.column_count(), 1);
        assert_eq!(table.get(0, 0), Some(&Value::Integer(1)));
        assert_eq!(conn.reader_state(), ReaderState::Closed);
        assert_eq!(backend.open_cursors(), 0);
    }

    #[test]
    fn test_execute_statement_without_results() {
        let mut conn = PgConnection::with_backend(backend(), "mydb").unwrap();

        let table = conn.execute("CREATE TABLE t (id integer)").unwrap();
        assert!(table.is_empty());
        assert_eq!(table.column_count(), 0);
        assert_eq!(conn.reader_state(), ReaderState::Closed);
    }

    #[test]
    fn test_execute_reconnects_when_closed() {
        let backend = backend();
        let mut conn = PgConnection::with_backend(backend.clone(), "mydb").unwrap();
        conn.close_connection();

        conn.execute("SELECT 1").unwrap();
        assert!(conn.is_connected());
        assert_eq!(backend.connect_count(), 2);
    }

    #[test]
    fn test_execute_reader_requires_open_connection() {
        let mut conn = PgConnection::with_backend(backend(), "mydb").unwrap();
        conn.close_connection();

        let err = conn.execute_reader("SELECT 1").unwrap_err();
        assert!(matches!(err, Error::NotConnected));
        assert_eq!(err.kind(), ErrorKind::ResourceState);
    }

    #[test]
    fn test_close_reader_before_any_query() {
        let mut conn = PgConnection::with_backend(backend(), "mydb").unwrap();
        assert!(matches!(conn.close_reader(), Err(Error::NoReader)));

        conn.execute("SELECT 1").unwrap();
        conn.close_reader().unwrap();
        conn.close_reader().unwrap();

        conn.close_connection();
        assert!(matches!(conn.close_reader(), Err(Error::NoReader)));
    }

    #[test]
    fn test_query_errors_are_classified() {
        let mut conn = PgConnection::with_backend(backend(), "mydb").unwrap();
        let err = conn.execute("SELECT * FROM missing").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Query);
        assert!(conn.is_connected());
    }

    #[test]
    fn test_is_alive_consults_driver() {
        let backend = backend();
        let mut conn = PgConnection::with_backend(backend.clone(), "mydb").unwrap();
        assert!(conn.is_alive());

        backend.set_dead(true);
        assert!(!conn.is_alive());
        // The tracked state does not ping the server
        assert!(conn.is_connected());

        conn.close_connection();
        backend.set_dead(false);
        assert!(!conn.is_alive());
    }
}
