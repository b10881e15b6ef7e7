/// Backend Module
///
/// The connection wrapper never talks to a driver directly. It goes through
/// the traits in this module, implemented by:
/// - **ODBC** (`odbc.rs`): the real driver manager via `odbc-api`
/// - **Memory** (`memory.rs`): a scripted in-process stand-in for tests
///
/// Resources are released by dropping them: a dropped connection
/// disconnects and a dropped cursor is closed.
pub mod memory;
pub mod odbc;

pub use memory::{MemoryBackend, Script};
pub use odbc::OdbcBackend;

use crate::core::db::query::{Column, Value};
use crate::core::DriverError;

/// Opens connections from a connection string.
pub trait Backend {
    type Connection: BackendConnection;

    fn connect(&self, connection_string: &str) -> Result<Self::Connection, DriverError>;
}

/// A live connection handle.
pub trait BackendConnection {
    /// Cursor type, borrowing the connection for as long as it is open.
    type Cursor<'c>: BackendCursor
    where
        Self: 'c;

    /// Runs a statement. Returns `None` when it produced no result set.
    fn execute(&mut self, query: &str) -> Result<Option<Self::Cursor<'_>>, DriverError>;

    /// Asks the driver whether the connection has been lost.
    fn is_dead(&self) -> Result<bool, DriverError>;
}

/// A forward-only cursor over a result set.
pub trait BackendCursor {
    fn columns(&self) -> &[Column];

    fn next_row(&mut self) -> Result<Option<Vec<Value>>, DriverError>;
}

/// The cursor type produced by a backend's connections.
pub type CursorOf<'c, B> =
    <<B as Backend>::Connection as BackendConnection>::Cursor<'c>;
