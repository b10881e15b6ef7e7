/// Database Module
///
/// This module provides the database layer for pgodbc, organized into
/// focused submodules.
///
/// ## Architecture
///
/// - **Connection Management** (`connection.rs`): `PgConnection`, its lifecycle and query entry points
/// - **Query Results** (`query.rs`): typed values, materialized tables and the streaming `Reader`
/// - **Backends** (`backend/`): the driver seam, with ODBC and scripted in-memory implementations
///
/// ## Error Handling
///
/// All database operations return the crate-wide `Error` type; `Error::kind`
/// tells configuration, connectivity, query and resource-state failures apart.
pub mod backend;
pub mod connection;
pub mod query;

pub use backend::{Backend, BackendConnection, BackendCursor, MemoryBackend, OdbcBackend, Script};
pub use connection::*;
pub use query::*;
