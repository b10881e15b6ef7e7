/// pgodbc Error Module
///
/// This module defines the error types surfaced by the connection wrapper,
/// the backends beneath it and the terminal front end on top of it.
use std::fmt;
use thiserror::Error;

/// An error reported by the native driver (or a backend standing in for it).
///
/// Only the driver's own message is kept. Callers that need to tell causes
/// apart should use [`Error::kind`] rather than parsing this text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverError {
    message: String,
}

impl DriverError {
    pub fn new(message: impl Into<String>) -> Self {
        DriverError {
            message: message.into(),
        }
    }

    /// The driver's message, unmodified.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for DriverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for DriverError {}

impl From<odbc_api::Error> for DriverError {
    fn from(error: odbc_api::Error) -> Self {
        DriverError::new(error.to_string())
    }
}

/// Broad classes of failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The wrapper was configured with something unusable (blank DSN, bad config file).
    Configuration,
    /// A connection could not be established.
    Connectivity,
    /// The driver rejected or failed a statement.
    Query,
    /// An operation was invoked on a handle that does not exist.
    ResourceState,
    /// Terminal front end and I/O failures.
    Application,
}

/// Error type for pgodbc.
#[derive(Error, Debug)]
pub enum Error {
    /// The data source name is empty or whitespace.
    #[error("Cannot connect to database with blank data source name.")]
    BlankDsn,

    /// Driver failure while opening the connection at construction, passed through as-is.
    #[error("{0}")]
    Driver(DriverError),

    /// Driver failure while (re)opening the connection.
    #[error("An error occurred while opening the connection: {0}")]
    Connection(DriverError),

    /// Driver failure while running a statement or fetching its rows.
    #[error("{0}")]
    Query(DriverError),

    /// A statement was issued after the connection handle was released.
    #[error("Resource error: the connection has been closed")]
    NotConnected,

    /// The cursor was closed before any query created one.
    #[error("Resource error: no reader has been opened on this connection")]
    NoReader,

    /// Configuration loading and validation errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Export and rendering errors
    #[error("UI error: {0}")]
    Ui(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Classifies the error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::BlankDsn | Error::Config(_) => ErrorKind::Configuration,
            Error::Driver(_) | Error::Connection(_) => ErrorKind::Connectivity,
            Error::Query(_) => ErrorKind::Query,
            Error::NotConnected | Error::NoReader => ErrorKind::ResourceState,
            Error::Ui(_) | Error::Io(_) | Error::Json(_) => ErrorKind::Application,
        }
    }

    /// The underlying driver error, if the failure came from the driver.
    pub fn driver_error(&self) -> Option<&DriverError> {
        match self {
            Error::Driver(e) | Error::Connection(e) | Error::Query(e) => Some(e),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
