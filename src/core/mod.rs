/// Core Module for pgodbc
///
/// This module contains the connection wrapper and the error types shared by
/// the rest of the crate.

pub mod db;
pub mod error;

// Re-export commonly used types for convenience
pub use error::{DriverError, Error, ErrorKind, Result};
