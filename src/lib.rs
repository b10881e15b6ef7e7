// Core infrastructure modules
pub mod config;
pub mod core;

// Terminal front end
pub mod command_palette;
pub mod repl;
pub mod results_grid;

pub use crate::core::db::{PgConnection, Reader, ResultTable, Value};
pub use crate::core::{Error, ErrorKind, Result};
