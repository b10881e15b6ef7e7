use super::{Backend, BackendConnection, BackendCursor};
use crate::core::db::query::{Column, Value, ValueKind};
use crate::core::DriverError;
use odbc_api::handles::StatementImpl;
use odbc_api::{ConnectionOptions, Cursor, CursorImpl, DataType, Environment, ResultSetMetadata};
use once_cell::sync::OnceCell;
use tracing::debug;

/// Process-wide ODBC environment, allocated on first connect.
static ENVIRONMENT: OnceCell<Environment> = OnceCell::new();

fn environment() -> Result<&'static Environment, DriverError> {
    ENVIRONMENT
        .get_or_try_init(|| {
            debug!("allocating ODBC environment");
            Environment::new()
        })
        .map_err(DriverError::from)
}

/// Connects through the system ODBC driver manager.
#[derive(Debug, Clone, Copy, Default)]
pub struct OdbcBackend;

impl Backend for OdbcBackend {
    type Connection = OdbcConnection;

    fn connect(&self, connection_string: &str) -> Result<OdbcConnection, DriverError> {
        let connection = environment()?
            .connect_with_connection_string(connection_string, ConnectionOptions::default())?;
        Ok(OdbcConnection { connection })
    }
}

pub struct OdbcConnection {
    connection: odbc_api::Connection<'static>,
}

impl BackendConnection for OdbcConnection {
    type Cursor<'c> = OdbcCursor<'c> where Self: 'c;

    fn execute(&mut self, query: &str) -> Result<Option<OdbcCursor<'_>>, DriverError> {
        match self.connection.execute(query, ())? {
            Some(cursor) => OdbcCursor::new(cursor).map(Some),
            None => Ok(None),
        }
    }

    fn is_dead(&self) -> Result<bool, DriverError> {
        Ok(self.connection.is_dead()?)
    }
}

pub struct OdbcCursor<'c> {
    cursor: CursorImpl<StatementImpl<'c>>,
    columns: Vec<Column>,
    buffer: Vec<u8>,
}

impl<'c> OdbcCursor<'c> {
    fn new(mut cursor: CursorImpl<StatementImpl<'c>>) -> Result<Self, DriverError> {
        let count = cursor.num_result_cols()?;
        let mut columns = Vec::with_capacity(count.max(0) as usize);
        for index in 1..=count {
            let index = index as u16;
            let name = cursor.col_name(index)?;
            let kind = value_kind(cursor.col_data_type(index)?);
            columns.push(Column::new(name, kind));
        }
        Ok(OdbcCursor {
            cursor,
            columns,
            buffer: Vec::new(),
        })
    }
}

impl BackendCursor for OdbcCursor<'_> {
    fn columns(&self) -> &[Column] {
        &self.columns
    }

    fn next_row(&mut self) -> Result<Option<Vec<Value>>, DriverError> {
        let Some(mut row) = self.cursor.next_row()? else {
            return Ok(None);
        };
        let mut values = Vec::with_capacity(self.columns.len());
        for (index, column) in self.columns.iter().enumerate() {
            self.buffer.clear();
            // Column numbers are 1-based in ODBC
            let present = row.get_text((index + 1) as u16, &mut self.buffer)?;
            values.push(if present {
                column.kind.parse(&self.buffer)
            } else {
                Value::Null
            });
        }
        Ok(Some(values))
    }
}

/// Maps an ODBC column type onto the value kind rows are parsed into.
fn value_kind(data_type: DataType) -> ValueKind {
    match data_type {
        DataType::TinyInt | DataType::SmallInt | DataType::Integer | DataType::BigInt => {
            ValueKind::Integer
        }
        DataType::Real | DataType::Float { .. } | DataType::Double => ValueKind::Float,
        DataType::Bit => ValueKind::Bool,
        DataType::Date => ValueKind::Date,
        DataType::Timestamp { .. } => ValueKind::Timestamp,
        _ => ValueKind::Text,
    }
}
