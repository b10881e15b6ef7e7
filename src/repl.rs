use crate::command_palette::CommandPalette;
use crate::core::db::{Backend, PgConnection};
use crate::core::Result;
use crate::results_grid::ResultsGrid;
use std::io::{BufRead, Write};
use tracing::debug;

/// Represents a parsed REPL command.
#[derive(Debug, PartialEq)]
pub enum Command {
    Open(String),
    Close,
    Status,
    Reader(String),
    Export(String),
    Next,
    Prev,
    Help,
    Quit,
    Sql(String),
    Unknown(String),
}

/// Whether the REPL keeps reading input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// Parses a user input string into a corresponding `Command`.
///
/// If the input starts with a colon (`:`), it is interpreted as a command.
/// Otherwise, it is treated as a SQL query.
pub fn parse_command(input: &str) -> Command {
    let input = input.trim();
    let Some(trimmed) = input.strip_prefix(':') else {
        return Command::Sql(input.to_string());
    };
    let (name, rest) = match trimmed.split_once(char::is_whitespace) {
        Some((name, rest)) => (name, rest.trim()),
        None => (trimmed, ""),
    };
    match (name, rest.is_empty()) {
        ("open", false) => Command::Open(rest.to_string()),
        ("close", _) => Command::Close,
        ("status", _) => Command::Status,
        ("reader", false) => Command::Reader(rest.to_string()),
        ("export", false) => Command::Export(rest.to_string()),
        ("next", _) => Command::Next,
        ("prev", _) => Command::Prev,
        ("help", _) => Command::Help,
        ("quit", _) | ("q", _) => Command::Quit,
        _ => Command::Unknown(input.to_string()),
    }
}

/// Line-oriented shell over a single [`PgConnection`].
pub struct Repl<B: Backend + Clone> {
    backend: B,
    connection: Option<PgConnection<B>>,
    /// Last materialized result, paged with `:next` / `:prev`
    grid: Option<ResultsGrid>,
    page_size: usize,
    palette: CommandPalette,
}

impl<B: Backend + Clone> Repl<B> {
    pub fn new(backend: B, page_size: usize) -> Self {
        Repl {
            backend,
            connection: None,
            grid: None,
            page_size,
            palette: CommandPalette::new(),
        }
    }

    /// Connects to `dsn`, replacing the current connection on success.
    pub fn connect(&mut self, dsn: &str) -> Result<()> {
        let connection = PgConnection::with_backend(self.backend.clone(), dsn)?;
        if let Some(mut previous) = self.connection.replace(connection) {
            previous.close_connection();
        }
        Ok(())
    }

    pub fn connection(&self) -> Option<&PgConnection<B>> {
        self.connection.as_ref()
    }

    /// Reads commands from `input` until `:quit` or end of input.
    pub fn run<R: BufRead, W: Write>(&mut self, input: R, mut out: W) -> Result<()> {
        writeln!(out, "Type :help for commands, :quit to exit.")?;
        let mut lines = input.lines();
        loop {
            write!(out, "> ")?;
            out.flush()?;
            let Some(line) = lines.next() else {
                writeln!(out)?;
                break;
            };
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            if self.handle_line(&line, &mut out)? == Flow::Quit {
                break;
            }
        }
        if let Some(connection) = self.connection.as_mut() {
            connection.close_connection();
        }
        Ok(())
    }

    /// Runs one line of input. Only I/O failures on `out` are returned;
    /// database errors are reported on `out`.
    pub fn handle_line<W: Write>(&mut self, line: &str, out: &mut W) -> Result<Flow> {
        let command = parse_command(line);
        debug!(?command, "repl command");
        match command {
            Command::Help => {
                writeln!(out, "Available commands:")?;
                for cmd in self.palette.commands() {
                    writeln!(out, "  {} - {}", cmd.usage, cmd.description)?;
                }
                writeln!(out, "\nOr enter SQL queries directly without any prefix.")?;
            }
            Command::Quit => return Ok(Flow::Quit),
            Command::Open(dsn) => match self.connect(&dsn) {
                Ok(()) => writeln!(out, "Connected to data source: {}", dsn)?,
                Err(e) => writeln!(out, "Error opening data source: {}", e)?,
            },
            Command::Close => match self.connection.as_mut() {
                Some(connection) => {
                    connection.close_connection();
                    writeln!(out, "Connection closed.")?;
                }
                None => writeln!(out, "Not connected.")?,
            },
            Command::Status => match self.connection.as_ref() {
                Some(connection) if connection.is_connected() => writeln!(
                    out,
                    "Connected ({}), driver reports the connection as {}.",
                    connection.connection_string(),
                    if connection.is_alive() { "alive" } else { "dead" }
                )?,
                Some(connection) => writeln!(out, "Closed ({}).", connection.connection_string())?,
                None => writeln!(out, "Not connected.")?,
            },
            Command::Sql(sql) => self.run_query(&sql, out)?,
            Command::Reader(sql) => self.stream_query(&sql, out)?,
            Command::Export(format) => match &self.grid {
                Some(grid) => match grid.export(&format) {
                    Ok(text) => write!(out, "{}", text)?,
                    Err(e) => writeln!(out, "Error: {}", e)?,
                },
                None => writeln!(out, "No result set to export.")?,
            },
            Command::Next => self.turn_page(out, |grid| grid.viewport.page_down(grid.rows.len()))?,
            Command::Prev => self.turn_page(out, |grid| grid.viewport.page_up())?,
            Command::Unknown(input) => {
                writeln!(out, "Unknown command: {}", input)?;
                let name = input.trim_start_matches(':').split_whitespace().next().unwrap_or("");
                let suggestions = self.palette.filter_commands(name);
                if !name.is_empty() && !suggestions.is_empty() {
                    writeln!(out, "Did you mean:")?;
                    for suggestion in suggestions {
                        writeln!(out, "  {} - {}", suggestion.usage, suggestion.description)?;
                    }
                }
            }
        }
        Ok(Flow::Continue)
    }

    fn turn_page<W: Write>(&mut self, out: &mut W, turn: impl FnOnce(&mut ResultsGrid)) -> Result<()> {
        match self.grid.as_mut() {
            Some(grid) if !grid.headers.is_empty() => {
                turn(grid);
                write_page(grid, out)
            }
            _ => {
                writeln!(out, "No result set to page through.")?;
                Ok(())
            }
        }
    }

    fn run_query<W: Write>(&mut self, sql: &str, out: &mut W) -> Result<()> {
        let Some(connection) = self.connection.as_mut() else {
            writeln!(out, "Not connected. Use :open <dsn> first.")?;
            return Ok(());
        };
        match connection.execute(sql) {
            Ok(table) => {
                let grid = ResultsGrid::from_table(&table, self.page_size);
                if table.column_count() == 0 {
                    writeln!(out, "OK")?;
                } else {
                    write_page(&grid, out)?;
                    writeln!(out, "({} rows)", table.row_count())?;
                }
                self.grid = Some(grid);
            }
            Err(e) => writeln!(out, "Error executing query: {}", e)?,
        }
        Ok(())
    }

    fn stream_query<W: Write>(&mut self, sql: &str, out: &mut W) -> Result<()> {
        let Some(connection) = self.connection.as_mut() else {
            writeln!(out, "Not connected. Use :open <dsn> first.")?;
            return Ok(());
        };
        let mut reader = match connection.execute_reader(sql) {
            Ok(reader) => reader,
            Err(e) => {
                writeln!(out, "Error executing query: {}", e)?;
                return Ok(());
            }
        };
        let headers: Vec<&str> = reader.columns().iter().map(|c| c.name.as_str()).collect();
        if !headers.is_empty() {
            writeln!(out, "{}", headers.join(" | "))?;
        }
        let mut count = 0;
        loop {
            match reader.next_row() {
                Ok(Some(row)) => {
                    let cells: Vec<String> = row.iter().map(ToString::to_string).collect();
                    writeln!(out, "{}", cells.join(" | "))?;
                    count += 1;
                }
                Ok(None) => break,
                Err(e) => {
                    writeln!(out, "Error reading row: {}", e)?;
                    break;
                }
            }
        }
        reader.close();
        writeln!(out, "({} rows streamed)", count)?;
        Ok(())
    }
}

/// Writes the visible page of `grid`, with a position line when there is more than one page.
fn write_page<W: Write>(grid: &ResultsGrid, out: &mut W) -> Result<()> {
    write!(out, "{}", grid.render())?;
    if grid.rows.len() > grid.viewport.page_size() {
        writeln!(out, "... {} (:next / :prev to page)", grid.page_status())?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::db::{Column, MemoryBackend, ResultTable, Value, ValueKind};

    fn users() -> ResultTable {
        ResultTable::new(
            vec![Column::new("id", ValueKind::Integer), Column::new("name", ValueKind::Text)],
            vec![
                vec![Value::Integer(1), Value::Text("Alice".into())],
                vec![Value::Integer(2), Value::Null],
            ],
        )
    }

    fn repl() -> (Repl<MemoryBackend>, MemoryBackend) {
        let backend = MemoryBackend::new()
            .with_rows("SELECT id, name FROM users", users())
            .with_statement("DELETE FROM users");
        (Repl::new(backend.clone(), 10), backend)
    }

    fn run(repl: &mut Repl<MemoryBackend>, line: &str) -> String {
        let mut out = Vec::new();
        repl.handle_line(line, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_parse_open_command() {
        assert_eq!(parse_command(":open mydb"), Command::Open("mydb".to_string()));
        assert_eq!(parse_command(":open"), Command::Unknown(":open".to_string()));
    }

    #[test]
    fn test_parse_reader_keeps_whole_query() {
        assert_eq!(
            parse_command(":reader SELECT id, name FROM users"),
            Command::Reader("SELECT id, name FROM users".to_string())
        );
    }

    #[test]
    fn test_parse_simple_commands() {
        assert_eq!(parse_command(":close"), Command::Close);
        assert_eq!(parse_command(":status"), Command::Status);
        assert_eq!(parse_command(":quit"), Command::Quit);
        assert_eq!(parse_command(":export csv"), Command::Export("csv".to_string()));
        assert_eq!(parse_command(":next"), Command::Next);
        assert_eq!(parse_command(":prev"), Command::Prev);
    }

    #[test]
    fn test_parse_unknown_command() {
        assert_eq!(parse_command(":invalid"), Command::Unknown(":invalid".to_string()));
    }

    #[test]
    fn test_parse_sql_query() {
        assert_eq!(
            parse_command("SELECT * FROM users"),
            Command::Sql("SELECT * FROM users".to_string())
        );
    }

    #[test]
    fn test_query_without_connection() {
        let (mut repl, _) = repl();
        assert!(run(&mut repl, "SELECT 1").contains("Not connected"));
    }

    #[test]
    fn test_open_and_query() {
        let (mut repl, backend) = repl();
        assert!(run(&mut repl, ":open mydb").contains("Connected to data source: mydb"));
        assert_eq!(backend.last_connection_string().as_deref(), Some("DSN=mydb"));

        let output = run(&mut repl, "SELECT id, name FROM users");
        assert!(output.contains("id | name"));
        assert!(output.contains("1  | Alice"));
        assert!(output.contains("2  | NULL"));
        assert!(output.contains("(2 rows)"));
        assert_eq!(backend.open_cursors(), 0);
    }

    #[test]
    fn test_statement_prints_ok() {
        let (mut repl, _) = repl();
        run(&mut repl, ":open mydb");
        assert_eq!(run(&mut repl, "DELETE FROM users"), "OK\n");
    }

    #[test]
    fn test_reader_streams_rows() {
        let (mut repl, backend) = repl();
        run(&mut repl, ":open mydb");
        let output = run(&mut repl, ":reader SELECT id, name FROM users");
        assert_eq!(output, "id | name\n1 | Alice\n2 | NULL\n(2 rows streamed)\n");
        assert_eq!(backend.open_cursors(), 0);
    }

    #[test]
    fn test_close_then_query_reconnects() {
        let (mut repl, backend) = repl();
        run(&mut repl, ":open mydb");
        assert!(run(&mut repl, ":close").contains("Connection closed."));
        assert!(run(&mut repl, ":status").contains("Closed (DSN=mydb)"));

        run(&mut repl, "SELECT id, name FROM users");
        assert_eq!(backend.connect_count(), 2);
        assert!(run(&mut repl, ":status").contains("alive"));
    }

    #[test]
    fn test_export_last_result() {
        let (mut repl, _) = repl();
        run(&mut repl, ":open mydb");
        assert!(run(&mut repl, ":export csv").contains("No result set"));

        run(&mut repl, "SELECT id, name FROM users");
        assert_eq!(run(&mut repl, ":export csv"), "id,name\n1,Alice\n2,\n");
        assert!(run(&mut repl, ":export xml").contains("Unsupported export format"));
    }

    #[test]
    fn test_paging_through_last_result() {
        let numbers = ResultTable::new(
            vec![Column::new("n", ValueKind::Integer)],
            (1..=5).map(|i| vec![Value::Integer(i)]).collect(),
        );
        let backend = MemoryBackend::new().with_rows("SELECT n FROM numbers", numbers);
        let mut repl = Repl::new(backend, 2);
        assert!(run(&mut repl, ":next").contains("No result set to page through."));

        run(&mut repl, ":open mydb");
        let output = run(&mut repl, "SELECT n FROM numbers");
        assert_eq!(
            output,
            "n\n-\n1\n2\n... rows 1-2 of 5 (:next / :prev to page)\n(5 rows)\n"
        );

        let output = run(&mut repl, ":next");
        assert_eq!(output, "n\n-\n3\n4\n... rows 3-4 of 5 (:next / :prev to page)\n");
        assert!(run(&mut repl, ":next").contains("rows 4-5 of 5"));
        assert!(run(&mut repl, ":prev").contains("rows 2-3 of 5"));

        // Export still covers every row, not just the visible page
        assert_eq!(run(&mut repl, ":export csv"), "n\n1\n2\n3\n4\n5\n");
    }

    #[test]
    fn test_failed_open_reports_error() {
        let (mut repl, backend) = repl();
        backend.refuse_connections("Data source name not found");
        let output = run(&mut repl, ":open nowhere");
        assert!(output.contains("Error opening data source: Data source name not found"));
        assert!(repl.connection().is_none());
    }

    #[test]
    fn test_unknown_command_suggestions() {
        let (mut repl, _) = repl();
        let output = run(&mut repl, ":stat");
        assert!(output.contains("Unknown command: :stat"));
        assert!(output.contains(":status"));
    }

    #[test]
    fn test_run_until_quit() {
        let (mut repl, backend) = repl();
        let input = b":open mydb\nSELECT id, name FROM users\n:quit\nSELECT 1\n";
        let mut out = Vec::new();
        repl.run(&input[..], &mut out).unwrap();

        let output = String::from_utf8(out).unwrap();
        assert!(output.contains("(2 rows)"));
        assert_eq!(backend.executed(), vec!["SELECT id, name FROM users"]);
        assert_eq!(backend.open_connections(), 0);
    }
}
