//! Results Grid Module
//!
//! Renders result tables in the terminal, a page at a time, and exports
//! them to text formats.

use crate::core::db::{ResultTable, Value};
use crate::core::{Error, Result};

/// Represents a single cell in the grid.
#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    /// Display text
    pub content: String,
    pub value: Value,
}

impl Cell {
    pub fn is_null(&self) -> bool {
        self.value.is_null()
    }
}

/// Represents a row of cells in the grid.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub cells: Vec<Cell>,
    pub row_index: usize,
}

/// Represents the viewport for virtualized scrolling.
#[derive(Debug, Clone)]
pub struct Viewport {
    pub start: usize,
    pub end: usize,
}

impl Viewport {
    pub fn new(start: usize, end: usize) -> Self {
        Viewport { start, end }
    }

    pub fn visible_rows<'a>(&self, rows: &'a [Row]) -> &'a [Row] {
        let start = self.start.min(rows.len());
        let end = self.end.min(rows.len());
        &rows[start..end]
    }

    pub fn scroll_down(&mut self, total_rows: usize) {
        if self.end < total_rows {
            self.start += 1;
            self.end += 1;
        }
    }

    pub fn scroll_up(&mut self) {
        if self.start > 0 {
            self.start -= 1;
            self.end -= 1;
        }
    }

    pub fn page_size(&self) -> usize {
        self.end - self.start
    }

    /// Moves down a whole page, stopping at the last row.
    pub fn page_down(&mut self, total_rows: usize) {
        for _ in 0..self.page_size() {
            self.scroll_down(total_rows);
        }
    }

    pub fn page_up(&mut self) {
        for _ in 0..self.page_size() {
            self.scroll_up();
        }
    }
}

/// Represents the entire grid structure.
#[derive(Debug, Clone)]
pub struct ResultsGrid {
    pub headers: Vec<String>,
    pub rows: Vec<Row>,
    pub viewport: Viewport,
}

impl Default for ResultsGrid {
    fn default() -> Self {
        Self::new()
    }
}

impl ResultsGrid {
    /// Creates a new, empty ResultsGrid.
    pub fn new() -> Self {
        ResultsGrid {
            headers: Vec::new(),
            rows: Vec::new(),
            viewport: Viewport::new(0, 10), // Default viewport with 10 rows
        }
    }

    /// Builds a grid showing `page_size` rows of a result table at a time.
    pub fn from_table(table: &ResultTable, page_size: usize) -> Self {
        let mut grid = ResultsGrid::new();
        grid.viewport = Viewport::new(0, page_size);
        grid.set_headers(table.column_names().into_iter().map(String::from).collect());
        for values in &table.rows {
            grid.add_values(values);
        }
        grid
    }

    /// Sets the headers for the grid.
    pub fn set_headers(&mut self, headers: Vec<String>) {
        self.headers = headers;
    }

    /// Adds a row to the grid. Each row is represented as a vector of strings.
    pub fn add_row(&mut self, row: Vec<String>) {
        let cells = row
            .into_iter()
            .map(|s| Cell {
                content: s.clone(),
                value: Value::Text(s),
            })
            .collect();
        self.push_cells(cells);
    }

    /// Adds a row of typed values.
    pub fn add_values(&mut self, values: &[Value]) {
        let cells = values
            .iter()
            .map(|value| Cell {
                content: value.to_string(),
                value: value.clone(),
            })
            .collect();
        self.push_cells(cells);
    }

    fn push_cells(&mut self, cells: Vec<Cell>) {
        self.rows.push(Row {
            cells,
            row_index: self.rows.len(),
        });
    }

    /// Width of each column, wide enough for its header and every cell.
    fn column_widths(&self) -> Vec<usize> {
        let mut widths: Vec<usize> = self.headers.iter().map(|h| h.chars().count()).collect();
        for row in &self.rows {
            for (i, cell) in row.cells.iter().enumerate() {
                let len = cell.content.chars().count();
                match widths.get_mut(i) {
                    Some(width) => *width = (*width).max(len),
                    None => widths.push(len),
                }
            }
        }
        widths
    }

    /// One-line summary of which rows the viewport shows, e.g. `rows 21-40 of 95`.
    pub fn page_status(&self) -> String {
        let total = self.rows.len();
        let start = self.viewport.start.min(total);
        let end = self.viewport.end.min(total);
        if start == end {
            format!("rows 0 of {}", total)
        } else {
            format!("rows {}-{} of {}", start + 1, end, total)
        }
    }

    /// Renders the visible rows as aligned text with a header line.
    pub fn render(&self) -> String {
        let widths = self.column_widths();
        let pad = |text: &str, i: usize| {
            let width = widths.get(i).copied().unwrap_or(0);
            format!("{:<width$}", text, width = width)
        };

        let mut output = String::new();
        if !self.headers.is_empty() {
            let header: Vec<String> = self.headers.iter().enumerate().map(|(i, h)| pad(h, i)).collect();
            output.push_str(header.join(" | ").trim_end());
            output.push('\n');
            let underline: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
            output.push_str(&underline.join("-+-"));
            output.push('\n');
        }
        for row in self.viewport.visible_rows(&self.rows) {
            let row_content: Vec<String> = row
                .cells
                .iter()
                .enumerate()
                .map(|(i, cell)| pad(&cell.content, i))
                .collect();
            output.push_str(row_content.join(" | ").trim_end());
            output.push('\n');
        }
        output
    }

    /// Exports the grid data to a specified format.
    /// Supported formats: CSV, JSON, Markdown.
    pub fn export(&self, format: &str) -> Result<String> {
        match format.to_lowercase().as_str() {
            "csv" => Ok(self.export_to_csv()),
            "json" => self.export_to_json(),
            "markdown" | "md" => Ok(self.export_to_markdown()),
            _ => Err(Error::Ui(format!(
                "Unsupported export format: '{}'. Supported formats: csv, json, markdown",
                format
            ))),
        }
    }

    fn export_to_csv(&self) -> String {
        let mut output = String::new();
        if !self.headers.is_empty() {
            let headers: Vec<String> = self.headers.iter().map(|h| csv_field(h)).collect();
            output.push_str(&headers.join(","));
            output.push('\n');
        }
        for row in &self.rows {
            let row_content: Vec<String> = row
                .cells
                .iter()
                .map(|cell| if cell.is_null() { String::new() } else { csv_field(&cell.content) })
                .collect();
            output.push_str(&row_content.join(","));
            output.push('\n');
        }
        output
    }

    /// `{"columns": [...], "rows": [[...], ...]}`, both in result set order.
    fn export_to_json(&self) -> Result<String> {
        let rows: Vec<Vec<&Value>> = self
            .rows
            .iter()
            .map(|row| row.cells.iter().map(|cell| &cell.value).collect())
            .collect();
        let document = serde_json::json!({
            "columns": self.headers,
            "rows": rows,
        });
        Ok(serde_json::to_string(&document)?)
    }

    fn export_to_markdown(&self) -> String {
        let mut output = String::new();
        if !self.headers.is_empty() {
            let headers: Vec<String> = self.headers.iter().map(|h| h.replace('|', "\\|")).collect();
            output.push_str(&headers.join(" | "));
            output.push('\n');
            let underline: Vec<String> = headers
                .iter()
                .map(|h| "-".repeat(h.chars().count().max(3)))
                .collect();
            output.push_str(&underline.join(" | "));
            output.push('\n');
        }
        for row in &self.rows {
            let row_content: Vec<String> =
                row.cells.iter().map(|cell| cell.content.replace('|', "\\|")).collect();
            output.push_str(&row_content.join(" | "));
            output.push('\n');
        }
        output
    }
}

/// Quotes a CSV field when it contains a separator, quote or newline.
fn csv_field(text: &str) -> String {
    if text.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", text.replace('"', "\"\""))
    } else {
        text.to_string()
    }
}
