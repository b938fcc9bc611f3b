// 📊 Tabular extracts
// In-memory table plus the column resolver used to tolerate header
// variation across source documents.

use anyhow::{bail, Context, Result};
use std::path::Path;

/// A tabular extract: one header row plus data rows, all cells as text.
///
/// This is the shape every tabular artifact takes, whether it came from a
/// spreadsheet sheet, a delimited file, or a table recovered from a PDF
/// text layer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(headers: Vec<String>) -> Self {
        Table {
            headers,
            rows: Vec::new(),
        }
    }

    pub fn push_row(&mut self, row: Vec<String>) {
        self.rows.push(row);
    }

    /// Load a table from CSV bytes. An empty input yields an empty table.
    pub fn from_csv_bytes(bytes: &[u8]) -> Result<Table> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(bytes);

        let headers: Vec<String> = reader
            .headers()
            .context("failed to read CSV header row")?
            .iter()
            .map(|h| h.to_string())
            .collect();

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record.context("failed to read CSV record")?;
            rows.push(record.iter().map(|c| c.to_string()).collect());
        }

        Ok(Table { headers, rows })
    }

    pub fn from_csv_path(path: &Path) -> Result<Table> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("failed to read table artifact: {}", path.display()))?;
        Self::from_csv_bytes(&bytes)
    }

    /// Persist this table as a CSV artifact.
    pub fn write_csv(&self, path: &Path) -> Result<()> {
        let mut writer = csv::WriterBuilder::new()
            .flexible(true)
            .from_path(path)
            .with_context(|| format!("failed to create table artifact: {}", path.display()))?;

        writer.write_record(&self.headers)?;
        for row in &self.rows {
            writer.write_record(row)?;
        }
        writer.flush()?;

        Ok(())
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    /// True when the artifact carried no header row and no data at all.
    pub fn is_empty(&self) -> bool {
        self.headers.is_empty() && self.rows.is_empty()
    }

    // ========================================================================
    // COLUMN RESOLVER
    // ========================================================================

    /// Find a column whose header equals `name` (case-insensitive).
    pub fn column_named(&self, name: &str) -> Option<usize> {
        let name = name.to_lowercase();
        self.headers
            .iter()
            .position(|h| h.trim().to_lowercase() == name)
    }

    /// Find the first column whose header contains `needle`
    /// (case-insensitive substring match).
    pub fn column_containing(&self, needle: &str) -> Option<usize> {
        let needle = needle.to_lowercase();
        self.headers
            .iter()
            .position(|h| h.to_lowercase().contains(&needle))
    }

    /// Like `column_named`, but required: a missing header is an error.
    pub fn require_named(&self, field: &str, name: &str) -> Result<usize> {
        match self.column_named(name) {
            Some(idx) => Ok(idx),
            None => bail!(
                "missing expected column for {field}: no header named \"{name}\" among {:?}",
                self.headers
            ),
        }
    }

    /// Like `column_containing`, but required: a missing header is an error.
    pub fn require_containing(&self, field: &str, needle: &str) -> Result<usize> {
        match self.column_containing(needle) {
            Some(idx) => Ok(idx),
            None => bail!(
                "missing expected column for {field}: no header containing \"{needle}\" among {:?}",
                self.headers
            ),
        }
    }
}

/// Read one cell of a data row, tolerating short rows.
pub fn cell(row: &[String], idx: usize) -> &str {
    row.get(idx).map(String::as_str).unwrap_or("")
}
