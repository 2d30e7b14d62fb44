//! Delimited-text ingestion and export for [`Table`].

use super::{Cell, Column, ColumnKind, Table, Value};
use crate::error::Result;
use csv::{ReaderBuilder, Trim, WriterBuilder};
use log::{debug, trace};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

/// Parsing options for delimited text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportOptions {
    /// Single-byte field separator.
    pub separator: u8,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self { separator: b',' }
    }
}

impl ImportOptions {
    pub fn with_separator(separator: u8) -> Self {
        Self { separator }
    }
}

/// Raw field values treated as missing, besides any spelling of `nan`.
const MISSING_MARKERS: &[&str] = &["", "NA"];

fn is_missing(raw: &str) -> bool {
    MISSING_MARKERS.contains(&raw) || raw.eq_ignore_ascii_case("nan")
}

impl Table {
    /// Reads a table from a delimited text file with a header row.
    pub fn from_path(path: impl AsRef<Path>, options: ImportOptions) -> Result<Self> {
        let path = path.as_ref();
        debug!("importing {}", path.display());
        let file = File::open(path)?;
        Self::from_reader(BufReader::new(file), options)
    }

    pub fn from_csv_str(text: &str, options: ImportOptions) -> Result<Self> {
        Self::from_reader(text.as_bytes(), options)
    }

    /// Parses a header row of column names followed by data rows.
    ///
    /// A column is numeric when every non-missing field parses as a number,
    /// categorical otherwise. Empty fields, `NA` and `nan` are missing.
    pub fn from_reader<R: Read>(reader: R, options: ImportOptions) -> Result<Self> {
        let mut reader = ReaderBuilder::new()
            .delimiter(options.separator)
            .has_headers(true)
            .trim(Trim::All)
            .from_reader(reader);

        let names: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
        let mut raw: Vec<Vec<String>> = vec![Vec::new(); names.len()];
        for record in reader.records() {
            let record = record?;
            for (column, field) in raw.iter_mut().zip(record.iter()) {
                column.push(field.to_string());
            }
        }

        let mut table = Table::new();
        for (name, fields) in names.into_iter().zip(raw) {
            table.push_column(infer_column(name, fields))?;
        }
        debug!(
            "imported table with {} rows and {} columns",
            table.nrows(),
            table.ncols()
        );
        Ok(table)
    }

    /// Replaces this table's contents with the file at `path`.
    ///
    /// On failure the table is left as it was.
    pub fn import_from_delimited_text(
        &mut self,
        path: impl AsRef<Path>,
        separator: u8,
    ) -> Result<()> {
        *self = Self::from_path(path, ImportOptions::with_separator(separator))?;
        Ok(())
    }

    pub fn write_csv(&self, path: impl AsRef<Path>, separator: u8) -> Result<()> {
        let file = File::create(path)?;
        self.write_csv_to(BufWriter::new(file), separator)
    }

    /// Writes a header row and one record per row; missing cells are empty fields.
    pub fn write_csv_to<W: Write>(&self, writer: W, separator: u8) -> Result<()> {
        let mut writer = WriterBuilder::new()
            .delimiter(separator)
            .from_writer(writer);
        writer.write_record(self.column_names())?;
        for row in self.rows() {
            writer.write_record(row.iter().map(|cell| match cell {
                Some(value) => value.to_string(),
                None => String::new(),
            }))?;
        }
        writer.flush()?;
        Ok(())
    }
}

fn infer_column(name: String, fields: Vec<String>) -> Column {
    let parsed: Vec<Option<Option<f64>>> = fields
        .iter()
        .map(|raw| {
            if is_missing(raw) {
                Some(None)
            } else {
                raw.parse::<f64>().ok().map(Some)
            }
        })
        .collect();
    let numeric = parsed.iter().all(Option::is_some);
    trace!(
        "column '{name}': {} fields, inferred {}",
        fields.len(),
        if numeric { "numeric" } else { "categorical" }
    );

    if numeric {
        let values: Vec<Cell> = parsed
            .into_iter()
            .map(|v| v.flatten().map(Value::Number))
            .collect();
        Column::from_parts(name, ColumnKind::Numeric, values)
    } else {
        let values: Vec<Cell> = fields
            .into_iter()
            .map(|raw| (!is_missing(&raw)).then(|| Value::Text(raw)))
            .collect();
        Column::from_parts(name, ColumnKind::Categorical, values)
    }
}
