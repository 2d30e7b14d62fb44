//! Columnar table with nullable, typed columns.
//!
//! A [`Table`] is an ordered list of named [`Column`]s that all share the same
//! row count. Each cell is a [`Cell`], i.e. `Option<Value>`, where `None` is the
//! missing marker. A column's [`ColumnKind`] is inferred when the column is
//! created and never changes afterwards; values written later are coerced to
//! that kind or rejected.

mod io;

pub use io::ImportOptions;

use crate::error::{Error, Result};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A present (non-missing) scalar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Number(f64),
    Text(String),
}

impl Value {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(x) => Some(*x),
            Value::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Number(_) => None,
            Value::Text(s) => Some(s),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(x) => write!(f, "{x}"),
            Value::Text(s) => f.write_str(s),
        }
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Number(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

/// One table cell; `None` marks a missing value.
pub type Cell = Option<Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnKind {
    Numeric,
    Categorical,
}

impl ColumnKind {
    /// Numeric unless some present cell is text. All-missing columns are numeric.
    pub fn infer(cells: &[Cell]) -> Self {
        let has_text = cells
            .iter()
            .flatten()
            .any(|value| matches!(value, Value::Text(_)));
        if has_text {
            ColumnKind::Categorical
        } else {
            ColumnKind::Numeric
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ColumnKind::Numeric => "numeric",
            ColumnKind::Categorical => "categorical",
        }
    }
}

impl fmt::Display for ColumnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A named, homogeneous, nullable sequence of cells.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    name: String,
    kind: ColumnKind,
    values: Vec<Cell>,
}

impl Column {
    /// Builds a column, inferring its kind from `values`.
    ///
    /// Numbers in a categorical column are stored as their text rendering and
    /// NaN numbers are stored as missing.
    pub fn new(name: impl Into<String>, values: Vec<Cell>) -> Self {
        let kind = ColumnKind::infer(&values);
        let values = values
            .into_iter()
            .map(|cell| normalize(kind, cell).unwrap_or(None))
            .collect();
        Self {
            name: name.into(),
            kind,
            values,
        }
    }

    /// Convenience constructor for numeric data with optional gaps.
    pub fn numeric(name: impl Into<String>, values: &[Option<f64>]) -> Self {
        Self::new(
            name,
            values.iter().map(|v| v.map(Value::Number)).collect(),
        )
    }

    pub(crate) fn from_parts(name: String, kind: ColumnKind, values: Vec<Cell>) -> Self {
        Self { name, kind, values }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ColumnKind {
        self.kind
    }

    pub fn is_numeric(&self) -> bool {
        self.kind == ColumnKind::Numeric
    }

    pub fn values(&self) -> &[Cell] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn missing_count(&self) -> usize {
        self.values.iter().filter(|cell| cell.is_none()).count()
    }

    /// Present numeric values, in row order.
    pub fn numbers(&self) -> impl Iterator<Item = f64> + '_ {
        self.values
            .iter()
            .filter_map(|cell| cell.as_ref().and_then(Value::as_number))
    }

    pub(crate) fn number_at(&self, row: usize) -> Option<f64> {
        self.values[row].as_ref().and_then(Value::as_number)
    }

    pub(crate) fn values_mut(&mut self) -> &mut [Cell] {
        &mut self.values
    }

    /// Coerces `cell` to this column's kind.
    fn accept(&self, cell: Cell) -> Result<Cell> {
        normalize(self.kind, cell).ok_or_else(|| Error::KindMismatch {
            column: self.name.clone(),
            kind: self.kind.label(),
        })
    }

    fn select(&self, rows: &[usize]) -> Column {
        Column {
            name: self.name.clone(),
            kind: self.kind,
            values: rows.iter().map(|&r| self.values[r].clone()).collect(),
        }
    }
}

/// Returns the cell as stored in a column of `kind`, or `None` if it cannot be stored there.
fn normalize(kind: ColumnKind, cell: Cell) -> Option<Cell> {
    match (kind, cell) {
        (_, None) => Some(None),
        (_, Some(Value::Number(x))) if x.is_nan() => Some(None),
        (ColumnKind::Numeric, Some(Value::Number(x))) => Some(Some(Value::Number(x))),
        (ColumnKind::Numeric, Some(Value::Text(s))) => {
            s.trim().parse::<f64>().ok().map(|x| {
                if x.is_nan() {
                    None
                } else {
                    Some(Value::Number(x))
                }
            })
        }
        (ColumnKind::Categorical, Some(Value::Number(x))) => Some(Some(Value::Text(x.to_string()))),
        (ColumnKind::Categorical, Some(Value::Text(s))) => Some(Some(Value::Text(s))),
    }
}

/// Ordered collection of equally long columns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    columns: Vec<Column>,
    nrows: usize,
    // Row count pinned by `preallocate` before any column exists.
    reserved: bool,
}

impl Table {
    pub fn new() -> Self {
        Self::default()
    }

    /// An empty table whose columns must each hold exactly `nrows` values.
    pub fn with_capacity(nrows: usize, ncols: usize) -> Self {
        Self {
            columns: Vec::with_capacity(ncols),
            nrows,
            reserved: true,
        }
    }

    /// Reserves room for `ncols` columns of `nrows` rows each.
    pub fn preallocate(&mut self, nrows: usize, ncols: usize) -> Result<()> {
        if !self.columns.is_empty() && nrows != self.nrows {
            return Err(Error::DimensionMismatch {
                expected: self.nrows,
                actual: nrows,
            });
        }
        self.columns
            .reserve(ncols.saturating_sub(self.columns.len()));
        self.nrows = nrows;
        self.reserved = true;
        Ok(())
    }

    /// (row count, column count)
    pub fn dims(&self) -> (usize, usize) {
        (self.nrows, self.columns.len())
    }

    pub fn nrows(&self) -> usize {
        self.nrows
    }

    pub fn ncols(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, idx: usize) -> Option<&Column> {
        self.columns.get(idx)
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(Column::name).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name == name)
    }

    pub fn get_column(&self, name: &str) -> Result<&Column> {
        self.position(name).map(|idx| &self.columns[idx])
    }

    pub(crate) fn get_column_mut(&mut self, name: &str) -> Result<&mut Column> {
        let idx = self.position(name)?;
        Ok(&mut self.columns[idx])
    }

    fn position(&self, name: &str) -> Result<usize> {
        self.columns
            .iter()
            .position(|c| c.name == name)
            .ok_or_else(|| Error::UnknownColumn(name.to_string()))
    }

    fn shape_fixed(&self) -> bool {
        self.reserved || !self.columns.is_empty()
    }

    /// Appends a column. The first column of an unallocated table sets the row count.
    pub fn add_column(&mut self, name: &str, values: Vec<Cell>) -> Result<()> {
        self.push_column(Column::new(name, values))
    }

    pub(crate) fn push_column(&mut self, column: Column) -> Result<()> {
        if self.contains(&column.name) {
            return Err(Error::DuplicateColumn(column.name));
        }
        if self.shape_fixed() && column.len() != self.nrows {
            return Err(Error::DimensionMismatch {
                expected: self.nrows,
                actual: column.len(),
            });
        }
        debug!(
            "add column '{}' ({}, {} rows)",
            column.name,
            column.kind,
            column.len()
        );
        self.nrows = column.len();
        self.columns.push(column);
        Ok(())
    }

    pub fn drop_column(&mut self, name: &str) -> Result<Column> {
        let idx = self.position(name)?;
        debug!("drop column '{name}'");
        Ok(self.columns.remove(idx))
    }

    /// Replaces every value of `name`, keeping its length and kind.
    pub fn set_column(&mut self, name: &str, values: Vec<Cell>) -> Result<()> {
        let idx = self.position(name)?;
        if values.len() != self.nrows {
            return Err(Error::DimensionMismatch {
                expected: self.nrows,
                actual: values.len(),
            });
        }
        let column = &self.columns[idx];
        let values = values
            .into_iter()
            .map(|cell| column.accept(cell))
            .collect::<Result<Vec<_>>>()?;
        self.columns[idx].values = values;
        Ok(())
    }

    pub fn set_cell(&mut self, row: usize, name: &str, cell: Cell) -> Result<()> {
        let idx = self.position(name)?;
        self.check_row(row)?;
        let cell = self.columns[idx].accept(cell)?;
        self.columns[idx].values[row] = cell;
        Ok(())
    }

    pub fn cell(&self, row: usize, name: &str) -> Result<&Cell> {
        let idx = self.position(name)?;
        self.check_row(row)?;
        Ok(&self.columns[idx].values[row])
    }

    fn check_row(&self, row: usize) -> Result<()> {
        if row >= self.nrows {
            return Err(Error::RowOutOfBounds {
                index: row,
                rows: self.nrows,
            });
        }
        Ok(())
    }

    /// Cells of one row, in column order.
    pub fn row(&self, idx: usize) -> Result<Vec<&Cell>> {
        self.check_row(idx)?;
        Ok(self.columns.iter().map(|c| &c.values[idx]).collect())
    }

    pub fn rows(&self) -> impl Iterator<Item = Vec<&Cell>> + '_ {
        (0..self.nrows).map(move |r| self.columns.iter().map(|c| &c.values[r]).collect())
    }

    pub fn push_row(&mut self, row: Vec<Cell>) -> Result<()> {
        self.insert_row(self.nrows, row)
    }

    /// Inserts `row` before position `idx` (`idx == nrows` appends).
    pub fn insert_row(&mut self, idx: usize, row: Vec<Cell>) -> Result<()> {
        if idx > self.nrows {
            return Err(Error::RowOutOfBounds {
                index: idx,
                rows: self.nrows,
            });
        }
        if self.columns.is_empty() || row.len() != self.columns.len() {
            return Err(Error::DimensionMismatch {
                expected: self.columns.len(),
                actual: row.len(),
            });
        }
        let cells = self
            .columns
            .iter()
            .zip(row)
            .map(|(column, cell)| column.accept(cell))
            .collect::<Result<Vec<_>>>()?;
        for (column, cell) in self.columns.iter_mut().zip(cells) {
            column.values.insert(idx, cell);
        }
        self.nrows += 1;
        Ok(())
    }

    pub fn drop_row(&mut self, idx: usize) -> Result<Vec<Cell>> {
        self.check_row(idx)?;
        let removed = self
            .columns
            .iter_mut()
            .map(|c| c.values.remove(idx))
            .collect();
        self.nrows -= 1;
        Ok(removed)
    }

    /// Removes every row holding at least one missing cell. Returns the number of rows removed.
    pub fn drop_nan(&mut self) -> usize {
        let keep: Vec<bool> = (0..self.nrows)
            .map(|r| self.columns.iter().all(|c| c.values[r].is_some()))
            .collect();
        let kept = keep.iter().filter(|&&k| k).count();
        let removed = self.nrows - kept;
        if removed > 0 {
            for column in &mut self.columns {
                let mut flags = keep.iter();
                column.values.retain(|_| *flags.next().unwrap_or(&false));
            }
            self.nrows = kept;
        }
        debug!("drop_nan removed {removed} rows, {kept} remain");
        removed
    }

    pub fn count_missing(&self, name: &str) -> Result<usize> {
        Ok(self.get_column(name)?.missing_count())
    }

    /// Rows whose cell in `name` equals `probe`; a missing probe selects missing cells.
    pub fn filter_rows(&self, name: &str, probe: &Cell) -> Result<Table> {
        let column = self.get_column(name)?;
        let rows: Vec<usize> = match normalize(column.kind, probe.clone()) {
            Some(target) => (0..self.nrows)
                .filter(|&r| column.values[r] == target)
                .collect(),
            None => Vec::new(),
        };
        Ok(self.select_rows(&rows))
    }

    /// Replaces the missing cells of `name` with `value`. Returns how many were filled.
    pub fn fill_missing(&mut self, name: &str, value: Value) -> Result<usize> {
        let idx = self.position(name)?;
        let fill = self.columns[idx].accept(Some(value))?;
        let mut filled = 0;
        for cell in self.columns[idx].values.iter_mut().filter(|c| c.is_none()) {
            *cell = fill.clone();
            filled += 1;
        }
        Ok(filled)
    }

    pub fn head(&self, n: usize) -> Table {
        let rows: Vec<usize> = (0..n.min(self.nrows)).collect();
        self.select_rows(&rows)
    }

    pub fn tail(&self, n: usize) -> Table {
        let start = self.nrows.saturating_sub(n);
        let rows: Vec<usize> = (start..self.nrows).collect();
        self.select_rows(&rows)
    }

    /// Frequency of each present value of `name`, keyed by its text rendering.
    pub fn value_counts(&self, name: &str) -> Result<BTreeMap<String, usize>> {
        let column = self.get_column(name)?;
        let mut counts = BTreeMap::new();
        for value in column.values.iter().flatten() {
            *counts.entry(value.to_string()).or_insert(0) += 1;
        }
        Ok(counts)
    }

    fn select_rows(&self, rows: &[usize]) -> Table {
        Table {
            columns: self.columns.iter().map(|c| c.select(rows)).collect(),
            nrows: rows.len(),
            reserved: false,
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<Vec<String>> = self
            .columns
            .iter()
            .map(|c| {
                c.values
                    .iter()
                    .map(|cell| match cell {
                        Some(value) => value.to_string(),
                        None => "NA".to_string(),
                    })
                    .collect()
            })
            .collect();
        let widths: Vec<usize> = self
            .columns
            .iter()
            .zip(&rendered)
            .map(|(c, cells)| {
                cells
                    .iter()
                    .map(String::len)
                    .chain(std::iter::once(c.name.len()))
                    .max()
                    .unwrap_or(0)
            })
            .collect();

        for (c, width) in self.columns.iter().zip(&widths) {
            write!(f, "{:<width$} ", c.name, width = width)?;
        }
        writeln!(f)?;
        for r in 0..self.nrows {
            for (cells, width) in rendered.iter().zip(&widths) {
                write!(f, "{:<width$} ", cells[r], width = width)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn num(x: f64) -> Cell {
        Some(Value::Number(x))
    }

    fn text(s: &str) -> Cell {
        Some(Value::Text(s.to_string()))
    }

    fn sample() -> Table {
        let mut table = Table::new();
        table
            .add_column("x", vec![num(1.0), None, num(3.0), num(4.0)])
            .expect("x");
        table
            .add_column("label", vec![text("a"), text("b"), None, text("a")])
            .expect("label");
        table
    }

    #[test]
    fn add_column_infers_kind() {
        let table = sample();
        assert_eq!(table.dims(), (4, 2));
        assert_eq!(table.get_column("x").unwrap().kind(), ColumnKind::Numeric);
        assert_eq!(
            table.get_column("label").unwrap().kind(),
            ColumnKind::Categorical
        );
        assert_eq!(table.column_names(), vec!["x", "label"]);
    }

    #[test]
    fn mixed_values_become_categorical_text() {
        let column = Column::new("mixed", vec![num(2.0), text("b"), None]);
        assert_eq!(column.kind(), ColumnKind::Categorical);
        assert_eq!(column.values()[0], text("2"));
        assert_eq!(column.missing_count(), 1);
    }

    #[test]
    fn nan_numbers_are_stored_as_missing() {
        let column = Column::numeric("v", &[Some(1.0), Some(f64::NAN)]);
        assert_eq!(column.values()[1], None);
        assert_eq!(column.numbers().collect::<Vec<_>>(), vec![1.0]);
    }

    #[test]
    fn add_column_length_mismatch_leaves_table_unchanged() {
        let mut table = sample();
        let before = table.clone();
        let err = table
            .add_column("y", vec![num(1.0), num(2.0)])
            .expect_err("length mismatch");
        assert!(matches!(
            err,
            Error::DimensionMismatch {
                expected: 4,
                actual: 2
            }
        ));
        assert_eq!(table, before);
    }

    #[test]
    fn add_column_rejects_duplicate_name() {
        let mut table = sample();
        let err = table
            .add_column("x", vec![None, None, None, None])
            .expect_err("duplicate");
        assert!(matches!(err, Error::DuplicateColumn(name) if name == "x"));
        assert_eq!(table.ncols(), 2);
    }

    #[test]
    fn preallocated_table_enforces_row_count() {
        let mut table = Table::with_capacity(3, 2);
        assert_eq!(table.dims(), (3, 0));
        assert!(matches!(
            table.add_column("a", vec![num(1.0)]),
            Err(Error::DimensionMismatch {
                expected: 3,
                actual: 1
            })
        ));
        table
            .add_column("a", vec![num(1.0), num(2.0), num(3.0)])
            .expect("exact length");

        let mut other = Table::new();
        other.preallocate(2, 1).expect("empty table");
        assert!(other.add_column("b", vec![num(1.0)]).is_err());
        assert!(matches!(
            table.preallocate(5, 2),
            Err(Error::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn drop_column_and_unknown_name() {
        let mut table = sample();
        let dropped = table.drop_column("label").expect("drop");
        assert_eq!(dropped.name(), "label");
        assert_eq!(table.dims(), (4, 1));
        assert!(matches!(
            table.drop_column("label"),
            Err(Error::UnknownColumn(name)) if name == "label"
        ));
    }

    #[test]
    fn set_column_keeps_length_and_kind() {
        let mut table = sample();
        table
            .set_column("x", vec![num(9.0), num(8.0), None, text("7")])
            .expect("numeric text parses");
        assert_eq!(table.get_column("x").unwrap().values()[3], num(7.0));

        let before = table.clone();
        assert!(matches!(
            table.set_column("x", vec![num(1.0)]),
            Err(Error::DimensionMismatch { .. })
        ));
        assert!(matches!(
            table.set_column("x", vec![text("nope"), None, None, None]),
            Err(Error::KindMismatch { .. })
        ));
        assert_eq!(table, before);
    }

    #[test]
    fn set_cell_validates_row_and_kind() {
        let mut table = sample();
        table.set_cell(1, "x", num(2.0)).expect("set");
        assert_eq!(table.cell(1, "x").unwrap(), &num(2.0));
        table.set_cell(0, "label", num(5.0)).expect("number as text");
        assert_eq!(table.cell(0, "label").unwrap(), &text("5"));
        assert!(matches!(
            table.set_cell(4, "x", None),
            Err(Error::RowOutOfBounds { index: 4, rows: 4 })
        ));
        assert!(matches!(
            table.set_cell(0, "x", text("abc")),
            Err(Error::KindMismatch { .. })
        ));
    }

    #[test]
    fn insert_and_drop_rows() {
        let mut table = sample();
        table
            .insert_row(0, vec![num(0.0), text("z")])
            .expect("insert");
        assert_eq!(table.nrows(), 5);
        assert_eq!(table.row(0).unwrap(), vec![&num(0.0), &text("z")]);
        table.push_row(vec![None, None]).expect("push");
        assert_eq!(table.nrows(), 6);

        assert!(matches!(
            table.push_row(vec![num(1.0)]),
            Err(Error::DimensionMismatch {
                expected: 2,
                actual: 1
            })
        ));
        assert!(matches!(
            table.insert_row(10, vec![None, None]),
            Err(Error::RowOutOfBounds { .. })
        ));
        assert!(table.push_row(vec![text("x"), None]).is_err());
        assert_eq!(table.nrows(), 6);

        let removed = table.drop_row(0).expect("drop");
        assert_eq!(removed, vec![num(0.0), text("z")]);
        assert_eq!(table.nrows(), 5);
    }

    #[test]
    fn drop_nan_reindexes_all_columns() {
        let mut table = sample();
        let removed = table.drop_nan();
        assert_eq!(removed, 2);
        assert_eq!(table.dims(), (2, 2));
        let x: Vec<f64> = table.get_column("x").unwrap().numbers().collect();
        assert_eq!(x, vec![1.0, 4.0]);
        assert_eq!(table.count_missing("label").unwrap(), 0);
        for column in table.columns() {
            assert_eq!(column.len(), table.nrows());
        }
    }

    #[test]
    fn filter_rows_matches_value_and_missing() {
        let table = sample();
        let filtered = table.filter_rows("label", &text("a")).expect("filter");
        assert_eq!(filtered.dims(), (2, 2));
        let x: Vec<f64> = filtered.get_column("x").unwrap().numbers().collect();
        assert_eq!(x, vec![1.0, 4.0]);

        let missing = table.filter_rows("x", &None).expect("filter missing");
        assert_eq!(missing.nrows(), 1);

        let none = table.filter_rows("x", &text("abc")).expect("no match");
        assert_eq!(none.dims(), (0, 2));
    }

    #[test]
    fn fill_missing_respects_kind() {
        let mut table = sample();
        assert_eq!(table.fill_missing("x", Value::Number(0.0)).unwrap(), 1);
        assert_eq!(table.count_missing("x").unwrap(), 0);
        assert!(table.fill_missing("x", Value::from("zero")).is_err());
        assert_eq!(table.fill_missing("label", Value::from("c")).unwrap(), 1);
    }

    #[test]
    fn head_tail_and_value_counts() {
        let table = sample();
        assert_eq!(table.head(2).nrows(), 2);
        assert_eq!(table.head(10).nrows(), 4);
        let tail = table.tail(1);
        assert_eq!(tail.row(0).unwrap(), vec![&num(4.0), &text("a")]);

        let counts = table.value_counts("label").unwrap();
        assert_eq!(counts.get("a"), Some(&2));
        assert_eq!(counts.get("b"), Some(&1));
        assert_eq!(counts.len(), 2);
    }

    #[test]
    fn display_marks_missing_cells() {
        let rendered = sample().to_string();
        let mut lines = rendered.lines();
        assert!(lines.next().unwrap().starts_with("x"));
        assert!(rendered.contains("NA"));
        assert_eq!(rendered.lines().count(), 5);
    }
}
