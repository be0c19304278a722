//! Flat tables keyed by calendar day, and the assembly step that turns
//! normalized rows into one.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::NaiveDate;

use crate::cell::Cell;
use crate::error::{PipelineError, PipelineResult};

/// The sole join/uniqueness key. Always the first column, never droppable.
pub const DATE_COLUMN: &str = "calendarDate";

/// Declared type of a column, fixed at assembly time. Core columns get a
/// concrete type; dynamically discovered columns stay `Any` (best-effort).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColumnType {
    Int,
    Float,
    Bool,
    Str,
    Any,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Column {
    pub name: String,
    pub ty: ColumnType,
}

impl Column {
    pub fn new(name: impl Into<String>, ty: ColumnType) -> Column {
        Column {
            name: name.into(),
            ty,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct TableRow {
    pub date: NaiveDate,
    cells: Vec<Cell>,
}

impl TableRow {
    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }
}

/// An ordered, day-keyed table. `calendarDate` is implicit (stored as the
/// row key); `columns` holds everything else in presentation order.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct Table {
    columns: Vec<Column>,
    rows: Vec<TableRow>,
}

impl Table {
    pub fn new(columns: Vec<Column>) -> Table {
        Table {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Column names with `calendarDate` first, as persisted/rendered.
    pub fn column_names(&self) -> Vec<String> {
        let mut names = Vec::with_capacity(self.columns.len() + 1);
        names.push(DATE_COLUMN.to_string());
        names.extend(self.columns.iter().map(|c| c.name.clone()));
        names
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        name == DATE_COLUMN || self.column_index(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[TableRow] {
        &self.rows
    }

    pub fn date(&self, row: usize) -> NaiveDate {
        self.rows[row].date
    }

    /// Push a row whose cells are aligned with `columns`. Length mismatches
    /// are a caller bug and panic in debug builds.
    pub fn push_row(&mut self, date: NaiveDate, cells: Vec<Cell>) {
        debug_assert_eq!(cells.len(), self.columns.len());
        self.rows.push(TableRow { date, cells });
    }

    pub fn cell(&self, row: usize, name: &str) -> Option<&Cell> {
        let idx = self.column_index(name)?;
        Some(&self.rows[row].cells[idx])
    }

    /// Numeric view of a cell; missing column or non-numeric value is None.
    pub fn number(&self, row: usize, name: &str) -> Option<f64> {
        self.cell(row, name).and_then(Cell::as_f64)
    }

    /// Boolean view of a cell.
    pub fn flag(&self, row: usize, name: &str) -> Option<bool> {
        self.cell(row, name).and_then(Cell::as_bool)
    }

    /// Sort ascending by date and keep the last occurrence per date.
    /// Later files / later records supersede earlier snapshots of a day.
    pub fn sort_and_dedupe(&mut self) {
        self.rows.sort_by_key(|r| r.date);
        let mut deduped: Vec<TableRow> = Vec::with_capacity(self.rows.len());
        for row in self.rows.drain(..) {
            match deduped.last() {
                Some(last) if last.date == row.date => {
                    *deduped.last_mut().expect("non-empty") = row;
                }
                _ => deduped.push(row),
            }
        }
        self.rows = deduped;
    }

    pub fn duplicate_dates(&self) -> usize {
        let mut seen = BTreeSet::new();
        self.rows.iter().filter(|r| !seen.insert(r.date)).count()
    }

    /// Fatal precondition check used before merging: silent duplicate
    /// resolution here would hide a real upstream inconsistency.
    pub fn ensure_unique_dates(&self, label: &str) -> PipelineResult<()> {
        let count = self.duplicate_dates();
        if count > 0 {
            return Err(PipelineError::DuplicateDates {
                table: label.to_string(),
                count,
            });
        }
        Ok(())
    }

    /// Copy of this table restricted to `names`, in that order, skipping
    /// names that do not exist. `calendarDate` is always carried.
    pub fn project(&self, names: &[&str]) -> Table {
        let picked: Vec<usize> = names
            .iter()
            .filter(|n| **n != DATE_COLUMN)
            .filter_map(|n| self.column_index(n))
            .collect();
        let columns = picked.iter().map(|&i| self.columns[i].clone()).collect();
        let mut out = Table::new(columns);
        for row in &self.rows {
            let cells = picked.iter().map(|&i| row.cells[i].clone()).collect();
            out.push_row(row.date, cells);
        }
        out
    }

    /// Copy of this table truncated to the first `n` rows.
    pub fn head(&self, n: usize) -> Table {
        let mut out = Table::new(self.columns.clone());
        for row in self.rows.iter().take(n) {
            out.push_row(row.date, row.cells.clone());
        }
        out
    }
}

/// A normalized record before assembly: stable column name to scalar.
pub type FlatRow = BTreeMap<String, Cell>;

/// Column layout and coercion declaration for one ingestion domain.
pub struct AssemblySpec {
    /// Fixed columns, in order, placed right after `calendarDate`.
    pub core_columns: &'static [&'static str],
    /// Nullable-integer columns (non-integral numerics become null).
    pub int_columns: &'static [&'static str],
    pub float_columns: &'static [&'static str],
    pub bool_columns: &'static [&'static str],
    pub string_columns: &'static [&'static str],
    /// Whether columns beyond `core_columns` are collected (alphabetical)
    /// or discarded (fixed-schema domains).
    pub dynamic: bool,
}

impl AssemblySpec {
    fn column_type(&self, name: &str) -> ColumnType {
        if self.int_columns.contains(&name) {
            ColumnType::Int
        } else if self.float_columns.contains(&name) {
            ColumnType::Float
        } else if self.bool_columns.contains(&name) {
            ColumnType::Bool
        } else if self.string_columns.contains(&name) {
            ColumnType::Str
        } else {
            ColumnType::Any
        }
    }
}

/// Parse a calendar-date cell to a timezone-naive day. Accepts plain dates,
/// RFC3339 datetimes, and naive datetimes; everything else is None.
pub fn parse_calendar_date(cell: &Cell) -> Option<NaiveDate> {
    let s = cell.as_str()?;
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(d);
    }
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(s) {
        return Some(dt.date_naive());
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(ndt.date());
    }
    None
}

fn coerce(cell: &Cell, ty: ColumnType) -> Cell {
    match ty {
        ColumnType::Int => cell.as_i64().map(Cell::Int).unwrap_or(Cell::Null),
        ColumnType::Float => cell.as_f64().map(Cell::Float).unwrap_or(Cell::Null),
        ColumnType::Bool => cell.as_bool().map(Cell::Bool).unwrap_or(Cell::Null),
        ColumnType::Str | ColumnType::Any => cell.clone(),
    }
}

/// Assemble normalized rows into one table: resolve the column layout,
/// parse and filter dates, coerce declared types, then sort and apply
/// last-write-wins per day.
pub fn assemble(rows: &[FlatRow], spec: &AssemblySpec) -> Table {
    let mut columns: Vec<Column> = spec
        .core_columns
        .iter()
        .map(|n| Column::new(*n, spec.column_type(n)))
        .collect();

    if spec.dynamic {
        let mut extra: BTreeSet<&str> = BTreeSet::new();
        for row in rows {
            for key in row.keys() {
                if key != DATE_COLUMN && !spec.core_columns.contains(&key.as_str()) {
                    extra.insert(key);
                }
            }
        }
        columns.extend(extra.into_iter().map(|n| Column::new(n, spec.column_type(n))));
    }

    let mut table = Table::new(columns);
    let mut dropped = 0usize;
    for row in rows {
        let date = match row.get(DATE_COLUMN).and_then(parse_calendar_date) {
            Some(d) => d,
            None => {
                dropped += 1;
                continue;
            }
        };
        let cells = table
            .columns
            .iter()
            .map(|col| {
                row.get(&col.name)
                    .map(|c| coerce(c, col.ty))
                    .unwrap_or(Cell::Null)
            })
            .collect();
        table.rows.push(TableRow { date, cells });
    }
    if dropped > 0 {
        tracing::warn!("dropped {dropped} rows with unparsable calendarDate");
    }

    table.sort_and_dedupe();
    table
}

/// Index rows by date. Callers must have verified uniqueness first.
pub fn date_index(table: &Table) -> HashMap<NaiveDate, usize> {
    table
        .rows
        .iter()
        .enumerate()
        .map(|(i, r)| (r.date, i))
        .collect()
}
