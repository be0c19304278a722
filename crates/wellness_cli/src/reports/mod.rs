//! Report rendering: CSV and Markdown views over in-memory tables.

pub mod data_dictionary;
pub mod quality;

use wellness_core::{Cell, Table};

/// Quote a CSV field only when it needs it.
pub(crate) fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

pub(crate) fn cell_to_csv(cell: &Cell) -> String {
    match cell {
        Cell::Null => String::new(),
        Cell::Int(i) => i.to_string(),
        Cell::Float(f) => f.to_string(),
        Cell::Bool(b) => b.to_string(),
        Cell::Str(s) => csv_field(s),
    }
}

/// Render a whole table as CSV, `calendarDate` first.
pub fn table_to_csv(table: &Table) -> String {
    let mut out = String::new();
    out.push_str(&table.column_names().join(","));
    out.push('\n');
    for row in 0..table.len() {
        out.push_str(&table.date(row).to_string());
        for cell in table.rows()[row].cells() {
            out.push(',');
            out.push_str(&cell_to_csv(cell));
        }
        out.push('\n');
    }
    out
}

/// Render a Markdown table from header + string rows.
pub(crate) fn markdown_table(columns: &[&str], rows: &[Vec<String>]) -> String {
    let mut lines = Vec::with_capacity(rows.len() + 2);
    lines.push(format!("| {} |", columns.join(" | ")));
    lines.push(format!("|{}|", vec![" --- "; columns.len()].join("|")));
    for row in rows {
        lines.push(format!("| {} |", row.join(" | ")));
    }
    lines.join("\n")
}
