//! JSON persistence for tables.
//!
//! Each table is one document carrying the column schema and the rows, so a
//! reload reproduces column order, declared types, and null cells exactly.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use wellness_core::{Cell, Column, ColumnType, Table};

#[derive(Serialize, Deserialize)]
struct ColumnDoc {
    name: String,
    #[serde(rename = "type")]
    ty: String,
}

#[derive(Serialize, Deserialize)]
struct RowDoc {
    #[serde(rename = "calendarDate")]
    calendar_date: NaiveDate,
    values: Vec<Value>,
}

#[derive(Serialize, Deserialize)]
struct TableDoc {
    columns: Vec<ColumnDoc>,
    rows: Vec<RowDoc>,
}

fn type_tag(ty: ColumnType) -> &'static str {
    match ty {
        ColumnType::Int => "int",
        ColumnType::Float => "float",
        ColumnType::Bool => "bool",
        ColumnType::Str => "str",
        ColumnType::Any => "any",
    }
}

fn parse_type_tag(tag: &str) -> Result<ColumnType> {
    Ok(match tag {
        "int" => ColumnType::Int,
        "float" => ColumnType::Float,
        "bool" => ColumnType::Bool,
        "str" => ColumnType::Str,
        "any" => ColumnType::Any,
        other => anyhow::bail!("unknown column type tag: {other}"),
    })
}

pub fn save_table(path: &Path, table: &Table) -> Result<()> {
    let doc = TableDoc {
        columns: table
            .columns()
            .iter()
            .map(|c| ColumnDoc {
                name: c.name.clone(),
                ty: type_tag(c.ty).to_string(),
            })
            .collect(),
        rows: (0..table.len())
            .map(|row| RowDoc {
                calendar_date: table.date(row),
                values: table.rows()[row].cells().iter().map(Cell::to_json).collect(),
            })
            .collect(),
    };

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    let body = serde_json::to_vec_pretty(&doc)?;
    std::fs::write(path, body).with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

pub fn load_table(path: &Path) -> Result<Table> {
    let body =
        std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let doc: TableDoc = serde_json::from_slice(&body)
        .with_context(|| format!("parsing table document {}", path.display()))?;

    let columns = doc
        .columns
        .iter()
        .map(|c| Ok(Column::new(c.name.clone(), parse_type_tag(&c.ty)?)))
        .collect::<Result<Vec<_>>>()?;
    let width = columns.len();

    let mut table = Table::new(columns);
    for row in doc.rows {
        anyhow::ensure!(
            row.values.len() == width,
            "row {} has {} values, expected {}",
            row.calendar_date,
            row.values.len(),
            width
        );
        let cells = row.values.iter().map(Cell::from_json).collect();
        table.push_row(row.calendar_date, cells);
    }
    Ok(table)
}

/// Read and parse one raw export document. A malformed file aborts the run.
pub fn read_payload(path: &Path) -> Result<Value> {
    let body =
        std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_slice(&body).with_context(|| format!("parsing {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_table() -> Table {
        let mut table = Table::new(vec![
            Column::new("totalSteps", ColumnType::Int),
            Column::new("averageRespiration", ColumnType::Float),
            Column::new("retro", ColumnType::Bool),
            Column::new("sleepScoreFeedback", ColumnType::Str),
        ]);
        table.push_row(
            NaiveDate::from_ymd_opt(2025, 4, 1).unwrap(),
            vec![
                Cell::Int(8123),
                Cell::Float(14.5),
                Cell::Bool(false),
                Cell::Str("POSITIVE_DEEP".into()),
            ],
        );
        table.push_row(
            NaiveDate::from_ymd_opt(2025, 4, 2).unwrap(),
            vec![Cell::Null, Cell::Null, Cell::Null, Cell::Null],
        );
        table
    }

    #[test]
    fn round_trip_preserves_schema_and_nulls() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("daily.json");

        let table = sample_table();
        save_table(&path, &table).unwrap();
        let loaded = load_table(&path).unwrap();
        assert_eq!(table, loaded);
    }

    #[test]
    fn width_mismatch_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(
            &path,
            r#"{"columns":[{"name":"a","type":"int"}],"rows":[{"calendarDate":"2025-04-01","values":[1,2]}]}"#,
        )
        .unwrap();
        assert!(load_table(&path).is_err());
    }

    #[test]
    fn unknown_type_tag_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(
            &path,
            r#"{"columns":[{"name":"a","type":"decimal"}],"rows":[]}"#,
        )
        .unwrap();
        assert!(load_table(&path).is_err());
    }
}
