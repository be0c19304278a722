//! Data-dictionary report: per-column stats, inferred units/groups, and
//! identifier warnings, rendered as CSV and Markdown.

use std::path::Path;

use anyhow::{Context, Result};
use wellness_core::{Cell, ColumnType, Table};

use super::{csv_field, markdown_table};

const MISSINGNESS_TOP: usize = 30;
const ISO_SAMPLE: usize = 20;
const EXAMPLE_MAX_LEN: usize = 80;

#[derive(Clone, Debug)]
pub struct DictionaryEntry {
    pub column: String,
    pub dtype: String,
    pub non_null_count: usize,
    pub missing_count: usize,
    pub missing_pct: f64,
    pub n_unique: usize,
    pub example_values: String,
    pub min: Option<f64>,
    pub median: Option<f64>,
    pub max: Option<f64>,
    pub mean: Option<f64>,
    pub std: Option<f64>,
    pub inferred_unit: String,
    pub inferred_group: String,
    pub notes: String,
}

fn is_timestamp_name(name: &str) -> bool {
    let lowered = name.to_lowercase();
    lowered.contains("timestamp") || lowered.contains("timegmt") || lowered.contains("timelocal")
}

fn looks_like_iso_datetime(values: &[&Cell]) -> bool {
    values
        .iter()
        .filter_map(|c| c.as_str())
        .take(ISO_SAMPLE)
        .any(|s| {
            s.len() >= 11
                && s.as_bytes()[4] == b'-'
                && s.as_bytes()[7] == b'-'
                && s.as_bytes()[10] == b'T'
                && s[..4].bytes().all(|b| b.is_ascii_digit())
        })
}

fn infer_unit(name: &str, numeric: &[f64], values: &[&Cell]) -> String {
    let lowered = name.to_lowercase();
    if is_timestamp_name(name) {
        if looks_like_iso_datetime(values) {
            return "datetime".into();
        }
        if numeric.iter().any(|v| *v >= 1e12) {
            return "ms".into();
        }
    }
    if lowered.contains("meters") {
        return "Meters".into();
    }
    if lowered.contains("durationinmilliseconds") {
        return "Milliseconds".into();
    }
    if lowered.contains("seconds") {
        return "Seconds".into();
    }
    if lowered.contains("hydration") && lowered.contains("ml") {
        return "mL".into();
    }
    if lowered.contains("kilocalories") || lowered.contains("calories") {
        return "Kilocalories".into();
    }
    if lowered.contains("milliseconds") {
        return "Milliseconds".into();
    }
    if lowered.contains("respiration") {
        return "brpm".into();
    }
    if lowered.contains("spo2") {
        return "percent".into();
    }
    if lowered.contains("heartrate") {
        return "bpm".into();
    }
    if lowered.contains("value") && !numeric.is_empty() {
        let min = numeric.iter().copied().fold(f64::INFINITY, f64::min);
        let max = numeric.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        if (0.0..=100.0).contains(&min) && (0.0..=100.0).contains(&max) {
            return "percent".into();
        }
    }
    String::new()
}

fn infer_group(name: &str) -> &'static str {
    let lowered = name.to_lowercase();
    if lowered.starts_with("alldaystress") || lowered.contains("stress") {
        "stress"
    } else if lowered.starts_with("bodybattery") {
        "body_battery"
    } else if lowered.starts_with("respiration") {
        "respiration"
    } else if lowered.starts_with("hydration") {
        "hydration"
    } else if lowered.starts_with("includes") {
        "flags_includes"
    } else if lowered.starts_with("sleep") {
        "sleep"
    } else if lowered.contains("spo2") {
        "spo2"
    } else if lowered.contains("heartrate") {
        "heart_rate"
    } else if lowered.contains("kilocalories") || lowered.contains("calories") {
        "calories"
    } else if lowered.contains("steps") || lowered.contains("distance") || lowered.contains("meters")
    {
        "steps_distance"
    } else if lowered.contains("timestamp") || lowered.contains("date") {
        "timestamps"
    } else {
        "other"
    }
}

fn note_for_column(name: &str, numeric: &[f64], values: &[&Cell]) -> String {
    let lowered = name.to_lowercase();
    if lowered.contains("uuid") || lowered.contains("userprofilepk") {
        return "likely identifier".into();
    }
    if is_timestamp_name(name) {
        if looks_like_iso_datetime(values) {
            return "ISO datetime string".into();
        }
        if numeric.iter().any(|v| *v >= 1e12) {
            return "epoch millis".into();
        }
    }
    if (lowered.contains("timestamp") || lowered.contains("date")) && !numeric.is_empty() {
        let max = numeric.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        if max >= 1e12 {
            return "epoch millis timestamp".into();
        }
        if max >= 1e9 {
            return "epoch seconds timestamp".into();
        }
    }
    if looks_like_iso_datetime(values) {
        return "ISO datetime string".into();
    }
    String::new()
}

fn example_values(values: &[&Cell], max_values: usize) -> String {
    let mut seen: Vec<serde_json::Value> = Vec::new();
    for cell in values {
        let json = cell.to_json();
        if !seen.contains(&json) {
            seen.push(json);
            if seen.len() == max_values {
                break;
            }
        }
    }
    serde_json::Value::Array(seen).to_string()
}

fn numeric_stats(numeric: &[f64]) -> (Option<f64>, Option<f64>, Option<f64>, Option<f64>, Option<f64>) {
    if numeric.is_empty() {
        return (None, None, None, None, None);
    }
    let mut sorted = numeric.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).expect("finite"));
    let min = sorted[0];
    let max = sorted[sorted.len() - 1];
    let mid = sorted.len() / 2;
    let median = if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    };
    let mean = sorted.iter().sum::<f64>() / sorted.len() as f64;
    let std = if sorted.len() > 1 {
        let var = sorted.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (sorted.len() - 1) as f64;
        Some(var.sqrt())
    } else {
        None
    };
    (Some(min), Some(median), Some(max), Some(mean), std)
}

fn dtype_name(ty: ColumnType) -> &'static str {
    match ty {
        ColumnType::Int => "int",
        ColumnType::Float => "float",
        ColumnType::Bool => "bool",
        ColumnType::Str => "str",
        ColumnType::Any => "any",
    }
}

fn entry_for_column(table: &Table, index: usize, max_sample_values: usize) -> DictionaryEntry {
    let column = &table.columns()[index];
    let total = table.len();
    let values: Vec<&Cell> = table
        .rows()
        .iter()
        .map(|r| &r.cells()[index])
        .filter(|c| !c.is_null())
        .collect();
    let numeric: Vec<f64> = match column.ty {
        ColumnType::Str => Vec::new(),
        _ => values.iter().filter_map(|c| c.as_f64()).collect(),
    };

    let non_null = values.len();
    let missing = total - non_null;
    let mut unique: Vec<&Cell> = Vec::new();
    for cell in &values {
        if !unique.contains(cell) {
            unique.push(cell);
        }
    }

    let (min, median, max, mean, std) = numeric_stats(&numeric);
    DictionaryEntry {
        column: column.name.clone(),
        dtype: dtype_name(column.ty).to_string(),
        non_null_count: non_null,
        missing_count: missing,
        missing_pct: if total > 0 {
            missing as f64 / total as f64 * 100.0
        } else {
            0.0
        },
        n_unique: unique.len(),
        example_values: example_values(&values, max_sample_values),
        min,
        median,
        max,
        mean,
        std,
        inferred_unit: infer_unit(&column.name, &numeric, &values),
        inferred_group: infer_group(&column.name).to_string(),
        notes: note_for_column(&column.name, &numeric, &values),
    }
}

pub fn build_data_dictionary(table: &Table, max_sample_values: usize) -> Vec<DictionaryEntry> {
    (0..table.columns().len())
        .map(|i| entry_for_column(table, i, max_sample_values))
        .collect()
}

fn opt(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

pub fn dictionary_to_csv(entries: &[DictionaryEntry]) -> String {
    let mut out = String::from(
        "column,dtype,non_null_count,missing_count,missing_pct,n_unique,example_values,min,median,max,mean,std,inferred_unit,inferred_group,notes\n",
    );
    for e in entries {
        out.push_str(&format!(
            "{},{},{},{},{:.4},{},{},{},{},{},{},{},{},{},{}\n",
            csv_field(&e.column),
            e.dtype,
            e.non_null_count,
            e.missing_count,
            e.missing_pct,
            e.n_unique,
            csv_field(&e.example_values),
            opt(e.min),
            opt(e.median),
            opt(e.max),
            opt(e.mean),
            opt(e.std),
            e.inferred_unit,
            e.inferred_group,
            csv_field(&e.notes),
        ));
    }
    out
}

fn truncate(value: &str, max_len: usize) -> String {
    if value.len() <= max_len {
        return value.to_string();
    }
    // Cut on a char boundary at or below the byte budget.
    let cut = value
        .char_indices()
        .map(|(i, _)| i)
        .take_while(|&i| i <= max_len - 3)
        .last()
        .unwrap_or(0);
    format!("{}...", &value[..cut])
}

pub fn build_markdown_report(entries: &[DictionaryEntry], table: &Table) -> String {
    let generated = chrono::Utc::now().to_rfc3339();
    let mut lines = vec![
        "# Data Dictionary".to_string(),
        String::new(),
        format!("Generated at (UTC): {generated}"),
        format!(
            "Dataset shape: rows={}, columns={}",
            table.len(),
            table.columns().len() + 1
        ),
    ];
    if !table.is_empty() {
        lines.push(format!(
            "Date range: {} to {}",
            table.date(0),
            table.date(table.len() - 1)
        ));
    }

    let identifiers: Vec<&str> = entries
        .iter()
        .filter(|e| e.notes == "likely identifier")
        .map(|e| e.column.as_str())
        .collect();
    if !identifiers.is_empty() {
        lines.push(format!(
            "**WARNING:** Identifier-like columns detected: {}",
            identifiers.join(", ")
        ));
    }

    let mut by_missing: Vec<&DictionaryEntry> = entries.iter().collect();
    by_missing.sort_by(|a, b| b.missing_pct.total_cmp(&a.missing_pct));
    let summary_rows: Vec<Vec<String>> = by_missing
        .iter()
        .take(MISSINGNESS_TOP)
        .map(|e| {
            vec![
                e.column.clone(),
                e.dtype.clone(),
                format!("{:.2}", e.missing_pct),
                e.inferred_group.clone(),
                e.notes.clone(),
            ]
        })
        .collect();
    lines.extend([
        String::new(),
        format!("## Missingness summary (top {MISSINGNESS_TOP})"),
        String::new(),
        markdown_table(
            &["column", "dtype", "missing_pct", "inferred_group", "notes"],
            &summary_rows,
        ),
        String::new(),
        "## Columns by group".to_string(),
    ]);

    let mut groups: Vec<&str> = entries.iter().map(|e| e.inferred_group.as_str()).collect();
    groups.sort_unstable();
    groups.dedup();
    for group in groups {
        let mut members: Vec<&DictionaryEntry> = entries
            .iter()
            .filter(|e| e.inferred_group == group)
            .collect();
        members.sort_by(|a, b| a.column.cmp(&b.column));
        let rows: Vec<Vec<String>> = members
            .iter()
            .map(|e| {
                vec![
                    e.column.clone(),
                    e.dtype.clone(),
                    format!("{:.2}", e.missing_pct),
                    e.n_unique.to_string(),
                    truncate(&e.example_values, EXAMPLE_MAX_LEN),
                    opt(e.min),
                    opt(e.median),
                    opt(e.max),
                    e.inferred_unit.clone(),
                    e.notes.clone(),
                ]
            })
            .collect();
        lines.extend([
            String::new(),
            format!("### {group}"),
            String::new(),
            markdown_table(
                &[
                    "column",
                    "dtype",
                    "missing_pct",
                    "n_unique",
                    "example_values",
                    "min",
                    "median",
                    "max",
                    "inferred_unit",
                    "notes",
                ],
                &rows,
            ),
        ]);
    }

    lines.join("\n") + "\n"
}

pub fn write_dictionary_reports(
    entries: &[DictionaryEntry],
    table: &Table,
    out_dir: &Path,
) -> Result<(std::path::PathBuf, std::path::PathBuf)> {
    std::fs::create_dir_all(out_dir).with_context(|| format!("creating {}", out_dir.display()))?;
    let csv_path = out_dir.join("data_dictionary.csv");
    let md_path = out_dir.join("data_dictionary.md");
    std::fs::write(&csv_path, dictionary_to_csv(entries))?;
    std::fs::write(&md_path, build_markdown_report(entries, table))?;
    Ok((csv_path, md_path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use wellness_core::{Column, Table};

    fn table() -> Table {
        let mut t = Table::new(vec![
            Column::new("totalSteps", ColumnType::Int),
            Column::new("sleepStartTimestampGMT", ColumnType::Int),
            Column::new("uuid", ColumnType::Str),
            Column::new("averageSpo2Value", ColumnType::Float),
        ]);
        t.push_row(
            NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            vec![
                Cell::Int(1000),
                Cell::Int(1_704_067_200),
                Cell::Str("9f8e7d6c5b4a39281706f5e4d3c2b1a0".into()),
                Cell::Float(95.5),
            ],
        );
        t.push_row(
            NaiveDate::from_ymd_opt(2025, 1, 2).unwrap(),
            vec![Cell::Int(3000), Cell::Null, Cell::Null, Cell::Null],
        );
        t
    }

    #[test]
    fn stats_and_missingness_are_computed_per_column() {
        let entries = build_data_dictionary(&table(), 5);
        let steps = &entries[0];
        assert_eq!(steps.non_null_count, 2);
        assert_eq!(steps.missing_pct, 0.0);
        assert_eq!(steps.min, Some(1000.0));
        assert_eq!(steps.mean, Some(2000.0));

        let ts = &entries[1];
        assert_eq!(ts.missing_count, 1);
        assert_eq!(ts.notes, "epoch seconds timestamp");
    }

    #[test]
    fn identifier_columns_are_flagged() {
        let entries = build_data_dictionary(&table(), 5);
        assert_eq!(entries[2].notes, "likely identifier");
        let md = build_markdown_report(&entries, &table());
        assert!(md.contains("**WARNING:** Identifier-like columns detected: uuid"));
    }

    #[test]
    fn groups_and_units_are_inferred_from_names() {
        let entries = build_data_dictionary(&table(), 5);
        assert_eq!(entries[0].inferred_group, "steps_distance");
        assert_eq!(entries[1].inferred_group, "sleep");
        assert_eq!(entries[3].inferred_unit, "percent");
    }

    #[test]
    fn example_values_keep_first_distinct() {
        let entries = build_data_dictionary(&table(), 5);
        assert_eq!(entries[0].example_values, "[1000,3000]");
    }

    #[test]
    fn long_samples_truncate_on_char_boundaries() {
        assert_eq!(truncate("short", 80), "short");
        let ascii = "x".repeat(100);
        let cut = truncate(&ascii, 80);
        assert_eq!(cut.len(), 80);
        assert!(cut.ends_with("..."));
        // Multi-byte content must not split a character mid-sequence.
        let accented = "é".repeat(60);
        let cut = truncate(&accented, 80);
        assert!(cut.len() <= 80);
        assert!(cut.ends_with("..."));
        assert!(cut.trim_end_matches("...").chars().all(|c| c == 'é'));
    }

    #[test]
    fn markdown_report_renders_non_ascii_samples() {
        let mut t = Table::new(vec![Column::new("sleepScoreFeedback", ColumnType::Str)]);
        t.push_row(
            NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            vec![Cell::Str("é".repeat(60))],
        );
        let entries = build_data_dictionary(&t, 5);
        let md = build_markdown_report(&entries, &t);
        assert!(md.contains("sleepScoreFeedback"));
    }
}
