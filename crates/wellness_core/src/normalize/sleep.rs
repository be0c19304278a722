//! Sleep-record normalizer.
//!
//! Unlike the daily summary, the sleep export has a fixed target schema:
//! stage durations, respiration, the SpO2 sub-summary, and the score block.
//! The awkward part is timestamps, which show up as ISO strings or as epoch
//! numbers in seconds, milliseconds, or nanoseconds depending on vintage.

use chrono::NaiveDateTime;
use serde_json::{Map, Value};

use super::{pick, pick_cell};
use crate::cell::Cell;
use crate::extract::{SLEEP_WRAPPER_KEYS, extract_records};
use crate::table::{AssemblySpec, DATE_COLUMN, FlatRow, Table, assemble};

pub const SLEEP_COLUMNS: &[&str] = &[
    "sleepStartTimestampGMT",
    "sleepEndTimestampGMT",
    "deepSleepSeconds",
    "lightSleepSeconds",
    "remSleepSeconds",
    "awakeSleepSeconds",
    "unmeasurableSeconds",
    "averageRespiration",
    "lowestRespiration",
    "highestRespiration",
    "avgSleepStress",
    "awakeCount",
    "restlessMomentsCount",
    "retro",
    "sleepWindowConfirmationType",
    "spo2SleepMeasurementStartGMT",
    "spo2SleepMeasurementEndGMT",
    "averageSpo2Value",
    "lowestSpo2Value",
    "averageSpo2HR",
    "sleepOverallScore",
    "sleepScore_totalDuration",
    "sleepScore_stress",
    "sleepScore_awakeCount",
    "sleepScore_interruptions",
    "sleepScore_remPercentage",
    "sleepScore_lightPercentage",
    "sleepScore_deepPercentage",
    "sleepScore_restlessness",
    "sleepScoreFeedback",
    "sleepScoreInsight",
];

const INT_COLUMNS: &[&str] = &[
    "sleepStartTimestampGMT",
    "sleepEndTimestampGMT",
    "deepSleepSeconds",
    "lightSleepSeconds",
    "remSleepSeconds",
    "awakeSleepSeconds",
    "unmeasurableSeconds",
    "avgSleepStress",
    "awakeCount",
    "restlessMomentsCount",
    "spo2SleepMeasurementStartGMT",
    "spo2SleepMeasurementEndGMT",
    "lowestSpo2Value",
    "sleepOverallScore",
    "sleepScore_totalDuration",
    "sleepScore_stress",
    "sleepScore_awakeCount",
    "sleepScore_interruptions",
    "sleepScore_remPercentage",
    "sleepScore_lightPercentage",
    "sleepScore_deepPercentage",
    "sleepScore_restlessness",
];

const FLOAT_COLUMNS: &[&str] = &[
    "averageRespiration",
    "lowestRespiration",
    "highestRespiration",
    "averageSpo2Value",
    "averageSpo2HR",
];

const STRING_COLUMNS: &[&str] = &[
    "sleepWindowConfirmationType",
    "sleepScoreFeedback",
    "sleepScoreInsight",
];

/// Columns carrying GMT instants, normalized to integer epoch seconds.
const TIMESTAMP_COLUMNS: &[&str] = &[
    "sleepStartTimestampGMT",
    "sleepEndTimestampGMT",
    "spo2SleepMeasurementStartGMT",
    "spo2SleepMeasurementEndGMT",
];

/// The eight named sub-scores under `sleepScores`.
const SUB_SCORES: &[&str] = &[
    "totalDuration",
    "stress",
    "awakeCount",
    "interruptions",
    "remPercentage",
    "lightPercentage",
    "deepPercentage",
    "restlessness",
];

const SLEEP_SPEC: AssemblySpec = AssemblySpec {
    core_columns: SLEEP_COLUMNS,
    int_columns: INT_COLUMNS,
    float_columns: FLOAT_COLUMNS,
    bool_columns: &["retro"],
    string_columns: STRING_COLUMNS,
    dynamic: false,
};

/// A score entry is either a bare number or a `{value, qualifierKey, ...}`
/// block; both collapse to the numeric value.
fn score_value(value: &Value) -> Option<Cell> {
    if let Some(obj) = value.as_object() {
        return pick_cell(obj, &["value", "score"]);
    }
    Some(Cell::from_json(value)).filter(|c| !c.is_null())
}

fn insert_if_some(row: &mut FlatRow, name: &str, cell: Option<Cell>) {
    if let Some(cell) = cell {
        row.insert(name.to_string(), cell);
    }
}

/// Normalize one sleep record into a flat row. Timestamps stay raw here;
/// unit detection needs the whole column and runs in `build_table`.
pub fn normalize_record(entry: &Map<String, Value>) -> FlatRow {
    let mut row = FlatRow::new();
    insert_if_some(
        &mut row,
        DATE_COLUMN,
        pick_cell(entry, &["calendarDate", "calendarDateStr"]),
    );

    for name in [
        "sleepStartTimestampGMT",
        "sleepEndTimestampGMT",
        "deepSleepSeconds",
        "lightSleepSeconds",
        "remSleepSeconds",
        "awakeSleepSeconds",
        "unmeasurableSeconds",
        "averageRespiration",
        "lowestRespiration",
        "highestRespiration",
        "avgSleepStress",
        "awakeCount",
        "restlessMomentsCount",
        "retro",
        "sleepWindowConfirmationType",
    ] {
        insert_if_some(&mut row, name, pick_cell(entry, &[name]));
    }

    if let Some(spo2) = entry.get("spo2SleepSummary").and_then(|v| v.as_object()) {
        insert_if_some(
            &mut row,
            "spo2SleepMeasurementStartGMT",
            pick_cell(spo2, &["sleepMeasurementStartGMT", "startGMT"]),
        );
        insert_if_some(
            &mut row,
            "spo2SleepMeasurementEndGMT",
            pick_cell(spo2, &["sleepMeasurementEndGMT", "endGMT"]),
        );
        insert_if_some(
            &mut row,
            "averageSpo2Value",
            pick_cell(spo2, &["averageSPO2", "averageSpo2Value", "avgSpo2"]),
        );
        insert_if_some(
            &mut row,
            "lowestSpo2Value",
            pick_cell(spo2, &["lowestSPO2", "lowestSpo2Value"]),
        );
        insert_if_some(
            &mut row,
            "averageSpo2HR",
            pick_cell(spo2, &["averageHR", "averageSpo2HR"]),
        );
    }

    if let Some(scores) = entry.get("sleepScores").and_then(|v| v.as_object()) {
        let overall = pick(scores, &["overallScore", "score", "overall"]).and_then(score_value);
        insert_if_some(&mut row, "sleepOverallScore", overall);
        for name in SUB_SCORES {
            let cell = scores.get(*name).and_then(score_value);
            insert_if_some(&mut row, &format!("sleepScore_{name}"), cell);
        }
        insert_if_some(
            &mut row,
            "sleepScoreFeedback",
            pick_cell(scores, &["feedback", "sleepScoreFeedback"]),
        );
        insert_if_some(
            &mut row,
            "sleepScoreInsight",
            pick_cell(scores, &["insight", "sleepScoreInsight"]),
        );
    }
    // Some vintages keep feedback/insight at the top level instead.
    if !row.contains_key("sleepScoreFeedback") {
        insert_if_some(&mut row, "sleepScoreFeedback", pick_cell(entry, &["sleepScoreFeedback"]));
    }
    if !row.contains_key("sleepScoreInsight") {
        insert_if_some(&mut row, "sleepScoreInsight", pick_cell(entry, &["sleepScoreInsight"]));
    }

    row
}

/// Parse an ISO-8601 timestamp string as UTC and return epoch seconds.
fn parse_iso_utc(s: &str) -> Option<i64> {
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(s) {
        return Some(dt.timestamp());
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(ndt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(ndt.and_utc().timestamp());
        }
    }
    None
}

fn median(values: &mut [f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(|a, b| a.partial_cmp(b).expect("finite"));
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        Some((values[mid - 1] + values[mid]) / 2.0)
    } else {
        Some(values[mid])
    }
}

/// Normalize one timestamp column across all rows to epoch seconds.
///
/// ISO strings parse per cell; numeric epochs share one unit per column,
/// detected from the median absolute value so a single outlier cannot flip
/// the interpretation row-by-row.
fn normalize_epoch_column(rows: &mut [FlatRow], column: &str) {
    // Strings first, so unit detection only sees numeric epochs.
    for row in rows.iter_mut() {
        let Some(cell) = row.get(column) else { continue };
        if let Some(s) = cell.as_str() {
            let replacement = parse_iso_utc(s).map(Cell::Int).unwrap_or(Cell::Null);
            row.insert(column.to_string(), replacement);
        }
    }

    let mut magnitudes: Vec<f64> = rows
        .iter()
        .filter_map(|r| r.get(column))
        .filter(|c| matches!(c, Cell::Int(_) | Cell::Float(_)))
        .filter_map(Cell::as_f64)
        .map(f64::abs)
        .collect();
    let Some(med) = median(&mut magnitudes) else {
        return;
    };
    let divisor: i64 = if med >= 1e14 {
        1_000_000_000
    } else if med >= 1e11 {
        1_000
    } else {
        1
    };
    if divisor == 1 {
        return;
    }

    for row in rows.iter_mut() {
        let scaled = match row.get(column) {
            Some(Cell::Int(i)) => Some(Cell::Int(i / divisor)),
            Some(Cell::Float(f)) => Some(Cell::Int((f / divisor as f64) as i64)),
            _ => None,
        };
        if let Some(cell) = scaled {
            row.insert(column.to_string(), cell);
        }
    }
}

/// Build the sleep table from parsed export documents, in file order.
pub fn build_table(payloads: &[Value]) -> Table {
    let mut rows: Vec<FlatRow> = Vec::new();
    for payload in payloads {
        let records = extract_records(payload, SLEEP_WRAPPER_KEYS);
        if records.is_empty() {
            tracing::debug!("sleep document yielded no records");
        }
        rows.extend(records.into_iter().map(normalize_record));
    }
    for column in TIMESTAMP_COLUMNS {
        normalize_epoch_column(&mut rows, column);
    }
    assemble(&rows, &SLEEP_SPEC)
}
