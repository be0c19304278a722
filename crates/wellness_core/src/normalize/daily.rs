//! Daily-summary (UDS) normalizer.
//!
//! The daily export varies the most across vendor vintages: the same body
//! battery or stress breakdown may live under any of several keys, either
//! as a summary object or as a typed stat list. Every top-level scalar is
//! kept verbatim; the stable derived columns below are resolved on top so
//! downstream scoring never has to know which variant produced them.

use serde_json::{Map, Value};

use super::{pick_cell, pick_object};
use crate::cell::Cell;
use crate::extract::{DAILY_WRAPPER_KEYS, extract_records};
use crate::table::{AssemblySpec, DATE_COLUMN, FlatRow, Table, assemble};

/// Fixed metric columns, placed right after `calendarDate`.
pub const CORE_METRIC_COLUMNS: &[&str] = &[
    "totalSteps",
    "totalDistanceMeters",
    "activeKilocalories",
    "bmrKilocalories",
    "totalKilocalories",
    "restingHeartRate",
    "minHeartRate",
    "maxHeartRate",
];

/// Stable derived columns, guaranteed present regardless of source variant.
pub const CORE_DERIVED_COLUMNS: &[&str] = &[
    "bodyBatteryStartOfDay",
    "bodyBatteryEndOfDay",
    "bodyBatteryLowest",
    "bodyBatteryHighest",
    "stressAwakeDurationSeconds",
    "stressAsleepDurationSeconds",
    "stressTotalDurationSeconds",
];

const CORE_COLUMNS: &[&str] = &[
    "totalSteps",
    "totalDistanceMeters",
    "activeKilocalories",
    "bmrKilocalories",
    "totalKilocalories",
    "restingHeartRate",
    "minHeartRate",
    "maxHeartRate",
    "bodyBatteryStartOfDay",
    "bodyBatteryEndOfDay",
    "bodyBatteryLowest",
    "bodyBatteryHighest",
    "stressAwakeDurationSeconds",
    "stressAsleepDurationSeconds",
    "stressTotalDurationSeconds",
];

const BODY_BATTERY_CONTAINERS: &[&str] = &[
    "bodyBattery",
    "bodyBatteryValues",
    "bodyBatterySummary",
    "bodyBatteryStats",
];

const STRESS_CONTAINERS: &[&str] = &[
    "stressSummary",
    "stress",
    "stressSummaryDto",
    "stressSummaryData",
];

/// (stable column, direct aliases, stat-list type tag) per body battery metric.
const BODY_BATTERY_FIELDS: &[(&str, &[&str], &str)] = &[
    (
        "bodyBatteryStartOfDay",
        &["startOfDay", "bodyBatteryStartOfDay", "start"],
        "STARTOFDAY",
    ),
    (
        "bodyBatteryEndOfDay",
        &["endOfDay", "bodyBatteryEndOfDay", "end"],
        "ENDOFDAY",
    ),
    (
        "bodyBatteryLowest",
        &["lowest", "bodyBatteryLowest", "low"],
        "LOWEST",
    ),
    (
        "bodyBatteryHighest",
        &["highest", "bodyBatteryHighest", "high"],
        "HIGHEST",
    ),
];

/// (stable column, direct aliases, aggregator type tag) per stress duration.
const STRESS_FIELDS: &[(&str, &[&str], &str)] = &[
    (
        "stressAwakeDurationSeconds",
        &[
            "awakeDuration",
            "awakeStressDuration",
            "awakeStressDurationSeconds",
            "awakeStressDurationInSeconds",
        ],
        "AWAKE",
    ),
    (
        "stressAsleepDurationSeconds",
        &[
            "sleepDuration",
            "asleepDuration",
            "asleepStressDuration",
            "sleepStressDuration",
            "sleepStressDurationSeconds",
            "sleepStressDurationInSeconds",
        ],
        "ASLEEP",
    ),
    (
        "stressTotalDurationSeconds",
        &[
            "totalDuration",
            "totalStressDuration",
            "totalStressDurationSeconds",
            "totalStressDurationInSeconds",
        ],
        "TOTAL",
    ),
];

const DAILY_SPEC: AssemblySpec = AssemblySpec {
    core_columns: CORE_COLUMNS,
    int_columns: CORE_COLUMNS,
    float_columns: &[],
    bool_columns: &[],
    string_columns: &[],
    dynamic: true,
};

fn insert_if_some(row: &mut FlatRow, name: &str, cell: Option<Cell>) {
    if let Some(cell) = cell {
        row.insert(name.to_string(), cell);
    }
}

/// Flatten one level of scalar sub-fields as `<prefix>_<key>`.
fn flatten_scalars(row: &mut FlatRow, prefix: &str, obj: &Map<String, Value>) {
    for (key, value) in obj {
        let cell = Cell::from_json(value);
        if !cell.is_null() {
            row.insert(format!("{prefix}_{key}"), cell);
        }
    }
}

/// Scan a stat list (`{bodyBatteryStatType, statsValue, ...}` items): derive
/// the stable columns still unresolved (first match per destination wins)
/// and emit the raw detail as `bodyBatteryStat_<TYPE>[_<key>]`.
fn apply_stat_list(row: &mut FlatRow, items: &[Value]) {
    for item in items {
        let Some(obj) = item.as_object() else {
            continue;
        };
        let Some(tag) = obj.get("bodyBatteryStatType").and_then(|v| v.as_str()) else {
            continue;
        };
        for (key, value) in obj {
            if key == "bodyBatteryStatType" {
                continue;
            }
            let cell = Cell::from_json(value);
            if cell.is_null() {
                continue;
            }
            let name = if key == "statsValue" {
                format!("bodyBatteryStat_{tag}")
            } else {
                format!("bodyBatteryStat_{tag}_{key}")
            };
            row.insert(name, cell);
        }

        for (column, _, wanted) in BODY_BATTERY_FIELDS {
            if tag == *wanted && !row.contains_key(*column) {
                insert_if_some(row, column, obj.get("statsValue").map(Cell::from_json).filter(|c| !c.is_null()));
            }
        }
    }
}

/// Flatten `allDayStress.aggregatorList` into `allDayStress_<TYPE>_<key>`
/// columns and resolve still-missing stable stress durations from the
/// per-category `totalDuration` values.
fn apply_all_day_stress(row: &mut FlatRow, entry: &Map<String, Value>) {
    let Some(items) = entry
        .get("allDayStress")
        .and_then(|v| v.as_object())
        .and_then(|o| o.get("aggregatorList"))
        .and_then(|v| v.as_array())
    else {
        return;
    };

    for item in items {
        let Some(obj) = item.as_object() else {
            continue;
        };
        let Some(tag) = obj.get("type").and_then(|v| v.as_str()) else {
            continue;
        };
        for (key, value) in obj {
            if key == "type" {
                continue;
            }
            let cell = Cell::from_json(value);
            if !cell.is_null() {
                row.insert(format!("allDayStress_{tag}_{key}"), cell);
            }
        }

        for (column, _, wanted) in STRESS_FIELDS {
            if tag == *wanted && !row.contains_key(*column) {
                insert_if_some(
                    row,
                    column,
                    obj.get("totalDuration").map(Cell::from_json).filter(|c| !c.is_null()),
                );
            }
        }
    }
}

/// Normalize one daily-summary record into a flat row.
pub fn normalize_record(entry: &Map<String, Value>) -> FlatRow {
    let mut row = FlatRow::new();

    // Verbatim pass-through of top-level scalars.
    for (key, value) in entry {
        let cell = Cell::from_json(value);
        if !cell.is_null() {
            row.insert(key.clone(), cell);
        }
    }

    insert_if_some(
        &mut row,
        DATE_COLUMN,
        pick_cell(entry, &["calendarDate", "calendarDateStr"]),
    );
    insert_if_some(
        &mut row,
        "totalDistanceMeters",
        pick_cell(entry, &["totalDistanceMeters", "totalDistance"]),
    );

    if let Some((container, bb)) = pick_object(entry, BODY_BATTERY_CONTAINERS) {
        flatten_scalars(&mut row, container, bb);
        for (column, aliases, _) in BODY_BATTERY_FIELDS {
            insert_if_some(&mut row, column, pick_cell(bb, aliases));
        }
        if let Some(items) = bb.get("bodyBatteryStatList").and_then(|v| v.as_array()) {
            apply_stat_list(&mut row, items);
        }
    }
    // The stat list also appears directly on the record in newer exports.
    if let Some(items) = entry.get("bodyBatteryStatList").and_then(|v| v.as_array()) {
        apply_stat_list(&mut row, items);
    }

    if let Some((container, stress)) = pick_object(entry, STRESS_CONTAINERS) {
        flatten_scalars(&mut row, container, stress);
        for (column, aliases, _) in STRESS_FIELDS {
            insert_if_some(&mut row, column, pick_cell(stress, aliases));
        }
    }

    apply_all_day_stress(&mut row, entry);

    row
}

/// Build the daily-summary table from parsed export documents, in file
/// order. Documents with no recognizable records contribute zero rows.
pub fn build_table(payloads: &[Value]) -> Table {
    let mut rows: Vec<FlatRow> = Vec::new();
    for payload in payloads {
        let records = extract_records(payload, DAILY_WRAPPER_KEYS);
        if records.is_empty() {
            tracing::debug!("daily document yielded no records");
        }
        rows.extend(records.into_iter().map(normalize_record));
    }
    assemble(&rows, &DAILY_SPEC)
}
