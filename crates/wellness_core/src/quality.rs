//! Day-quality scoring: coverage flags, score, labels, artifact detection.
//!
//! Stateless per row — every output is a function of that day's sanctioned
//! input columns and the configured thresholds.

use crate::cell::Cell;
use crate::table::{Column, ColumnType, Table};

/// Scoring thresholds. Defaults mirror long-observed export behavior:
/// six hours of stress coverage means the watch was actually worn, twenty
/// hours means it was worn essentially all day.
#[derive(Clone, Debug)]
pub struct QualityConfig {
    pub steps_min: i64,
    pub stress_any_min_seconds: i64,
    pub stress_full_min_seconds: i64,
    pub strict_min_score: i64,
    pub loose_min_score: i64,
    pub top_n: usize,
}

impl Default for QualityConfig {
    fn default() -> Self {
        QualityConfig {
            steps_min: 50,
            stress_any_min_seconds: 21_600,
            stress_full_min_seconds: 72_000,
            strict_min_score: 4,
            loose_min_score: 3,
            top_n: 50,
        }
    }
}

/// The five scored coverage flags, in scoring order.
pub const QUALITY_FLAGS: &[&str] = &[
    "has_steps",
    "has_hr",
    "has_stress_duration",
    "has_bodybattery_end",
    "has_sleep",
];

/// A stress duration at or above this is a telemetry default, not a day of
/// near-continuous stress.
const CORRUPTED_STRESS_SECONDS: f64 = 23.5 * 3600.0;

const CROSS_CHECK_TOLERANCE_SECONDS: f64 = 60.0;

/// Label for one score under threshold `min_score`. The `bad` cutoff is
/// fixed at score <= 1 and intentionally independent of the threshold,
/// even though a low threshold can leave the `partial` band empty.
fn label_from_score(score: i64, min_score: i64) -> &'static str {
    if score <= 1 {
        "bad"
    } else if score >= min_score {
        "good"
    } else {
        "partial"
    }
}

fn present(table: &Table, row: usize, name: &str) -> bool {
    table.cell(row, name).is_some_and(|c| !c.is_null())
}

/// Nullable comparison of the stable derived column against the raw
/// breakdown column; null when either side is unavailable.
fn match_with_tolerance(table: &Table, row: usize, left: &str, right: &str) -> Cell {
    let (Some(a), Some(b)) = (table.number(row, left), table.number(row, right)) else {
        return Cell::Null;
    };
    Cell::Bool((a - b).abs() <= CROSS_CHECK_TOLERANCE_SECONDS)
}

struct RowQuality {
    has_steps: bool,
    has_hr: bool,
    has_stress_duration: bool,
    full_day_stress: bool,
    has_bodybattery_end: bool,
    has_sleep: bool,
    score: i64,
    corrupted: bool,
}

fn score_row(table: &Table, row: usize, config: &QualityConfig) -> RowQuality {
    let steps = table.number(row, "totalSteps");
    let stress_total = table.number(row, "stressTotalDurationSeconds");

    let has_steps = steps.is_some_and(|v| v >= config.steps_min as f64);
    let has_hr = present(table, row, "minHeartRate")
        || present(table, row, "maxHeartRate")
        || present(table, row, "restingHeartRate");
    let has_stress_duration =
        stress_total.is_some_and(|v| v >= config.stress_any_min_seconds as f64);
    let full_day_stress = stress_total.is_some_and(|v| v >= config.stress_full_min_seconds as f64);
    let has_bodybattery_end = present(table, row, "bodyBatteryEndOfDay");
    let has_sleep = present(table, row, "sleepStartTimestampGMT")
        && present(table, row, "sleepEndTimestampGMT");

    let score = [
        has_steps,
        has_hr,
        has_stress_duration,
        has_bodybattery_end,
        has_sleep,
    ]
    .iter()
    .filter(|f| **f)
    .count() as i64;

    let corrupted = stress_total.is_some_and(|v| v >= CORRUPTED_STRESS_SECONDS)
        && !has_hr
        && !has_sleep
        && !has_bodybattery_end
        && !has_steps;

    RowQuality {
        has_steps,
        has_hr,
        has_stress_duration,
        full_day_stress,
        has_bodybattery_end,
        has_sleep,
        score,
        corrupted,
    }
}

fn suspicion_reasons(q: &RowQuality) -> String {
    let mut missing: Vec<&str> = Vec::new();
    if q.corrupted {
        missing.push("corrupted_stress_only_day");
    }
    for (flag, value) in [
        ("has_steps", q.has_steps),
        ("has_hr", q.has_hr),
        ("has_stress_duration", q.has_stress_duration),
        ("has_bodybattery_end", q.has_bodybattery_end),
        ("has_sleep", q.has_sleep),
        ("full_day_stress", q.full_day_stress),
    ] {
        if !value {
            missing.push(flag);
        }
    }
    missing.join(",")
}

/// Augment `table` with the coverage flags, score, labels, artifact flag,
/// cross-checks, and suspicion reasons.
pub fn apply_quality_labels(table: &Table, config: &QualityConfig) -> Table {
    let mut columns = table.columns().to_vec();
    for name in [
        "has_steps",
        "has_hr",
        "has_stress_duration",
        "full_day_stress",
        "has_bodybattery_end",
        "has_sleep",
    ] {
        columns.push(Column::new(name, ColumnType::Bool));
    }
    columns.push(Column::new(
        "stress_duration_matches_allDayStress_TOTAL",
        ColumnType::Bool,
    ));
    columns.push(Column::new(
        "stress_awake_matches_allDayStress_AWAKE",
        ColumnType::Bool,
    ));
    columns.push(Column::new("quality_score", ColumnType::Int));
    columns.push(Column::new("day_quality_label_strict", ColumnType::Str));
    columns.push(Column::new("day_quality_label_loose", ColumnType::Str));
    columns.push(Column::new("valid_day_strict", ColumnType::Bool));
    columns.push(Column::new("valid_day_loose", ColumnType::Bool));
    columns.push(Column::new("corrupted_stress_only_day", ColumnType::Bool));
    columns.push(Column::new("suspicion_reasons", ColumnType::Str));

    let mut out = Table::new(columns);
    for row in 0..table.len() {
        let q = score_row(table, row, config);

        let (strict, loose, valid_strict, valid_loose) = if q.corrupted {
            // Artifact days are forced to the worst label regardless of score.
            ("bad", "bad", false, false)
        } else {
            (
                label_from_score(q.score, config.strict_min_score),
                label_from_score(q.score, config.loose_min_score),
                q.score >= config.strict_min_score,
                q.score >= config.loose_min_score,
            )
        };

        let mut cells = table.rows()[row].cells().to_vec();
        cells.extend([
            Cell::Bool(q.has_steps),
            Cell::Bool(q.has_hr),
            Cell::Bool(q.has_stress_duration),
            Cell::Bool(q.full_day_stress),
            Cell::Bool(q.has_bodybattery_end),
            Cell::Bool(q.has_sleep),
            match_with_tolerance(
                table,
                row,
                "stressTotalDurationSeconds",
                "allDayStress_TOTAL_totalDuration",
            ),
            match_with_tolerance(
                table,
                row,
                "stressAwakeDurationSeconds",
                "allDayStress_AWAKE_totalDuration",
            ),
            Cell::Int(q.score),
            Cell::Str(strict.into()),
            Cell::Str(loose.into()),
            Cell::Bool(valid_strict),
            Cell::Bool(valid_loose),
            Cell::Bool(q.corrupted),
            Cell::Str(suspicion_reasons(&q)),
        ]);
        out.push_row(table.date(row), cells);
    }
    out
}
