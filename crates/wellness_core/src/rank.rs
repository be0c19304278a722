//! Suspicious-day ranking over the quality-labeled table.

use std::cmp::Ordering;

use crate::table::Table;

/// Columns carried into the ranked exports, in presentation order. Names
/// that the labeled table lacks are skipped.
const SUSPICIOUS_COLUMNS: &[&str] = &[
    "quality_score",
    "day_quality_label_strict",
    "day_quality_label_loose",
    "corrupted_stress_only_day",
    "has_steps",
    "has_hr",
    "has_stress_duration",
    "has_bodybattery_end",
    "has_sleep",
    "full_day_stress",
    "stressTotalDurationSeconds",
    "totalSteps",
    "minHeartRate",
    "maxHeartRate",
    "restingHeartRate",
    "bodyBatteryStartOfDay",
    "bodyBatteryEndOfDay",
    "suspicion_reasons",
];

const ARTIFACT_FLAGS: &[&str] = &["has_hr", "has_sleep", "has_bodybattery_end", "has_steps"];

fn score(table: &Table, row: usize) -> f64 {
    table.number(row, "quality_score").unwrap_or(0.0)
}

/// Stress duration with missing mapped to -1 so absent telemetry sorts
/// ahead of any real duration.
fn stress_or_sentinel(table: &Table, row: usize) -> f64 {
    table
        .number(row, "stressTotalDurationSeconds")
        .unwrap_or(-1.0)
}

fn flag_false(table: &Table, row: usize, name: &str) -> bool {
    !table.flag(row, name).unwrap_or(false)
}

fn select(table: &Table, mut order: Vec<usize>, top_n: usize) -> Table {
    order.truncate(top_n);

    let projected = table.project(SUSPICIOUS_COLUMNS);
    let mut out = Table::new(projected.columns().to_vec());
    for row in order {
        out.push_row(projected.date(row), projected.rows()[row].cells().to_vec());
    }
    out
}

/// Rank by sheer data sparsity: lowest score first, then least stress
/// coverage, then days missing sleep ahead of ties that have it.
pub fn sparsest_first(table: &Table, top_n: usize) -> Table {
    let mut order: Vec<usize> = (0..table.len()).collect();
    order.sort_by(|&a, &b| {
        score(table, a)
            .total_cmp(&score(table, b))
            .then(stress_or_sentinel(table, a).total_cmp(&stress_or_sentinel(table, b)))
            .then_with(|| {
                flag_false(table, b, "has_sleep").cmp(&flag_false(table, a, "has_sleep"))
            })
    });
    select(table, order, top_n)
}

/// Rank likely telemetry artifacts first: the corrupted flag, then a full
/// day of stress, then how many of the other signals are absent, then raw
/// stress duration. Sparse-but-honest days fall to the bottom.
pub fn artifact_first(table: &Table, top_n: usize) -> Table {
    let missing_count = |row: usize| -> usize {
        ARTIFACT_FLAGS
            .iter()
            .filter(|f| flag_false(table, row, f))
            .count()
    };
    let mut order: Vec<usize> = (0..table.len()).collect();
    order.sort_by(|&a, &b| {
        let corrupted = |r: usize| table.flag(r, "corrupted_stress_only_day").unwrap_or(false);
        let full = |r: usize| table.flag(r, "full_day_stress").unwrap_or(false);
        corrupted(b)
            .cmp(&corrupted(a))
            .then(full(b).cmp(&full(a)))
            .then(missing_count(b).cmp(&missing_count(a)))
            .then(stress_or_sentinel(table, b).total_cmp(&stress_or_sentinel(table, a)))
            .then(score(table, a).total_cmp(&score(table, b)))
    });
    select(table, order, top_n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::Cell;
    use crate::quality::{QualityConfig, apply_quality_labels};
    use crate::table::{Column, ColumnType};
    use chrono::NaiveDate;

    fn labeled_fixture() -> Table {
        let columns = [
            "totalSteps",
            "minHeartRate",
            "stressTotalDurationSeconds",
            "bodyBatteryEndOfDay",
            "sleepStartTimestampGMT",
            "sleepEndTimestampGMT",
        ];
        let mut t = Table::new(
            columns
                .iter()
                .map(|n| Column::new(*n, ColumnType::Any))
                .collect(),
        );
        // Day 1: complete. Day 2: steps only. Day 3: corrupted stress-only.
        // Day 4: stress + hr, nothing else.
        let rows = [
            vec![
                Cell::Int(8000),
                Cell::Int(44),
                Cell::Int(60_000),
                Cell::Int(30),
                Cell::Int(1_704_067_200),
                Cell::Int(1_704_096_000),
            ],
            vec![
                Cell::Int(6000),
                Cell::Null,
                Cell::Null,
                Cell::Null,
                Cell::Null,
                Cell::Null,
            ],
            vec![
                Cell::Null,
                Cell::Null,
                Cell::Int(86_400),
                Cell::Null,
                Cell::Null,
                Cell::Null,
            ],
            vec![
                Cell::Null,
                Cell::Int(50),
                Cell::Int(30_000),
                Cell::Null,
                Cell::Null,
                Cell::Null,
            ],
        ];
        for (i, cells) in rows.into_iter().enumerate() {
            t.push_row(
                NaiveDate::from_ymd_opt(2025, 2, 1 + i as u32).unwrap(),
                cells.to_vec(),
            );
        }
        apply_quality_labels(&t, &QualityConfig::default())
    }

    fn dates(table: &Table) -> Vec<NaiveDate> {
        (0..table.len()).map(|r| table.date(r)).collect()
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 2, d).unwrap()
    }

    #[test]
    fn sparsest_first_orders_by_score_then_stress() {
        let ranked = sparsest_first(&labeled_fixture(), 10);
        // Day 2 (score 1, no stress) before day 3 (score 1, full stress),
        // then day 4 (score 2), then day 1 (score 5).
        assert_eq!(dates(&ranked), vec![day(2), day(3), day(4), day(1)]);
    }

    #[test]
    fn artifact_first_puts_corrupted_days_on_top() {
        let ranked = artifact_first(&labeled_fixture(), 10);
        assert_eq!(ranked.date(0), day(3));
        // The complete day ranks last.
        assert_eq!(ranked.date(ranked.len() - 1), day(1));
    }

    #[test]
    fn rankings_truncate_to_top_n() {
        let ranked = sparsest_first(&labeled_fixture(), 2);
        assert_eq!(ranked.len(), 2);
        assert_eq!(dates(&ranked), vec![day(2), day(3)]);
    }

    #[test]
    fn ranked_table_projects_the_export_columns() {
        let ranked = sparsest_first(&labeled_fixture(), 10);
        let names = ranked.column_names();
        assert_eq!(names[0], "calendarDate");
        assert_eq!(names[1], "quality_score");
        assert!(names.iter().any(|n| n == "suspicion_reasons"));
        // Raw input columns absent from the fixture are skipped.
        assert!(!names.iter().any(|n| n == "bodyBatteryStartOfDay"));
    }
}
