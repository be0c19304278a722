//! Left outer join of the daily-summary and sleep tables on calendar day.

use crate::cell::Cell;
use crate::error::PipelineResult;
use crate::table::{Table, date_index};

/// Merge the sleep table into the daily-summary table.
///
/// The daily table drives: every one of its days appears exactly once in
/// the result, with sleep columns null for days the sleep table lacks.
/// Duplicate dates in either input are fatal — the assembler already
/// defines last-write-wins, so a duplicate here means an upstream
/// inconsistency that must not be papered over.
pub fn merge_daily(daily: &Table, sleep: &Table) -> PipelineResult<Table> {
    daily.ensure_unique_dates("daily")?;
    sleep.ensure_unique_dates("sleep")?;

    let sleep_only: Vec<usize> = sleep
        .columns()
        .iter()
        .enumerate()
        .filter(|(_, c)| !daily.has_column(&c.name))
        .map(|(i, _)| i)
        .collect();

    let mut columns = daily.columns().to_vec();
    columns.extend(sleep_only.iter().map(|&i| sleep.columns()[i].clone()));

    let by_date = date_index(sleep);
    let mut out = Table::new(columns);
    for row in daily.rows() {
        let mut cells = row.cells().to_vec();
        match by_date.get(&row.date) {
            Some(&si) => {
                let sleep_cells = sleep.rows()[si].cells();
                cells.extend(sleep_only.iter().map(|&i| sleep_cells[i].clone()));
            }
            None => cells.extend(sleep_only.iter().map(|_| Cell::Null)),
        }
        out.push_row(row.date, cells);
    }

    tracing::info!(
        daily_rows = daily.len(),
        sleep_rows = sleep.len(),
        merged_rows = out.len(),
        "merged daily and sleep tables"
    );
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;
    use crate::table::{Column, ColumnType};
    use chrono::NaiveDate;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, d).unwrap()
    }

    fn daily_table(days: &[u32]) -> Table {
        let mut t = Table::new(vec![Column::new("totalSteps", ColumnType::Int)]);
        for d in days {
            t.push_row(day(*d), vec![Cell::Int(*d as i64 * 100)]);
        }
        t
    }

    fn sleep_table(days: &[u32]) -> Table {
        let mut t = Table::new(vec![
            Column::new("sleepStartTimestampGMT", ColumnType::Int),
            Column::new("totalSteps", ColumnType::Int),
        ]);
        for d in days {
            t.push_row(day(*d), vec![Cell::Int(1_700_000_000), Cell::Int(-1)]);
        }
        t
    }

    #[test]
    fn row_count_matches_daily_side() {
        let merged = merge_daily(&daily_table(&[1, 2, 3]), &sleep_table(&[2])).unwrap();
        assert_eq!(merged.len(), 3);
        assert_eq!(merged.cell(0, "sleepStartTimestampGMT"), Some(&Cell::Null));
        assert_eq!(
            merged.cell(1, "sleepStartTimestampGMT"),
            Some(&Cell::Int(1_700_000_000))
        );
        // Daily-side column wins on name collision.
        assert_eq!(merged.cell(1, "totalSteps"), Some(&Cell::Int(200)));
    }

    #[test]
    fn duplicate_daily_dates_are_fatal() {
        let mut daily = daily_table(&[2]);
        daily.push_row(day(2), vec![Cell::Int(5)]);
        let err = merge_daily(&daily, &sleep_table(&[])).unwrap_err();
        let PipelineError::DuplicateDates { table, count } = err;
        assert_eq!(table, "daily");
        assert_eq!(count, 1);
    }

    #[test]
    fn duplicate_sleep_dates_are_fatal() {
        let mut sleep = sleep_table(&[2]);
        sleep.push_row(day(2), vec![Cell::Null, Cell::Null]);
        assert!(merge_daily(&daily_table(&[1]), &sleep).is_err());
    }
}
