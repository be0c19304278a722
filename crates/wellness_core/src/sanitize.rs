//! Column-level privacy/cleanup pass and stress-sentinel repair.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

use crate::cell::Cell;
use crate::table::{DATE_COLUMN, Table};

fn guid_re() -> &'static Regex {
    static GUID_RE: OnceLock<Regex> = OnceLock::new();
    GUID_RE.get_or_init(|| Regex::new(r"^[0-9a-fA-F-]{32,}$").expect("valid guid regex"))
}

fn stress_level_re() -> &'static Regex {
    static STRESS_LEVEL_RE: OnceLock<Regex> = OnceLock::new();
    STRESS_LEVEL_RE.get_or_init(|| {
        Regex::new(r"(?:^|_)averageStressLevel(?:Intensity)?$").expect("valid stress level regex")
    })
}

/// Sanitizer knobs. Keep can rescue metadata/duplicate-date columns but
/// never identifier-like ones; drop always wins except for `calendarDate`.
#[derive(Clone, Debug, Default)]
pub struct SanitizeOptions {
    pub keep: Vec<String>,
    pub drop: Vec<String>,
    pub allow_identifiers: bool,
}

#[derive(Clone, Debug, Serialize)]
pub struct ValueReplacements {
    pub rule: String,
    pub replaced_to_null_by_column: BTreeMap<String, usize>,
}

/// Structured record of what the sanitizer did, persisted as JSON by the
/// reporting collaborator.
#[derive(Clone, Debug, Serialize)]
pub struct SanitizeReport {
    pub dropped_columns: Vec<String>,
    pub kept_columns: Vec<String>,
    pub rules_applied: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_replacements: Option<ValueReplacements>,
}

fn looks_like_identifier_name(name: &str) -> bool {
    let lowered = name.to_lowercase();
    if lowered.contains("uuid") || lowered.contains("userprofilepk") {
        return true;
    }
    // "pk" alone is too aggressive; require a clear token plus user/profile
    // context so metric names containing "pk" survive.
    if lowered.contains("pk") {
        let pk_is_token =
            lowered.ends_with("pk") || lowered.contains("_pk") || lowered.starts_with("pk_");
        if pk_is_token && (lowered.contains("user") || lowered.contains("profile")) {
            return true;
        }
    }
    false
}

/// Value-based GUID detection over up to `sample_size` non-null values.
/// Mixed-type and numeric columns never qualify.
fn looks_like_guid_column(table: &Table, column: &str, sample_size: usize) -> bool {
    let mut sampled = 0usize;
    let mut matched = 0usize;
    for row in 0..table.len() {
        if sampled >= sample_size {
            break;
        }
        match table.cell(row, column) {
            Some(Cell::Null) | None => continue,
            Some(Cell::Str(s)) => {
                sampled += 1;
                if guid_re().is_match(s) {
                    matched += 1;
                }
            }
            Some(_) => return false,
        }
    }
    if sampled == 0 {
        return false;
    }
    if sampled < 5 {
        return matched == sampled;
    }
    matched as f64 / sampled as f64 >= 0.8
}

fn is_calendar_duplicate(name: &str) -> bool {
    let lowered = name.to_lowercase();
    if lowered == "calendardate" {
        return false;
    }
    lowered.ends_with("_calendardate") || lowered.ends_with("_calendardatestr")
}

fn is_stress_level_column(name: &str) -> bool {
    name == "avgSleepStress" || stress_level_re().is_match(name)
}

/// Null stress-level values outside [0, 100] in place. The vendor encodes
/// "not computed" as negative sentinels (-1 awake/total, -2 asleep); those
/// are missingness, not measurements.
fn repair_stress_levels(table: &mut Table) -> BTreeMap<String, usize> {
    let stress_columns: Vec<String> = table
        .columns()
        .iter()
        .map(|c| c.name.clone())
        .filter(|n| is_stress_level_column(n))
        .collect();

    let mut replaced: BTreeMap<String, usize> = BTreeMap::new();
    for name in &stress_columns {
        let mut count = 0usize;
        let sanitized: Vec<Option<Cell>> = (0..table.len())
            .map(|row| {
                let value = table.number(row, name)?;
                if !(0.0..=100.0).contains(&value) {
                    count += 1;
                    Some(Cell::Null)
                } else {
                    None
                }
            })
            .collect();
        if count == 0 {
            continue;
        }
        let mut out = Table::new(table.columns().to_vec());
        for (row, replacement) in sanitized.into_iter().enumerate() {
            let idx = table.column_index(name).expect("column exists");
            let mut cells = table.rows()[row].cells().to_vec();
            if let Some(null) = replacement {
                cells[idx] = null;
            }
            out.push_row(table.date(row), cells);
        }
        *table = out;
        replaced.insert(name.clone(), count);
    }
    replaced
}

/// Produce a sanitized copy of `table` plus the report of what was removed
/// or repaired. `calendarDate` is never removable.
pub fn sanitize_table(table: &Table, opts: &SanitizeOptions) -> (Table, SanitizeReport) {
    let keep: BTreeSet<&str> = opts.keep.iter().map(String::as_str).collect();
    let user_drop: BTreeSet<&str> = opts.drop.iter().map(String::as_str).collect();

    let mut rules_applied: Vec<String> = Vec::new();
    let mut to_drop: BTreeSet<String> = BTreeSet::new();

    let mut sensitive_by_name: BTreeSet<String> = BTreeSet::new();
    for col in table.columns() {
        if looks_like_identifier_name(&col.name) {
            sensitive_by_name.insert(col.name.clone());
        }
    }
    if !sensitive_by_name.is_empty() {
        rules_applied.push("drop_sensitive_columns_by_name".into());
        if !opts.allow_identifiers {
            to_drop.extend(sensitive_by_name.iter().cloned());
        }
    }

    let mut guid_like: BTreeSet<String> = BTreeSet::new();
    if !opts.allow_identifiers {
        for col in table.columns() {
            if looks_like_guid_column(table, &col.name, 200) {
                guid_like.insert(col.name.clone());
            }
        }
        if !guid_like.is_empty() {
            rules_applied.push("drop_guid_like_value_columns".into());
            to_drop.extend(guid_like.iter().cloned());
        }
    }

    let meta: Vec<String> = table
        .columns()
        .iter()
        .map(|c| c.name.clone())
        .filter(|n| n == "version" || n == "source")
        .collect();
    if !meta.is_empty() {
        rules_applied.push("drop_redundant_metadata_columns".into());
        to_drop.extend(meta);
    }

    let dup_dates: Vec<String> = table
        .columns()
        .iter()
        .map(|c| c.name.clone())
        .filter(|n| is_calendar_duplicate(n))
        .collect();
    if !dup_dates.is_empty() {
        rules_applied.push("drop_nested_calendarDate_duplicates".into());
        to_drop.extend(dup_dates);
    }

    if !keep.is_empty() {
        rules_applied.push("apply_keep_exceptions".into());
        // Keep never rescues identifier-like or GUID-like columns.
        to_drop.retain(|c| {
            !keep.contains(c.as_str())
                || sensitive_by_name.contains(c)
                || (!opts.allow_identifiers && guid_like.contains(c))
        });
    }

    if !user_drop.is_empty() {
        rules_applied.push("apply_explicit_drop_list".into());
        to_drop.extend(user_drop.iter().map(|s| s.to_string()));
    }
    to_drop.remove(DATE_COLUMN);

    let kept: Vec<&str> = table
        .columns()
        .iter()
        .map(|c| c.name.as_str())
        .filter(|n| !to_drop.contains(*n))
        .collect();
    let mut sanitized = table.project(&kept);

    let replaced = repair_stress_levels(&mut sanitized);
    if !replaced.is_empty() {
        rules_applied.push("normalize_stress_levels_out_of_range_to_null".into());
    }

    let dropped: Vec<String> = to_drop
        .into_iter()
        .filter(|c| table.has_column(c))
        .collect();
    tracing::info!(
        dropped = dropped.len(),
        kept = sanitized.columns().len() + 1,
        "sanitized table"
    );

    let report = SanitizeReport {
        dropped_columns: dropped,
        kept_columns: sanitized.column_names(),
        rules_applied,
        value_replacements: if replaced.is_empty() {
            None
        } else {
            Some(ValueReplacements {
                rule: "stress_levels_must_be_in_0_100".into(),
                replaced_to_null_by_column: replaced,
            })
        },
    };
    (sanitized, report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::{Column, ColumnType};
    use chrono::NaiveDate;

    fn make_table(columns: &[(&str, ColumnType)], rows: Vec<Vec<Cell>>) -> Table {
        let mut t = Table::new(
            columns
                .iter()
                .map(|(n, ty)| Column::new(*n, *ty))
                .collect(),
        );
        for (i, cells) in rows.into_iter().enumerate() {
            t.push_row(
                NaiveDate::from_ymd_opt(2025, 1, 1 + i as u32).unwrap(),
                cells,
            );
        }
        t
    }

    #[test]
    fn identifiers_and_metadata_are_dropped() {
        let table = make_table(
            &[
                ("totalSteps", ColumnType::Int),
                ("uuid", ColumnType::Str),
                ("userProfilePK", ColumnType::Any),
                ("version", ColumnType::Any),
                ("source", ColumnType::Any),
                ("someGuidLike", ColumnType::Str),
            ],
            vec![vec![
                Cell::Int(900),
                Cell::Str("abc".into()),
                Cell::Int(42),
                Cell::Int(1),
                Cell::Str("app".into()),
                Cell::Str("0123456789abcdef0123456789abcdef".into()),
            ]],
        );
        let (out, report) = sanitize_table(&table, &SanitizeOptions::default());
        assert_eq!(out.column_names(), vec!["calendarDate", "totalSteps"]);
        assert_eq!(report.dropped_columns.len(), 5);
        assert!(report.dropped_columns.contains(&"someGuidLike".to_string()));
        assert!(
            report
                .rules_applied
                .contains(&"drop_guid_like_value_columns".to_string())
        );
    }

    #[test]
    fn keep_cannot_rescue_identifiers_but_rescues_metadata() {
        let table = make_table(
            &[("uuid", ColumnType::Str), ("source", ColumnType::Any)],
            vec![vec![Cell::Str("x".into()), Cell::Str("app".into())]],
        );
        let opts = SanitizeOptions {
            keep: vec!["uuid".into(), "source".into()],
            ..Default::default()
        };
        let (out, _) = sanitize_table(&table, &opts);
        assert!(!out.has_column("uuid"));
        assert!(out.has_column("source"));
    }

    #[test]
    fn explicit_drop_cannot_remove_calendar_date() {
        let table = make_table(
            &[("totalSteps", ColumnType::Int)],
            vec![vec![Cell::Int(1)]],
        );
        let opts = SanitizeOptions {
            drop: vec![DATE_COLUMN.into(), "totalSteps".into()],
            ..Default::default()
        };
        let (out, _) = sanitize_table(&table, &opts);
        assert_eq!(out.column_names(), vec!["calendarDate"]);
    }

    #[test]
    fn nested_calendar_date_duplicates_are_dropped() {
        let table = make_table(
            &[
                ("sleep_calendarDate", ColumnType::Any),
                ("sleep_calendarDateStr", ColumnType::Any),
            ],
            vec![vec![Cell::Str("2025-01-01".into()), Cell::Str("2025-01-01".into())]],
        );
        let (out, report) = sanitize_table(&table, &SanitizeOptions::default());
        assert_eq!(out.column_names(), vec!["calendarDate"]);
        assert!(
            report
                .rules_applied
                .contains(&"drop_nested_calendarDate_duplicates".to_string())
        );
    }

    #[test]
    fn stress_sentinels_become_null_and_are_counted() {
        let table = make_table(
            &[("avgSleepStress", ColumnType::Int)],
            vec![
                vec![Cell::Int(-2)],
                vec![Cell::Int(18)],
                vec![Cell::Int(42)],
                vec![Cell::Int(101)],
            ],
        );
        let (out, report) = sanitize_table(&table, &SanitizeOptions::default());
        assert_eq!(out.cell(0, "avgSleepStress"), Some(&Cell::Null));
        assert_eq!(out.cell(1, "avgSleepStress"), Some(&Cell::Int(18)));
        assert_eq!(out.cell(3, "avgSleepStress"), Some(&Cell::Null));
        let replacements = report.value_replacements.unwrap();
        assert_eq!(
            replacements.replaced_to_null_by_column.get("avgSleepStress"),
            Some(&2)
        );
    }

    #[test]
    fn namespaced_stress_level_columns_are_repaired() {
        let table = make_table(
            &[("allDayStress_ASLEEP_averageStressLevel", ColumnType::Int)],
            vec![vec![Cell::Int(-2)], vec![Cell::Int(30)]],
        );
        let (out, _) = sanitize_table(&table, &SanitizeOptions::default());
        assert_eq!(
            out.cell(0, "allDayStress_ASLEEP_averageStressLevel"),
            Some(&Cell::Null)
        );
        assert_eq!(
            out.cell(1, "allDayStress_ASLEEP_averageStressLevel"),
            Some(&Cell::Int(30))
        );
    }

    #[test]
    fn small_guid_samples_require_every_value_to_match() {
        let table = make_table(
            &[("maybeGuid", ColumnType::Str)],
            vec![
                vec![Cell::Str("0123456789abcdef0123456789abcdef".into())],
                vec![Cell::Str("plain text".into())],
            ],
        );
        let (out, _) = sanitize_table(&table, &SanitizeOptions::default());
        assert!(out.has_column("maybeGuid"));
    }

    #[test]
    fn allow_identifiers_retains_sensitive_columns() {
        let table = make_table(
            &[("uuid", ColumnType::Str)],
            vec![vec![Cell::Str("x".into())]],
        );
        let opts = SanitizeOptions {
            allow_identifiers: true,
            ..Default::default()
        };
        let (out, report) = sanitize_table(&table, &opts);
        assert!(out.has_column("uuid"));
        // The rule still fires for reporting purposes.
        assert!(
            report
                .rules_applied
                .contains(&"drop_sensitive_columns_by_name".to_string())
        );
    }
}
