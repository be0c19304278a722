//! Quality summary Markdown and suspicious-day CSV outputs.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use wellness_core::quality::QUALITY_FLAGS;
use wellness_core::{QualityConfig, Table};

use super::{markdown_table, table_to_csv};

fn label_counts(table: &Table, column: &str) -> Vec<(String, usize, f64)> {
    let total = table.len();
    ["good", "partial", "bad"]
        .iter()
        .map(|label| {
            let count = (0..total)
                .filter(|&r| {
                    table
                        .cell(r, column)
                        .and_then(|c| c.as_str())
                        .is_some_and(|s| s == *label)
                })
                .count();
            let pct = if total > 0 {
                count as f64 / total as f64 * 100.0
            } else {
                0.0
            };
            (label.to_string(), count, pct)
        })
        .collect()
}

fn label_rows(counts: &[(String, usize, f64)]) -> Vec<Vec<String>> {
    counts
        .iter()
        .map(|(label, count, pct)| vec![label.clone(), count.to_string(), format!("{pct:.2}")])
        .collect()
}

fn flag_fraction(table: &Table, flag: &str) -> f64 {
    if table.is_empty() {
        return 0.0;
    }
    let trues = (0..table.len())
        .filter(|&r| table.flag(r, flag).unwrap_or(false))
        .count();
    trues as f64 / table.len() as f64
}

fn stress_hours(table: &Table) -> Vec<f64> {
    (0..table.len())
        .filter_map(|r| table.number(r, "stressTotalDurationSeconds"))
        .map(|s| s / 3600.0)
        .collect()
}

fn match_summary(table: &Table, column: &str) -> String {
    if !table.has_column(column) {
        return "column unavailable".to_string();
    }
    let values: Vec<bool> = (0..table.len())
        .filter_map(|r| table.flag(r, column))
        .collect();
    if values.is_empty() {
        return "no comparable rows".to_string();
    }
    let compared = values.len();
    let true_pct = values.iter().filter(|v| **v).count() as f64 / compared as f64 * 100.0;
    format!(
        "true={true_pct:.2}%, false={:.2}%, compared_rows={compared}",
        100.0 - true_pct
    )
}

/// Build the quality summary Markdown document.
pub fn build_quality_summary(table: &Table, input_path: &Path, config: &QualityConfig) -> String {
    let generated = chrono::Utc::now().to_rfc3339();
    let mut lines = vec![
        "# Quality Summary".to_string(),
        String::new(),
        format!("Generated at (UTC): {generated}"),
        format!("Input file: {}", input_path.display()),
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

    lines.extend([
        String::new(),
        "## Strict labels".to_string(),
        String::new(),
        markdown_table(
            &["label", "count", "pct"],
            &label_rows(&label_counts(table, "day_quality_label_strict")),
        ),
        String::new(),
        "## Loose labels".to_string(),
        String::new(),
        markdown_table(
            &["label", "count", "pct"],
            &label_rows(&label_counts(table, "day_quality_label_loose")),
        ),
    ]);

    let coverage_rows: Vec<Vec<String>> = QUALITY_FLAGS
        .iter()
        .filter(|flag| table.has_column(flag))
        .map(|flag| {
            let frac = flag_fraction(table, flag);
            vec![
                flag.to_string(),
                format!("{:.4}", frac),
                format!("{:.2}", frac * 100.0),
            ]
        })
        .collect();
    lines.extend([
        String::new(),
        "## Coverage metrics".to_string(),
        String::new(),
        if coverage_rows.is_empty() {
            "No coverage flags available.".to_string()
        } else {
            markdown_table(&["flag", "fraction_true", "pct_true"], &coverage_rows)
        },
    ]);

    let mut hours = stress_hours(table);
    hours.sort_by(|a, b| a.total_cmp(b));
    let (min_h, med_h, max_h) = if hours.is_empty() {
        ("None".to_string(), "None".to_string(), "None".to_string())
    } else {
        let mid = hours.len() / 2;
        let median = if hours.len() % 2 == 0 {
            (hours[mid - 1] + hours[mid]) / 2.0
        } else {
            hours[mid]
        };
        (
            hours[0].to_string(),
            median.to_string(),
            hours[hours.len() - 1].to_string(),
        )
    };
    let below = |limit: f64| hours.iter().filter(|h| **h < limit).count();
    lines.extend([
        String::new(),
        "## Stress duration summary".to_string(),
        String::new(),
        format!("- min/median/max hours: {min_h}, {med_h}, {max_h}"),
        format!("- days with stressTotalDurationSeconds < 1h: {}", below(1.0)),
        format!("- days with stressTotalDurationSeconds < 6h: {}", below(6.0)),
        format!("- days with stressTotalDurationSeconds < 12h: {}", below(12.0)),
        format!("- days with stressTotalDurationSeconds < 20h: {}", below(20.0)),
        String::new(),
        "## Duplicate sanity checks".to_string(),
        String::new(),
        format!(
            "- stress_duration_matches_allDayStress_TOTAL: {}",
            match_summary(table, "stress_duration_matches_allDayStress_TOTAL")
        ),
        format!(
            "- stress_awake_matches_allDayStress_AWAKE: {}",
            match_summary(table, "stress_awake_matches_allDayStress_AWAKE")
        ),
    ]);

    let corrupted_rows: Vec<usize> = (0..table.len())
        .filter(|&r| table.flag(r, "corrupted_stress_only_day").unwrap_or(false))
        .collect();
    let corrupted_pct = if table.is_empty() {
        0.0
    } else {
        corrupted_rows.len() as f64 / table.len() as f64 * 100.0
    };
    let corrupted_range = match (corrupted_rows.first(), corrupted_rows.last()) {
        (Some(&first), Some(&last)) => format!("{} to {}", table.date(first), table.date(last)),
        _ => "n/a".to_string(),
    };
    lines.extend([
        String::new(),
        "## Corrupted stress-only days".to_string(),
        String::new(),
        format!("- count: {}", corrupted_rows.len()),
        format!("- percent: {corrupted_pct:.2}%"),
        format!("- date range: {corrupted_range}"),
        String::new(),
        "## Notes".to_string(),
        String::new(),
        format!(
            "- Strict validity uses quality_score >= {}.",
            config.strict_min_score
        ),
        format!(
            "- Loose validity uses quality_score >= {}.",
            config.loose_min_score
        ),
        "- Missing sleep often indicates no night coverage for that date.".to_string(),
    ]);

    lines.join("\n") + "\n"
}

/// Write the summary Markdown and the two ranked suspicious-day CSVs.
pub fn write_quality_outputs(
    out_dir: &Path,
    summary: &str,
    sparsest: &Table,
    artifacts: &Table,
) -> Result<(PathBuf, PathBuf, PathBuf)> {
    std::fs::create_dir_all(out_dir).with_context(|| format!("creating {}", out_dir.display()))?;
    let summary_path = out_dir.join("quality_summary.md");
    let sparsest_path = out_dir.join("suspicious_days.csv");
    let artifacts_path = out_dir.join("suspicious_days_artifacts.csv");
    std::fs::write(&summary_path, summary)?;
    std::fs::write(&sparsest_path, table_to_csv(sparsest))?;
    std::fs::write(&artifacts_path, table_to_csv(artifacts))?;
    Ok((summary_path, sparsest_path, artifacts_path))
}
