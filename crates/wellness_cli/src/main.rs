//! `wellness` — ingestion and reporting CLI for wellness-tracker exports.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::{Value, json};

use wellness_core::normalize::{daily, sleep};
use wellness_core::{
    QualityConfig, SanitizeOptions, Table, apply_quality_labels, artifact_first, merge_daily,
    sanitize_table, sparsest_first,
};

mod paths;
mod reports;
mod store;

use reports::data_dictionary::{build_data_dictionary, write_dictionary_reports};
use reports::quality::{build_quality_summary, write_quality_outputs};

#[derive(Parser, Debug)]
#[command(name = "wellness")]
#[command(about = "Ingest wellness-tracker exports into day-keyed tables and reports")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List export files and write an inventory CSV
    Discover {
        /// Root of the unpacked export (default: data/raw/DI_CONNECT)
        #[arg(long, env = paths::EXPORT_DIR_ENV)]
        export_dir: Option<PathBuf>,
    },
    /// Parse UDSFile_*.json into the daily-summary table
    IngestDaily {
        /// Root of the unpacked export (default: data/raw/DI_CONNECT)
        #[arg(long, env = paths::EXPORT_DIR_ENV)]
        export_dir: Option<PathBuf>,
    },
    /// Parse *_sleepData.json into the sleep table
    IngestSleep {
        /// Root of the unpacked export (default: data/raw/DI_CONNECT)
        #[arg(long, env = paths::EXPORT_DIR_ENV)]
        export_dir: Option<PathBuf>,
    },
    /// Left-join the daily-summary and sleep tables on calendarDate
    BuildDaily,
    /// Strip identifier-like columns and repair sentinel values
    Sanitize {
        /// Primary input table (default: data/processed/daily.json)
        #[arg(long)]
        input: Option<PathBuf>,
        /// Primary output table (default: data/processed/daily_sanitized.json)
        #[arg(long)]
        output: Option<PathBuf>,
        /// Aggregated report path (default: data/processed/sanitize_report.json)
        #[arg(long)]
        report: Option<PathBuf>,
        /// Overwrite the input tables instead of writing *_sanitized copies
        #[arg(long)]
        inplace: bool,
        /// Keep identifier-like columns (not recommended)
        #[arg(long)]
        allow_identifiers: bool,
        /// Column names to rescue from metadata/duplicate-date dropping
        #[arg(long)]
        keep: Vec<String>,
        /// Column names to drop unconditionally
        #[arg(long)]
        drop: Vec<String>,
    },
    /// Generate the data-dictionary CSV and Markdown reports
    DataDictionary {
        /// Input table (default: daily_sanitized.json, fallback: daily.json)
        #[arg(long)]
        input: Option<PathBuf>,
        /// Output directory (default: reports)
        #[arg(long)]
        out_dir: Option<PathBuf>,
        /// Max distinct example values per column
        #[arg(long, default_value_t = 5)]
        max_sample_values: usize,
    },
    /// Compute day-quality labels and export quality reports
    Quality {
        /// Input table (default: daily_sanitized.json, fallback: daily.json)
        #[arg(long)]
        input: Option<PathBuf>,
        /// Output directory for reports (default: reports)
        #[arg(long)]
        out_dir: Option<PathBuf>,
        /// Labeled table output (default: data/processed/daily_quality.json)
        #[arg(long)]
        output_table: Option<PathBuf>,
        /// Skip writing the labeled table
        #[arg(long)]
        no_table: bool,
        #[arg(long, default_value_t = 50)]
        steps_min: i64,
        #[arg(long, default_value_t = 6.0)]
        stress_any_hours: f64,
        #[arg(long, default_value_t = 20.0)]
        stress_full_hours: f64,
        #[arg(long, default_value_t = 4)]
        strict_min_score: i64,
        #[arg(long, default_value_t = 3)]
        loose_min_score: i64,
        #[arg(long, default_value_t = 50)]
        top_n: usize,
    },
}

fn init_tracing() {
    let log_env = std::env::var("WELLNESS_LOG")
        .or_else(|_| std::env::var("RUST_LOG"))
        .unwrap_or_else(|_| "info".to_string());
    let env_filter = tracing_subscriber::EnvFilter::try_new(&log_env)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .compact()
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_target(false)
        .with_env_filter(env_filter)
        .init();
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    match cli.command {
        Command::Discover { export_dir } => discover(resolve_export_dir(export_dir)),
        Command::IngestDaily { export_dir } => ingest_daily(resolve_export_dir(export_dir)),
        Command::IngestSleep { export_dir } => ingest_sleep(resolve_export_dir(export_dir)),
        Command::BuildDaily => build_daily(),
        Command::Sanitize {
            input,
            output,
            report,
            inplace,
            allow_identifiers,
            keep,
            drop,
        } => sanitize(input, output, report, inplace, allow_identifiers, keep, drop),
        Command::DataDictionary {
            input,
            out_dir,
            max_sample_values,
        } => data_dictionary(input, out_dir, max_sample_values),
        Command::Quality {
            input,
            out_dir,
            output_table,
            no_table,
            steps_min,
            stress_any_hours,
            stress_full_hours,
            strict_min_score,
            loose_min_score,
            top_n,
        } => quality(
            input,
            out_dir,
            output_table,
            no_table,
            QualityConfig {
                steps_min,
                stress_any_min_seconds: (stress_any_hours * 3600.0) as i64,
                stress_full_min_seconds: (stress_full_hours * 3600.0) as i64,
                strict_min_score,
                loose_min_score,
                top_n,
            },
        ),
    }
}

fn resolve_export_dir(flag: Option<PathBuf>) -> PathBuf {
    flag.unwrap_or_else(paths::export_dir)
}

fn discover(export_dir: PathBuf) -> Result<()> {
    let daily_files = paths::list_daily_files(&export_dir)?;
    let sleep_files = paths::list_sleep_files(&export_dir)?;

    tracing::info!("export dir: {}", export_dir.display());
    tracing::info!("found daily files: {}", daily_files.len());
    tracing::info!("found sleep files: {}", sleep_files.len());

    let mut csv = String::from("type,path,size_bytes,modified_utc\n");
    for (kind, files) in [("daily", &daily_files), ("sleep", &sleep_files)] {
        for path in files {
            let meta = std::fs::metadata(path)
                .with_context(|| format!("stat {}", path.display()))?;
            let modified: chrono::DateTime<chrono::Utc> = meta.modified()?.into();
            csv.push_str(&format!(
                "{kind},{},{},{}\n",
                reports::csv_field(&path.display().to_string()),
                meta.len(),
                modified.to_rfc3339(),
            ));
        }
    }

    let inventory = paths::interim_dir().join("inventory.csv");
    if let Some(parent) = inventory.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&inventory, csv)?;
    tracing::info!("wrote inventory: {}", inventory.display());
    Ok(())
}

fn read_payloads(files: &[PathBuf]) -> Result<Vec<Value>> {
    files.iter().map(|p| store::read_payload(p)).collect()
}

fn ingest_daily(export_dir: PathBuf) -> Result<()> {
    let files = paths::list_daily_files(&export_dir)?;
    anyhow::ensure!(!files.is_empty(), "no daily export files found");
    let table = daily::build_table(&read_payloads(&files)?);
    let output = paths::processed_dir().join("daily_uds.json");
    store::save_table(&output, &table)?;
    tracing::info!("wrote {} rows to {}", table.len(), output.display());
    Ok(())
}

fn ingest_sleep(export_dir: PathBuf) -> Result<()> {
    let files = paths::list_sleep_files(&export_dir)?;
    anyhow::ensure!(!files.is_empty(), "no sleep export files found");
    let table = sleep::build_table(&read_payloads(&files)?);
    let output = paths::processed_dir().join("sleep.json");
    store::save_table(&output, &table)?;
    tracing::info!("wrote {} rows to {}", table.len(), output.display());
    Ok(())
}

fn build_daily() -> Result<()> {
    let processed = paths::processed_dir();
    let daily_table = store::load_table(&processed.join("daily_uds.json"))?;
    let sleep_table = store::load_table(&processed.join("sleep.json"))?;

    let merged = merge_daily(&daily_table, &sleep_table)?;
    let output = processed.join("daily.json");
    store::save_table(&output, &merged)?;
    tracing::info!("wrote {} rows to {}", merged.len(), output.display());
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn sanitize(
    input: Option<PathBuf>,
    output: Option<PathBuf>,
    report: Option<PathBuf>,
    inplace: bool,
    allow_identifiers: bool,
    keep: Vec<String>,
    drop: Vec<String>,
) -> Result<()> {
    let processed = paths::processed_dir();
    let primary_in = input.unwrap_or_else(|| processed.join("daily.json"));
    anyhow::ensure!(primary_in.exists(), "missing input: {}", primary_in.display());
    let primary_out = if inplace {
        primary_in.clone()
    } else {
        output.unwrap_or_else(|| processed.join("daily_sanitized.json"))
    };
    let report_path = report.unwrap_or_else(|| processed.join("sanitize_report.json"));

    let opts = SanitizeOptions {
        keep,
        drop,
        allow_identifiers,
    };

    // The per-domain tables are sanitized alongside the merged one when
    // present, so no processed artifact keeps identifiers.
    let mut candidates: Vec<(&str, PathBuf, PathBuf)> = vec![("daily", primary_in.clone(), primary_out)];
    for (label, name, sanitized) in [
        ("daily_uds", "daily_uds.json", "daily_uds_sanitized.json"),
        ("sleep", "sleep.json", "sleep_sanitized.json"),
    ] {
        let in_path = processed.join(name);
        if in_path.exists() && in_path != primary_in {
            let out_path = if inplace {
                in_path.clone()
            } else {
                processed.join(sanitized)
            };
            candidates.push((label, in_path, out_path));
        }
    }

    let mut files = serde_json::Map::new();
    for (label, in_path, out_path) in candidates {
        let table = store::load_table(&in_path)?;
        let before_cols = table.columns().len() + 1;
        let (clean, file_report) = sanitize_table(&table, &opts);
        let after_cols = clean.columns().len() + 1;
        store::save_table(&out_path, &clean)?;
        tracing::info!(
            "sanitized {label}: {} rows, {before_cols} -> {after_cols} cols (dropped {})",
            table.len(),
            before_cols - after_cols
        );
        files.insert(
            label.to_string(),
            json!({
                "input": in_path.display().to_string(),
                "output": out_path.display().to_string(),
                "rows": table.len(),
                "cols_before": before_cols,
                "cols_after": after_cols,
                "report": file_report,
            }),
        );
    }

    if let Some(parent) = report_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let aggregated = json!({ "files": files });
    std::fs::write(&report_path, serde_json::to_vec_pretty(&aggregated)?)?;
    tracing::info!("wrote report: {}", report_path.display());
    Ok(())
}

/// Default input resolution shared by the reporting commands: prefer the
/// sanitized merged table, fall back to the unsanitized one.
fn resolve_report_input(input: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(path) = input {
        anyhow::ensure!(path.exists(), "missing input: {}", path.display());
        return Ok(path);
    }
    let processed = paths::processed_dir();
    let sanitized = processed.join("daily_sanitized.json");
    if sanitized.exists() {
        return Ok(sanitized);
    }
    let fallback = processed.join("daily.json");
    anyhow::ensure!(fallback.exists(), "missing input: {}", fallback.display());
    Ok(fallback)
}

fn data_dictionary(
    input: Option<PathBuf>,
    out_dir: Option<PathBuf>,
    max_sample_values: usize,
) -> Result<()> {
    let input_path = resolve_report_input(input)?;
    let out_dir = out_dir.unwrap_or_else(paths::reports_dir);

    let table = store::load_table(&input_path)?;
    log_timestamp_coverage("input", &table);

    let entries = build_data_dictionary(&table, max_sample_values);
    let (csv_path, md_path) = write_dictionary_reports(&entries, &table, &out_dir)?;
    tracing::info!("wrote {}", csv_path.display());
    tracing::info!("wrote {}", md_path.display());
    Ok(())
}

fn log_timestamp_coverage(label: &str, table: &Table) {
    for column in ["sleepStartTimestampGMT", "sleepEndTimestampGMT"] {
        if table.has_column(column) {
            let non_null = (0..table.len())
                .filter(|&r| table.cell(r, column).is_some_and(|c| !c.is_null()))
                .count();
            tracing::info!("{label} {column} non-null: {non_null}");
        }
    }
}

fn quality(
    input: Option<PathBuf>,
    out_dir: Option<PathBuf>,
    output_table: Option<PathBuf>,
    no_table: bool,
    config: QualityConfig,
) -> Result<()> {
    let input_path = resolve_report_input(input)?;
    let out_dir = out_dir.unwrap_or_else(paths::reports_dir);

    let table = store::load_table(&input_path)?;
    let labeled = apply_quality_labels(&table, &config);
    let sparse = sparsest_first(&labeled, config.top_n);
    let artifacts = artifact_first(&labeled, config.top_n);
    let summary = build_quality_summary(&labeled, &input_path, &config);

    let (summary_path, sparsest_path, artifacts_path) =
        write_quality_outputs(&out_dir, &summary, &sparse, &artifacts)?;

    if !no_table {
        let table_path = output_table
            .unwrap_or_else(|| paths::processed_dir().join("daily_quality.json"));
        store::save_table(&table_path, &labeled)?;
        tracing::info!("wrote labeled table: {}", table_path.display());
    }

    log_label_distribution(&labeled, "day_quality_label_strict", "strict");
    log_label_distribution(&labeled, "day_quality_label_loose", "loose");
    tracing::info!("input: {}", input_path.display());
    tracing::info!("total days: {}", labeled.len());
    tracing::info!("suspicious days exported: {}", sparse.len());
    tracing::info!("wrote {}", summary_path.display());
    tracing::info!("wrote {}", sparsest_path.display());
    tracing::info!("wrote {}", artifacts_path.display());
    Ok(())
}

fn log_label_distribution(table: &Table, column: &str, kind: &str) {
    let total = table.len().max(1);
    let pct = |label: &str| {
        let count = (0..table.len())
            .filter(|&r| {
                table
                    .cell(r, column)
                    .and_then(|c| c.as_str())
                    .is_some_and(|s| s == label)
            })
            .count();
        count as f64 / total as f64 * 100.0
    };
    tracing::info!(
        "{kind} labels: good={:.2}% partial={:.2}% bad={:.2}%",
        pct("good"),
        pct("partial"),
        pct("bad")
    );
}
