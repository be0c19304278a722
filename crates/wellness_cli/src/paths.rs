//! Directory layout and export-file discovery.
//!
//! Everything lives under one data directory (`WELLNESS_DATA_DIR`, default
//! `./data`): raw exports in `raw/DI_CONNECT`, intermediate artifacts in
//! `interim/`, pipeline outputs in `processed/`. The export location can be
//! pointed elsewhere with `WELLNESS_EXPORT_DIR`.

use std::path::{Path, PathBuf};

pub const DATA_DIR_ENV: &str = "WELLNESS_DATA_DIR";
pub const EXPORT_DIR_ENV: &str = "WELLNESS_EXPORT_DIR";

pub fn data_dir() -> PathBuf {
    std::env::var_os(DATA_DIR_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("data"))
}

pub fn interim_dir() -> PathBuf {
    data_dir().join("interim")
}

pub fn processed_dir() -> PathBuf {
    data_dir().join("processed")
}

pub fn reports_dir() -> PathBuf {
    PathBuf::from("reports")
}

pub fn export_dir() -> PathBuf {
    std::env::var_os(EXPORT_DIR_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| data_dir().join("raw").join("DI_CONNECT"))
}

fn list_matching(dir: &Path, matches: impl Fn(&str) -> bool) -> std::io::Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(found),
        Err(err) => return Err(err),
    };
    for entry in entries {
        let path = entry?.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if path.is_file() && matches(name) {
            found.push(path);
        }
    }
    found.sort();
    Ok(found)
}

/// `UDSFile_*.json` under the aggregator subdirectory, sorted by name so
/// later export windows supersede earlier ones during assembly.
pub fn list_daily_files(export_dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    list_matching(&export_dir.join("DI-Connect-Aggregator"), |name| {
        name.starts_with("UDSFile_") && name.ends_with(".json")
    })
}

/// `*_sleepData.json` under the wellness subdirectory, sorted by name.
pub fn list_sleep_files(export_dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    list_matching(&export_dir.join("DI-Connect-Wellness"), |name| {
        name.ends_with("_sleepData.json")
    })
}
