//! Runs the `wellness` binary end to end against a synthetic export tree:
//! discover, ingest both domains, merge, sanitize, label.

use std::path::Path;
use std::process::Command;

use serde_json::{Value, json};

fn run(tmp: &Path, args: &[&str]) {
    let output = Command::new(env!("CARGO_BIN_EXE_wellness"))
        .args(args)
        .current_dir(tmp)
        .env("WELLNESS_DATA_DIR", tmp.join("data"))
        .env_remove("WELLNESS_EXPORT_DIR")
        .output()
        .expect("spawn wellness binary");
    assert!(
        output.status.success(),
        "`wellness {}` failed:\n{}",
        args.join(" "),
        String::from_utf8_lossy(&output.stderr)
    );
}

fn write_export(tmp: &Path) {
    let export = tmp.join("data").join("raw").join("DI_CONNECT");
    let aggregator = export.join("DI-Connect-Aggregator");
    let wellness = export.join("DI-Connect-Wellness");
    std::fs::create_dir_all(&aggregator).unwrap();
    std::fs::create_dir_all(&wellness).unwrap();

    let daily = json!({
        "dailySummaries": [
            {
                "calendarDate": "2025-05-01",
                "totalSteps": 9200,
                "restingHeartRate": 47,
                "userProfilePK": 123456,
                "bodyBatteryStatList": [
                    {"bodyBatteryStatType": "ENDOFDAY", "statsValue": 31}
                ],
                "allDayStress": {
                    "aggregatorList": [
                        {"type": "TOTAL", "totalDuration": 79900},
                        {"type": "AWAKE", "totalDuration": 52000}
                    ]
                }
            },
            {
                "calendarDate": "2025-05-02",
                "totalSteps": 30,
                "stressSummary": {"totalStressDuration": 84700}
            }
        ]
    });
    std::fs::write(
        aggregator.join("UDSFile_2025-05-01_2025-06-01.json"),
        serde_json::to_vec(&daily).unwrap(),
    )
    .unwrap();

    let sleep = json!({
        "sleepData": [
            {
                "calendarDate": "2025-05-01",
                "sleepStartTimestampGMT": "2025-04-30T21:40:00.0",
                "sleepEndTimestampGMT": "2025-05-01T05:55:00.0",
                "deepSleepSeconds": 5400,
                "sleepScores": {"overallScore": 81}
            }
        ]
    });
    std::fs::write(
        wellness.join("2025-05-01_2025-06-01_123_sleepData.json"),
        serde_json::to_vec(&sleep).unwrap(),
    )
    .unwrap();
}

fn column_names(doc: &Value) -> Vec<String> {
    doc["columns"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["name"].as_str().unwrap().to_string())
        .collect()
}

#[test]
fn pipeline_produces_sanitized_and_labeled_artifacts() {
    let tmp = tempfile::tempdir().unwrap();
    write_export(tmp.path());

    run(tmp.path(), &["discover"]);
    run(tmp.path(), &["ingest-daily"]);
    run(tmp.path(), &["ingest-sleep"]);
    run(tmp.path(), &["build-daily"]);
    run(tmp.path(), &["sanitize"]);
    run(tmp.path(), &["quality"]);
    run(tmp.path(), &["data-dictionary"]);

    let inventory =
        std::fs::read_to_string(tmp.path().join("data/interim/inventory.csv")).unwrap();
    assert_eq!(inventory.lines().count(), 3, "header plus two export files");

    let processed = tmp.path().join("data/processed");
    let merged: Value =
        serde_json::from_slice(&std::fs::read(processed.join("daily.json")).unwrap()).unwrap();
    assert_eq!(merged["rows"].as_array().unwrap().len(), 2);
    assert!(column_names(&merged).iter().any(|c| c == "userProfilePK"));

    let sanitized: Value =
        serde_json::from_slice(&std::fs::read(processed.join("daily_sanitized.json")).unwrap())
            .unwrap();
    assert!(!column_names(&sanitized).iter().any(|c| c == "userProfilePK"));
    assert!(column_names(&sanitized).iter().any(|c| c == "totalSteps"));

    let report: Value =
        serde_json::from_slice(&std::fs::read(processed.join("sanitize_report.json")).unwrap())
            .unwrap();
    let files = report["files"].as_object().unwrap();
    assert!(files.contains_key("daily"));
    assert!(files.contains_key("daily_uds"));
    assert!(files.contains_key("sleep"));

    let labeled: Value =
        serde_json::from_slice(&std::fs::read(processed.join("daily_quality.json")).unwrap())
            .unwrap();
    let columns = column_names(&labeled);
    assert!(columns.iter().any(|c| c == "quality_score"));
    assert!(columns.iter().any(|c| c == "corrupted_stress_only_day"));

    let reports = tmp.path().join("reports");
    let summary = std::fs::read_to_string(reports.join("quality_summary.md")).unwrap();
    assert!(summary.contains("Strict labels"));
    let suspicious = std::fs::read_to_string(reports.join("suspicious_days.csv")).unwrap();
    // Two days total, the stress-artifact day ranked first.
    assert_eq!(suspicious.lines().count(), 3);
    assert!(suspicious.lines().nth(1).unwrap().starts_with("2025-05-02"));
    assert!(reports.join("suspicious_days_artifacts.csv").exists());
    assert!(reports.join("data_dictionary.csv").exists());
    assert!(reports.join("data_dictionary.md").exists());
}

#[test]
fn explicit_export_dir_flag_overrides_default_layout() {
    let tmp = tempfile::tempdir().unwrap();
    write_export(tmp.path());
    let export = tmp.path().join("data/raw/DI_CONNECT");
    let elsewhere = tmp.path().join("elsewhere");
    std::fs::rename(&export, &elsewhere).unwrap();

    run(
        tmp.path(),
        &["ingest-daily", "--export-dir", elsewhere.to_str().unwrap()],
    );
    assert!(tmp.path().join("data/processed/daily_uds.json").exists());
}
