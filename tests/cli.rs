use std::path::Path;
use std::process::{Command, Output};

fn devpulse(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_devpulse"))
        .args(args)
        .current_dir(dir)
        .env_remove("RUST_LOG")
        .env_remove("LLM_DRIVER")
        .env("NO_COLOR", "1")
        .output()
        .unwrap()
}

fn stdout(output: &Output) -> String {
    assert!(
        output.status.success(),
        "devpulse failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8(output.stdout.clone()).unwrap()
}

#[test]
fn demo_report_as_json() {
    let dir = tempfile::tempdir().unwrap();
    let out = stdout(&devpulse(
        dir.path(),
        &["report", "--demo", "--no-llm", "--format", "json"],
    ));

    let report: serde_json::Value = serde_json::from_str(&out).unwrap();
    assert_eq!(report["commitCount"], 3);
    assert_eq!(report["authorChurn"]["alice"], 250);
    assert_eq!(report["authorChurn"]["bob"], 350);
    assert_eq!(report["riskFlags"].as_array().unwrap().len(), 1);
    assert_eq!(report["forecast"]["status"], "insufficientData");
    assert_eq!(report["chart"]["mimeType"], "image/svg+xml");
}

#[test]
fn seed_report_writes_chart() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("acme.json"),
        r#"{"github_data": [
            {"author": "carol", "additions": 10, "deletions": 0, "files_changed": 1, "timestamp": "2025-06-02T09:00:00Z"},
            {"author": null, "additions": 20, "deletions": 0, "files_changed": 2, "timestamp": "2025-06-09T09:00:00Z"},
            {"author": "carol", "additions": 30, "deletions": 0, "files_changed": 1, "timestamp": "2025-06-16T09:00:00Z"}
        ]}"#,
    )
    .unwrap();

    let out = stdout(&devpulse(
        dir.path(),
        &["report", "--seed", "acme.json", "--no-llm", "--out-dir", "charts"],
    ));

    assert!(out.contains("local/acme"));
    assert!(out.contains("unknown"));
    assert!(out.contains("Next week churn: 40.00 (Week of 2025-06-23)"));
    let chart = std::fs::read_to_string(dir.path().join("charts/churn_chart.svg")).unwrap();
    assert!(chart.starts_with("<svg"));
}

#[test]
fn missing_seed_file_fails() {
    let dir = tempfile::tempdir().unwrap();
    let output = devpulse(dir.path(), &["report", "--seed", "nope.json", "--no-llm"]);
    assert!(!output.status.success());
}

#[test]
fn seed_with_overflowing_churn_fails_cleanly() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("huge.json"),
        r#"[{"author": "a", "additions": 18446744073709551615, "deletions": 1, "files_changed": 1, "timestamp": "2025-06-30T12:00:00Z"}]"#,
    )
    .unwrap();

    let output = devpulse(dir.path(), &["report", "--seed", "huge.json", "--no-llm"]);
    // an error diagnostic exits with 1, a panic with 101
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn forecast_from_history_file() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("weeks.json"),
        r#"[
            {"period_start": "2024-06-01", "total_churn": 100},
            {"period_start": "2024-06-08", "total_churn": 200},
            {"period_start": "2024-06-15", "total_churn": 300}
        ]"#,
    )
    .unwrap();

    let out = stdout(&devpulse(dir.path(), &["forecast", "--history", "weeks.json"]));
    assert!(out.starts_with("Next week churn: 400.00 (Week of 2024-06-22)"));

    let json = stdout(&devpulse(
        dir.path(),
        &["forecast", "--history", "weeks.json", "--format", "json"],
    ));
    let outcome: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(outcome["status"], "forecast");
    assert_eq!(outcome["forecastChurn"], 400.0);
}

#[test]
fn forecast_with_single_point_reports_insufficient_data() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("weeks.json"),
        r#"[{"period_start": "2024-06-01", "total_churn": 100}]"#,
    )
    .unwrap();

    let out = stdout(&devpulse(dir.path(), &["forecast", "--history", "weeks.json"]));
    assert_eq!(out.trim(), "Not enough data to forecast.");
}

#[test]
fn unordered_history_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("weeks.json"),
        r#"[
            {"period_start": "2024-06-08", "total_churn": 100},
            {"period_start": "2024-06-01", "total_churn": 200}
        ]"#,
    )
    .unwrap();

    let output = devpulse(dir.path(), &["forecast", "--history", "weeks.json"]);
    assert!(!output.status.success());
}

#[test]
fn oversized_synthetic_history_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join(".devpulse.toml"),
        "[forecast]\nhistory = \"synthetic\"\nsynthetic_periods = 1000000000000\n",
    )
    .unwrap();

    let output = devpulse(dir.path(), &["report", "--demo", "--no-llm"]);
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn schedule_interval_must_be_in_range() {
    let dir = tempfile::tempdir().unwrap();
    for minutes in ["0", "18446744073709551615"] {
        let output = devpulse(
            dir.path(),
            &["schedule", "--demo", "--no-llm", "--once", "--interval-minutes", minutes],
        );
        assert_eq!(output.status.code(), Some(1), "interval {minutes}");
    }
}
