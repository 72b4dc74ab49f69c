//! Integration tests for the `custody` binary.

use assert_cmd::Command;
use predicates::prelude::*;
use std::path::PathBuf;

fn cli() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_custody"));
    cmd.env_remove("CUSTODY_HORIZON_WEEKS")
        .env_remove("CUSTODY_OCCURRENCE_LIMIT")
        .env_remove("CUSTODY_WEEK_START")
        .env_remove("RUST_LOG");
    cmd
}

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn stdout_json(cmd: &mut Command) -> serde_json::Value {
    let output = cmd.output().unwrap();
    assert!(output.status.success(), "command failed: {output:?}");
    serde_json::from_slice(&output.stdout).unwrap()
}

// ── import ──────────────────────────────────────────────────────────────────

#[test]
fn test_import_keeps_custody_events() {
    let report = stdout_json(
        cli()
            .arg("import")
            .arg(fixture("shared.ics"))
            .args(["--child", "maya"]),
    );

    // One pickup plus three expanded overnights; the grocery run is dropped.
    assert_eq!(report["events"], 4);
    assert_eq!(report["skipped"], 0);
    let visits = report["visits"].as_array().unwrap();
    assert_eq!(visits.len(), 4);
    assert_eq!(visits[0]["type"], "school_transport_only");
    assert_eq!(visits[0]["notes"], "Custody pickup");
    assert_eq!(visits[0]["startTime"], "2025-03-10T09:00:00");
    assert!(visits[1..].iter().all(|v| v["type"] == "overnight"));
    assert!(visits
        .iter()
        .all(|v| v["childId"] == "maya" && v["source"] == "imported_from_calendar"));
}

#[test]
fn test_import_skips_existing_visits() {
    let report = stdout_json(
        cli()
            .arg("import")
            .arg(fixture("shared.ics"))
            .args(["--child", "maya", "--existing"])
            .arg(fixture("existing_visits.json")),
    );
    assert_eq!(report["skipped"], 1);
    assert_eq!(report["visits"].as_array().unwrap().len(), 3);
}

#[test]
fn test_import_config_limits_occurrences() {
    let report = stdout_json(
        cli()
            .arg("--config")
            .arg(fixture("config.json"))
            .arg("import")
            .arg(fixture("shared.ics"))
            .args(["--child", "maya"]),
    );
    assert_eq!(report["events"], 3);
}

#[test]
fn test_import_env_overrides_limit() {
    let report = stdout_json(
        cli()
            .env("CUSTODY_OCCURRENCE_LIMIT", "1")
            .arg("import")
            .arg(fixture("shared.ics"))
            .args(["--child", "maya"]),
    );
    assert_eq!(report["events"], 2);
}

#[test]
fn test_import_missing_file_fails() {
    cli()
        .arg("import")
        .arg(fixture("nope.ics"))
        .args(["--child", "maya"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read calendar"));
}

#[test]
fn test_import_requires_child() {
    cli()
        .arg("import")
        .arg(fixture("shared.ics"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("--child"));
}

// ── export ──────────────────────────────────────────────────────────────────

#[test]
fn test_export_schedule() {
    cli()
        .arg("export")
        .arg(fixture("schedule.json"))
        .assert()
        .success()
        .stdout(predicate::str::starts_with("BEGIN:VCALENDAR\r\n"))
        .stdout(predicate::str::contains(
            "UID:6f1c1c1e-6a4b-4f0e-9a59-2d2f3e1b8c11@custody-engine\r\n",
        ))
        .stdout(predicate::str::contains("DTSTART:20250110T170000\r\n"))
        .stdout(predicate::str::contains(
            "RRULE:FREQ=WEEKLY;INTERVAL=2;BYDAY=FR,SA;UNTIL=20250630T235959\r\n",
        ))
        .stdout(predicate::str::contains("SUMMARY:Alternating weekends\r\n"));
}

#[test]
fn test_export_accepts_draft() {
    cli()
        .arg("export")
        .arg(fixture("draft.json"))
        .assert()
        .success()
        .stdout(predicate::str::contains("DTSTART:20250108T173000\r\n"))
        .stdout(predicate::str::contains("RRULE:FREQ=WEEKLY;BYDAY=WE\r\n"));
}

// ── expand ──────────────────────────────────────────────────────────────────

#[test]
fn test_expand_default_horizon() {
    let visits = stdout_json(
        cli()
            .arg("expand")
            .arg(fixture("schedule.json"))
            .args(["--today", "2025-01-01"]),
    );
    let visits = visits.as_array().unwrap();
    // Fri/Sat of weeks 0 and 2, for two children.
    assert_eq!(visits.len(), 8);
    assert_eq!(visits[0]["childId"], "maya");
    assert_eq!(visits[1]["childId"], "leo");
    assert_eq!(visits[0]["startTime"], "2025-01-10T17:00:00");
    assert_eq!(visits[0]["endTime"], "2025-01-10T20:30:00");
    assert_eq!(visits[0]["source"], "generated_from_schedule");
    assert_eq!(visits[7]["startTime"], "2025-01-25T17:00:00");
}

#[test]
fn test_expand_weeks_flag() {
    let visits = stdout_json(
        cli()
            .arg("expand")
            .arg(fixture("schedule.json"))
            .args(["--weeks", "2", "--today", "2025-01-01"]),
    );
    assert_eq!(visits.as_array().unwrap().len(), 4);
}

#[test]
fn test_expand_config_horizon() {
    let visits = stdout_json(
        cli()
            .arg("--config")
            .arg(fixture("config.json"))
            .arg("expand")
            .arg(fixture("schedule.json"))
            .args(["--today", "2025-01-01"]),
    );
    assert_eq!(visits.as_array().unwrap().len(), 16);
}

#[test]
fn test_expand_rejects_bad_date() {
    cli()
        .arg("expand")
        .arg(fixture("schedule.json"))
        .args(["--today", "01/01/2025"])
        .assert()
        .failure();
}

#[test]
fn test_expand_is_quiet_by_default() {
    cli()
        .arg("expand")
        .arg(fixture("schedule.json"))
        .args(["--today", "2025-01-01"])
        .assert()
        .success()
        .stderr(predicate::str::is_empty());
}

#[test]
fn test_rust_log_enables_debug_events() {
    cli()
        .env("RUST_LOG", "debug")
        .arg("expand")
        .arg(fixture("schedule.json"))
        .args(["--today", "2025-01-01"])
        .assert()
        .success()
        .stderr(predicate::str::contains("generated visits from schedule"));
}

// ── validate / describe ─────────────────────────────────────────────────────

#[test]
fn test_validate_valid_draft() {
    cli()
        .arg("validate")
        .arg(fixture("draft.json"))
        .assert()
        .success()
        .stdout("valid\n");
}

#[test]
fn test_validate_lists_every_problem() {
    cli()
        .arg("validate")
        .arg(fixture("invalid_draft.json"))
        .assert()
        .code(1)
        .stdout(predicate::str::contains("Schedule name is required"))
        .stdout(predicate::str::contains("day of the week"))
        .stdout(predicate::str::contains("End time must be after start time"))
        .stdout(predicate::str::contains("End date cannot be before start date"));
}

#[test]
fn test_describe_schedule() {
    cli()
        .arg("describe")
        .arg(fixture("schedule.json"))
        .assert()
        .success()
        .stdout("Biweekly on Fri, Sat, 5:00 PM - 8:30 PM until Jun 30, 2025\n");
}

#[test]
fn test_bad_config_fails() {
    cli()
        .env("CUSTODY_WEEK_START", "friday")
        .arg("describe")
        .arg(fixture("schedule.json"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Configuration error"));
}
