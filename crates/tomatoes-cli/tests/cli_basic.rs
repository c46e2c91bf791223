//! Basic CLI E2E tests.
//!
//! Tests run the built binary against a throwaway data directory and verify
//! its outputs.

use std::path::Path;
use std::process::Command;

use tempfile::TempDir;

/// Run a CLI command and return (stdout, stderr, exit code).
fn run_cli(home: &Path, args: &[&str]) -> (String, String, i32) {
    let output = Command::new(env!("CARGO_BIN_EXE_tomatoes"))
        .args(args)
        .env("TOMATOES_HOME", home)
        .env("TOMATOES_LOG", "off")
        .output()
        .expect("Failed to execute CLI command");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let code = output.status.code().unwrap_or(-1);

    (stdout, stderr, code)
}

fn run_ok(home: &Path, args: &[&str]) -> String {
    let (stdout, stderr, code) = run_cli(home, args);
    assert_eq!(code, 0, "{args:?} failed: {stderr}");
    stdout
}

/// Parse one JSON document per output line.
fn json_lines(stdout: &str) -> Vec<serde_json::Value> {
    stdout
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| serde_json::from_str(line).expect("Failed to parse JSON line"))
        .collect()
}

fn has_type(events: &[serde_json::Value], kind: &str) -> bool {
    events.iter().any(|e| e["type"] == kind)
}

fn pending(home: &Path) -> Vec<serde_json::Value> {
    let stdout = run_ok(home, &["background", "pending"]);
    serde_json::from_str(&stdout).expect("Failed to parse pending jobs")
}

#[test]
fn test_settings_defaults() {
    let home = TempDir::new().unwrap();
    let stdout = run_ok(home.path(), &["settings", "show"]);
    let settings: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(settings["total_units"], 12);
    assert_eq!(settings["duration_minutes"], 25);
    assert_eq!(settings["unit_duration_ms"], 1_500_000);
}

#[test]
fn test_settings_set_and_reject() {
    let home = TempDir::new().unwrap();
    run_ok(home.path(), &["settings", "set", "4", "50"]);

    let (_, stderr, code) = run_cli(home.path(), &["settings", "set", "abc", "25"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("Please enter valid numbers"));

    let (_, _, code) = run_cli(home.path(), &["settings", "set", "4", "0"]);
    assert_eq!(code, 1);

    let stdout = run_ok(home.path(), &["settings", "show"]);
    let settings: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(settings["total_units"], 4);
    assert_eq!(settings["duration_minutes"], 50);
}

#[test]
fn test_timer_start_arms_background_job() {
    let home = TempDir::new().unwrap();
    let events = json_lines(&run_ok(home.path(), &["timer", "start"]));
    assert!(has_type(&events, "RolloverApplied"));
    assert!(has_type(&events, "TimerStarted"));

    let jobs = pending(home.path());
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0]["job_id"], "alarm:0");

    let snapshot = json_lines(&run_ok(home.path(), &["timer", "status"]));
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[0]["type"], "StateSnapshot");
    assert_eq!(snapshot[0]["state"], "running");
    assert_eq!(snapshot[0]["background_job_id"], serde_json::Value::Null);

    // Status parked the countdown again on exit.
    assert_eq!(pending(home.path()).len(), 1);
}

#[test]
fn test_timer_finish_with_credit() {
    let home = TempDir::new().unwrap();
    run_ok(home.path(), &["timer", "start"]);

    let events = json_lines(&run_ok(home.path(), &["timer", "finish", "--credit"]));
    assert!(has_type(&events, "TimerCancelled"));
    let credited = events
        .iter()
        .find(|e| e["type"] == "UnitCredited")
        .expect("no UnitCredited event");
    assert_eq!(credited["completed_units"], 1);
    assert!(pending(home.path()).is_empty());

    let progress = json_lines(&run_ok(home.path(), &["progress", "--json"]));
    assert_eq!(progress[0]["completed_units"], 1);
    assert_eq!(progress[0]["state"], "idle");

    let text = run_ok(home.path(), &["progress"]);
    assert!(text.contains("1/12 today"));
    assert!(text.starts_with("● ○"));
}

#[test]
fn test_timer_finish_without_credit() {
    let home = TempDir::new().unwrap();
    run_ok(home.path(), &["timer", "start"]);
    let events = json_lines(&run_ok(home.path(), &["timer", "finish", "--no-credit"]));
    assert!(!has_type(&events, "UnitCredited"));

    let progress = json_lines(&run_ok(home.path(), &["progress", "--json"]));
    assert_eq!(progress[0]["completed_units"], 0);
    assert!(pending(home.path()).is_empty());
}

#[test]
fn test_timer_finish_when_idle() {
    let home = TempDir::new().unwrap();
    let (stdout, stderr, code) = run_cli(home.path(), &["timer", "finish", "--credit"]);
    assert_eq!(code, 0);
    assert!(stderr.contains("no countdown running"));
    assert!(!has_type(&json_lines(&stdout), "UnitCredited"));
}

#[test]
fn test_timer_finish_requires_choice() {
    let home = TempDir::new().unwrap();
    let (_, _, code) = run_cli(home.path(), &["timer", "finish"]);
    assert_ne!(code, 0);
}

#[test]
fn test_work_strategy() {
    let home = TempDir::new().unwrap();
    run_ok(home.path(), &["config", "set", "background.strategy", "work"]);
    assert_eq!(
        run_ok(home.path(), &["config", "get", "background.strategy"]).trim(),
        "work"
    );

    run_ok(home.path(), &["timer", "start"]);
    let jobs = pending(home.path());
    assert_eq!(jobs.len(), 1);
    assert!(jobs[0]["job_id"].as_str().unwrap().starts_with("work:"));
}

#[test]
fn test_config_rejects_bad_values() {
    let home = TempDir::new().unwrap();
    let (stdout, stderr, code) = run_cli(home.path(), &["config", "get", "nope"]);
    assert_eq!(code, 1);
    assert!(stdout.is_empty());
    assert!(stderr.starts_with("error:"));
    assert!(stderr.contains("nope"));

    let (_, stderr, code) = run_cli(
        home.path(),
        &["config", "set", "background.strategy", "cron"],
    );
    assert_eq!(code, 1);
    assert!(stderr.starts_with("error:"));
    assert_eq!(
        run_ok(home.path(), &["config", "get", "background.strategy"]).trim(),
        "alarm"
    );
}

#[test]
fn test_config_set_echoes_stored_value() {
    let home = TempDir::new().unwrap();
    let stdout = run_ok(home.path(), &["config", "set", "display.slots_per_row", "3"]);
    assert_eq!(stdout.trim(), "display.slots_per_row = 3");

    let stdout = run_ok(home.path(), &["config", "set", "notifications.bell", "false"]);
    assert_eq!(stdout.trim(), "notifications.bell = false");
}

#[test]
fn test_config_list_and_reset() {
    let home = TempDir::new().unwrap();
    run_ok(home.path(), &["config", "set", "display.slots_per_row", "3"]);

    let lines = run_ok(home.path(), &["config", "list"]);
    assert!(lines.lines().any(|l| l == "display.slots_per_row = 3"));
    assert!(lines.lines().any(|l| l == "background.strategy = alarm"));

    let list: serde_json::Value =
        serde_json::from_str(&run_ok(home.path(), &["config", "list", "--json"])).unwrap();
    assert_eq!(list["display"]["slots_per_row"], 3);

    let stdout = run_ok(home.path(), &["config", "reset"]);
    assert!(stdout.starts_with("defaults written to"));
    assert_eq!(
        run_ok(home.path(), &["config", "get", "display.slots_per_row"]).trim(),
        "6"
    );
}

#[test]
fn test_config_path_is_inside_home() {
    let home = TempDir::new().unwrap();
    let stdout = run_ok(home.path(), &["config", "path"]);
    let path = Path::new(stdout.trim());
    assert!(path.starts_with(home.path()));
    assert_eq!(path.file_name().unwrap(), "config.toml");
}

#[test]
fn test_run_due_with_nothing_pending() {
    let home = TempDir::new().unwrap();
    let stdout = run_ok(home.path(), &["background", "run-due"]);
    assert!(stdout.trim().is_empty());
}
