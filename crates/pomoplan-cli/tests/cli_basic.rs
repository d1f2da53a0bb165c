//! Basic CLI E2E tests.
//!
//! Tests invoke the built binary against a throwaway data directory and verify
//! outputs.

use std::path::Path;
use std::process::Command;

use serde_json::Value;
use tempfile::TempDir;

/// Run a CLI command and return (exit code, stdout, stderr).
fn run_cli(data_dir: &Path, args: &[&str]) -> (i32, String, String) {
    let output = Command::new(env!("CARGO_BIN_EXE_pomoplan"))
        .args(args)
        .env("POMOPLAN_DATA_DIR", data_dir)
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to execute CLI command");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let code = output.status.code().unwrap_or(-1);

    (code, stdout, stderr)
}

fn run_json(data_dir: &Path, args: &[&str]) -> Value {
    let (code, stdout, stderr) = run_cli(data_dir, args);
    assert_eq!(code, 0, "{args:?} failed: {stderr}");
    serde_json::from_str(&stdout).expect("stdout is JSON")
}

fn add_task(data_dir: &Path, args: &[&str]) -> String {
    let mut full = vec!["task", "add"];
    full.extend_from_slice(args);
    full.push("--json");
    let task = run_json(data_dir, &full);
    task["id"].as_str().expect("task id").to_string()
}

#[test]
fn test_task_add_and_list() {
    let dir = TempDir::new().unwrap();
    let id = add_task(dir.path(), &["Write report", "--priority", "ui", "--units", "3"]);

    let tasks = run_json(dir.path(), &["task", "list", "--json"]);
    let tasks = tasks.as_array().unwrap();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0]["id"], id.as_str());
    assert_eq!(tasks[0]["priority"], "urgent_important");
    assert_eq!(tasks[0]["total_work_units"], 3);

    let (code, stdout, _) = run_cli(dir.path(), &["task", "list"]);
    assert_eq!(code, 0);
    assert!(stdout.contains("Write report"));
}

#[test]
fn test_task_update_and_delete() {
    let dir = TempDir::new().unwrap();
    let id = add_task(dir.path(), &["Draft"]);

    let updated = run_json(dir.path(), &["task", "update", &id, "--units", "4", "--title", "Final"]);
    assert_eq!(updated["title"], "Final");
    assert_eq!(updated["total_work_units"], 4);

    let (code, stdout, _) = run_cli(dir.path(), &["task", "delete", &id]);
    assert_eq!(code, 0);
    assert!(stdout.contains("Task deleted"));

    let tasks = run_json(dir.path(), &["task", "list", "--json", "--all"]);
    assert!(tasks.as_array().unwrap().is_empty());
}

#[test]
fn test_plan_places_units_with_breaks() {
    let dir = TempDir::new().unwrap();
    add_task(dir.path(), &["Focus", "--units", "2"]);

    let plan = run_json(
        dir.path(),
        &["plan", "--from", "2026-03-02", "--json", "--at", "2026-03-02T08:00"],
    );
    let slots = plan["placed_slots"].as_array().unwrap();
    let kinds: Vec<&str> = slots.iter().map(|s| s["kind"].as_str().unwrap()).collect();
    assert_eq!(kinds, vec!["work", "short_break", "work"]);
    assert_eq!(slots[0]["start_minute"], 540);
    assert!(plan["unscheduled"].as_array().unwrap().is_empty());

    // Planning again finds nothing left to place.
    let again = run_json(
        dir.path(),
        &["plan", "--from", "2026-03-02", "--json", "--at", "2026-03-02T08:00"],
    );
    assert!(again["placed_slots"].as_array().unwrap().is_empty());

    let day = run_json(dir.path(), &["day", "show", "2026-03-02", "--json"]);
    assert_eq!(day["slots"].as_array().unwrap().len(), 3);
}

#[test]
fn test_lowering_units_trims_the_schedule() {
    let dir = TempDir::new().unwrap();
    let id = add_task(dir.path(), &["Focus", "--units", "3"]);
    run_json(
        dir.path(),
        &["plan", "--from", "2026-03-02", "--json", "--at", "2026-03-02T08:00"],
    );

    let (code, _, stderr) = run_cli(dir.path(), &["task", "update", &id, "--units", "1"]);
    assert_eq!(code, 0, "{stderr}");
    assert!(stderr.contains("Dropped 2 surplus"));

    let day = run_json(dir.path(), &["day", "show", "2026-03-02", "--json"]);
    let slots = day["slots"].as_array().unwrap();
    assert_eq!(slots.len(), 1);
    assert_eq!(slots[0]["kind"], "work");
    assert_eq!(slots[0]["start_minute"], 540);
}

#[test]
fn test_slot_lifecycle_records_progress() {
    let dir = TempDir::new().unwrap();
    let task_id = add_task(dir.path(), &["Focus", "--units", "1"]);
    let plan = run_json(
        dir.path(),
        &["plan", "--from", "2026-03-02", "--json", "--at", "2026-03-02T08:00"],
    );
    let slot_id = plan["placed_slots"][0]["id"].as_str().unwrap().to_string();

    let (code, _, stderr) = run_cli(dir.path(), &["slot", "start", &slot_id, "--at", "2026-03-02T08:30"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("error:"));

    let (code, stdout, _) = run_cli(dir.path(), &["slot", "start", &slot_id, "--at", "2026-03-02T09:00"]);
    assert_eq!(code, 0);
    assert!(stdout.contains("in_progress"));

    let (code, stdout, _) = run_cli(dir.path(), &["slot", "complete", &slot_id, "--at", "2026-03-02T09:25"]);
    assert_eq!(code, 0);
    assert!(stdout.contains("1/1 units done"));

    let task = run_json(dir.path(), &["task", "show", &task_id]);
    assert_eq!(task["completed_work_units"], 1);
}

#[test]
fn test_slot_move_pushes_later_slots() {
    let dir = TempDir::new().unwrap();
    add_task(dir.path(), &["Focus", "--units", "2"]);
    let plan = run_json(
        dir.path(),
        &["plan", "--from", "2026-03-02", "--json", "--at", "2026-03-02T08:00"],
    );
    let first = plan["placed_slots"][0]["id"].as_str().unwrap().to_string();

    let (code, _, stderr) = run_cli(dir.path(), &["slot", "move", &first, "10:00"]);
    assert_eq!(code, 0, "{stderr}");

    let day = run_json(dir.path(), &["day", "show", "2026-03-02", "--json"]);
    let slots = day["slots"].as_array().unwrap();
    let moved = slots.iter().find(|s| s["id"] == first.as_str()).unwrap();
    assert_eq!(moved["start_minute"], 600);

    let (code, _, _) = run_cli(dir.path(), &["slot", "move", &first, "20:00"]);
    assert_eq!(code, 1);
}

#[test]
fn test_config_get_set() {
    let dir = TempDir::new().unwrap();
    let (code, stdout, _) = run_cli(dir.path(), &["config", "get", "working_hours.start"]);
    assert_eq!(code, 0);
    assert_eq!(stdout.trim(), "09:00");

    let (code, _, _) = run_cli(dir.path(), &["config", "set", "scheduler.buffer_minutes", "10"]);
    assert_eq!(code, 0);
    let (_, stdout, _) = run_cli(dir.path(), &["config", "get", "scheduler.buffer_minutes"]);
    assert_eq!(stdout.trim(), "10");

    let (code, _, stderr) = run_cli(dir.path(), &["config", "set", "scheduler.session_duration_minutes", "0"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("error:"));
}

#[test]
fn test_unknown_task_exits_with_error() {
    let dir = TempDir::new().unwrap();
    let (code, _, stderr) = run_cli(dir.path(), &["task", "show", "missing"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("task not found"));
}

#[test]
fn test_completions_generate() {
    let dir = TempDir::new().unwrap();
    let (code, stdout, _) = run_cli(dir.path(), &["completions", "bash"]);
    assert_eq!(code, 0);
    assert!(stdout.contains("pomoplan"));
}
