//! Integration tests for the spotter binary.
//!
//! Only offline paths are exercised: seeded fresh caches, missing
//! credentials, corrupt cache files and settings round-trips. Anything that
//! would reach the network is pointed at an unreachable local port.

use assert_cmd::Command;
use chrono::{Local, Utc};
use predicates::prelude::*;
use serde_json::json;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn setup_test_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp dir")
}

/// CLI bound to `data_dir` with an isolated config pointing at nothing
fn cli(data_dir: &Path) -> Command {
    let config_path = data_dir.join("test-config.toml");
    if !config_path.exists() {
        fs::write(
            &config_path,
            "[hevy]\nbase_url = \"http://127.0.0.1:9\"\n\n[inference]\nbase_url = \"http://127.0.0.1:9\"\n",
        )
        .expect("Failed to write test config");
    }

    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("spotter"));
    cmd.arg("--data-dir")
        .arg(data_dir)
        .arg("--config")
        .arg(&config_path)
        .env_remove("RUST_LOG");
    cmd
}

fn set_hevy_key(data_dir: &Path) {
    cli(data_dir)
        .args(["settings", "set-hevy-key", "hevy-test-key"])
        .assert()
        .success();
}

/// Write a workout cache entry stamped `age_hours` ago
fn seed_cache(data_dir: &Path, age_hours: i64) {
    let today = Local::now().date_naive().format("%Y-%m-%d").to_string();
    let stamp = (Utc::now() - chrono::Duration::hours(age_hours)).timestamp_millis();
    let entry = json!({
        "timestamp": stamp,
        "workouts": [{
            "date": today,
            "startTime": format!("{}T10:00:00Z", today),
            "title": "Push Day",
            "durationMinutes": 45,
            "exercises": [{
                "name": "Bench Press",
                "sets": [
                    {"weight_kg": 80.0, "reps": 8},
                    "50kg x 10 reps"
                ]
            }]
        }]
    });
    fs::write(
        data_dir.join("hevy_workouts_cache.json"),
        serde_json::to_string(&entry).unwrap(),
    )
    .unwrap();
}

#[test]
fn test_cli_help() {
    Command::new(assert_cmd::cargo::cargo_bin!("spotter"))
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Hevy workout sync, analytics and AI coaching",
        ));
}

#[test]
fn test_settings_roundtrip() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path();

    set_hevy_key(data_dir);
    cli(data_dir)
        .args(["settings", "set-philosophy", "5/3/1 Boring But Big"])
        .assert()
        .success();
    cli(data_dir)
        .args(["settings", "set-coach", "scientist"])
        .assert()
        .success()
        .stdout(predicate::str::contains("The Scientist"));

    assert!(data_dir.join("hevy-spotter-storage.json").exists());

    cli(data_dir)
        .args(["settings", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("set (…-key)"))
        .stdout(predicate::str::contains("OpenAI API key: not set"))
        .stdout(predicate::str::contains("The Scientist"))
        .stdout(predicate::str::contains("5/3/1 Boring But Big"))
        .stdout(predicate::str::contains("hevy-test-key").not());

    cli(data_dir)
        .args(["settings", "clear-philosophy"])
        .assert()
        .success();
    cli(data_dir)
        .args(["settings", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Philosophy:     (none)"));
}

#[test]
fn test_unknown_coach_rejected() {
    let temp_dir = setup_test_dir();
    cli(temp_dir.path())
        .args(["settings", "set-coach", "yoda"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown coach"));
}

#[test]
fn test_coaches_lists_default_selection() {
    let temp_dir = setup_test_dir();
    cli(temp_dir.path())
        .arg("coaches")
        .assert()
        .success()
        .stdout(predicate::str::contains("* drill-sergeant"))
        .stdout(predicate::str::contains("hype-man"));
}

#[test]
fn test_status_without_key_reports_no_data() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path();
    // A cache on disk is ignored without a credential
    seed_cache(data_dir, 1);

    cli(data_dir)
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("No data"))
        .stderr(predicate::str::contains("set-hevy-key"));
}

#[test]
fn test_fresh_cache_served_without_network() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path();
    set_hevy_key(data_dir);
    seed_cache(data_dir, 23);

    cli(data_dir)
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("Status: idle"))
        .stdout(predicate::str::contains("Workouts: 1"))
        .stdout(predicate::str::contains("Push Day"));

    cli(data_dir)
        .arg("heatmap")
        .assert()
        .success()
        .stdout(predicate::str::contains("Mon"))
        .stdout(predicate::str::contains("Workouts:     1"))
        .stdout(predicate::str::contains("Time:         45 min"));

    let month = Local::now().date_naive().format("%Y-%m").to_string();
    cli(data_dir)
        .arg("volume")
        .assert()
        .success()
        .stdout(predicate::str::contains(month))
        .stdout(predicate::str::contains("1140 kg"));
}

#[test]
fn test_stale_cache_shown_when_refresh_fails() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path();
    set_hevy_key(data_dir);
    seed_cache(data_dir, 25);

    cli(data_dir)
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("Status: error"))
        .stdout(predicate::str::contains("Workouts: 1"))
        .stderr(predicate::str::contains("showing cached workouts"));
}

#[test]
fn test_corrupt_cache_without_key_is_harmless() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path();
    fs::write(data_dir.join("hevy_workouts_cache.json"), "{not json").unwrap();

    cli(data_dir).arg("heatmap").assert().success();
}

#[test]
fn test_corrupt_cache_with_key_refetches() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path();
    set_hevy_key(data_dir);
    fs::write(data_dir.join("hevy_workouts_cache.json"), "{not json").unwrap();

    // Treated as missing, so a fetch is attempted and fails against the dead port
    cli(data_dir)
        .arg("status")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Sync failed"));
}

#[test]
fn test_sync_without_key_fails() {
    let temp_dir = setup_test_dir();
    cli(temp_dir.path())
        .arg("sync")
        .assert()
        .failure()
        .stderr(predicate::str::contains("No Hevy API key configured"));
}

#[test]
fn test_analysis_show_and_clear() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path();

    cli(data_dir)
        .args(["analysis", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No saved analysis"));

    let analysis = json!({
        "summary": "Solid pressing block.",
        "trends": ["Bench 80kg x 8 -> 85kg x 8"],
        "neglect": ["Hamstrings"],
        "recommendations": ["Romanian Deadlift 3x10"]
    });
    fs::write(
        data_dir.join("hevy_ai_analysis.json"),
        serde_json::to_string(&analysis).unwrap(),
    )
    .unwrap();

    cli(data_dir)
        .args(["analysis", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Solid pressing block."))
        .stdout(predicate::str::contains("→ Hamstrings"));

    cli(data_dir)
        .args(["analysis", "clear"])
        .assert()
        .success();
    assert!(!data_dir.join("hevy_ai_analysis.json").exists());
}

#[test]
fn test_analyze_without_openai_key() {
    let temp_dir = setup_test_dir();
    cli(temp_dir.path())
        .arg("analyze")
        .assert()
        .failure()
        .stderr(predicate::str::contains("OpenAI API key missing"));
}

#[test]
fn test_analyze_checks_openai_key_before_syncing() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path();
    // Hevy key set but no cache: a sync would hit the dead port
    set_hevy_key(data_dir);

    cli(data_dir)
        .arg("analyze")
        .assert()
        .failure()
        .stderr(predicate::str::contains("OpenAI API key missing"))
        .stderr(predicate::str::contains("Sync failed").not());
}

#[test]
fn test_analyze_rejects_unsupported_window() {
    let temp_dir = setup_test_dir();
    cli(temp_dir.path())
        .args(["analyze", "--sessions", "7"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("3, 5, 10 or 20"));
}

#[test]
fn test_generate_requires_saved_analysis() {
    let temp_dir = setup_test_dir();
    cli(temp_dir.path())
        .arg("generate")
        .assert()
        .failure()
        .stderr(predicate::str::contains("No saved analysis"));
}
