//! Integration tests: run profiles end-to-end against real bash cases
//!
//! Usage:
//!   cargo test --test integration

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::process::Command;
use std::time::Duration;

use testrun::{Event, EventLog, JsonReporter, Profile, RunOutcome, RunnerBuilder, RunnerStatus};

fn write_case(dir: &Path, name: &str, body: &str) {
    let path = dir.join(name);
    fs::write(&path, format!("#!/bin/bash\n{body}")).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
}

fn fixture() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    write_case(dir.path(), "greet.sh", "echo \"hello $WHO\"\n");
    write_case(dir.path(), "fail.sh", "echo failing >&2\nexit 4\n");
    write_case(dir.path(), "hang.sh", "sleep 5\n");
    fs::write(dir.path().join("readme.txt"), "not a case\n").unwrap();
    dir
}

const PROFILE: &str = r#"{
    "env": { "PATH": "/usr/bin:/bin", "WHO": "world" },
    "cases": [
        { "name": "greet.sh" },
        { "name": "greet.sh", "env": { "WHO": "override" } },
        { "name": "fail.sh" },
        { "name": "hang.sh", "timeout": 0.3 },
        { "name": "readme.txt" },
        { "name": "greet.sh", "skip": "not today" }
    ]
}"#;

#[test]
fn profile_end_to_end() {
    let dir = fixture();
    let profile: Profile = PROFILE.parse().unwrap();
    let batch = RunnerBuilder::new(dir.path())
        .grace_period(Duration::from_millis(500))
        .poll_interval(Duration::from_millis(10))
        .build();

    let log = EventLog::new();
    batch.run_profile(&profile, &mut log.clone()).unwrap();

    assert_eq!(batch.status().get(), RunnerStatus::Idle);
    assert_eq!(log.lines(), vec!["hello world", "hello override", "failing"]);
    assert_eq!(
        log.outcomes(),
        vec![
            RunOutcome::Exited { code: 0 },
            RunOutcome::Exited { code: 0 },
            RunOutcome::Exited { code: 4 },
            RunOutcome::TimedOut { after_seconds: 0.3 },
        ]
    );

    let events = log.events();
    assert!(events.contains(&Event::UnknownCase { path: dir.path().join("readme.txt") }));
    assert_eq!(
        events.last(),
        Some(&Event::Skipped { name: "greet.sh".into(), reason: "not today".into() })
    );
    let brackets = events
        .iter()
        .filter(|e| matches!(e, Event::BeforeRun { .. } | Event::AfterRun { .. }))
        .count();
    assert_eq!(brackets, 8);
}

#[test]
fn json_report_is_line_delimited() {
    let dir = fixture();
    let profile: Profile = r#"{
        "env": { "PATH": "/usr/bin:/bin", "WHO": "json" },
        "cases": [ { "name": "greet.sh" } ]
    }"#
    .parse()
    .unwrap();
    let batch = RunnerBuilder::new(dir.path()).build();
    let mut reporter = JsonReporter::new(Vec::new());
    batch.run_profile(&profile, &mut reporter).unwrap();

    let text = String::from_utf8(reporter.into_inner()).unwrap();
    let kinds: Vec<String> = text
        .lines()
        .map(|l| serde_json::from_str::<serde_json::Value>(l).unwrap()["event"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(kinds, vec!["before_run", "output", "outcome", "after_run"]);
}

#[test]
fn cli_dry_run_prints_commands_without_running() {
    let dir = fixture();
    write_case(dir.path(), "mark.sh", "touch ran\n");
    let profile = dir.path().join("profile.json");
    fs::write(&profile, r#"{ "cases": [ { "name": "mark.sh", "args": "-x" } ] }"#).unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_testrun"))
        .arg("--profile")
        .arg(&profile)
        .arg("--case-dir")
        .arg(dir.path())
        .arg("--dry-run")
        .output()
        .unwrap();

    assert!(output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("cmd: bash -c"), "{stderr}");
    assert!(stderr.contains("mark.sh -x"), "{stderr}");
    assert!(!dir.path().join("ran").exists());
}

#[test]
fn cli_serve_mode_is_unsupported() {
    let output = Command::new(env!("CARGO_BIN_EXE_testrun"))
        .args(["--serve", "8080"])
        .output()
        .unwrap();
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("server mode is not implemented"));
}

#[test]
fn cli_bad_profile_fails() {
    let dir = tempfile::tempdir().unwrap();
    let profile = dir.path().join("profile.json");
    fs::write(&profile, "{ not json").unwrap();
    let output = Command::new(env!("CARGO_BIN_EXE_testrun"))
        .arg("-p")
        .arg(&profile)
        .output()
        .unwrap();
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("invalid profile"));
}

#[test]
fn cli_rejects_out_of_range_grace() {
    for grace in ["1e30", "-1", "inf"] {
        let output = Command::new(env!("CARGO_BIN_EXE_testrun"))
            .args(["-p", "/nonexistent/profile.json"])
            .arg(format!("--grace={grace}"))
            .output()
            .unwrap();
        assert_eq!(output.status.code(), Some(1), "--grace {grace}");
        let stderr = String::from_utf8_lossy(&output.stderr);
        assert!(stderr.contains("--grace must be a non-negative number"), "{stderr}");
    }
}
