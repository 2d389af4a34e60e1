use std::fs;

use assert_cmd::cargo::cargo_bin_cmd;
use tempfile::tempdir;

#[test]
fn test_cli_runs_an_episode() {
    let output = cargo_bin_cmd!("covid19-gym")
        .args(["--random-seed", "42", "--max-steps", "5", "--action", "1.0"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("steps: 5"));
    assert!(stdout.contains("icu overflow: false"));
}

#[test]
fn test_cli_writes_report() {
    let temp_dir = tempdir().unwrap();
    let config_path = temp_dir.path().join("config.json");
    fs::write(&config_path, r#"{ "max_steps": 4, "seed": 3 }"#).unwrap();
    let output_dir = temp_dir.path().join("out");

    let output = cargo_bin_cmd!("covid19-gym")
        .arg("--config")
        .arg(&config_path)
        .arg("--output-dir")
        .arg(&output_dir)
        .output()
        .unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("steps: 4"));
    assert!(stdout.contains("total reward: 0"));

    let report = fs::read_to_string(output_dir.join("episode.csv")).unwrap();
    let mut lines = report.lines();
    assert_eq!(
        lines.next(),
        Some("step,age,susceptible,exposed,infectious,severe,critical,fatal,recovered,action,reward,done")
    );
    // Five snapshots of nine cohorts.
    assert_eq!(lines.count(), 45);
}

#[test]
fn test_cli_rejects_invalid_config() {
    let temp_dir = tempdir().unwrap();
    let config_path = temp_dir.path().join("config.json");
    fs::write(
        &config_path,
        r#"{ "population": { "isolation_effectiveness": 1.5 } }"#,
    )
    .unwrap();

    let output = cargo_bin_cmd!("covid19-gym")
        .arg("--config")
        .arg(&config_path)
        .output()
        .unwrap();
    assert!(!output.status.success());
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("isolation_effectiveness"));
}

#[test]
fn test_cli_logging_goes_to_stderr() {
    let output = cargo_bin_cmd!("covid19-gym")
        .args(["--max-steps", "2", "--log-level", "info"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("covid19_gym::runner - episode finished after 2 steps"));
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.starts_with("steps: 2"));
}
