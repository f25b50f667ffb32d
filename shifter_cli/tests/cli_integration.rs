use assert_cmd::prelude::*;
use predicates::prelude::*;
use rstest::rstest;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::tempdir;

const MOTORS: &str = r#"
[[motors]]
name = "left"
family = "spark_max"
port = 1

[[motors.gears]]
gear = 1
kp = 0.1
max_speed = 8.0

[[motors.gears]]
gear = 2
kp = 0.05
max_speed = 16.0

[[motors]]
name = "shooter"
family = "talon"
port = 5
encoder_cpr = 1024

[[motors.gears]]
gear = 0
max_speed = 90.0

[[readiness]]
name = "shooter_at_speed"
motor = "shooter"
abs_tolerance = 2.0
samples = 3
"#;

// Short timings so a full high/low sequence finishes in about a second.
const SHIFTER: &str = r#"
[shifter]
low_sensors = [17]
high_sensors = [27]
dependents = ["left"]
disable_while_shifting = ["left"]
fail_open_ms = 100
checker_period_ms = 5
starting_gear = "low"

[simulation]
piston_travel_ms = 20
shifts = ["high", "low"]
shift_interval_ms = 300
"#;

fn write_config(dir: &tempfile::TempDir, body: &str) -> PathBuf {
    let path = dir.path().join("cfg.toml");
    fs::write(&path, body).unwrap();
    path
}

fn shifter_cmd(cfg: &Path) -> Command {
    let mut cmd = Command::cargo_bin("shifter").unwrap();
    cmd.arg("--config").arg(cfg);
    cmd
}

#[rstest]
#[case(&["--help"], 0, "Usage:", "stdout")]
#[case(&["check"], 0, "config ok: 2 motors, shifter in low gear", "stdout")]
#[case(&["telemetry", "--motor", "nope"], 3, "unknown motor 'nope'", "stderr")]
#[case(&["simulate", "--loop-ms"], 2, "value is required", "stderr")]
fn cli_table_cases(
    #[case] args: &[&str],
    #[case] exit_code: i32,
    #[case] needle: &str,
    #[case] stream: &str,
) {
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir, &format!("{MOTORS}{SHIFTER}"));

    let mut cmd = shifter_cmd(&cfg);
    for a in args {
        cmd.arg(a);
    }

    let assert = cmd.assert().code(exit_code);
    match stream {
        "stdout" => {
            assert.stdout(predicate::str::contains(needle));
        }
        "stderr" => {
            assert.stderr(predicate::str::contains(needle));
        }
        other => panic!("unknown stream: {other}"),
    }
}

#[rstest]
fn duplicate_motor_name_is_a_config_error() {
    let dir = tempdir().unwrap();
    let body = format!("[[motors]]\nname = \"left\"\nfamily = \"spark_max\"\nport = 9\n{MOTORS}");
    let cfg = write_config(&dir, &body);

    shifter_cmd(&cfg)
        .arg("check")
        .assert()
        .code(3)
        .stderr(predicate::str::contains("defined more than once"));
}

#[rstest]
fn missing_config_file_is_a_config_error() {
    let dir = tempdir().unwrap();
    let missing = dir.path().join("absent.toml");

    shifter_cmd(&missing)
        .arg("check")
        .assert()
        .code(3)
        .stderr(predicate::str::contains("could not be read"));
}

#[rstest]
fn json_errors_carry_reason_and_exit_code() {
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir, MOTORS);

    let out = shifter_cmd(&cfg)
        .arg("--json")
        .arg("simulate")
        .output()
        .unwrap();
    assert_eq!(out.status.code(), Some(3));
    let stderr = String::from_utf8(out.stderr).unwrap();
    let line = stderr
        .lines()
        .find(|l| l.contains("\"reason\""))
        .expect("json error line");
    let v: serde_json::Value = serde_json::from_str(line).unwrap();
    assert_eq!(v["reason"], "Config");
    assert!(v["message"].as_str().unwrap().contains("[shifter] section"));
}

#[rstest]
fn simulate_confirms_each_shift() {
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir, &format!("{MOTORS}{SHIFTER}"));

    shifter_cmd(&cfg)
        .args(["simulate", "--loop-ms", "5"])
        .assert()
        .success()
        .stdout(predicate::str::contains("shifted to high"))
        .stdout(predicate::str::contains("high gear confirmed by sensors"))
        .stdout(predicate::str::contains("low gear confirmed by sensors"))
        .stdout(predicate::str::contains(
            "simulation complete: 2 shifts, final gear low, checker resolved, 0 fail-open",
        ));
}

#[rstest]
fn stuck_sensor_fails_open() {
    let dir = tempdir().unwrap();
    let body = format!(
        "{MOTORS}{SHIFTER}stuck_sensor = {{ gear = \"high\", index = 0, value = false }}\n"
    );
    let cfg = write_config(&dir, &body);

    let out = shifter_cmd(&cfg)
        .args(["--json", "simulate", "--loop-ms", "5"])
        .output()
        .unwrap();
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));

    let events: Vec<serde_json::Value> = String::from_utf8(out.stdout)
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert!(
        events
            .iter()
            .any(|e| e["event"] == "fail_open" && e["gear"] == "high" && e["t_ms"].is_u64())
    );
    let summary = &events.last().unwrap()["summary"];
    assert_eq!(summary["fail_open_count"], 1);
    assert_eq!(summary["gear"], "low");
}

#[rstest]
fn json_telemetry_emits_one_object_per_motor() {
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir, MOTORS);

    let out = shifter_cmd(&cfg)
        .args(["--json", "telemetry", "--throttle", "0.5"])
        .output()
        .unwrap();
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));

    let rows: Vec<serde_json::Value> = String::from_utf8(out.stdout)
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(rows.len(), 2);
    let names: Vec<&str> = rows.iter().map(|r| r["name"].as_str().unwrap()).collect();
    assert_eq!(names, ["left", "shooter"]);
    assert_eq!(rows[0]["kind"], "spark_max");
    assert_eq!(rows[1]["mode"], "velocity");
}
