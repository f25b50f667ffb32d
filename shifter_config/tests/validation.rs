use rstest::rstest;
use shifter_config::{Family, GearName, load_file, load_toml};

const BASE: &str = r#"
[[motors]]
name = "left"
family = "spark_max"
port = 1
post_encoder_gearing = 0.1
units_per_rotation = 0.5

[[motors.gears]]
gear = 1
kp = 0.1
max_speed = 8.0

[[motors.gears]]
gear = 2
kp = 0.05
max_speed = 16.0
post_encoder_gearing = 0.2

[[motors]]
name = "right"
family = "talon"
port = 2
encoder_cpr = 256

[[motors.gears]]
gear = 1

[[motors.gears]]
gear = 2

[shifter]
low_sensors = [17]
high_sensors = [27, 22]
dependents = ["left", "right"]
disable_while_shifting = ["left", "right"]
"#;

fn expect_rejected(toml: &str, needle: &str) {
    let cfg = load_toml(toml).expect("parse TOML");
    let err = cfg.validate().expect_err("config should be rejected");
    let msg = format!("{err}");
    assert!(msg.contains(needle), "expected '{needle}' in '{msg}'");
}

#[test]
fn base_config_is_valid_and_defaults_apply() {
    let cfg = load_toml(BASE).expect("parse TOML");
    cfg.validate().expect("base config should pass");

    let left = cfg.motor("left").expect("left motor");
    assert_eq!(left.family, Family::SparkMax);
    assert_eq!(left.voltage_comp_volts, 12.0);
    assert!(left.electrical.is_none());

    let sh = cfg.shifter.as_ref().expect("shifter section");
    assert_eq!(sh.fail_open_ms, 500);
    assert_eq!(sh.checker_period_ms, 20);
    assert!(sh.starting_gear.is_none());
    assert_eq!(cfg.simulation.shifts, vec![GearName::High, GearName::Low]);
}

#[test]
fn rejects_duplicate_gear_ids() {
    let toml = r#"
[[motors]]
name = "m"
family = "spark_max"
port = 3

[[motors.gears]]
gear = 1

[[motors.gears]]
gear = 1
"#;
    expect_rejected(toml, "duplicate gear id 1");
}

#[test]
fn rejects_duplicate_motor_names() {
    let toml = r#"
[[motors]]
name = "m"
family = "spark_max"
port = 3

[[motors]]
name = "m"
family = "spark_max"
port = 4
"#;
    expect_rejected(toml, "defined more than once");
}

#[rstest]
#[case("post_encoder_gearing = 0.0", "post_encoder_gearing must be > 0")]
#[case("post_encoder_gearing = -2.0", "post_encoder_gearing must be > 0")]
#[case("units_per_rotation = 0.0", "units_per_rotation must be > 0")]
#[case("starting_gear = 4", "starting_gear 4 has no matching gears entry")]
#[case("voltage_comp_volts = -1.0", "voltage_comp_volts must be >= 0")]
fn rejects_bad_motor_scalars(#[case] line: &str, #[case] needle: &str) {
    let toml = format!(
        r#"
[[motors]]
name = "m"
family = "spark_max"
port = 3
{line}

[[motors.gears]]
gear = 1
"#
    );
    expect_rejected(&toml, needle);
}

#[test]
fn talon_requires_encoder_cpr() {
    let toml = r#"
[[motors]]
name = "t"
family = "talon"
port = 5
"#;
    expect_rejected(toml, "encoder_cpr is required");
}

#[rstest]
#[case("fwd_limit = \"normally_open\"")]
#[case("rev_soft_limit = -3.0")]
fn wrapped_family_rejects_limit_inputs(#[case] line: &str) {
    let toml = format!(
        r#"
[[motors]]
name = "w"
family = "wrapped"
port = 6
encoder_cpr = 2048
{line}
"#
    );
    expect_rejected(&toml, "wrapped family does not support limit switches");
}

#[test]
fn rejects_conflicting_readiness_tolerances() {
    let toml = format!(
        r#"{BASE}
[[readiness]]
name = "flywheel"
motor = "left"
abs_tolerance = 5.0
rel_tolerance = 0.1
"#
    );
    expect_rejected(&toml, "mutually exclusive");
}

#[test]
fn rejects_readiness_on_unknown_motor() {
    let toml = format!(
        r#"{BASE}
[[readiness]]
name = "flywheel"
motor = "shooter"
rel_tolerance = 0.1
"#
    );
    expect_rejected(&toml, "'shooter' is not a configured motor");
}

#[test]
fn dependents_must_carry_both_gears() {
    let toml = r#"
[[motors]]
name = "m"
family = "spark_max"
port = 3

[[motors.gears]]
gear = 1

[shifter]
dependents = ["m"]
"#;
    expect_rejected(toml, "has no profile for gear 2");
}

#[rstest]
#[case("fail_open_ms = 0", "fail_open_ms must be >= 1")]
#[case("checker_period_ms = 0", "checker_period_ms must be >= 1")]
#[case("checker_period_ms = 900", "must not exceed shifter.fail_open_ms")]
#[case("high_valve = \"forward\"", "must differ")]
#[case("dependents = [\"ghost\"]", "'ghost' is not a configured motor")]
fn rejects_bad_shifter_settings(#[case] line: &str, #[case] needle: &str) {
    let toml = format!(
        r#"
[[motors]]
name = "m"
family = "spark_max"
port = 3

[shifter]
{line}
"#
    );
    expect_rejected(&toml, needle);
}

#[test]
fn stuck_sensor_index_is_bounds_checked() {
    let toml = format!(
        r#"{BASE}
[simulation]
stuck_sensor = {{ gear = "high", index = 2, value = false }}
"#
    );
    expect_rejected(&toml, "stuck_sensor.index 2 is out of range for 2 sensors");
}

#[test]
fn rejects_unknown_rotation() {
    let toml = format!(
        r#"{BASE}
[logging]
rotation = "weekly"
"#
    );
    expect_rejected(&toml, "logging.rotation");
}

#[test]
fn unknown_family_fails_to_parse() {
    let toml = r#"
[[motors]]
name = "m"
family = "victor"
port = 3
"#;
    assert!(load_toml(toml).is_err());
}

#[test]
fn load_file_parses_and_validates() {
    let dir = tempfile::tempdir().expect("tempdir");
    let good = dir.path().join("good.toml");
    std::fs::write(&good, BASE).expect("write");
    let cfg = load_file(&good).expect("valid file");
    assert_eq!(cfg.motors.len(), 2);

    let bad = dir.path().join("bad.toml");
    std::fs::write(&bad, BASE.replace("port = 1", "port = 1\nunits_per_rotation = 0.0"))
        .expect("write");
    // Duplicate key is a parse error, not a validation error.
    let err = load_file(&bad).expect_err("duplicate key");
    assert!(format!("{err}").contains("parse config"));

    let missing = dir.path().join("missing.toml");
    let err = load_file(&missing).expect_err("missing file");
    assert!(format!("{err}").contains("read config"));
}
