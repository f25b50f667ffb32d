//! Human-readable error descriptions and structured JSON error formatting.

/// Exit code for configuration problems (parse, validation, wiring).
pub const EXIT_CONFIG: i32 = 3;
/// Exit code for hardware access failures.
pub const EXIT_HARDWARE: i32 = 4;
/// Exit code for an interrupted run or an invalid runtime state.
pub const EXIT_STATE: i32 = 5;

/// Top-level context `main` attaches to config loading failures.
pub const CONFIG_CONTEXT: &str = "invalid configuration";

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    use shifter_core::error::{BuildError, ShiftError};

    // Typed matches first
    if let Some(be) = err.downcast_ref::<BuildError>() {
        return match be {
            BuildError::MissingActuator => {
                "What happened: No shifter valve was provided.\nLikely causes: The valve failed to initialize or was not wired into the builder.\nHow to fix: Ensure the valve is created successfully and passed via with_actuator(...).".to_string()
            }
            BuildError::ConflictingTolerance | BuildError::MissingTolerance => format!(
                "What happened: {be}.\nLikely causes: A [[readiness]] entry sets both abs_tolerance and rel_tolerance, or neither.\nHow to fix: Keep exactly one of the two tolerances."
            ),
            BuildError::DuplicateGear(gear) => format!(
                "What happened: Gear {gear} is defined twice for one motor.\nLikely causes: Copy-pasted [[motors.gears]] table.\nHow to fix: Give every gear table of a motor a distinct `gear` id."
            ),
            BuildError::UnknownStartingGear(gear) => format!(
                "What happened: Starting gear {gear} has no profile.\nLikely causes: starting_gear does not match any [[motors.gears]] entry.\nHow to fix: Add the gear or change starting_gear."
            ),
            BuildError::UnsupportedGear { motor, gear } => format!(
                "What happened: {motor} cannot follow the shifter into gear {gear}.\nLikely causes: A shifter dependent lacks a [[motors.gears]] entry with gear = 1 (low) or gear = 2 (high).\nHow to fix: Add both gear profiles to every motor listed in shifter.dependents."
            ),
            BuildError::DuplicateMotor(name) => format!(
                "What happened: Motor '{name}' is registered twice.\nLikely causes: Two [[motors]] entries share a name.\nHow to fix: Rename one of them."
            ),
            BuildError::InvalidConfig(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nLikely causes: Missing or out-of-range values in the TOML.\nHow to fix: Edit the config file, then rerun `shifter check`."
            ),
        };
    }

    if let Some(se) = err.downcast_ref::<ShiftError>() {
        return match se {
            ShiftError::UnknownGear { motor, gear } => format!(
                "What happened: Motor '{motor}' was asked for gear {gear}, which it has no profile for.\nLikely causes: A gear id that is not in its [[motors.gears]] list.\nHow to fix: Add the profile or request a configured gear."
            ),
            ShiftError::Hardware(msg) | ShiftError::HardwareFault(msg) => format!(
                "What happened: Hardware access failed ({msg}).\nLikely causes: Controller not powered, wrong port or CAN id, or a wiring fault.\nHow to fix: Check power and wiring, then re-run with --log-level=debug."
            ),
            ShiftError::Config(msg) => format!(
                "What happened: {msg}.\nLikely causes: A name or section the command needs is missing from the config.\nHow to fix: Edit the TOML config and try again."
            ),
            ShiftError::State(msg) if msg == "interrupted" => {
                "What happened: The run was interrupted.\nLikely causes: Ctrl-C or a termination signal.\nHow to fix: Nothing to fix; motors were disabled before exit.".to_string()
            }
            ShiftError::State(msg) => format!(
                "What happened: {msg}.\nLikely causes: See logs.\nHow to fix: Re-run with --log-level=debug or set RUST_LOG for more detail."
            ),
        };
    }

    // String-based heuristics for errors coming from config loading
    let msg = err.to_string();
    let chain = format!("{err:#}");
    let lower = chain.to_ascii_lowercase();

    if lower.contains("read config") {
        return format!(
            "What happened: The config file could not be read.\nLikely causes: Wrong --config path or missing permissions.\nHow to fix: Pass an existing TOML file via --config. Original: {chain}"
        );
    }

    if lower.contains("parse config") {
        return format!(
            "What happened: The config file is not valid TOML for this schema.\nLikely causes: Syntax error, misspelled key, or wrong value type.\nHow to fix: Fix the line named below and rerun. Original: {chain}"
        );
    }

    if msg == CONFIG_CONTEXT {
        let cause = err.root_cause();
        return format!(
            "What happened: Configuration is invalid ({cause}).\nLikely causes: Missing, duplicated, or out-of-range values.\nHow to fix: Edit the TOML config and try again."
        );
    }

    // Generic fallback
    let mut cause = String::new();
    if let Some(src) = err.source() {
        cause = format!(" Cause: {src}");
    }
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

/// Stable exit codes: 3 config, 4 hardware, 5 interrupted/state, 1 otherwise.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    use shifter_core::error::{BuildError, ShiftError};
    if err.downcast_ref::<BuildError>().is_some() {
        return EXIT_CONFIG;
    }
    if let Some(se) = err.downcast_ref::<ShiftError>() {
        return match se {
            ShiftError::UnknownGear { .. } | ShiftError::Config(_) => EXIT_CONFIG,
            ShiftError::Hardware(_) | ShiftError::HardwareFault(_) => EXIT_HARDWARE,
            ShiftError::State(_) => EXIT_STATE,
        };
    }
    if err.to_string() == CONFIG_CONTEXT {
        return EXIT_CONFIG;
    }
    1
}

/// Stable reason names for JSON output.
pub fn reason_name(err: &eyre::Report) -> &'static str {
    match exit_code_for_error(err) {
        EXIT_CONFIG => "Config",
        EXIT_HARDWARE => "Hardware",
        EXIT_STATE => "Interrupted",
        _ => "Error",
    }
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    use serde_json::json;

    json!({
        "reason": reason_name(err),
        "exit_code": exit_code_for_error(err),
        "message": humanize(err),
        "error": format!("{err:#}"),
    })
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use eyre::WrapErr;
    use shifter_core::error::{BuildError, ShiftError};

    #[test]
    fn typed_errors_map_to_stable_codes() {
        let e = eyre::Report::new(BuildError::MissingActuator);
        assert_eq!(exit_code_for_error(&e), EXIT_CONFIG);
        let e = eyre::Report::new(ShiftError::Hardware("bus off".into()));
        assert_eq!(exit_code_for_error(&e), EXIT_HARDWARE);
        assert!(humanize(&e).contains("bus off"));
        let e = eyre::Report::new(ShiftError::State("interrupted".into()));
        assert_eq!(reason_name(&e), "Interrupted");
    }

    #[test]
    fn wrapped_typed_error_is_still_recognized() {
        let r: eyre::Result<()> = Err(BuildError::DuplicateGear(2).into());
        let e = r.wrap_err("build motor 'left'").unwrap_err();
        assert_eq!(exit_code_for_error(&e), EXIT_CONFIG);
        assert!(humanize(&e).contains("Gear 2"));
    }

    #[test]
    fn config_context_uses_root_cause() {
        let r: eyre::Result<()> = Err(eyre::eyre!("motors must contain at least one entry"));
        let e = r.wrap_err(CONFIG_CONTEXT).unwrap_err();
        assert_eq!(exit_code_for_error(&e), EXIT_CONFIG);
        assert!(humanize(&e).contains("motors must contain"));
        let v: serde_json::Value = serde_json::from_str(&format_error_json(&e)).unwrap();
        assert_eq!(v["reason"], "Config");
        assert_eq!(v["exit_code"], 3);
    }
}
