#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schema for the shifter workspace.
//!
//! - `Config` and its sections are deserialized from TOML and checked by
//!   `Config::validate`, which names the offending key in every error.
//! - Nothing here touches hardware; `shifter_core::conversions` turns these
//!   structs into runtime settings.
use std::collections::HashSet;
use std::path::Path;

use serde::Deserialize;

/// Motor controller family backing a `[[motors]]` entry.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Family {
    SparkMax,
    Talon,
    /// Plain controller with an external encoder; closed loop runs in software.
    Wrapped,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Polarity {
    NormallyOpen,
    NormallyClosed,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum GearName {
    Low,
    High,
}

impl GearName {
    /// Profile id a gear-aware motor must carry for this gear.
    pub const fn id(self) -> u8 {
        match self {
            Self::Low => 1,
            Self::High => 2,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ValveDir {
    Forward,
    Reverse,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq)]
pub struct FeedForwardCfg {
    #[serde(default)]
    pub ks: f64,
    #[serde(default)]
    pub kv: f64,
    #[serde(default)]
    pub ka: f64,
}

/// One `[[motors.gears]]` table.
#[derive(Debug, Deserialize, Clone)]
pub struct GearCfg {
    pub gear: u8,
    #[serde(default)]
    pub kp: f64,
    #[serde(default)]
    pub ki: f64,
    #[serde(default)]
    pub kd: f64,
    /// Volts per second; absent means no ramp.
    pub ramp_rate: Option<f64>,
    /// Units per second at full output.
    pub max_speed: Option<f64>,
    /// Output rotations per encoder rotation in this gear.
    pub post_encoder_gearing: Option<f64>,
    pub feed_forward: Option<FeedForwardCfg>,
}

/// Voltage-per-current regression used to estimate winding resistance.
#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct ElectricalCfg {
    pub window: usize,
    pub r2_threshold: f64,
}

impl Default for ElectricalCfg {
    fn default() -> Self {
        Self {
            window: 50,
            r2_threshold: 0.8,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct MotorCfg {
    pub name: String,
    pub family: Family,
    pub port: i32,
    #[serde(default)]
    pub inverted: bool,
    /// Brake in neutral instead of coasting.
    #[serde(default)]
    pub brake: bool,
    /// Default gearing for gears that do not carry their own.
    #[serde(default = "default_one")]
    pub post_encoder_gearing: f64,
    /// Physical units per output rotation (feet, radians, ...).
    #[serde(default = "default_one")]
    pub units_per_rotation: f64,
    /// Encoder counts per rotation; required for `talon` and `wrapped`.
    pub encoder_cpr: Option<u32>,
    pub current_limit_amps: Option<u32>,
    /// Nominal voltage for compensation; 0 disables it.
    #[serde(default = "default_voltage_comp")]
    pub voltage_comp_volts: f64,
    pub starting_gear: Option<u8>,
    pub fwd_limit: Option<Polarity>,
    pub rev_limit: Option<Polarity>,
    /// Soft limits in physical units.
    pub fwd_soft_limit: Option<f64>,
    pub rev_soft_limit: Option<f64>,
    #[serde(default)]
    pub gears: Vec<GearCfg>,
    pub electrical: Option<ElectricalCfg>,
}

const fn default_one() -> f64 {
    1.0
}

const fn default_voltage_comp() -> f64 {
    12.0
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ShifterCfg {
    /// Valve position that engages low gear.
    pub low_valve: ValveDir,
    /// Valve position that engages high gear.
    pub high_valve: ValveDir,
    pub forward_channel: u8,
    pub reverse_channel: u8,
    /// Sensor inputs that must all read true in low gear (GPIO pins on hardware).
    pub low_sensors: Vec<u8>,
    /// Sensor inputs that must all read true in high gear.
    pub high_sensors: Vec<u8>,
    /// Active-low sensor wiring.
    pub sensors_active_low: bool,
    /// Motors whose profile follows the gear.
    pub dependents: Vec<String>,
    /// Motors held disabled while a shift is unconfirmed.
    pub disable_while_shifting: Vec<String>,
    /// Mismatch must persist this long before failing open.
    pub fail_open_ms: u64,
    pub checker_period_ms: u64,
    /// Starting gear; derived from the valve when absent.
    pub starting_gear: Option<GearName>,
}

impl Default for ShifterCfg {
    fn default() -> Self {
        Self {
            low_valve: ValveDir::Forward,
            high_valve: ValveDir::Reverse,
            forward_channel: 0,
            reverse_channel: 1,
            low_sensors: Vec::new(),
            high_sensors: Vec::new(),
            sensors_active_low: true,
            dependents: Vec::new(),
            disable_while_shifting: Vec::new(),
            fail_open_ms: 500,
            checker_period_ms: 20,
            starting_gear: None,
        }
    }
}

/// Debounced "at speed" condition on a motor.
#[derive(Debug, Deserialize, Clone)]
pub struct ReadinessCfg {
    pub name: String,
    pub motor: String,
    /// Allowed |speed - target| in units/sec. Exclusive with `rel_tolerance`.
    pub abs_tolerance: Option<f64>,
    /// Allowed |speed - target| as a fraction of target. Exclusive with `abs_tolerance`.
    pub rel_tolerance: Option<f64>,
    #[serde(default = "default_readiness_samples")]
    pub samples: usize,
}

const fn default_readiness_samples() -> usize {
    30
}

/// A sensor forced to a fixed reading in simulation.
#[derive(Debug, Deserialize, Clone, Copy)]
pub struct StuckSensorCfg {
    pub gear: GearName,
    /// Position in the gear's sensor list.
    pub index: usize,
    pub value: bool,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SimulationCfg {
    pub piston_travel_ms: u64,
    /// Gears to shift into, in order.
    pub shifts: Vec<GearName>,
    pub shift_interval_ms: u64,
    pub stuck_sensor: Option<StuckSensorCfg>,
}

impl Default for SimulationCfg {
    fn default() -> Self {
        Self {
            piston_travel_ms: 80,
            shifts: vec![GearName::High, GearName::Low],
            shift_interval_ms: 750,
            stuck_sensor: None,
        }
    }
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub motors: Vec<MotorCfg>,
    #[serde(default)]
    pub shifter: Option<ShifterCfg>,
    #[serde(default)]
    pub readiness: Vec<ReadinessCfg>,
    #[serde(default)]
    pub simulation: SimulationCfg,
    #[serde(default)]
    pub logging: Logging,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

/// Read, parse and validate a config file.
pub fn load_file(path: &Path) -> eyre::Result<Config> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| eyre::eyre!("read config {}: {}", path.display(), e))?;
    let cfg = load_toml(&text).map_err(|e| eyre::eyre!("parse config {}: {}", path.display(), e))?;
    cfg.validate()?;
    Ok(cfg)
}

fn positive(v: f64) -> bool {
    v.is_finite() && v > 0.0
}

impl Config {
    pub fn motor(&self, name: &str) -> Option<&MotorCfg> {
        self.motors.iter().find(|m| m.name == name)
    }

    pub fn validate(&self) -> eyre::Result<()> {
        if self.motors.is_empty() {
            eyre::bail!("motors must contain at least one entry");
        }
        let mut names = HashSet::new();
        for m in &self.motors {
            if !names.insert(m.name.as_str()) {
                eyre::bail!("motors.name '{}' is defined more than once", m.name);
            }
            m.validate()?;
        }

        if let Some(sh) = &self.shifter {
            self.validate_shifter(sh)?;
        }

        let mut readiness_names = HashSet::new();
        for r in &self.readiness {
            if !readiness_names.insert(r.name.as_str()) {
                eyre::bail!("readiness.name '{}' is defined more than once", r.name);
            }
            if self.motor(&r.motor).is_none() {
                eyre::bail!("readiness[{}].motor '{}' is not a configured motor", r.name, r.motor);
            }
            match (r.abs_tolerance, r.rel_tolerance) {
                (None, None) => eyre::bail!(
                    "readiness[{}] needs abs_tolerance or rel_tolerance",
                    r.name
                ),
                (Some(_), Some(_)) => eyre::bail!(
                    "readiness[{}]: abs_tolerance and rel_tolerance are mutually exclusive",
                    r.name
                ),
                (Some(t), None) | (None, Some(t)) if !(t.is_finite() && t >= 0.0) => {
                    eyre::bail!("readiness[{}] tolerance must be >= 0", r.name)
                }
                _ => {}
            }
            if r.samples == 0 {
                eyre::bail!("readiness[{}].samples must be >= 1", r.name);
            }
        }

        // Simulation
        if let Some(stuck) = self.simulation.stuck_sensor {
            let Some(sh) = &self.shifter else {
                eyre::bail!("simulation.stuck_sensor requires a [shifter] section");
            };
            let len = match stuck.gear {
                GearName::Low => sh.low_sensors.len(),
                GearName::High => sh.high_sensors.len(),
            };
            if stuck.index >= len {
                eyre::bail!(
                    "simulation.stuck_sensor.index {} is out of range for {} sensors",
                    stuck.index,
                    len
                );
            }
        }

        // Logging
        if let Some(rot) = self.logging.rotation.as_deref()
            && !matches!(rot, "never" | "daily" | "hourly")
        {
            eyre::bail!("logging.rotation must be one of never|daily|hourly");
        }

        Ok(())
    }

    fn validate_shifter(&self, sh: &ShifterCfg) -> eyre::Result<()> {
        if sh.low_valve == sh.high_valve {
            eyre::bail!("shifter.low_valve and shifter.high_valve must differ");
        }
        if sh.forward_channel == sh.reverse_channel {
            eyre::bail!("shifter.forward_channel and shifter.reverse_channel must differ");
        }
        if sh.fail_open_ms == 0 {
            eyre::bail!("shifter.fail_open_ms must be >= 1");
        }
        if sh.checker_period_ms == 0 {
            eyre::bail!("shifter.checker_period_ms must be >= 1");
        }
        if sh.checker_period_ms > sh.fail_open_ms {
            eyre::bail!("shifter.checker_period_ms must not exceed shifter.fail_open_ms");
        }
        for name in &sh.dependents {
            let Some(m) = self.motor(name) else {
                eyre::bail!("shifter.dependents: '{name}' is not a configured motor");
            };
            for g in [GearName::Low, GearName::High] {
                if !m.gears.iter().any(|p| p.gear == g.id()) {
                    eyre::bail!(
                        "shifter.dependents: motor '{}' has no profile for gear {}",
                        name,
                        g.id()
                    );
                }
            }
        }
        for name in &sh.disable_while_shifting {
            if self.motor(name).is_none() {
                eyre::bail!("shifter.disable_while_shifting: '{name}' is not a configured motor");
            }
        }
        Ok(())
    }
}

impl MotorCfg {
    fn validate(&self) -> eyre::Result<()> {
        let n = &self.name;
        if !positive(self.post_encoder_gearing) {
            eyre::bail!("motors[{n}].post_encoder_gearing must be > 0");
        }
        if !positive(self.units_per_rotation) {
            eyre::bail!("motors[{n}].units_per_rotation must be > 0");
        }
        if matches!(self.family, Family::Talon | Family::Wrapped) {
            match self.encoder_cpr {
                None => eyre::bail!("motors[{n}].encoder_cpr is required for this family"),
                Some(0) => eyre::bail!("motors[{n}].encoder_cpr must be >= 1"),
                Some(_) => {}
            }
        }
        if self.family == Family::Wrapped
            && (self.fwd_limit.is_some()
                || self.rev_limit.is_some()
                || self.fwd_soft_limit.is_some()
                || self.rev_soft_limit.is_some())
        {
            eyre::bail!("motors[{n}]: wrapped family does not support limit switches or soft limits");
        }
        if let (Some(f), Some(r)) = (self.fwd_soft_limit, self.rev_soft_limit)
            && f <= r
        {
            eyre::bail!("motors[{n}].fwd_soft_limit must be greater than rev_soft_limit");
        }
        if !(self.voltage_comp_volts.is_finite() && self.voltage_comp_volts >= 0.0) {
            eyre::bail!("motors[{n}].voltage_comp_volts must be >= 0");
        }

        let mut ids = HashSet::new();
        for g in &self.gears {
            if !ids.insert(g.gear) {
                eyre::bail!("motors[{n}].gears: duplicate gear id {}", g.gear);
            }
            if let Some(r) = g.ramp_rate
                && !positive(r)
            {
                eyre::bail!("motors[{n}].gears[{}].ramp_rate must be > 0", g.gear);
            }
            if let Some(s) = g.max_speed
                && !positive(s)
            {
                eyre::bail!("motors[{n}].gears[{}].max_speed must be > 0", g.gear);
            }
            if let Some(pg) = g.post_encoder_gearing
                && !positive(pg)
            {
                eyre::bail!("motors[{n}].gears[{}].post_encoder_gearing must be > 0", g.gear);
            }
            if ![g.kp, g.ki, g.kd].iter().all(|k| k.is_finite()) {
                eyre::bail!("motors[{n}].gears[{}] gains must be finite", g.gear);
            }
        }
        // An empty gear list gets a single default profile with id 0.
        if let Some(start) = self.starting_gear
            && (if self.gears.is_empty() { start != 0 } else { !ids.contains(&start) })
        {
            eyre::bail!("motors[{n}].starting_gear {start} has no matching gears entry");
        }
        if let Some(e) = self.electrical {
            if e.window < 2 {
                eyre::bail!("motors[{n}].electrical.window must be >= 2");
            }
            if !(0.0..=1.0).contains(&e.r2_threshold) {
                eyre::bail!("motors[{n}].electrical.r2_threshold must be in [0.0, 1.0]");
            }
        }
        Ok(())
    }
}
