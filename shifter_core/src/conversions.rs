//! `From` implementations bridging `shifter_config` types to `shifter_core` types.

use std::time::Duration;

use shifter_config as cfg;
use shifter_traits::{IdleMode, LimitPolarity, ValveState};

use crate::error::{BuildError, Result};
use crate::motor::{ControllerKind, ElectricalModel, MotorSettings};
use crate::profile::{FeedForward, PerGearProfile};
use crate::readiness::{SpeedReadiness, Tolerance};
use crate::sensor_shift::ShifterSettings;
use crate::shift::{Gear, ValveMapping};

// ── Enums ────────────────────────────────────────────────────────────────────

impl From<cfg::Family> for ControllerKind {
    fn from(f: cfg::Family) -> Self {
        match f {
            cfg::Family::SparkMax => Self::SparkMax,
            cfg::Family::Talon => Self::Talon,
            cfg::Family::Wrapped => Self::Wrapped,
        }
    }
}

const fn polarity(p: cfg::Polarity) -> LimitPolarity {
    match p {
        cfg::Polarity::NormallyOpen => LimitPolarity::NormallyOpen,
        cfg::Polarity::NormallyClosed => LimitPolarity::NormallyClosed,
    }
}

impl From<cfg::GearName> for Gear {
    fn from(g: cfg::GearName) -> Self {
        match g {
            cfg::GearName::Low => Self::Low,
            cfg::GearName::High => Self::High,
        }
    }
}

fn valve(d: cfg::ValveDir) -> ValveState {
    match d {
        cfg::ValveDir::Forward => ValveState::Forward,
        cfg::ValveDir::Reverse => ValveState::Reverse,
    }
}

// ── Profiles ─────────────────────────────────────────────────────────────────

impl From<&cfg::FeedForwardCfg> for FeedForward {
    fn from(c: &cfg::FeedForwardCfg) -> Self {
        Self::new(c.ks, c.kv, c.ka)
    }
}

impl From<&cfg::GearCfg> for PerGearProfile {
    fn from(c: &cfg::GearCfg) -> Self {
        let mut p = Self::new(c.gear, c.kp, c.ki, c.kd);
        if let Some(r) = c.ramp_rate {
            p = p.with_ramp_rate(r);
        }
        if let Some(s) = c.max_speed {
            p = p.with_max_speed(s);
        }
        if let Some(g) = c.post_encoder_gearing {
            p = p.with_post_encoder_gearing(g);
        }
        if let Some(ff) = &c.feed_forward {
            p = p.with_feed_forward(ff.into());
        }
        p
    }
}

// ── MotorSettings ────────────────────────────────────────────────────────────

impl From<&cfg::MotorCfg> for MotorSettings {
    fn from(c: &cfg::MotorCfg) -> Self {
        Self {
            name: c.name.clone(),
            kind: c.family.into(),
            encoder_cpr: c.encoder_cpr,
            inverted: c.inverted,
            idle_mode: if c.brake { IdleMode::Brake } else { IdleMode::Coast },
            post_encoder_gearing: c.post_encoder_gearing,
            units_per_rotation: c.units_per_rotation,
            current_limit: c.current_limit_amps,
            voltage_compensation: (c.voltage_comp_volts > 0.0).then_some(c.voltage_comp_volts),
            starting_gear: c.starting_gear,
            fwd_limit: c.fwd_limit.map(polarity),
            rev_limit: c.rev_limit.map(polarity),
            fwd_soft_limit: c.fwd_soft_limit,
            rev_soft_limit: c.rev_soft_limit,
            profiles: c.gears.iter().map(PerGearProfile::from).collect(),
            electrical: c.electrical.map(|e| ElectricalModel {
                window: e.window,
                r2_threshold: e.r2_threshold,
            }),
        }
    }
}

// ── ShifterSettings ──────────────────────────────────────────────────────────

impl From<&cfg::ShifterCfg> for ShifterSettings {
    fn from(c: &cfg::ShifterCfg) -> Self {
        Self {
            mapping: ValveMapping {
                low: valve(c.low_valve),
                high: valve(c.high_valve),
            },
            starting_gear: c.starting_gear.map(Into::into),
            fail_open_after: Duration::from_millis(c.fail_open_ms),
            period: Duration::from_millis(c.checker_period_ms),
            ..Self::default()
        }
    }
}

// ── Readiness ────────────────────────────────────────────────────────────────

impl TryFrom<&cfg::ReadinessCfg> for SpeedReadiness {
    type Error = eyre::Report;
    fn try_from(c: &cfg::ReadinessCfg) -> Result<Self> {
        let tolerance = Tolerance::from_options(c.abs_tolerance, c.rel_tolerance)
            .map_err(|e: BuildError| eyre::Report::new(e).wrap_err(format!("readiness '{}'", c.name)))?;
        Ok(Self::new(tolerance, c.samples))
    }
}
