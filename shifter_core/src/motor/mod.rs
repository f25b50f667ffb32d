//! Closed-loop motor facade.
//!
//! `SmartMotor` is the hardware-independent contract. `Motor<D, F>` implements
//! it over any `MotorDevice` port; the `ControllerFamily` parameter captures
//! what differs between controller families (native units, where the closed
//! loop runs, which limit inputs exist). `build_smart_motor` picks the family
//! from `MotorSettings` at runtime.
use std::sync::Arc;

use serde::Serialize;
use shifter_traits::{
    Clock, Fault, IdleMode, LimitDirection, LimitPolarity, MotorDevice, PortResult,
};

use crate::error::{BuildError, Result, ShiftError};
use crate::hw_error::port_err;
use crate::linreg::RunningLinReg;
use crate::profile::{GearId, PerGearProfile, ProfileSet};
use crate::units::{NativeScale, UnitConverter, ramp_seconds};
use crate::util::clamp_unit;

pub mod shared;
pub mod spark;
pub mod talon;
pub mod wrapped;

pub use shared::SharedMotor;
pub use spark::SparkMax;
pub use talon::Talon;
pub use wrapped::Wrapped;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ControllerKind {
    SparkMax,
    Talon,
    Wrapped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlMode {
    Voltage,
    Velocity,
    Position,
    Disabled,
}

/// Minimal motor surface: what the shift controller needs to hold a motor off.
pub trait SimpleMotor {
    fn name(&self) -> &str;
    /// Duty cycle in [-1, 1]; out-of-range values are clipped.
    fn set_percent_output(&mut self, value: f64) -> Result<()>;
    fn enable(&mut self) -> Result<()>;
    fn disable(&mut self) -> Result<()>;
    fn is_enabled(&self) -> bool;
}

/// Something whose behaviour depends on the gearbox gear.
pub trait Shiftable {
    fn gear(&self) -> GearId;
    /// Install the profile for `gear`. Unknown gears are a lookup error and
    /// leave the current profile in place.
    fn set_gear(&mut self, gear: GearId) -> Result<()>;
    fn supports_gear(&self, gear: GearId) -> bool;
}

pub trait SmartMotor: SimpleMotor + Shiftable {
    fn device_id(&self) -> i32;
    fn kind(&self) -> ControllerKind;
    fn control_mode(&self) -> ControlMode;
    /// Last commanded setpoint in the units of the current control mode.
    fn setpoint(&self) -> Option<f64>;

    fn active_profile(&self) -> &PerGearProfile;
    fn profile_for(&self, gear: GearId) -> Option<&PerGearProfile>;
    /// Device ramp in seconds from neutral to full output.
    fn ramp_seconds(&self) -> f64;
    /// Post-encoder gearing of the active gear.
    fn gearing(&self) -> f64;

    /// Scaled velocity in [-1, 1]. Scales by the active gear's max speed, or
    /// falls back to percent output when the gear has none.
    fn set_velocity(&mut self, value: f64) -> Result<()>;
    /// Like `set_velocity`, scaled by `gear`'s max speed.
    fn set_gear_scaled_velocity(&mut self, value: f64, gear: GearId) -> Result<()>;
    /// Closed-loop velocity in units per second.
    fn set_velocity_units(&mut self, units_per_sec: f64) -> Result<()>;
    /// Closed-loop position in units.
    fn set_position(&mut self, units: f64) -> Result<()>;
    fn set_voltage(&mut self, volts: f64) -> Result<()>;
    /// Periodic work (software control loops). Call once per main loop.
    fn update(&mut self) -> Result<()>;

    fn encoder_to_unit(&self, native: f64) -> f64;
    fn unit_to_encoder(&self, units: f64) -> f64;
    fn encoder_to_velocity_unit(&self, native: f64) -> f64;
    fn velocity_unit_to_encoder(&self, units_per_sec: f64) -> f64;

    fn position(&self) -> Result<f64>;
    fn velocity(&self) -> Result<f64>;
    fn reset_position(&mut self) -> Result<()>;
    fn output_voltage(&self) -> Result<f64>;
    fn bus_voltage(&self) -> Result<f64>;
    fn output_current(&self) -> Result<f64>;
    /// Always false when the switch is not configured.
    fn limit_switch(&self, dir: LimitDirection) -> Result<bool>;
    fn fault(&self, fault: Fault) -> Result<bool>;

    /// Sample (output current, output voltage) into the electrical model, if any.
    fn update_electrical_model(&mut self) -> Result<()>;
    /// Winding resistance in ohms, when the model has a confident fit.
    fn resistance_estimate(&self) -> Option<f64>;
}

/// What differs between controller families.
pub trait ControllerFamily {
    fn kind(&self) -> ControllerKind;
    fn native_scale(&self) -> NativeScale;
    fn supports_limit_inputs(&self) -> bool {
        true
    }
    /// Push a profile's gains and ramp to wherever the closed loop runs.
    fn apply_profile(
        &mut self,
        device: &mut dyn MotorDevice,
        profile: &PerGearProfile,
        ramp_secs: f64,
    ) -> PortResult<()>;
    fn command_velocity(
        &mut self,
        device: &mut dyn MotorDevice,
        native: f64,
        arb_ff_volts: f64,
    ) -> PortResult<()>;
    fn command_position(&mut self, device: &mut dyn MotorDevice, native: f64) -> PortResult<()>;
    /// An open-loop command replaced any closed-loop target.
    fn release(&mut self) {}
    fn tick(&mut self, _device: &mut dyn MotorDevice) -> PortResult<()> {
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ElectricalModel {
    pub window: usize,
    pub r2_threshold: f64,
}

/// Runtime settings for one motor.
#[derive(Debug, Clone)]
pub struct MotorSettings {
    pub name: String,
    pub kind: ControllerKind,
    /// Required by `Talon` and `Wrapped`.
    pub encoder_cpr: Option<u32>,
    pub inverted: bool,
    pub idle_mode: IdleMode,
    /// Default gearing for profiles without their own.
    pub post_encoder_gearing: f64,
    pub units_per_rotation: f64,
    pub current_limit: Option<u32>,
    pub voltage_compensation: Option<f64>,
    pub starting_gear: Option<GearId>,
    pub fwd_limit: Option<LimitPolarity>,
    pub rev_limit: Option<LimitPolarity>,
    /// Physical units.
    pub fwd_soft_limit: Option<f64>,
    pub rev_soft_limit: Option<f64>,
    pub profiles: Vec<PerGearProfile>,
    pub electrical: Option<ElectricalModel>,
}

impl MotorSettings {
    pub fn new(name: impl Into<String>, kind: ControllerKind) -> Self {
        Self {
            name: name.into(),
            kind,
            encoder_cpr: None,
            inverted: false,
            idle_mode: IdleMode::Coast,
            post_encoder_gearing: 1.0,
            units_per_rotation: 1.0,
            current_limit: None,
            voltage_compensation: Some(crate::util::NOMINAL_VOLTS),
            starting_gear: None,
            fwd_limit: None,
            rev_limit: None,
            fwd_soft_limit: None,
            rev_soft_limit: None,
            profiles: Vec::new(),
            electrical: None,
        }
    }

    #[must_use]
    pub fn with_profile(mut self, profile: PerGearProfile) -> Self {
        self.profiles.push(profile);
        self
    }

    #[must_use]
    pub fn with_encoder_cpr(mut self, cpr: u32) -> Self {
        self.encoder_cpr = Some(cpr);
        self
    }

    #[must_use]
    pub fn with_gearing(mut self, post_encoder_gearing: f64, units_per_rotation: f64) -> Self {
        self.post_encoder_gearing = post_encoder_gearing;
        self.units_per_rotation = units_per_rotation;
        self
    }
}

/// Facade over one controller.
pub struct Motor<D, F> {
    name: String,
    device: D,
    family: F,
    profiles: ProfileSet,
    active: GearId,
    default_gearing: f64,
    converter: UnitConverter,
    ramp_secs: f64,
    fwd_soft_limit: Option<f64>,
    rev_soft_limit: Option<f64>,
    setpoint: Option<f64>,
    mode: ControlMode,
    enabled: bool,
    electrical: Option<RunningLinReg>,
}

impl<D, F> core::fmt::Debug for Motor<D, F> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Motor")
            .field("name", &self.name)
            .field("gear", &self.active)
            .field("mode", &self.mode)
            .field("setpoint", &self.setpoint)
            .field("enabled", &self.enabled)
            .finish_non_exhaustive()
    }
}

fn positive(v: f64) -> bool {
    v.is_finite() && v > 0.0
}

impl<D: MotorDevice, F: ControllerFamily> Motor<D, F> {
    /// Configure `device` from `settings` and install the starting gear.
    pub fn new(mut device: D, family: F, settings: MotorSettings) -> Result<Self> {
        let profiles = ProfileSet::from_profiles(settings.profiles)?;
        if !positive(settings.post_encoder_gearing)
            || !positive(settings.units_per_rotation)
            || profiles
                .iter()
                .filter_map(PerGearProfile::post_encoder_gearing)
                .any(|g| !positive(g))
        {
            return Err(BuildError::InvalidConfig("gearing and units per rotation must be > 0").into());
        }
        let has_limit_inputs = settings.fwd_limit.is_some()
            || settings.rev_limit.is_some()
            || settings.fwd_soft_limit.is_some()
            || settings.rev_soft_limit.is_some();
        if has_limit_inputs && !family.supports_limit_inputs() {
            return Err(BuildError::InvalidConfig(
                "this controller family does not support limit switches or soft limits",
            )
            .into());
        }
        let start = match settings.starting_gear {
            Some(g) if profiles.contains(g) => g,
            Some(g) => return Err(BuildError::UnknownStartingGear(g).into()),
            None => profiles.lowest(),
        };

        device.set_inverted(settings.inverted).map_err(|e| port_err(&e))?;
        device.set_idle_mode(settings.idle_mode).map_err(|e| port_err(&e))?;
        if family.supports_limit_inputs() {
            device
                .configure_limit_switch(LimitDirection::Forward, settings.fwd_limit)
                .map_err(|e| port_err(&e))?;
            device
                .configure_limit_switch(LimitDirection::Reverse, settings.rev_limit)
                .map_err(|e| port_err(&e))?;
        }
        if let Some(amps) = settings.current_limit {
            device.set_current_limit(amps).map_err(|e| port_err(&e))?;
        }
        device
            .set_voltage_compensation(settings.voltage_compensation)
            .map_err(|e| port_err(&e))?;

        let converter = UnitConverter::new(
            family.native_scale(),
            settings.post_encoder_gearing,
            settings.units_per_rotation,
        );
        let mut motor = Self {
            name: settings.name,
            device,
            family,
            profiles,
            active: start,
            default_gearing: settings.post_encoder_gearing,
            converter,
            ramp_secs: 0.0,
            fwd_soft_limit: settings.fwd_soft_limit,
            rev_soft_limit: settings.rev_soft_limit,
            setpoint: None,
            mode: ControlMode::Voltage,
            enabled: true,
            electrical: settings
                .electrical
                .map(|m| RunningLinReg::new(m.window, m.r2_threshold)),
        };
        if let Some(profile) = motor.profiles.get(start).cloned() {
            motor.install(&profile)?;
        }
        tracing::debug!(motor = %motor.name, gear = start, kind = ?motor.family.kind(), "motor configured");
        Ok(motor)
    }

    /// Handle to the underlying device port.
    pub const fn device(&self) -> &D {
        &self.device
    }

    fn lookup(&self, gear: GearId) -> Result<&PerGearProfile> {
        self.profiles.get(gear).ok_or_else(|| {
            eyre::Report::new(ShiftError::UnknownGear {
                motor: self.name.clone(),
                gear,
            })
        })
    }

    /// Write a profile to the device and commit it locally only once every
    /// write has been accepted.
    fn install(&mut self, profile: &PerGearProfile) -> Result<()> {
        let gearing = profile
            .post_encoder_gearing()
            .unwrap_or(self.default_gearing);
        let ramp = ramp_seconds(profile.ramp_rate());
        let converter = self.converter.with_gearing(gearing);

        self.family
            .apply_profile(&mut self.device, profile, ramp)
            .map_err(|e| port_err(&e))?;
        if self.family.supports_limit_inputs() {
            for (dir, limit) in [
                (LimitDirection::Forward, self.fwd_soft_limit),
                (LimitDirection::Reverse, self.rev_soft_limit),
            ] {
                self.device
                    .set_soft_limit(dir, limit.map(|u| converter.unit_to_encoder(u)))
                    .map_err(|e| port_err(&e))?;
            }
        }

        self.active = profile.gear();
        self.converter = converter;
        self.ramp_secs = ramp;
        Ok(())
    }

    /// Record an open-loop or closed-loop command; write it only while enabled.
    fn command(
        &mut self,
        mode: ControlMode,
        setpoint: f64,
        write: impl FnOnce(&mut D, &mut F) -> PortResult<()>,
    ) -> Result<()> {
        self.mode = mode;
        self.setpoint = Some(setpoint);
        if !self.enabled {
            return Ok(());
        }
        write(&mut self.device, &mut self.family).map_err(|e| port_err(&e))
    }

    fn scaled_velocity(&mut self, value: f64, max_speed: Option<f64>) -> Result<()> {
        match max_speed {
            Some(max) => {
                let (v, _) = clamp_unit(value);
                self.set_velocity_units(v * max)
            }
            None => self.set_percent_output(value),
        }
    }
}

impl<D: MotorDevice, F: ControllerFamily> SimpleMotor for Motor<D, F> {
    fn name(&self) -> &str {
        &self.name
    }

    fn set_percent_output(&mut self, value: f64) -> Result<()> {
        let (duty, clipped) = clamp_unit(value);
        if clipped {
            tracing::warn!(motor = %self.name, requested = value, applied = duty, "percent output out of range, clipped");
        }
        self.family.release();
        self.command(ControlMode::Voltage, duty, |dev, _| dev.set_duty_cycle(duty))
    }

    fn enable(&mut self) -> Result<()> {
        if self.enabled {
            return Ok(());
        }
        self.device.enable().map_err(|e| port_err(&e))?;
        self.enabled = true;
        Ok(())
    }

    fn disable(&mut self) -> Result<()> {
        self.device.disable().map_err(|e| port_err(&e))?;
        self.enabled = false;
        Ok(())
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }
}

impl<D: MotorDevice, F: ControllerFamily> Shiftable for Motor<D, F> {
    fn gear(&self) -> GearId {
        self.active
    }

    fn set_gear(&mut self, gear: GearId) -> Result<()> {
        let profile = self.lookup(gear)?.clone();
        let previous = self.active;
        if let Err(e) = self.install(&profile) {
            if let Some(prev) = self.profiles.get(previous).cloned()
                && let Err(restore) = self.install(&prev)
            {
                tracing::warn!(motor = %self.name, gear = previous, error = %restore, "failed to restore previous gear profile");
            }
            return Err(e.wrap_err(format!("switch '{}' to gear {gear}", self.name)));
        }
        tracing::debug!(motor = %self.name, from = previous, to = gear, "gear profile installed");
        Ok(())
    }

    fn supports_gear(&self, gear: GearId) -> bool {
        self.profiles.contains(gear)
    }
}

impl<D: MotorDevice, F: ControllerFamily> SmartMotor for Motor<D, F> {
    fn device_id(&self) -> i32 {
        self.device.device_id()
    }

    fn kind(&self) -> ControllerKind {
        self.family.kind()
    }

    fn control_mode(&self) -> ControlMode {
        if self.enabled {
            self.mode
        } else {
            ControlMode::Disabled
        }
    }

    fn setpoint(&self) -> Option<f64> {
        self.setpoint
    }

    fn active_profile(&self) -> &PerGearProfile {
        // `active` is only ever set from a profile in the set.
        self.profiles
            .get(self.active)
            .or_else(|| self.profiles.iter().next())
            .unwrap_or(&DEFAULT_PROFILE)
    }

    fn profile_for(&self, gear: GearId) -> Option<&PerGearProfile> {
        self.profiles.get(gear)
    }

    fn ramp_seconds(&self) -> f64 {
        self.ramp_secs
    }

    fn gearing(&self) -> f64 {
        self.converter.gearing
    }

    fn set_velocity(&mut self, value: f64) -> Result<()> {
        let max = self.active_profile().max_speed();
        self.scaled_velocity(value, max)
    }

    fn set_gear_scaled_velocity(&mut self, value: f64, gear: GearId) -> Result<()> {
        let max = self.lookup(gear)?.max_speed();
        self.scaled_velocity(value, max)
    }

    fn set_velocity_units(&mut self, units_per_sec: f64) -> Result<()> {
        let native = self.converter.velocity_unit_to_encoder(units_per_sec);
        let ff = self
            .active_profile()
            .feed_forward()
            .map_or(0.0, |ff| ff.calculate(units_per_sec, 0.0));
        self.command(ControlMode::Velocity, units_per_sec, |dev, fam| {
            fam.command_velocity(dev, native, ff)
        })
    }

    fn set_position(&mut self, units: f64) -> Result<()> {
        let native = self.converter.unit_to_encoder(units);
        self.command(ControlMode::Position, units, |dev, fam| {
            fam.command_position(dev, native)
        })
    }

    fn set_voltage(&mut self, volts: f64) -> Result<()> {
        self.family.release();
        self.command(ControlMode::Voltage, volts, |dev, _| dev.set_voltage(volts))
    }

    fn update(&mut self) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }
        self.family
            .tick(&mut self.device)
            .map_err(|e| port_err(&e))
    }

    fn encoder_to_unit(&self, native: f64) -> f64 {
        self.converter.encoder_to_unit(native)
    }

    fn unit_to_encoder(&self, units: f64) -> f64 {
        self.converter.unit_to_encoder(units)
    }

    fn encoder_to_velocity_unit(&self, native: f64) -> f64 {
        self.converter.encoder_to_velocity_unit(native)
    }

    fn velocity_unit_to_encoder(&self, units_per_sec: f64) -> f64 {
        self.converter.velocity_unit_to_encoder(units_per_sec)
    }

    fn position(&self) -> Result<f64> {
        let native = self.device.position_native().map_err(|e| port_err(&e))?;
        Ok(self.converter.encoder_to_unit(native))
    }

    fn velocity(&self) -> Result<f64> {
        let native = self.device.velocity_native().map_err(|e| port_err(&e))?;
        Ok(self.converter.encoder_to_velocity_unit(native))
    }

    fn reset_position(&mut self) -> Result<()> {
        self.device.reset_position().map_err(|e| port_err(&e))
    }

    fn output_voltage(&self) -> Result<f64> {
        let applied = self.device.applied_output().map_err(|e| port_err(&e))?;
        Ok(applied * self.bus_voltage()?)
    }

    fn bus_voltage(&self) -> Result<f64> {
        self.device.bus_voltage().map_err(|e| port_err(&e))
    }

    fn output_current(&self) -> Result<f64> {
        self.device.output_current().map_err(|e| port_err(&e))
    }

    fn limit_switch(&self, dir: LimitDirection) -> Result<bool> {
        if !self.family.supports_limit_inputs() {
            return Ok(false);
        }
        self.device.limit_switch(dir).map_err(|e| port_err(&e))
    }

    fn fault(&self, fault: Fault) -> Result<bool> {
        self.device.fault(fault).map_err(|e| port_err(&e))
    }

    fn update_electrical_model(&mut self) -> Result<()> {
        if self.electrical.is_none() {
            return Ok(());
        }
        let current = self.output_current()?;
        let volts = self.output_voltage()?;
        if let Some(model) = self.electrical.as_mut() {
            model.add_point(current, volts);
        }
        Ok(())
    }

    fn resistance_estimate(&self) -> Option<f64> {
        self.electrical.as_ref().and_then(RunningLinReg::slope)
    }
}

static DEFAULT_PROFILE: PerGearProfile = PerGearProfile::zeroed(0);

/// Construct the facade for `settings.kind` over `device`.
pub fn build_smart_motor<D>(
    device: D,
    settings: MotorSettings,
    clock: Arc<dyn Clock + Send + Sync>,
) -> Result<Box<dyn SmartMotor + Send>>
where
    D: MotorDevice + Send + 'static,
{
    let encoder_cpr = settings.encoder_cpr.filter(|c| *c > 0);
    let cpr = || {
        encoder_cpr.ok_or_else(|| {
            eyre::Report::new(BuildError::InvalidConfig(
                "encoder_cpr is required for talon and wrapped motors",
            ))
        })
    };
    Ok(match settings.kind {
        ControllerKind::SparkMax => Box::new(Motor::new(device, SparkMax, settings)?),
        ControllerKind::Talon => {
            let family = Talon::new(cpr()?);
            Box::new(Motor::new(device, family, settings)?)
        }
        ControllerKind::Wrapped => {
            let family = Wrapped::new(cpr()?, clock);
            Box::new(Motor::new(device, family, settings)?)
        }
    })
}
