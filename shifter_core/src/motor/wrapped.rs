//! Plain controllers paired with an external encoder.
//!
//! The device only takes voltage, so the closed loop runs here: every
//! `tick` reads the encoder, runs a PID on the error in native counts and
//! writes PID output plus feed-forward as a voltage.
use std::sync::Arc;
use std::time::Instant;

use shifter_traits::{Clock, MotorDevice, PortResult};

use super::{ControllerFamily, ControllerKind};
use crate::profile::PerGearProfile;
use crate::units::NativeScale;
use crate::util::NOMINAL_VOLTS;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Target {
    Velocity { native: f64, arb_ff_volts: f64 },
    Position { native: f64 },
}

#[derive(Debug, Clone, Default)]
struct Pid {
    kp: f64,
    ki: f64,
    kd: f64,
    integral: f64,
    prev_error: Option<f64>,
}

impl Pid {
    fn set_gains(&mut self, (kp, ki, kd): (f64, f64, f64)) {
        self.kp = kp;
        self.ki = ki;
        self.kd = kd;
        self.reset();
    }

    fn reset(&mut self) {
        self.integral = 0.0;
        self.prev_error = None;
    }

    fn calculate(&mut self, error: f64, dt_secs: f64) -> f64 {
        let mut derivative = 0.0;
        if dt_secs > 0.0 {
            self.integral += error * dt_secs;
            if let Some(prev) = self.prev_error {
                derivative = (error - prev) / dt_secs;
            }
        }
        self.prev_error = Some(error);
        self.kp * error + self.ki * self.integral + self.kd * derivative
    }
}

pub struct Wrapped {
    encoder_cpr: u32,
    pid: Pid,
    target: Option<Target>,
    clock: Arc<dyn Clock + Send + Sync>,
    last_tick: Option<Instant>,
}

impl core::fmt::Debug for Wrapped {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Wrapped")
            .field("encoder_cpr", &self.encoder_cpr)
            .field("target", &self.target)
            .finish_non_exhaustive()
    }
}

impl Wrapped {
    pub fn new(encoder_cpr: u32, clock: Arc<dyn Clock + Send + Sync>) -> Self {
        Self {
            encoder_cpr,
            pid: Pid::default(),
            target: None,
            clock,
            last_tick: None,
        }
    }

    fn start(&mut self, device: &mut dyn MotorDevice, target: Target) -> PortResult<()> {
        if self.target.as_ref().map(std::mem::discriminant) != Some(std::mem::discriminant(&target)) {
            self.pid.reset();
            self.last_tick = None;
        }
        self.target = Some(target);
        self.drive(device)
    }

    fn drive(&mut self, device: &mut dyn MotorDevice) -> PortResult<()> {
        let Some(target) = self.target else {
            return Ok(());
        };
        let now = self.clock.now();
        let dt = self
            .last_tick
            .map_or(0.0, |t| now.saturating_duration_since(t).as_secs_f64());
        self.last_tick = Some(now);

        let (error, ff) = match target {
            Target::Velocity {
                native,
                arb_ff_volts,
            } => (native - device.velocity_native()?, arb_ff_volts),
            Target::Position { native } => (native - device.position_native()?, 0.0),
        };
        let volts = (self.pid.calculate(error, dt) + ff).clamp(-NOMINAL_VOLTS, NOMINAL_VOLTS);
        device.set_voltage(volts)
    }
}

impl ControllerFamily for Wrapped {
    fn kind(&self) -> ControllerKind {
        ControllerKind::Wrapped
    }

    fn native_scale(&self) -> NativeScale {
        NativeScale::counts(self.encoder_cpr)
    }

    fn supports_limit_inputs(&self) -> bool {
        false
    }

    fn apply_profile(
        &mut self,
        device: &mut dyn MotorDevice,
        profile: &PerGearProfile,
        ramp_secs: f64,
    ) -> PortResult<()> {
        device.set_ramp_seconds(ramp_secs)?;
        self.pid.set_gains(profile.pid());
        Ok(())
    }

    fn command_velocity(
        &mut self,
        device: &mut dyn MotorDevice,
        native: f64,
        arb_ff_volts: f64,
    ) -> PortResult<()> {
        self.start(
            device,
            Target::Velocity {
                native,
                arb_ff_volts,
            },
        )
    }

    fn command_position(&mut self, device: &mut dyn MotorDevice, native: f64) -> PortResult<()> {
        self.start(device, Target::Position { native })
    }

    fn release(&mut self) {
        self.target = None;
        self.pid.reset();
        self.last_tick = None;
    }

    fn tick(&mut self, device: &mut dyn MotorDevice) -> PortResult<()> {
        self.drive(device)
    }
}
