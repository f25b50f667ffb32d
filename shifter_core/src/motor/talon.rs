//! Controllers with a quadrature encoder that count edges and report
//! velocity per 100 ms. Gains are stored on the device.
use shifter_traits::{MotorDevice, PortResult};

use super::{ControllerFamily, ControllerKind};
use crate::profile::PerGearProfile;
use crate::units::NativeScale;

#[derive(Debug, Clone, Copy)]
pub struct Talon {
    encoder_cpr: u32,
}

impl Talon {
    /// `encoder_cpr` is encoder lines per rotation; the device counts 4 edges per line.
    pub const fn new(encoder_cpr: u32) -> Self {
        Self { encoder_cpr }
    }
}

impl ControllerFamily for Talon {
    fn kind(&self) -> ControllerKind {
        ControllerKind::Talon
    }

    fn native_scale(&self) -> NativeScale {
        NativeScale::quadrature(self.encoder_cpr)
    }

    fn apply_profile(
        &mut self,
        device: &mut dyn MotorDevice,
        profile: &PerGearProfile,
        ramp_secs: f64,
    ) -> PortResult<()> {
        let (kp, ki, kd) = profile.pid();
        device.set_pid(kp, ki, kd)?;
        device.set_ramp_seconds(ramp_secs)
    }

    fn command_velocity(
        &mut self,
        device: &mut dyn MotorDevice,
        native: f64,
        arb_ff_volts: f64,
    ) -> PortResult<()> {
        device.set_velocity_native(native, arb_ff_volts)
    }

    fn command_position(&mut self, device: &mut dyn MotorDevice, native: f64) -> PortResult<()> {
        // Position loop runs without feed-forward on this family.
        device.set_position_native(native)
    }
}
