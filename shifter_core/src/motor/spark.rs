//! Controllers that report rotations and RPM and close the loop on the device.
use shifter_traits::{MotorDevice, PortResult};

use super::{ControllerFamily, ControllerKind};
use crate::profile::PerGearProfile;
use crate::units::NativeScale;

#[derive(Debug, Clone, Copy, Default)]
pub struct SparkMax;

impl ControllerFamily for SparkMax {
    fn kind(&self) -> ControllerKind {
        ControllerKind::SparkMax
    }

    fn native_scale(&self) -> NativeScale {
        NativeScale::revolutions()
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
        device.set_position_native(native)
    }
}
