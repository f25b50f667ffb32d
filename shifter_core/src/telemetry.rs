//! Serializable motor snapshots.
use serde::Serialize;
use shifter_traits::{Fault, LimitDirection};

use crate::error::Result;
use crate::motor::{ControlMode, ControllerKind, SmartMotor};
use crate::profile::GearId;

const ALL_FAULTS: [Fault; 6] = [
    Fault::HardLimitForward,
    Fault::HardLimitReverse,
    Fault::SoftLimitForward,
    Fault::SoftLimitReverse,
    Fault::OverCurrent,
    Fault::UnderVoltage,
];

pub const fn fault_name(f: Fault) -> &'static str {
    match f {
        Fault::HardLimitForward => "hard_limit_forward",
        Fault::HardLimitReverse => "hard_limit_reverse",
        Fault::SoftLimitForward => "soft_limit_forward",
        Fault::SoftLimitReverse => "soft_limit_reverse",
        Fault::OverCurrent => "over_current",
        Fault::UnderVoltage => "under_voltage",
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MotorTelemetry {
    pub name: String,
    pub device_id: i32,
    pub kind: ControllerKind,
    pub gear: GearId,
    pub mode: ControlMode,
    pub setpoint: Option<f64>,
    pub position: f64,
    pub velocity: f64,
    pub output_voltage: f64,
    pub bus_voltage: f64,
    pub output_current: f64,
    pub fwd_limit: bool,
    pub rev_limit: bool,
    pub faults: Vec<&'static str>,
    pub resistance_ohms: Option<f64>,
}

impl MotorTelemetry {
    /// Read every telemetry channel. Reads have no side effects on the motor.
    pub fn capture(motor: &dyn SmartMotor) -> Result<Self> {
        let mut faults = Vec::new();
        for f in ALL_FAULTS {
            if motor.fault(f)? {
                faults.push(fault_name(f));
            }
        }
        Ok(Self {
            name: motor.name().to_owned(),
            device_id: motor.device_id(),
            kind: motor.kind(),
            gear: motor.gear(),
            mode: motor.control_mode(),
            setpoint: motor.setpoint(),
            position: motor.position()?,
            velocity: motor.velocity()?,
            output_voltage: motor.output_voltage()?,
            bus_voltage: motor.bus_voltage()?,
            output_current: motor.output_current()?,
            fwd_limit: motor.limit_switch(LimitDirection::Forward)?,
            rev_limit: motor.limit_switch(LimitDirection::Reverse)?,
            faults,
            resistance_ohms: motor.resistance_estimate(),
        })
    }
}
