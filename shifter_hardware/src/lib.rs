//! Device implementations for the shifter ports.
//!
//! Simulated devices are always available; GPIO-backed devices for a
//! Raspberry Pi bench rig are behind the `hardware` feature.
pub mod error;
#[cfg(all(feature = "hardware", target_os = "linux"))]
pub mod gpio;
pub mod motor;
pub mod pneumatics;

pub use motor::{SimCommand, SimMotorHandle, SimMotorState, SimulatedMotorDevice};
pub use pneumatics::{FlagSensor, PistonValve, RecordingValve, ReedSwitch, SimulatedPiston};
