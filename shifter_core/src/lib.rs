#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Motor control and gear shifting (hardware-agnostic).
//!
//! All hardware access goes through the ports in `shifter_traits`.
//!
//! ## Architecture
//!
//! - **Units**: native encoder units to physical units and back (`units`)
//! - **Profiles**: per-gear PID, ramp, max speed, gearing and feed-forward (`profile`)
//! - **Motor facade**: `SmartMotor` with one adapter per controller family (`motor`)
//! - **Debounce**: time- and count-based debounced booleans (`debounce`)
//! - **Shifting**: valve + dependents (`shift`), sensor-validated checker (`sensor_shift`)
//! - **Regression**: fixed-window streaming linear fit (`linreg`)
//! - **Context**: motors by name, telemetry (`context`, `telemetry`)

pub mod context;
pub mod conversions;
pub mod debounce;
pub mod error;
pub mod hw_error;
pub mod linreg;
pub mod mocks;
pub mod motor;
pub mod profile;
pub mod readiness;
pub mod sensor_shift;
pub mod shift;
pub mod telemetry;
pub mod units;
pub mod util;

pub use context::DeviceContext;
pub use error::{BuildError, Result, ShiftError};
pub use linreg::RunningLinReg;
pub use motor::{
    ControlMode, ControllerKind, MotorSettings, SharedMotor, Shiftable, SimpleMotor, SmartMotor,
    build_smart_motor,
};
pub use profile::{FeedForward, GearId, PerGearProfile};
pub use readiness::{SpeedReadiness, Tolerance};
pub use sensor_shift::{
    CheckerState, SensorShifter, ShiftChecker, ShiftEvent, ShifterSettings, TickOutcome,
};
pub use shift::{Gear, ShiftComponent, ValveMapping};
pub use telemetry::MotorTelemetry;
