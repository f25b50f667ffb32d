//! Hardware port contracts consumed by the shifting core.
//!
//! Every port is synchronous and non-blocking: implementations are expected to
//! behave like register access on a CAN or GPIO device.
pub mod clock;

pub use clock::{Clock, MonotonicClock};

/// Error type returned across every port boundary.
pub type PortError = Box<dyn std::error::Error + Send + Sync>;
pub type PortResult<T> = Result<T, PortError>;

/// Position of a double-acting valve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValveState {
    Forward,
    Reverse,
    Off,
}

/// Two-position pneumatic actuator (double solenoid).
pub trait Actuator {
    fn set(&mut self, state: ValveState) -> PortResult<()>;
    /// Last state the valve reports being driven to.
    fn get(&self) -> PortResult<ValveState>;
}

/// Single digital input such as a reed switch.
pub trait BinarySensor {
    fn get(&self) -> PortResult<bool>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IdleMode {
    Brake,
    #[default]
    Coast,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LimitDirection {
    Forward,
    Reverse,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitPolarity {
    NormallyOpen,
    NormallyClosed,
}

/// Sticky fault flags a motor controller can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Fault {
    HardLimitForward,
    HardLimitReverse,
    SoftLimitForward,
    SoftLimitReverse,
    OverCurrent,
    UnderVoltage,
}

/// Register-level view of a motor controller. All positions and velocities are
/// in the controller's native units; the facade owns the unit conversions.
pub trait MotorDevice {
    fn device_id(&self) -> i32;

    /// Open-loop duty cycle in [-1, 1].
    fn set_duty_cycle(&mut self, duty: f64) -> PortResult<()>;
    /// Closed-loop velocity setpoint with an arbitrary feed-forward in volts.
    fn set_velocity_native(&mut self, native: f64, arb_ff_volts: f64) -> PortResult<()>;
    /// Closed-loop position setpoint.
    fn set_position_native(&mut self, native: f64) -> PortResult<()>;
    fn set_voltage(&mut self, volts: f64) -> PortResult<()>;
    fn enable(&mut self) -> PortResult<()>;
    /// Neutral output until the next command after `enable`.
    fn disable(&mut self) -> PortResult<()>;

    fn set_pid(&mut self, kp: f64, ki: f64, kd: f64) -> PortResult<()>;
    /// Seconds from neutral to full output, applied to open and closed loop. 0 disables ramping.
    fn set_ramp_seconds(&mut self, secs_to_full: f64) -> PortResult<()>;
    fn set_current_limit(&mut self, amps: u32) -> PortResult<()>;
    fn set_soft_limit(&mut self, dir: LimitDirection, native: Option<f64>) -> PortResult<()>;
    /// `None` disables the switch.
    fn configure_limit_switch(
        &mut self,
        dir: LimitDirection,
        polarity: Option<LimitPolarity>,
    ) -> PortResult<()>;
    fn set_inverted(&mut self, inverted: bool) -> PortResult<()>;
    fn set_idle_mode(&mut self, mode: IdleMode) -> PortResult<()>;
    /// Nominal voltage to compensate against, or `None` to disable compensation.
    fn set_voltage_compensation(&mut self, nominal: Option<f64>) -> PortResult<()>;

    fn position_native(&self) -> PortResult<f64>;
    fn velocity_native(&self) -> PortResult<f64>;
    fn reset_position(&mut self) -> PortResult<()>;
    fn limit_switch(&self, dir: LimitDirection) -> PortResult<bool>;
    fn fault(&self, fault: Fault) -> PortResult<bool>;
    fn bus_voltage(&self) -> PortResult<f64>;
    /// Applied output as a fraction of bus voltage.
    fn applied_output(&self) -> PortResult<f64>;
    fn output_current(&self) -> PortResult<f64>;
}

impl<T: Actuator + ?Sized> Actuator for Box<T> {
    fn set(&mut self, state: ValveState) -> PortResult<()> {
        (**self).set(state)
    }
    fn get(&self) -> PortResult<ValveState> {
        (**self).get()
    }
}

impl<T: BinarySensor + ?Sized> BinarySensor for Box<T> {
    fn get(&self) -> PortResult<bool> {
        (**self).get()
    }
}

impl<T: MotorDevice + ?Sized> MotorDevice for Box<T> {
    fn device_id(&self) -> i32 {
        (**self).device_id()
    }
    fn set_duty_cycle(&mut self, duty: f64) -> PortResult<()> {
        (**self).set_duty_cycle(duty)
    }
    fn set_velocity_native(&mut self, native: f64, arb_ff_volts: f64) -> PortResult<()> {
        (**self).set_velocity_native(native, arb_ff_volts)
    }
    fn set_position_native(&mut self, native: f64) -> PortResult<()> {
        (**self).set_position_native(native)
    }
    fn set_voltage(&mut self, volts: f64) -> PortResult<()> {
        (**self).set_voltage(volts)
    }
    fn enable(&mut self) -> PortResult<()> {
        (**self).enable()
    }
    fn disable(&mut self) -> PortResult<()> {
        (**self).disable()
    }
    fn set_pid(&mut self, kp: f64, ki: f64, kd: f64) -> PortResult<()> {
        (**self).set_pid(kp, ki, kd)
    }
    fn set_ramp_seconds(&mut self, secs_to_full: f64) -> PortResult<()> {
        (**self).set_ramp_seconds(secs_to_full)
    }
    fn set_current_limit(&mut self, amps: u32) -> PortResult<()> {
        (**self).set_current_limit(amps)
    }
    fn set_soft_limit(&mut self, dir: LimitDirection, native: Option<f64>) -> PortResult<()> {
        (**self).set_soft_limit(dir, native)
    }
    fn configure_limit_switch(
        &mut self,
        dir: LimitDirection,
        polarity: Option<LimitPolarity>,
    ) -> PortResult<()> {
        (**self).configure_limit_switch(dir, polarity)
    }
    fn set_inverted(&mut self, inverted: bool) -> PortResult<()> {
        (**self).set_inverted(inverted)
    }
    fn set_idle_mode(&mut self, mode: IdleMode) -> PortResult<()> {
        (**self).set_idle_mode(mode)
    }
    fn set_voltage_compensation(&mut self, nominal: Option<f64>) -> PortResult<()> {
        (**self).set_voltage_compensation(nominal)
    }
    fn position_native(&self) -> PortResult<f64> {
        (**self).position_native()
    }
    fn velocity_native(&self) -> PortResult<f64> {
        (**self).velocity_native()
    }
    fn reset_position(&mut self) -> PortResult<()> {
        (**self).reset_position()
    }
    fn limit_switch(&self, dir: LimitDirection) -> PortResult<bool> {
        (**self).limit_switch(dir)
    }
    fn fault(&self, fault: Fault) -> PortResult<bool> {
        (**self).fault(fault)
    }
    fn bus_voltage(&self) -> PortResult<f64> {
        (**self).bus_voltage()
    }
    fn applied_output(&self) -> PortResult<f64> {
        (**self).applied_output()
    }
    fn output_current(&self) -> PortResult<f64> {
        (**self).output_current()
    }
}
