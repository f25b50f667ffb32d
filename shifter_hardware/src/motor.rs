//! In-memory motor controller.
//!
//! `SimulatedMotorDevice` implements `MotorDevice` over a shared register file.
//! The paired `SimMotorHandle` lets tests and the simulator inspect what was
//! written and inject sensor readings, faults and write failures.
use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;
use shifter_traits::{
    Fault, IdleMode, LimitDirection, LimitPolarity, MotorDevice, PortResult,
};

use crate::error::HwError;

/// Last output command written to the device.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SimCommand {
    Neutral,
    Duty(f64),
    Velocity { native: f64, arb_ff_volts: f64 },
    Position(f64),
    Voltage(f64),
}

#[derive(Debug, Clone)]
pub struct SimMotorState {
    pub device_id: i32,
    pub enabled: bool,
    pub command: SimCommand,
    pub pid: (f64, f64, f64),
    pub ramp_secs: f64,
    pub current_limit: Option<u32>,
    pub fwd_soft_limit: Option<f64>,
    pub rev_soft_limit: Option<f64>,
    pub fwd_limit_polarity: Option<LimitPolarity>,
    pub rev_limit_polarity: Option<LimitPolarity>,
    pub fwd_limit_pressed: bool,
    pub rev_limit_pressed: bool,
    pub inverted: bool,
    pub idle_mode: IdleMode,
    pub voltage_comp: Option<f64>,
    pub position: f64,
    pub velocity: f64,
    pub bus_voltage: f64,
    pub output_current: f64,
    pub faults: HashSet<Fault>,
    pub enable_calls: usize,
    pub disable_calls: usize,
    /// Reject every write with `HwError::WriteRejected`.
    pub fail_writes: bool,
    /// Velocity reading follows velocity setpoints instantly.
    pub ideal_tracking: bool,
}

impl SimMotorState {
    fn new(device_id: i32) -> Self {
        Self {
            device_id,
            enabled: true,
            command: SimCommand::Neutral,
            pid: (0.0, 0.0, 0.0),
            ramp_secs: 0.0,
            current_limit: None,
            fwd_soft_limit: None,
            rev_soft_limit: None,
            fwd_limit_polarity: None,
            rev_limit_polarity: None,
            fwd_limit_pressed: false,
            rev_limit_pressed: false,
            inverted: false,
            idle_mode: IdleMode::Coast,
            voltage_comp: None,
            position: 0.0,
            velocity: 0.0,
            bus_voltage: 12.0,
            output_current: 0.0,
            faults: HashSet::new(),
            enable_calls: 0,
            disable_calls: 0,
            fail_writes: false,
            ideal_tracking: false,
        }
    }
}

/// Simulated motor controller backed by a shared register file.
pub struct SimulatedMotorDevice {
    state: Arc<Mutex<SimMotorState>>,
}

impl SimulatedMotorDevice {
    pub fn new(device_id: i32) -> Self {
        Self {
            state: Arc::new(Mutex::new(SimMotorState::new(device_id))),
        }
    }

    /// Device whose measured velocity snaps to every velocity setpoint.
    pub fn with_ideal_tracking(self) -> Self {
        self.state.lock().ideal_tracking = true;
        self
    }

    pub fn handle(&self) -> SimMotorHandle {
        SimMotorHandle {
            state: self.state.clone(),
        }
    }

    fn write(
        &mut self,
        what: &'static str,
        f: impl FnOnce(&mut SimMotorState),
    ) -> PortResult<()> {
        let mut st = self.state.lock();
        if st.fail_writes {
            return Err(Box::new(HwError::WriteRejected {
                device: st.device_id,
                what,
            }));
        }
        f(&mut st);
        Ok(())
    }
}

impl MotorDevice for SimulatedMotorDevice {
    fn device_id(&self) -> i32 {
        self.state.lock().device_id
    }

    fn set_duty_cycle(&mut self, duty: f64) -> PortResult<()> {
        self.write("duty cycle", |st| st.command = SimCommand::Duty(duty))
    }

    fn set_velocity_native(&mut self, native: f64, arb_ff_volts: f64) -> PortResult<()> {
        self.write("velocity setpoint", |st| {
            st.command = SimCommand::Velocity {
                native,
                arb_ff_volts,
            };
            if st.ideal_tracking && st.enabled {
                st.velocity = native;
            }
        })
    }

    fn set_position_native(&mut self, native: f64) -> PortResult<()> {
        self.write("position setpoint", |st| {
            st.command = SimCommand::Position(native)
        })
    }

    fn set_voltage(&mut self, volts: f64) -> PortResult<()> {
        self.write("voltage", |st| st.command = SimCommand::Voltage(volts))
    }

    fn enable(&mut self) -> PortResult<()> {
        self.write("enable", |st| {
            st.enabled = true;
            st.enable_calls += 1;
        })
    }

    fn disable(&mut self) -> PortResult<()> {
        self.write("disable", |st| {
            st.enabled = false;
            st.disable_calls += 1;
            st.command = SimCommand::Neutral;
        })
    }

    fn set_pid(&mut self, kp: f64, ki: f64, kd: f64) -> PortResult<()> {
        self.write("pid gains", |st| st.pid = (kp, ki, kd))
    }

    fn set_ramp_seconds(&mut self, secs_to_full: f64) -> PortResult<()> {
        self.write("ramp", |st| st.ramp_secs = secs_to_full)
    }

    fn set_current_limit(&mut self, amps: u32) -> PortResult<()> {
        self.write("current limit", |st| st.current_limit = Some(amps))
    }

    fn set_soft_limit(&mut self, dir: LimitDirection, native: Option<f64>) -> PortResult<()> {
        self.write("soft limit", |st| match dir {
            LimitDirection::Forward => st.fwd_soft_limit = native,
            LimitDirection::Reverse => st.rev_soft_limit = native,
        })
    }

    fn configure_limit_switch(
        &mut self,
        dir: LimitDirection,
        polarity: Option<LimitPolarity>,
    ) -> PortResult<()> {
        self.write("limit switch", |st| match dir {
            LimitDirection::Forward => st.fwd_limit_polarity = polarity,
            LimitDirection::Reverse => st.rev_limit_polarity = polarity,
        })
    }

    fn set_inverted(&mut self, inverted: bool) -> PortResult<()> {
        self.write("inversion", |st| st.inverted = inverted)
    }

    fn set_idle_mode(&mut self, mode: IdleMode) -> PortResult<()> {
        self.write("idle mode", |st| st.idle_mode = mode)
    }

    fn set_voltage_compensation(&mut self, nominal: Option<f64>) -> PortResult<()> {
        self.write("voltage compensation", |st| st.voltage_comp = nominal)
    }

    fn position_native(&self) -> PortResult<f64> {
        Ok(self.state.lock().position)
    }

    fn velocity_native(&self) -> PortResult<f64> {
        Ok(self.state.lock().velocity)
    }

    fn reset_position(&mut self) -> PortResult<()> {
        self.write("reset position", |st| st.position = 0.0)
    }

    fn limit_switch(&self, dir: LimitDirection) -> PortResult<bool> {
        let st = self.state.lock();
        Ok(match dir {
            LimitDirection::Forward => st.fwd_limit_polarity.is_some() && st.fwd_limit_pressed,
            LimitDirection::Reverse => st.rev_limit_polarity.is_some() && st.rev_limit_pressed,
        })
    }

    fn fault(&self, fault: Fault) -> PortResult<bool> {
        Ok(self.state.lock().faults.contains(&fault))
    }

    fn bus_voltage(&self) -> PortResult<f64> {
        Ok(self.state.lock().bus_voltage)
    }

    fn applied_output(&self) -> PortResult<f64> {
        let st = self.state.lock();
        if !st.enabled {
            return Ok(0.0);
        }
        Ok(match st.command {
            SimCommand::Duty(d) => d,
            SimCommand::Voltage(v) if st.bus_voltage > 0.0 => v / st.bus_voltage,
            SimCommand::Velocity { arb_ff_volts, .. } if st.bus_voltage > 0.0 => {
                arb_ff_volts / st.bus_voltage
            }
            _ => 0.0,
        })
    }

    fn output_current(&self) -> PortResult<f64> {
        Ok(self.state.lock().output_current)
    }
}

/// Inspection and fault-injection side of a `SimulatedMotorDevice`.
#[derive(Clone)]
pub struct SimMotorHandle {
    state: Arc<Mutex<SimMotorState>>,
}

impl SimMotorHandle {
    pub fn snapshot(&self) -> SimMotorState {
        self.state.lock().clone()
    }

    pub fn set_position(&self, native: f64) {
        self.state.lock().position = native;
    }

    pub fn set_velocity(&self, native: f64) {
        self.state.lock().velocity = native;
    }

    pub fn set_bus_voltage(&self, volts: f64) {
        self.state.lock().bus_voltage = volts;
    }

    pub fn set_output_current(&self, amps: f64) {
        self.state.lock().output_current = amps;
    }

    pub fn press_limit(&self, dir: LimitDirection, pressed: bool) {
        let mut st = self.state.lock();
        match dir {
            LimitDirection::Forward => st.fwd_limit_pressed = pressed,
            LimitDirection::Reverse => st.rev_limit_pressed = pressed,
        }
    }

    pub fn set_fault(&self, fault: Fault, active: bool) {
        let mut st = self.state.lock();
        if active {
            st.faults.insert(fault);
        } else {
            st.faults.remove(&fault);
        }
    }

    pub fn fail_writes(&self, fail: bool) {
        self.state.lock().fail_writes = fail;
    }
}
