//! Registry of constructed motors.
//!
//! The context is built once at startup and handed to whatever needs a
//! motor by name: the shifter wiring, readiness checks, telemetry.
use std::collections::BTreeMap;
use std::sync::Arc;

use shifter_config::{Config, MotorCfg, ShifterCfg};
use shifter_traits::{Clock, MotorDevice};

use crate::error::{BuildError, Result, ShiftError};
use crate::motor::shared::BoxedMotor;
use crate::motor::{MotorSettings, SharedMotor, SimpleMotor, SmartMotor, build_smart_motor};
use crate::sensor_shift::{Missing, SensorShifterBuilder, ShifterSettings};
use crate::telemetry::MotorTelemetry;

pub type BoxedDevice = Box<dyn MotorDevice + Send>;

#[derive(Debug, Default, Clone)]
pub struct DeviceContext {
    motors: BTreeMap<String, SharedMotor>,
}

impl DeviceContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build every `[[motors]]` entry, asking `make_device` for each port.
    pub fn from_config<F>(
        cfg: &Config,
        clock: Arc<dyn Clock + Send + Sync>,
        mut make_device: F,
    ) -> Result<Self>
    where
        F: FnMut(&MotorCfg) -> Result<BoxedDevice>,
    {
        let mut ctx = Self::new();
        for mcfg in &cfg.motors {
            let device = make_device(mcfg)?;
            let motor = build_smart_motor(device, MotorSettings::from(mcfg), clock.clone())
                .map_err(|e| e.wrap_err(format!("build motor '{}'", mcfg.name)))?;
            ctx.insert(motor)?;
        }
        Ok(ctx)
    }

    /// Register a motor under its own name.
    pub fn insert(&mut self, motor: BoxedMotor) -> Result<SharedMotor> {
        let name = motor.name().to_owned();
        if self.motors.contains_key(&name) {
            return Err(BuildError::DuplicateMotor(name).into());
        }
        let shared = SharedMotor::new(motor);
        self.motors.insert(name, shared.clone());
        Ok(shared)
    }

    pub fn motor(&self, name: &str) -> Result<SharedMotor> {
        self.motors
            .get(name)
            .cloned()
            .ok_or_else(|| eyre::Report::new(ShiftError::Config(format!("unknown motor '{name}'"))))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.motors.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.motors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.motors.is_empty()
    }

    /// Disable every motor. All motors are attempted; the first error is returned.
    pub fn disable_all(&self) -> Result<()> {
        let mut first_err = None;
        for m in self.motors.values() {
            if let Err(e) = m.clone().disable() {
                tracing::warn!(motor = m.name(), error = %e, "disable failed");
                first_err.get_or_insert(e);
            }
        }
        first_err.map_or(Ok(()), Err)
    }

    /// Run each motor's periodic work and sample its electrical model.
    pub fn update_all(&self) -> Result<()> {
        for m in self.motors.values() {
            m.with(|motor| -> Result<()> {
                motor.update()?;
                motor.update_electrical_model()
            })?;
        }
        Ok(())
    }

    pub fn telemetry(&self) -> Result<Vec<MotorTelemetry>> {
        self.motors
            .values()
            .map(|m| m.with(|motor: &mut dyn SmartMotor| MotorTelemetry::capture(motor)))
            .collect()
    }

    /// Shifter builder with dependents, held motors and timing taken from
    /// `cfg`. The caller still provides the valve and the sensors.
    pub fn shifter_builder(&self, cfg: &ShifterCfg) -> Result<SensorShifterBuilder<Missing>> {
        let mut builder = SensorShifterBuilder::default().with_settings(ShifterSettings::from(cfg));
        for name in &cfg.dependents {
            builder = builder.with_dependent(self.motor(name)?);
        }
        for name in &cfg.disable_while_shifting {
            builder = builder.with_motor_to_disable(self.motor(name)?);
        }
        Ok(builder)
    }
}
