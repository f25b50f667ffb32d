//! Test and helper mocks for shifter_core.
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::Result;
use crate::motor::{Shiftable, SimpleMotor};
use crate::profile::GearId;

/// What a `ProbeMotor` has been asked to do.
#[derive(Debug, Default, Clone)]
pub struct ProbeLog {
    pub enabled: bool,
    pub enable_calls: usize,
    pub disable_calls: usize,
    pub gears: Vec<GearId>,
    pub outputs: Vec<f64>,
}

/// Gear-aware motor stand-in that records every call. Clones share the log.
#[derive(Debug, Clone)]
pub struct ProbeMotor {
    name: String,
    supported: Vec<GearId>,
    gear: GearId,
    log: Arc<Mutex<ProbeLog>>,
}

impl ProbeMotor {
    /// Probe supporting gears 1 and 2, starting enabled in gear 1.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_gears(name, &[1, 2])
    }

    pub fn with_gears(name: impl Into<String>, gears: &[GearId]) -> Self {
        Self {
            name: name.into(),
            supported: gears.to_vec(),
            gear: gears.first().copied().unwrap_or(0),
            log: Arc::new(Mutex::new(ProbeLog {
                enabled: true,
                ..ProbeLog::default()
            })),
        }
    }

    pub fn log(&self) -> ProbeLog {
        self.log.lock().clone()
    }
}

impl SimpleMotor for ProbeMotor {
    fn name(&self) -> &str {
        &self.name
    }

    fn set_percent_output(&mut self, value: f64) -> Result<()> {
        self.log.lock().outputs.push(value);
        Ok(())
    }

    fn enable(&mut self) -> Result<()> {
        let mut log = self.log.lock();
        log.enabled = true;
        log.enable_calls += 1;
        Ok(())
    }

    fn disable(&mut self) -> Result<()> {
        let mut log = self.log.lock();
        log.enabled = false;
        log.disable_calls += 1;
        Ok(())
    }

    fn is_enabled(&self) -> bool {
        self.log.lock().enabled
    }
}

impl Shiftable for ProbeMotor {
    fn gear(&self) -> GearId {
        self.gear
    }

    fn set_gear(&mut self, gear: GearId) -> Result<()> {
        if !self.supported.contains(&gear) {
            return Err(crate::error::ShiftError::UnknownGear {
                motor: self.name.clone(),
                gear,
            }
            .into());
        }
        self.gear = gear;
        self.log.lock().gears.push(gear);
        Ok(())
    }

    fn supports_gear(&self, gear: GearId) -> bool {
        self.supported.contains(&gear)
    }
}
