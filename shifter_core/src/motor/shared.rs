//! Shared handle to a boxed facade.
//!
//! The device context, the shift controller and the main loop all need the
//! same motor. `SharedMotor` is a cheap clone around one mutex-guarded
//! `SmartMotor` and itself implements `SimpleMotor` and `Shiftable`, so it
//! can be registered with a shift controller directly.
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};

use super::{Shiftable, SimpleMotor, SmartMotor};
use crate::error::Result;
use crate::profile::GearId;

pub type BoxedMotor = Box<dyn SmartMotor + Send>;

#[derive(Clone)]
pub struct SharedMotor {
    name: Arc<str>,
    inner: Arc<Mutex<BoxedMotor>>,
}

impl core::fmt::Debug for SharedMotor {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_tuple("SharedMotor").field(&self.name).finish()
    }
}

impl SharedMotor {
    pub fn new(motor: BoxedMotor) -> Self {
        Self {
            name: Arc::from(motor.name()),
            inner: Arc::new(Mutex::new(motor)),
        }
    }

    /// Exclusive access to the facade for the lifetime of the guard.
    pub fn lock(&self) -> MutexGuard<'_, BoxedMotor> {
        self.inner.lock()
    }

    pub fn with<R>(&self, f: impl FnOnce(&mut dyn SmartMotor) -> R) -> R {
        let mut guard = self.inner.lock();
        f(&mut **guard)
    }
}

impl SimpleMotor for SharedMotor {
    fn name(&self) -> &str {
        &self.name
    }

    fn set_percent_output(&mut self, value: f64) -> Result<()> {
        self.inner.lock().set_percent_output(value)
    }

    fn enable(&mut self) -> Result<()> {
        self.inner.lock().enable()
    }

    fn disable(&mut self) -> Result<()> {
        self.inner.lock().disable()
    }

    fn is_enabled(&self) -> bool {
        self.inner.lock().is_enabled()
    }
}

impl Shiftable for SharedMotor {
    fn gear(&self) -> GearId {
        self.inner.lock().gear()
    }

    fn set_gear(&mut self, gear: GearId) -> Result<()> {
        self.inner.lock().set_gear(gear)
    }

    fn supports_gear(&self, gear: GearId) -> bool {
        self.inner.lock().supports_gear(gear)
    }
}
