//! Debounced "at speed" condition, used for flywheel-style mechanisms.
use crate::debounce::SampleDebouncer;
use crate::error::{BuildError, Result};
use crate::motor::SmartMotor;

/// Allowed speed error.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Tolerance {
    /// Units per second.
    Absolute(f64),
    /// Fraction of the target speed.
    Relative(f64),
}

impl Tolerance {
    /// Exactly one of `abs` and `rel` must be given.
    pub fn from_options(
        abs: Option<f64>,
        rel: Option<f64>,
    ) -> core::result::Result<Self, BuildError> {
        match (abs, rel) {
            (Some(_), Some(_)) => Err(BuildError::ConflictingTolerance),
            (None, None) => Err(BuildError::MissingTolerance),
            (Some(a), None) => Ok(Self::Absolute(a.abs())),
            (None, Some(r)) => Ok(Self::Relative(r.abs())),
        }
    }

    fn allows(self, speed: f64, target: f64) -> bool {
        let err = (speed - target).abs();
        match self {
            Self::Absolute(t) => err <= t,
            Self::Relative(r) => err <= r * target.abs(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SpeedReadiness {
    tolerance: Tolerance,
    target: Option<f64>,
    debouncer: SampleDebouncer,
}

impl SpeedReadiness {
    pub fn new(tolerance: Tolerance, samples: usize) -> Self {
        Self {
            tolerance,
            target: None,
            debouncer: SampleDebouncer::new(samples),
        }
    }

    /// Target speed in units per second; `None` turns the mechanism off and
    /// readiness stays false. Changing the target restarts the debounce.
    pub fn set_target(&mut self, target: Option<f64>) {
        if self.target != target {
            self.debouncer.reset();
        }
        self.target = target;
    }

    pub const fn target(&self) -> Option<f64> {
        self.target
    }

    /// Record one speed observation and return readiness.
    pub fn observe(&mut self, speed: f64) -> bool {
        let Some(target) = self.target else {
            return false;
        };
        self.debouncer.update(self.tolerance.allows(speed, target))
    }

    /// Sample `motor`'s velocity.
    pub fn update(&mut self, motor: &dyn SmartMotor) -> Result<bool> {
        let speed = motor.velocity()?;
        Ok(self.observe(speed))
    }

    pub fn is_ready(&self) -> bool {
        self.target.is_some() && self.debouncer.value()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_tolerance_scales_with_target() {
        let t = Tolerance::Relative(0.1);
        assert!(t.allows(95.0, 100.0));
        assert!(!t.allows(85.0, 100.0));
        assert!(t.allows(9.5, 10.0));
    }

    #[test]
    fn no_target_is_never_ready() {
        let mut r = SpeedReadiness::new(Tolerance::Absolute(1.0), 1);
        assert!(!r.observe(0.0));
        assert!(!r.is_ready());
    }
}
