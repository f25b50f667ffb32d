//! Conversions between controller-native encoder units and physical units.
//!
//! Every function here is pure. "Gearing" is output rotations per encoder
//! rotation in the active gear; "units per rotation" is the physical distance
//! (or angle) covered by one output rotation.
use crate::util::NOMINAL_VOLTS;

/// How a controller family reports position and velocity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NativeScale {
    /// Native position counts per encoder rotation.
    pub counts_per_rev: f64,
    /// Native velocity units per encoder rotation per second.
    pub velocity_per_rps: f64,
}

impl NativeScale {
    /// Rotations and RPM.
    pub const fn revolutions() -> Self {
        Self {
            counts_per_rev: 1.0,
            velocity_per_rps: 60.0,
        }
    }

    /// Quadrature edges (4 per encoder line) and edges per 100 ms.
    pub fn quadrature(cpr: u32) -> Self {
        let edges = 4.0 * f64::from(cpr);
        Self {
            counts_per_rev: edges,
            velocity_per_rps: edges / 10.0,
        }
    }

    /// Raw counts and counts per second.
    pub fn counts(cpr: u32) -> Self {
        let c = f64::from(cpr);
        Self {
            counts_per_rev: c,
            velocity_per_rps: c,
        }
    }
}

/// Converter for one gear's worth of scalars.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UnitConverter {
    pub scale: NativeScale,
    pub gearing: f64,
    pub units_per_rotation: f64,
}

impl UnitConverter {
    pub const fn new(scale: NativeScale, gearing: f64, units_per_rotation: f64) -> Self {
        Self {
            scale,
            gearing,
            units_per_rotation,
        }
    }

    /// Same converter with a different gearing.
    #[must_use]
    pub const fn with_gearing(self, gearing: f64) -> Self {
        Self { gearing, ..self }
    }

    #[inline]
    fn units_per_rev(&self) -> f64 {
        self.gearing * self.units_per_rotation
    }

    pub fn encoder_to_unit(&self, native: f64) -> f64 {
        native / self.scale.counts_per_rev * self.units_per_rev()
    }

    pub fn unit_to_encoder(&self, units: f64) -> f64 {
        units / self.units_per_rev() * self.scale.counts_per_rev
    }

    pub fn encoder_to_velocity_unit(&self, native: f64) -> f64 {
        native / self.scale.velocity_per_rps * self.units_per_rev()
    }

    pub fn velocity_unit_to_encoder(&self, units_per_sec: f64) -> f64 {
        units_per_sec / self.units_per_rev() * self.scale.velocity_per_rps
    }
}

/// Device ramp setting for a ramp rate in volts per second: seconds from
/// neutral to full output. `None` (no ramp) maps to 0.
pub fn ramp_seconds(ramp_volts_per_sec: Option<f64>) -> f64 {
    match ramp_volts_per_sec {
        Some(r) if r > 0.0 => NOMINAL_VOLTS / r,
        _ => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spark_units_are_revolutions() {
        let c = UnitConverter::new(NativeScale::revolutions(), 0.5, 2.0);
        // One encoder rev = half an output rev = 1 unit.
        assert_eq!(c.encoder_to_unit(1.0), 1.0);
        // 60 RPM = 1 rps at the encoder.
        assert_eq!(c.encoder_to_velocity_unit(60.0), 1.0);
    }

    #[test]
    fn talon_velocity_is_per_100ms() {
        let c = UnitConverter::new(NativeScale::quadrature(256), 1.0, 1.0);
        assert_eq!(c.unit_to_encoder(1.0), 1024.0);
        assert_eq!(c.velocity_unit_to_encoder(1.0), 102.4);
    }

    #[test]
    fn ramp_translation() {
        assert_eq!(ramp_seconds(None), 0.0);
        assert_eq!(ramp_seconds(Some(24.0)), 0.5);
        assert_eq!(ramp_seconds(Some(0.0)), 0.0);
    }
}
