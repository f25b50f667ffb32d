//! Per-gear control constants.
use std::collections::BTreeMap;

use serde::Serialize;

use crate::error::BuildError;
use crate::util::sign;

/// Profile key. Gear-aware mechanisms use 1 (low) and 2 (high).
pub type GearId = u8;

/// Simple motor feed-forward: `ks·sign(v) + kv·v + ka·a`, in volts.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct FeedForward {
    pub ks: f64,
    pub kv: f64,
    pub ka: f64,
}

impl FeedForward {
    pub const fn new(ks: f64, kv: f64, ka: f64) -> Self {
        Self { ks, kv, ka }
    }

    pub fn calculate(&self, velocity: f64, acceleration: f64) -> f64 {
        self.ks * sign(velocity) + self.kv * velocity + self.ka * acceleration
    }
}

/// Immutable set of control constants for one gear.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PerGearProfile {
    gear: GearId,
    kp: f64,
    ki: f64,
    kd: f64,
    ramp_rate: Option<f64>,
    max_speed: Option<f64>,
    post_encoder_gearing: Option<f64>,
    feed_forward: Option<FeedForward>,
}

impl PerGearProfile {
    pub const fn new(gear: GearId, kp: f64, ki: f64, kd: f64) -> Self {
        Self {
            gear,
            kp,
            ki,
            kd,
            ramp_rate: None,
            max_speed: None,
            post_encoder_gearing: None,
            feed_forward: None,
        }
    }

    /// Zero-gain profile used when a motor is configured without any.
    pub const fn zeroed(gear: GearId) -> Self {
        Self::new(gear, 0.0, 0.0, 0.0)
    }

    /// Volts per second.
    #[must_use]
    pub const fn with_ramp_rate(mut self, volts_per_sec: f64) -> Self {
        self.ramp_rate = Some(volts_per_sec);
        self
    }

    /// Units per second at full output.
    #[must_use]
    pub const fn with_max_speed(mut self, units_per_sec: f64) -> Self {
        self.max_speed = Some(units_per_sec);
        self
    }

    #[must_use]
    pub const fn with_post_encoder_gearing(mut self, gearing: f64) -> Self {
        self.post_encoder_gearing = Some(gearing);
        self
    }

    #[must_use]
    pub const fn with_feed_forward(mut self, ff: FeedForward) -> Self {
        self.feed_forward = Some(ff);
        self
    }

    pub const fn gear(&self) -> GearId {
        self.gear
    }

    /// (kP, kI, kD)
    pub const fn pid(&self) -> (f64, f64, f64) {
        (self.kp, self.ki, self.kd)
    }

    pub const fn ramp_rate(&self) -> Option<f64> {
        self.ramp_rate
    }

    pub const fn max_speed(&self) -> Option<f64> {
        self.max_speed
    }

    pub const fn post_encoder_gearing(&self) -> Option<f64> {
        self.post_encoder_gearing
    }

    pub const fn feed_forward(&self) -> Option<FeedForward> {
        self.feed_forward
    }
}

/// Non-empty map of profiles keyed by gear id.
#[derive(Debug, Clone)]
pub struct ProfileSet {
    profiles: BTreeMap<GearId, PerGearProfile>,
}

impl ProfileSet {
    /// Build from a list of profiles. An empty list yields a single zeroed
    /// gear-0 profile; a repeated gear id is rejected.
    pub fn from_profiles(
        profiles: impl IntoIterator<Item = PerGearProfile>,
    ) -> Result<Self, BuildError> {
        let mut map = BTreeMap::new();
        for p in profiles {
            let gear = p.gear();
            if map.insert(gear, p).is_some() {
                return Err(BuildError::DuplicateGear(gear));
            }
        }
        if map.is_empty() {
            map.insert(0, PerGearProfile::zeroed(0));
        }
        Ok(Self { profiles: map })
    }

    pub fn get(&self, gear: GearId) -> Option<&PerGearProfile> {
        self.profiles.get(&gear)
    }

    pub fn contains(&self, gear: GearId) -> bool {
        self.profiles.contains_key(&gear)
    }

    /// Lowest configured gear id.
    pub fn lowest(&self) -> GearId {
        self.profiles.keys().next().copied().unwrap_or(0)
    }

    pub fn gears(&self) -> impl Iterator<Item = GearId> + '_ {
        self.profiles.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PerGearProfile> {
        self.profiles.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_set_gets_default_gear_zero() {
        let set = ProfileSet::from_profiles(Vec::new()).unwrap();
        assert_eq!(set.gears().collect::<Vec<_>>(), vec![0]);
        assert_eq!(set.get(0).unwrap().pid(), (0.0, 0.0, 0.0));
    }

    #[test]
    fn duplicate_gear_is_rejected() {
        let err = ProfileSet::from_profiles([
            PerGearProfile::new(1, 0.1, 0.0, 0.0),
            PerGearProfile::new(1, 0.2, 0.0, 0.0),
        ])
        .unwrap_err();
        assert_eq!(err, BuildError::DuplicateGear(1));
    }

    #[test]
    fn feed_forward_static_term_follows_direction() {
        let ff = FeedForward::new(0.2, 1.5, 0.0);
        assert_eq!(ff.calculate(0.0, 0.0), 0.0);
        assert!((ff.calculate(2.0, 0.0) - 3.2).abs() < 1e-12);
        assert!((ff.calculate(-2.0, 0.0) + 3.2).abs() < 1e-12);
    }

    #[test]
    fn lowest_is_smallest_id() {
        let set = ProfileSet::from_profiles([
            PerGearProfile::zeroed(2),
            PerGearProfile::zeroed(1),
        ])
        .unwrap();
        assert_eq!(set.lowest(), 1);
    }
}
