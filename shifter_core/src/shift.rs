//! Two-speed gearbox shifting.
//!
//! `ShiftComponent` drives the shifter valve and keeps every gear-aware
//! dependent on the matching profile. It trusts the valve; sensor validation
//! lives in `sensor_shift`.
use serde::Serialize;
use shifter_traits::{Actuator, ValveState};

use crate::error::{BuildError, Result};
use crate::hw_error::port_err;
use crate::motor::Shiftable;
use crate::profile::GearId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Gear {
    Low,
    High,
}

impl Gear {
    /// Profile id dependents carry for this gear.
    pub const fn id(self) -> GearId {
        match self {
            Self::Low => 1,
            Self::High => 2,
        }
    }

    pub const fn from_id(id: GearId) -> Option<Self> {
        match id {
            1 => Some(Self::Low),
            2 => Some(Self::High),
            _ => None,
        }
    }

    pub const fn other(self) -> Self {
        match self {
            Self::Low => Self::High,
            Self::High => Self::Low,
        }
    }
}

impl core::fmt::Display for Gear {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(match self {
            Self::Low => "low",
            Self::High => "high",
        })
    }
}

/// Which valve position engages which gear.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValveMapping {
    pub low: ValveState,
    pub high: ValveState,
}

impl Default for ValveMapping {
    fn default() -> Self {
        Self {
            low: ValveState::Forward,
            high: ValveState::Reverse,
        }
    }
}

impl ValveMapping {
    pub const fn valve_for(&self, gear: Gear) -> ValveState {
        match gear {
            Gear::Low => self.low,
            Gear::High => self.high,
        }
    }

    pub fn gear_for(&self, state: ValveState) -> Option<Gear> {
        if state == self.low {
            Some(Gear::Low)
        } else if state == self.high {
            Some(Gear::High)
        } else {
            None
        }
    }
}

pub type BoxedShiftable = Box<dyn Shiftable + Send>;
pub type BoxedActuator = Box<dyn Actuator + Send>;

pub struct ShiftComponent {
    actuator: BoxedActuator,
    dependents: Vec<BoxedShiftable>,
    mapping: ValveMapping,
    gear: Gear,
}

impl core::fmt::Debug for ShiftComponent {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ShiftComponent")
            .field("gear", &self.gear)
            .field("mapping", &self.mapping)
            .field("dependents", &self.dependents.len())
            .finish_non_exhaustive()
    }
}

impl ShiftComponent {
    /// Every dependent must carry a profile for both gears. With an explicit
    /// `starting_gear` the valve is driven there; otherwise the gear is read
    /// back from the valve (a valve that is off or unreadable counts as low).
    /// Either way dependents are put on the starting gear's profile.
    pub fn new(
        mut actuator: BoxedActuator,
        dependents: Vec<BoxedShiftable>,
        mapping: ValveMapping,
        starting_gear: Option<Gear>,
    ) -> Result<Self> {
        if mapping.low == mapping.high || mapping.low == ValveState::Off || mapping.high == ValveState::Off {
            return Err(BuildError::InvalidConfig("low and high gear need distinct valve positions").into());
        }
        for gear in [Gear::Low, Gear::High] {
            if let Some(idx) = dependents.iter().position(|d| !d.supports_gear(gear.id())) {
                return Err(BuildError::UnsupportedGear {
                    motor: format!("dependent #{idx}"),
                    gear: gear.id(),
                }
                .into());
            }
        }
        let gear = match starting_gear {
            Some(g) => {
                actuator
                    .set(mapping.valve_for(g))
                    .map_err(|e| port_err(&e))?;
                g
            }
            None => match actuator.get() {
                Ok(state) => mapping.gear_for(state).unwrap_or(Gear::Low),
                Err(e) => {
                    tracing::warn!(error = %e, "cannot read shifter valve, assuming low gear");
                    Gear::Low
                }
            },
        };
        let mut this = Self {
            actuator,
            dependents,
            mapping,
            gear,
        };
        this.propagate(gear)?;
        Ok(this)
    }

    /// Drive the valve to `gear` and switch every dependent's profile.
    ///
    /// The valve is commanded first; if that fails nothing changes. A dependent
    /// that rejects the new profile does not stop the others from switching;
    /// the first such error is returned.
    pub fn shift_to_gear(&mut self, gear: Gear) -> Result<()> {
        self.actuator
            .set(self.mapping.valve_for(gear))
            .map_err(|e| port_err(&e))?;
        let from = self.gear;
        self.gear = gear;
        tracing::info!(%from, to = %gear, "shifted");
        self.propagate(gear)
    }

    fn propagate(&mut self, gear: Gear) -> Result<()> {
        let mut first_err = None;
        for dep in &mut self.dependents {
            if let Err(e) = dep.set_gear(gear.id()) {
                tracing::warn!(error = %e, %gear, "dependent failed to switch profile");
                first_err.get_or_insert(e);
            }
        }
        first_err.map_or(Ok(()), Err)
    }

    pub const fn gear(&self) -> Gear {
        self.gear
    }

    pub const fn mapping(&self) -> ValveMapping {
        self.mapping
    }

    /// Valve position as reported by the actuator.
    pub fn valve_state(&self) -> Result<ValveState> {
        self.actuator.get().map_err(|e| port_err(&e))
    }
}
