//! Simulated shifter piston with travel time and reed switches.
//!
//! A `SimulatedPiston` models one double-acting cylinder. Its valve side
//! (`PistonValve`) records the commanded state and when it was commanded; its
//! reed switches (`ReedSwitch`) read true only once the piston has had `travel`
//! time to reach their end of the stroke. Individual switches can be stuck to
//! a fixed reading to exercise the fail-open path.
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use shifter_traits::{Actuator, BinarySensor, Clock, PortResult, ValveState};

#[derive(Debug)]
struct PistonState {
    commanded: ValveState,
    commanded_at: Instant,
}

#[derive(Clone)]
pub struct SimulatedPiston {
    state: Arc<Mutex<PistonState>>,
    travel: Duration,
    clock: Arc<dyn Clock + Send + Sync>,
}

impl SimulatedPiston {
    /// Piston resting at `initial`; a non-`Off` initial state counts as settled.
    pub fn new(
        initial: ValveState,
        travel: Duration,
        clock: Arc<dyn Clock + Send + Sync>,
    ) -> Self {
        let settled_at = clock
            .now()
            .checked_sub(travel)
            .unwrap_or_else(|| clock.now());
        Self {
            state: Arc::new(Mutex::new(PistonState {
                commanded: initial,
                commanded_at: settled_at,
            })),
            travel,
            clock,
        }
    }

    pub fn valve(&self) -> PistonValve {
        PistonValve {
            piston: self.clone(),
        }
    }

    /// Reed switch that closes when the piston rests at `end`.
    pub fn sensor(&self, end: ValveState) -> ReedSwitch {
        ReedSwitch {
            piston: self.clone(),
            end,
            stuck: Arc::new(Mutex::new(None)),
        }
    }

    /// End of stroke the piston currently rests at, if it has finished moving.
    pub fn settled_position(&self) -> Option<ValveState> {
        let st = self.state.lock();
        if st.commanded == ValveState::Off {
            return None;
        }
        (self.clock.elapsed_since(st.commanded_at) >= self.travel).then_some(st.commanded)
    }
}

pub struct PistonValve {
    piston: SimulatedPiston,
}

impl Actuator for PistonValve {
    fn set(&mut self, state: ValveState) -> PortResult<()> {
        let mut st = self.piston.state.lock();
        if st.commanded != state {
            st.commanded = state;
            st.commanded_at = self.piston.clock.now();
            tracing::trace!(?state, "simulated valve moved");
        }
        Ok(())
    }

    fn get(&self) -> PortResult<ValveState> {
        Ok(self.piston.state.lock().commanded)
    }
}

/// Reed switch at one end of a `SimulatedPiston`. Clones share the stuck override.
#[derive(Clone)]
pub struct ReedSwitch {
    piston: SimulatedPiston,
    end: ValveState,
    stuck: Arc<Mutex<Option<bool>>>,
}

impl ReedSwitch {
    /// Force the reading to `value`, or `None` to follow the piston again.
    pub fn stick(&self, value: Option<bool>) {
        *self.stuck.lock() = value;
    }
}

impl BinarySensor for ReedSwitch {
    fn get(&self) -> PortResult<bool> {
        if let Some(v) = *self.stuck.lock() {
            return Ok(v);
        }
        Ok(self.piston.settled_position() == Some(self.end))
    }
}

/// Sensor whose reading is set directly; clones share the value.
#[derive(Clone, Default)]
pub struct FlagSensor {
    value: Arc<AtomicBool>,
}

impl FlagSensor {
    pub fn new(initial: bool) -> Self {
        Self {
            value: Arc::new(AtomicBool::new(initial)),
        }
    }

    pub fn set(&self, value: bool) {
        self.value.store(value, Ordering::Relaxed);
    }
}

impl BinarySensor for FlagSensor {
    fn get(&self) -> PortResult<bool> {
        Ok(self.value.load(Ordering::Relaxed))
    }
}

/// Valve that only records what it was told; reads back the last command.
#[derive(Clone)]
pub struct RecordingValve {
    state: Arc<Mutex<Vec<ValveState>>>,
    initial: ValveState,
}

impl RecordingValve {
    pub fn new(initial: ValveState) -> Self {
        Self {
            state: Arc::new(Mutex::new(Vec::new())),
            initial,
        }
    }

    /// Every state written so far, oldest first.
    pub fn history(&self) -> Vec<ValveState> {
        self.state.lock().clone()
    }
}

impl Actuator for RecordingValve {
    fn set(&mut self, state: ValveState) -> PortResult<()> {
        self.state.lock().push(state);
        Ok(())
    }

    fn get(&self) -> PortResult<ValveState> {
        Ok(self.state.lock().last().copied().unwrap_or(self.initial))
    }
}
