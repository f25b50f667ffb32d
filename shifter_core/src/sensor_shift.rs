//! Sensor-validated shifting.
//!
//! After every shift a periodic checker compares the piston sensors with the
//! commanded gear. While they disagree the dependent motors are held
//! disabled; once they agree the motors are re-enabled and the checker stops.
//! A mismatch that outlasts the fail-open threshold is assumed to be a bad
//! sensor: the piston is treated as correct, motors are re-enabled and the
//! checker stops, so a stuck switch never strands the drivetrain.
//!
//! `ShiftChecker` is the state machine and can be ticked directly.
//! `SensorShifter` owns one behind a mutex and runs the ticks on a thread
//! that exists only while a shift is unconfirmed.
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel as xch;
use parking_lot::Mutex;
use serde::Serialize;
use shifter_traits::{BinarySensor, Clock, MonotonicClock};

use crate::debounce::Debouncer;
use crate::error::{BuildError, Result};
use crate::motor::SimpleMotor;
use crate::shift::{BoxedActuator, BoxedShiftable, Gear, ShiftComponent, ValveMapping};

pub type BoxedSensor = Box<dyn BinarySensor + Send>;
pub type BoxedSimpleMotor = Box<dyn SimpleMotor + Send>;
pub type EventReceiver = xch::Receiver<ShiftEvent>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckerState {
    /// Sensors confirmed the commanded gear.
    Resolved,
    /// A shift is outstanding (or the piston has not been confirmed yet).
    Unconfirmed,
    /// Mismatch outlasted the threshold; the piston is assumed correct.
    FailOpen,
}

/// What one checker tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Nothing outstanding; no sensor or motor access.
    Idle,
    /// Sensors still agree with the commanded gear.
    Steady,
    /// Sensors just started agreeing; motors enabled.
    Confirmed,
    /// Sensors disagree; motors held disabled.
    Holding,
    /// Mismatch outlasted the threshold; motors enabled.
    FailedOpen,
}

impl TickOutcome {
    /// Whether the checker task should stop after this tick.
    pub const fn stops_checker(self) -> bool {
        !matches!(self, Self::Holding)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ShiftEvent {
    Shifted { gear: Gear },
    Confirmed { gear: Gear },
    FailOpen { gear: Gear },
}

/// Runtime shifter settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShifterSettings {
    pub mapping: ValveMapping,
    pub starting_gear: Option<Gear>,
    pub fail_open_after: Duration,
    pub period: Duration,
    pub event_capacity: usize,
}

impl Default for ShifterSettings {
    fn default() -> Self {
        Self {
            mapping: ValveMapping::default(),
            starting_gear: None,
            fail_open_after: Duration::from_millis(500),
            period: Duration::from_millis(20),
            event_capacity: 64,
        }
    }
}

/// Shift state machine. All fields that the checker and shift requests both
/// touch live here so one lock covers them.
pub struct ShiftChecker {
    shifter: ShiftComponent,
    low_sensors: Vec<BoxedSensor>,
    high_sensors: Vec<BoxedSensor>,
    motors: Vec<BoxedSimpleMotor>,
    fail_open: Debouncer,
    was_correct: bool,
    state: CheckerState,
    fail_open_count: u64,
    events: Option<xch::Sender<ShiftEvent>>,
}

impl core::fmt::Debug for ShiftChecker {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ShiftChecker")
            .field("gear", &self.shifter.gear())
            .field("state", &self.state)
            .field("was_correct", &self.was_correct)
            .field("fail_open_count", &self.fail_open_count)
            .finish_non_exhaustive()
    }
}

impl ShiftChecker {
    /// The piston position starts unconfirmed.
    pub fn new(
        shifter: ShiftComponent,
        low_sensors: Vec<BoxedSensor>,
        high_sensors: Vec<BoxedSensor>,
        motors: Vec<BoxedSimpleMotor>,
        fail_open_after: Duration,
        clock: Arc<dyn Clock + Send + Sync>,
    ) -> Self {
        Self {
            shifter,
            low_sensors,
            high_sensors,
            motors,
            fail_open: Debouncer::new(fail_open_after, clock),
            was_correct: false,
            state: CheckerState::Unconfirmed,
            fail_open_count: 0,
            events: None,
        }
    }

    /// Publish events on `tx`; a full channel drops the event.
    #[must_use]
    pub fn with_events(mut self, tx: xch::Sender<ShiftEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    /// Shift and mark the piston unconfirmed. Idempotent for repeated requests
    /// of the same gear apart from restarting the confirmation.
    pub fn shift_to_gear(&mut self, gear: Gear) -> Result<()> {
        let result = self.shifter.shift_to_gear(gear);
        if self.shifter.gear() == gear {
            self.was_correct = false;
            self.fail_open.reset();
            self.state = CheckerState::Unconfirmed;
            self.emit(ShiftEvent::Shifted { gear });
        }
        result
    }

    /// All sensors for the commanded gear read true. A sensor that cannot be
    /// read counts as false.
    pub fn sensors_agree(&self) -> bool {
        let sensors = match self.shifter.gear() {
            Gear::Low => &self.low_sensors,
            Gear::High => &self.high_sensors,
        };
        sensors.iter().all(|s| match s.get() {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(error = %e, "shift sensor read failed");
                false
            }
        })
    }

    /// One checker period.
    pub fn tick(&mut self) -> TickOutcome {
        if self.state != CheckerState::Unconfirmed {
            return TickOutcome::Idle;
        }
        let gear = self.shifter.gear();
        let correct = self.sensors_agree();
        let (piston_correct, outcome) = if correct {
            // Mismatch time only counts while mismatched.
            self.fail_open.calculate(false);
            if self.was_correct {
                (true, TickOutcome::Steady)
            } else {
                self.enable_motors();
                self.state = CheckerState::Resolved;
                tracing::debug!(%gear, "shift confirmed by sensors");
                self.emit(ShiftEvent::Confirmed { gear });
                (true, TickOutcome::Confirmed)
            }
        } else if self.fail_open.calculate(true) {
            self.fail_open_count += 1;
            tracing::warn!(
                %gear,
                after_ms = u64::try_from(self.fail_open.threshold().as_millis()).unwrap_or(u64::MAX),
                "shift sensors disagree with commanded gear, failing open"
            );
            self.enable_motors();
            self.state = CheckerState::FailOpen;
            self.emit(ShiftEvent::FailOpen { gear });
            (true, TickOutcome::FailedOpen)
        } else {
            self.disable_motors();
            (false, TickOutcome::Holding)
        };
        self.was_correct = piston_correct;
        tracing::trace!(%gear, correct, ?outcome, "checker tick");
        outcome
    }

    fn enable_motors(&mut self) {
        for m in &mut self.motors {
            if let Err(e) = m.enable() {
                tracing::warn!(motor = m.name(), error = %e, "failed to enable motor after shift");
            }
        }
    }

    fn disable_motors(&mut self) {
        for m in &mut self.motors {
            if let Err(e) = m.disable() {
                tracing::warn!(motor = m.name(), error = %e, "failed to hold motor during shift");
            }
        }
    }

    fn emit(&self, event: ShiftEvent) {
        if let Some(tx) = &self.events
            && let Err(xch::TrySendError::Full(ev)) = tx.try_send(event)
        {
            tracing::trace!(?ev, "shift event dropped, channel full");
        }
    }

    pub const fn gear(&self) -> Gear {
        self.shifter.gear()
    }

    pub const fn state(&self) -> CheckerState {
        self.state
    }

    /// Whether the piston is currently trusted to be in the commanded gear.
    pub const fn piston_correct(&self) -> bool {
        self.was_correct
    }

    pub fn needs_checking(&self) -> bool {
        self.state == CheckerState::Unconfirmed
    }

    /// How many times a shift has failed open.
    pub const fn fail_open_count(&self) -> u64 {
        self.fail_open_count
    }

    pub const fn shifter(&self) -> &ShiftComponent {
        &self.shifter
    }
}

/// Handle to a running checker thread. Dropping it stops and joins the thread.
pub struct CheckerTask {
    stop: Option<xch::Sender<()>>,
    join_handle: Option<JoinHandle<()>>,
}

impl CheckerTask {
    fn spawn(state: Arc<Mutex<ShiftChecker>>, period: Duration) -> Result<Self> {
        let (stop_tx, stop_rx) = xch::bounded::<()>(1);
        let join_handle = std::thread::Builder::new()
            .name("shift-checker".into())
            .spawn(move || {
                tracing::debug!(?period, "shift checker started");
                loop {
                    match stop_rx.recv_timeout(period) {
                        Err(xch::RecvTimeoutError::Timeout) => {}
                        Ok(()) | Err(xch::RecvTimeoutError::Disconnected) => {
                            tracing::debug!("shift checker received shutdown signal");
                            break;
                        }
                    }
                    if state.lock().tick().stops_checker() {
                        break;
                    }
                }
                tracing::trace!("shift checker exiting cleanly");
            })?;
        Ok(Self {
            stop: Some(stop_tx),
            join_handle: Some(join_handle),
        })
    }

    /// True while the thread is still polling.
    pub fn is_running(&self) -> bool {
        self.join_handle
            .as_ref()
            .is_some_and(|h| !h.is_finished())
    }
}

impl Drop for CheckerTask {
    fn drop(&mut self) {
        // Disconnecting the stop channel wakes the thread immediately.
        drop(self.stop.take());
        if let Some(handle) = self.join_handle.take() {
            match handle.join() {
                Ok(()) => tracing::trace!("shift checker joined"),
                Err(e) => tracing::warn!(?e, "shift checker panicked"),
            }
        }
    }
}

/// Shift controller with a background consistency checker.
pub struct SensorShifter {
    state: Arc<Mutex<ShiftChecker>>,
    period: Duration,
    checker: Mutex<Option<CheckerTask>>,
    events: EventReceiver,
}

impl core::fmt::Debug for SensorShifter {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SensorShifter")
            .field("period", &self.period)
            .field("checking", &self.is_checking())
            .finish_non_exhaustive()
    }
}

impl SensorShifter {
    pub fn builder() -> SensorShifterBuilder<Missing> {
        SensorShifterBuilder::default()
    }

    /// Take ownership of `checker` and start confirming the piston position.
    pub fn start(
        checker: ShiftChecker,
        period: Duration,
        events: EventReceiver,
    ) -> Result<Self> {
        let pending = checker.needs_checking();
        let state = Arc::new(Mutex::new(checker));
        let task = if pending {
            Some(CheckerTask::spawn(state.clone(), period)?)
        } else {
            None
        };
        Ok(Self {
            state,
            period,
            checker: Mutex::new(task),
            events,
        })
    }

    /// Shift to `gear` and restart the checker. Any running checker is
    /// stopped and joined before the shift, so at most one ever runs.
    pub fn shift_to_gear(&self, gear: Gear) -> Result<()> {
        let mut slot = self.checker.lock();
        drop(slot.take());
        let (result, pending) = {
            let mut st = self.state.lock();
            let r = st.shift_to_gear(gear);
            (r, st.needs_checking())
        };
        if pending {
            *slot = Some(CheckerTask::spawn(self.state.clone(), self.period)?);
        }
        result
    }

    /// Run one checker tick on the calling thread.
    pub fn check_now(&self) -> TickOutcome {
        self.state.lock().tick()
    }

    /// Stop the checker without touching the state machine.
    pub fn stop_checker(&self) {
        drop(self.checker.lock().take());
    }

    pub fn is_checking(&self) -> bool {
        self.checker
            .lock()
            .as_ref()
            .is_some_and(CheckerTask::is_running)
    }

    pub fn gear(&self) -> Gear {
        self.state.lock().gear()
    }

    pub fn state(&self) -> CheckerState {
        self.state.lock().state()
    }

    pub fn piston_correct(&self) -> bool {
        self.state.lock().piston_correct()
    }

    pub fn fail_open_count(&self) -> u64 {
        self.state.lock().fail_open_count()
    }

    /// Receiver for shift events. Clones share one queue.
    pub fn events(&self) -> EventReceiver {
        self.events.clone()
    }
}

impl Drop for SensorShifter {
    fn drop(&mut self) {
        self.stop_checker();
    }
}

// ── Builder ──────────────────────────────────────────────────────────────────

pub struct Missing;
pub struct Set;

/// Builder for `SensorShifter`. `build()` needs the actuator; `try_build()`
/// is available in any state.
pub struct SensorShifterBuilder<A> {
    actuator: Option<BoxedActuator>,
    dependents: Vec<BoxedShiftable>,
    low_sensors: Vec<BoxedSensor>,
    high_sensors: Vec<BoxedSensor>,
    motors: Vec<BoxedSimpleMotor>,
    settings: ShifterSettings,
    clock: Option<Arc<dyn Clock + Send + Sync>>,
    _a: core::marker::PhantomData<A>,
}

impl Default for SensorShifterBuilder<Missing> {
    fn default() -> Self {
        Self {
            actuator: None,
            dependents: Vec::new(),
            low_sensors: Vec::new(),
            high_sensors: Vec::new(),
            motors: Vec::new(),
            settings: ShifterSettings::default(),
            clock: None,
            _a: core::marker::PhantomData,
        }
    }
}

impl SensorShifterBuilder<Missing> {
    pub fn with_actuator(
        self,
        actuator: impl shifter_traits::Actuator + Send + 'static,
    ) -> SensorShifterBuilder<Set> {
        SensorShifterBuilder {
            actuator: Some(Box::new(actuator)),
            dependents: self.dependents,
            low_sensors: self.low_sensors,
            high_sensors: self.high_sensors,
            motors: self.motors,
            settings: self.settings,
            clock: self.clock,
            _a: core::marker::PhantomData,
        }
    }
}

/// Chainable setters that do not affect type-state.
impl<A> SensorShifterBuilder<A> {
    #[must_use]
    pub fn with_settings(mut self, settings: ShifterSettings) -> Self {
        self.settings = settings;
        self
    }

    #[must_use]
    pub fn with_dependent(mut self, dep: impl crate::motor::Shiftable + Send + 'static) -> Self {
        self.dependents.push(Box::new(dep));
        self
    }

    #[must_use]
    pub fn with_low_sensor(mut self, sensor: impl BinarySensor + Send + 'static) -> Self {
        self.low_sensors.push(Box::new(sensor));
        self
    }

    #[must_use]
    pub fn with_high_sensor(mut self, sensor: impl BinarySensor + Send + 'static) -> Self {
        self.high_sensors.push(Box::new(sensor));
        self
    }

    /// Motor held disabled while a shift is unconfirmed.
    #[must_use]
    pub fn with_motor_to_disable(mut self, motor: impl SimpleMotor + Send + 'static) -> Self {
        self.motors.push(Box::new(motor));
        self
    }

    /// Provide a custom clock implementation; defaults to `MonotonicClock` when not provided.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock + Send + Sync>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Assemble the state machine without starting a checker thread.
    pub fn try_build_checker(self) -> Result<(ShiftChecker, Duration, EventReceiver)> {
        let actuator = self
            .actuator
            .ok_or_else(|| eyre::Report::new(BuildError::MissingActuator))?;
        if self.settings.period.is_zero() || self.settings.fail_open_after.is_zero() {
            return Err(BuildError::InvalidConfig("checker period and fail-open threshold must be > 0").into());
        }
        let shifter = ShiftComponent::new(
            actuator,
            self.dependents,
            self.settings.mapping,
            self.settings.starting_gear,
        )?;
        let (tx, rx) = xch::bounded(self.settings.event_capacity.max(1));
        let clock = self
            .clock
            .unwrap_or_else(|| Arc::new(MonotonicClock::new()));
        let checker = ShiftChecker::new(
            shifter,
            self.low_sensors,
            self.high_sensors,
            self.motors,
            self.settings.fail_open_after,
            clock,
        )
        .with_events(tx);
        Ok((checker, self.settings.period, rx))
    }

    /// Fallible build available in any type-state.
    pub fn try_build(self) -> Result<SensorShifter> {
        let (checker, period, rx) = self.try_build_checker()?;
        SensorShifter::start(checker, period, rx)
    }
}

impl SensorShifterBuilder<Set> {
    pub fn build(self) -> Result<SensorShifter> {
        self.try_build()
    }
}
