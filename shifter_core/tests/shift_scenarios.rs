//! Deterministic shift scenarios driven tick by tick on a test clock.
//!
//! Verifies that:
//! - agreeing sensors resolve the shift on the first tick and re-enable motors
//! - a stuck sensor holds motors off until the fail-open threshold, then fails open,
//!   in either gear
//! - re-shifting restarts the fail-open timer
//! - an unreadable sensor counts as disagreement
//! - shift events are published in order
use std::sync::Arc;

use rstest::rstest;
use shifter_core::mocks::ProbeMotor;
use shifter_core::{
    CheckerState, Gear, SensorShifter, ShiftChecker, ShiftEvent, ShifterSettings, TickOutcome,
};
use shifter_hardware::{FlagSensor, RecordingValve};
use shifter_traits::clock::test_clock::TestClock;
use shifter_traits::{BinarySensor, PortResult, ValveState};

const PERIOD_MS: u64 = 20;

struct Rig {
    checker: ShiftChecker,
    events: crossbeam_channel::Receiver<ShiftEvent>,
    clock: TestClock,
    valve: RecordingValve,
    low: [FlagSensor; 2],
    high: [FlagSensor; 2],
    dependent: ProbeMotor,
    drive: ProbeMotor,
}

fn rig() -> Rig {
    let clock = TestClock::new();
    let valve = RecordingValve::new(ValveState::Forward);
    let low = [FlagSensor::new(false), FlagSensor::new(false)];
    let high = [FlagSensor::new(false), FlagSensor::new(false)];
    let dependent = ProbeMotor::new("left");
    let drive = ProbeMotor::new("drive");
    let (checker, _period, events) = SensorShifter::builder()
        .with_actuator(valve.clone())
        .with_settings(ShifterSettings::default())
        .with_dependent(dependent.clone())
        .with_low_sensor(low[0].clone())
        .with_low_sensor(low[1].clone())
        .with_high_sensor(high[0].clone())
        .with_high_sensor(high[1].clone())
        .with_motor_to_disable(drive.clone())
        .with_clock(Arc::new(clock.clone()))
        .try_build_checker()
        .expect("build checker");
    Rig {
        checker,
        events,
        clock,
        valve,
        low,
        high,
        dependent,
        drive,
    }
}

impl Rig {
    fn tick(&mut self) -> TickOutcome {
        let out = self.checker.tick();
        self.clock.advance_ms(PERIOD_MS);
        out
    }
}

#[test]
fn initial_gear_is_read_from_valve() {
    let r = rig();
    assert_eq!(r.checker.gear(), Gear::Low);
    assert_eq!(r.checker.state(), CheckerState::Unconfirmed);
    assert!(r.valve.history().is_empty(), "valve is not driven without a starting gear");
    assert_eq!(r.dependent.log().gears, vec![1]);
}

#[test]
fn agreeing_sensors_resolve_on_first_tick() {
    let mut r = rig();
    r.low[0].set(true);
    r.low[1].set(true);

    assert_eq!(r.tick(), TickOutcome::Confirmed);
    assert_eq!(r.checker.state(), CheckerState::Resolved);
    assert!(r.checker.piston_correct());
    assert_eq!(r.drive.log().enable_calls, 1);
    assert_eq!(r.drive.log().disable_calls, 0);

    // Nothing outstanding: no further motor traffic.
    for _ in 0..5 {
        assert_eq!(r.tick(), TickOutcome::Idle);
    }
    assert_eq!(r.drive.log().enable_calls, 1);
}

#[test]
fn stuck_sensor_fails_open_after_threshold() {
    let mut r = rig();
    r.low[0].set(true);

    // 500 ms threshold at 20 ms per tick: the 27th tick is the first strictly past it.
    let mut outcomes = Vec::new();
    for _ in 0..30 {
        outcomes.push(r.tick());
    }
    assert!(outcomes[..26].iter().all(|o| *o == TickOutcome::Holding));
    assert_eq!(outcomes[26], TickOutcome::FailedOpen);
    assert!(outcomes[27..].iter().all(|o| *o == TickOutcome::Idle));

    assert_eq!(r.checker.state(), CheckerState::FailOpen);
    assert!(r.checker.piston_correct());
    assert_eq!(r.checker.fail_open_count(), 1);
    let log = r.drive.log();
    assert_eq!(log.disable_calls, 26);
    assert_eq!(log.enable_calls, 1);
    assert!(log.enabled);
}

#[test]
fn high_gear_with_one_disagreeing_sensor_fails_open() {
    let mut r = rig();
    r.checker.shift_to_gear(Gear::High).expect("shift");
    r.high[0].set(true);
    let enables_before = r.drive.log().enable_calls;

    let mut outcomes = Vec::new();
    for _ in 0..30 {
        outcomes.push(r.tick());
    }
    assert!(outcomes[..26].iter().all(|o| *o == TickOutcome::Holding));
    assert_eq!(outcomes[26], TickOutcome::FailedOpen);
    assert!(outcomes[27..].iter().all(|o| *o == TickOutcome::Idle));

    assert_eq!(r.checker.gear(), Gear::High);
    assert_eq!(r.checker.state(), CheckerState::FailOpen);
    assert!(r.checker.piston_correct());
    assert_eq!(r.checker.fail_open_count(), 1);
    let log = r.drive.log();
    assert_eq!(log.enable_calls, enables_before + 1);
    assert!(log.enabled);
}

#[test]
fn holding_keeps_motors_disabled() {
    let mut r = rig();
    for _ in 0..5 {
        assert_eq!(r.tick(), TickOutcome::Holding);
    }
    assert!(!r.drive.log().enabled);
    assert!(!r.checker.piston_correct());

    r.low[0].set(true);
    r.low[1].set(true);
    assert_eq!(r.tick(), TickOutcome::Confirmed);
    assert!(r.drive.log().enabled);
}

#[test]
fn reshift_restarts_fail_open_timer() {
    let mut r = rig();
    for _ in 0..20 {
        assert_eq!(r.tick(), TickOutcome::Holding);
    }
    r.checker.shift_to_gear(Gear::High).expect("shift");
    // 400 ms already spent mismatched in low; high starts from zero.
    for _ in 0..20 {
        assert_eq!(r.tick(), TickOutcome::Holding);
    }
    assert_eq!(r.checker.state(), CheckerState::Unconfirmed);
    assert_eq!(r.checker.fail_open_count(), 0);
}

#[test]
fn repeated_shift_is_idempotent() {
    let mut r = rig();
    r.checker.shift_to_gear(Gear::High).expect("shift");
    r.checker.shift_to_gear(Gear::High).expect("shift again");

    assert_eq!(r.checker.gear(), Gear::High);
    assert_eq!(r.valve.history(), vec![ValveState::Reverse, ValveState::Reverse]);
    assert_eq!(r.dependent.log().gears, vec![1, 2, 2]);

    r.high[0].set(true);
    r.high[1].set(true);
    assert_eq!(r.tick(), TickOutcome::Confirmed);
    assert_eq!(r.drive.log().enable_calls, 1);
    assert_eq!(r.tick(), TickOutcome::Idle);
}

#[test]
fn shift_to_low_checks_low_sensors() {
    let mut r = rig();
    r.checker.shift_to_gear(Gear::High).expect("shift");
    r.high[0].set(true);
    r.high[1].set(true);
    assert_eq!(r.tick(), TickOutcome::Confirmed);

    r.checker.shift_to_gear(Gear::Low).expect("shift back");
    assert_eq!(r.checker.state(), CheckerState::Unconfirmed);
    assert_eq!(r.tick(), TickOutcome::Holding, "high sensor is irrelevant in low");
    r.low[0].set(true);
    r.low[1].set(true);
    assert_eq!(r.tick(), TickOutcome::Confirmed);
    assert_eq!(r.dependent.log().gears, vec![1, 2, 1]);
}

struct BrokenSensor;

impl BinarySensor for BrokenSensor {
    fn get(&self) -> PortResult<bool> {
        Err("reed switch wire cut".into())
    }
}

#[test]
fn unreadable_sensor_counts_as_disagreement() {
    let clock = TestClock::new();
    let (mut checker, _, _rx) = SensorShifter::builder()
        .with_actuator(RecordingValve::new(ValveState::Forward))
        .with_low_sensor(BrokenSensor)
        .with_clock(Arc::new(clock.clone()))
        .try_build_checker()
        .expect("build");
    assert!(!checker.sensors_agree());
    assert_eq!(checker.tick(), TickOutcome::Holding);
}

#[test]
fn events_are_published_in_order() {
    let mut r = rig();
    r.low[0].set(true);
    r.low[1].set(true);
    r.tick();
    r.checker.shift_to_gear(Gear::High).expect("shift");
    for _ in 0..30 {
        r.tick();
    }
    let events: Vec<ShiftEvent> = r.events.try_iter().collect();
    assert_eq!(
        events,
        vec![
            ShiftEvent::Confirmed { gear: Gear::Low },
            ShiftEvent::Shifted { gear: Gear::High },
            ShiftEvent::FailOpen { gear: Gear::High },
        ]
    );
}

#[rstest]
#[case(Gear::Low, ValveState::Forward)]
#[case(Gear::High, ValveState::Reverse)]
fn explicit_starting_gear_drives_valve(#[case] gear: Gear, #[case] expected: ValveState) {
    let valve = RecordingValve::new(ValveState::Off);
    let probe = ProbeMotor::new("m");
    let (checker, _, _rx) = SensorShifter::builder()
        .with_actuator(valve.clone())
        .with_dependent(probe.clone())
        .with_settings(ShifterSettings {
            starting_gear: Some(gear),
            ..ShifterSettings::default()
        })
        .try_build_checker()
        .expect("build");
    assert_eq!(checker.gear(), gear);
    assert_eq!(valve.history(), vec![expected]);
    assert_eq!(probe.log().gears, vec![gear.id()]);
}

#[test]
fn off_valve_at_startup_means_low() {
    let (checker, _, _rx) = SensorShifter::builder()
        .with_actuator(RecordingValve::new(ValveState::Off))
        .try_build_checker()
        .expect("build");
    assert_eq!(checker.gear(), Gear::Low);
}
