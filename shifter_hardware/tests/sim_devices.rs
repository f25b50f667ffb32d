use std::sync::Arc;
use std::time::Duration;

use rstest::rstest;
use shifter_hardware::{SimCommand, SimulatedMotorDevice, SimulatedPiston};
use shifter_traits::clock::test_clock::TestClock;
use shifter_traits::{
    Actuator, BinarySensor, Fault, LimitDirection, LimitPolarity, MotorDevice, ValveState,
};

fn piston(initial: ValveState, clock: &TestClock) -> SimulatedPiston {
    SimulatedPiston::new(initial, Duration::from_millis(80), Arc::new(clock.clone()))
}

#[test]
fn reed_switch_closes_only_after_travel() {
    let clock = TestClock::new();
    let p = piston(ValveState::Forward, &clock);
    let fwd = p.sensor(ValveState::Forward);
    let rev = p.sensor(ValveState::Reverse);
    assert!(fwd.get().unwrap(), "initial position counts as settled");
    assert!(!rev.get().unwrap());

    let mut valve = p.valve();
    valve.set(ValveState::Reverse).unwrap();
    assert!(!fwd.get().unwrap());
    assert!(!rev.get().unwrap(), "still travelling");

    clock.advance_ms(79);
    assert!(!rev.get().unwrap());
    clock.advance_ms(1);
    assert!(rev.get().unwrap());
    assert_eq!(valve.get().unwrap(), ValveState::Reverse);
}

#[test]
fn repeated_command_does_not_restart_travel() {
    let clock = TestClock::new();
    let p = piston(ValveState::Forward, &clock);
    let mut valve = p.valve();
    valve.set(ValveState::Reverse).unwrap();
    clock.advance_ms(60);
    valve.set(ValveState::Reverse).unwrap();
    clock.advance_ms(20);
    assert_eq!(p.settled_position(), Some(ValveState::Reverse));
}

#[rstest]
#[case(Some(false), false)]
#[case(Some(true), true)]
#[case(None, true)]
fn stuck_switch_overrides_piston(#[case] stuck: Option<bool>, #[case] expected: bool) {
    let clock = TestClock::new();
    let p = piston(ValveState::Reverse, &clock);
    let sensor = p.sensor(ValveState::Reverse);
    sensor.clone().stick(stuck);
    assert_eq!(sensor.get().unwrap(), expected);
}

#[test]
fn off_valve_closes_no_switch() {
    let clock = TestClock::new();
    let p = piston(ValveState::Off, &clock);
    clock.advance_ms(1_000);
    assert_eq!(p.settled_position(), None);
    assert!(!p.sensor(ValveState::Forward).get().unwrap());
}

#[test]
fn limit_switch_reads_false_until_configured() {
    let mut dev = SimulatedMotorDevice::new(7);
    let h = dev.handle();
    h.press_limit(LimitDirection::Forward, true);
    assert!(!dev.limit_switch(LimitDirection::Forward).unwrap());
    dev.configure_limit_switch(LimitDirection::Forward, Some(LimitPolarity::NormallyOpen))
        .unwrap();
    assert!(dev.limit_switch(LimitDirection::Forward).unwrap());
    assert!(!dev.limit_switch(LimitDirection::Reverse).unwrap());
}

#[test]
fn injected_write_failure_surfaces_as_error() {
    let mut dev = SimulatedMotorDevice::new(9);
    let h = dev.handle();
    h.fail_writes(true);
    let err = dev.set_pid(1.0, 0.0, 0.0).expect_err("writes rejected");
    assert!(err.to_string().contains("pid gains"));
    assert_eq!(h.snapshot().pid, (0.0, 0.0, 0.0));
    // Reads still work.
    assert_eq!(dev.bus_voltage().unwrap(), 12.0);
}

#[test]
fn ideal_tracking_follows_velocity_setpoint() {
    let mut dev = SimulatedMotorDevice::new(1).with_ideal_tracking();
    dev.set_velocity_native(1200.0, 0.5).unwrap();
    assert_eq!(dev.velocity_native().unwrap(), 1200.0);
    assert_eq!(
        dev.handle().snapshot().command,
        SimCommand::Velocity {
            native: 1200.0,
            arb_ff_volts: 0.5
        }
    );
}

#[test]
fn faults_are_reported_per_flag() {
    let dev = SimulatedMotorDevice::new(2);
    dev.handle().set_fault(Fault::HardLimitReverse, true);
    assert!(dev.fault(Fault::HardLimitReverse).unwrap());
    assert!(!dev.fault(Fault::HardLimitForward).unwrap());
}
