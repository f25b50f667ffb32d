//! Time-based debounce behaviour on a test clock.
use std::sync::Arc;
use std::time::Duration;

use proptest::prelude::*;
use rstest::rstest;
use shifter_core::debounce::Debouncer;
use shifter_traits::clock::test_clock::TestClock;

fn debouncer(threshold_ms: u64) -> (Debouncer, TestClock) {
    let clock = TestClock::new();
    let d = Debouncer::new(Duration::from_millis(threshold_ms), Arc::new(clock.clone()));
    (d, clock)
}

#[rstest]
#[case::just_under(499, false)]
#[case::exactly_at(500, false)]
#[case::just_over(501, true)]
fn trips_strictly_after_threshold(#[case] held_ms: u64, #[case] expected: bool) {
    let (mut d, clock) = debouncer(500);
    assert!(!d.calculate(true));
    clock.advance_ms(held_ms);
    assert_eq!(d.calculate(true), expected);
    assert_eq!(d.value(), expected);
}

#[test]
fn false_input_resets_accumulated_time() {
    let (mut d, clock) = debouncer(100);
    d.calculate(true);
    clock.advance_ms(90);
    assert!(!d.calculate(false));
    clock.advance_ms(20);
    assert!(!d.calculate(true), "timer restarted on the false sample");
    clock.advance_ms(101);
    assert!(d.calculate(true));
    assert!(!d.calculate(false));
}

#[test]
fn reset_forgets_true_time() {
    let (mut d, clock) = debouncer(50);
    d.calculate(true);
    clock.advance_ms(60);
    assert!(d.calculate(true));
    d.reset();
    assert!(!d.value());
    assert!(!d.calculate(true));
}

proptest! {
    #[test]
    fn never_trips_before_threshold(steps in prop::collection::vec(1u64..50, 1..40)) {
        let (mut d, clock) = debouncer(1_000);
        d.calculate(true);
        let mut held = 0;
        for step in steps {
            clock.advance_ms(step);
            held += step;
            prop_assert_eq!(d.calculate(true), held > 1_000);
        }
    }
}
