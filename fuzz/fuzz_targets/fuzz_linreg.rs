#![no_main]
use libfuzzer_sys::{arbitrary::Arbitrary, fuzz_target};
use shifter_core::RunningLinReg;

#[derive(Debug, Arbitrary)]
struct Input {
    window: u8,
    threshold: f64,
    points: Vec<(f64, f64)>,
}

fuzz_target!(|input: Input| {
    let mut reg = RunningLinReg::new(usize::from(input.window), input.threshold);
    for (x, y) in input.points {
        reg.add_point(x, y);
        assert!(reg.len() <= usize::from(input.window).max(2));
        let _ = reg.r_squared();
        let _ = reg.slope();
        let _ = reg.intercept();
    }
});
