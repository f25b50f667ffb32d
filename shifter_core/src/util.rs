//! Small numeric helpers shared by the facade and the readiness check.

/// Nominal battery voltage the ramp and feed-forward math is referenced to.
pub const NOMINAL_VOLTS: f64 = 12.0;

/// Clamp `v` into [-1, 1]. Returns the clamped value and whether clipping occurred.
/// NaN maps to 0.
#[inline]
pub fn clamp_unit(v: f64) -> (f64, bool) {
    if v.is_nan() {
        return (0.0, true);
    }
    let c = v.clamp(-1.0, 1.0);
    (c, c != v)
}

/// Sign of `v` with 0 for 0 (unlike `f64::signum`, which returns ±1 for ±0).
#[inline]
pub fn sign(v: f64) -> f64 {
    if v > 0.0 {
        1.0
    } else if v < 0.0 {
        -1.0
    } else {
        0.0
    }
}

/// Relative closeness used by the conversion tests and readiness checks.
#[inline]
pub fn approx_eq(a: f64, b: f64, rel: f64) -> bool {
    (a - b).abs() <= rel * a.abs().max(b.abs()).max(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0.5, 0.5, false)]
    #[case(1.0, 1.0, false)]
    #[case(1.5, 1.0, true)]
    #[case(-3.0, -1.0, true)]
    #[case(f64::NAN, 0.0, true)]
    fn clamp_unit_cases(#[case] input: f64, #[case] out: f64, #[case] clipped: bool) {
        assert_eq!(clamp_unit(input), (out, clipped));
    }

    #[test]
    fn sign_of_zero_is_zero() {
        assert_eq!(sign(0.0), 0.0);
        assert_eq!(sign(-0.0), 0.0);
        assert_eq!(sign(-2.0), -1.0);
    }
}
