//! Fixed-window streaming linear regression.
//!
//! `add_point` is O(1): the oldest sample is evicted once the window is full
//! and its contribution subtracted from the running sums. Statistics use
//! sample (n - 1) normalisation throughout so the slope equals the ordinary
//! least-squares fit of the points in the window.
use std::collections::VecDeque;

#[derive(Debug, Clone)]
pub struct RunningLinReg {
    capacity: usize,
    points: VecDeque<(f64, f64)>,
    sum_x: f64,
    sum_y: f64,
    sum_xx: f64,
    sum_yy: f64,
    sum_xy: f64,
    r2_threshold: f64,
}

/// Centered second moments of the current window.
#[derive(Debug, Clone, Copy)]
struct Moments {
    var_x: f64,
    var_y: f64,
    cov: f64,
}

impl RunningLinReg {
    /// Window of `capacity` points (at least 2). The slope is reported only
    /// when R² exceeds `r2_threshold`.
    pub fn new(capacity: usize, r2_threshold: f64) -> Self {
        let capacity = capacity.max(2);
        Self {
            capacity,
            points: VecDeque::with_capacity(capacity),
            sum_x: 0.0,
            sum_y: 0.0,
            sum_xx: 0.0,
            sum_yy: 0.0,
            sum_xy: 0.0,
            r2_threshold,
        }
    }

    pub fn add_point(&mut self, x: f64, y: f64) {
        if self.points.len() == self.capacity
            && let Some((ox, oy)) = self.points.pop_front()
        {
            self.sum_x -= ox;
            self.sum_y -= oy;
            self.sum_xx -= ox * ox;
            self.sum_yy -= oy * oy;
            self.sum_xy -= ox * oy;
        }
        self.points.push_back((x, y));
        self.sum_x += x;
        self.sum_y += y;
        self.sum_xx += x * x;
        self.sum_yy += y * y;
        self.sum_xy += x * y;
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.points.clear();
        self.sum_x = 0.0;
        self.sum_y = 0.0;
        self.sum_xx = 0.0;
        self.sum_yy = 0.0;
        self.sum_xy = 0.0;
    }

    #[allow(clippy::cast_precision_loss)]
    fn moments(&self) -> Option<Moments> {
        let n = self.points.len();
        if n < 2 {
            return None;
        }
        let nf = n as f64;
        let denom = nf - 1.0;
        let var_x = (self.sum_xx - self.sum_x * self.sum_x / nf) / denom;
        let var_y = (self.sum_yy - self.sum_y * self.sum_y / nf) / denom;
        let cov = (self.sum_xy - self.sum_x * self.sum_y / nf) / denom;
        // Cancellation can leave a tiny negative variance.
        if !(var_x.is_finite() && var_x > 0.0) {
            return None;
        }
        Some(Moments {
            var_x,
            var_y: var_y.max(0.0),
            cov,
        })
    }

    /// Coefficient of determination, or `None` with fewer than two points or
    /// no spread in either axis.
    pub fn r_squared(&self) -> Option<f64> {
        let m = self.moments()?;
        if m.var_y <= 0.0 {
            return None;
        }
        Some((m.cov * m.cov / (m.var_x * m.var_y)).min(1.0))
    }

    /// Slope of the fit, only when R² exceeds the threshold.
    pub fn slope(&self) -> Option<f64> {
        let m = self.moments()?;
        let r2 = self.r_squared()?;
        (r2 > self.r2_threshold).then_some(m.cov / m.var_x)
    }

    /// Intercept of the fit; `None` whenever `slope` is.
    #[allow(clippy::cast_precision_loss)]
    pub fn intercept(&self) -> Option<f64> {
        let slope = self.slope()?;
        let n = self.points.len() as f64;
        Some(self.sum_y / n - slope * self.sum_x / n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_y_has_no_fit() {
        let mut r = RunningLinReg::new(5, 0.5);
        for x in 1..=5 {
            r.add_point(f64::from(x), 12.0);
        }
        assert_eq!(r.r_squared(), None);
        assert_eq!(r.slope(), None);
        assert_eq!(r.intercept(), None);
    }

    #[test]
    fn vertical_data_has_no_slope() {
        let mut r = RunningLinReg::new(4, 0.0);
        r.add_point(1.0, 1.0);
        r.add_point(1.0, 5.0);
        assert_eq!(r.slope(), None);
        assert_eq!(r.intercept(), None);
    }

    #[test]
    fn capacity_is_at_least_two() {
        assert_eq!(RunningLinReg::new(0, 0.5).capacity(), 2);
    }
}
