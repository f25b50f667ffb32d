//! Debounced booleans.
//!
//! `Debouncer` is time based: its output rises once the input has been true
//! continuously for strictly longer than the threshold, and falls as soon as
//! the input is false. `SampleDebouncer` is count based over the last N
//! observations and is what readiness checks use.
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use shifter_traits::Clock;

pub struct Debouncer {
    threshold: Duration,
    clock: Arc<dyn Clock + Send + Sync>,
    true_since: Option<Instant>,
    value: bool,
}

impl core::fmt::Debug for Debouncer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Debouncer")
            .field("threshold", &self.threshold)
            .field("true_since", &self.true_since)
            .field("value", &self.value)
            .finish_non_exhaustive()
    }
}

impl Debouncer {
    pub fn new(threshold: Duration, clock: Arc<dyn Clock + Send + Sync>) -> Self {
        Self {
            threshold,
            clock,
            true_since: None,
            value: false,
        }
    }

    /// Feed one observation and return the debounced value.
    pub fn calculate(&mut self, input: bool) -> bool {
        if !input {
            self.true_since = None;
            self.value = false;
            return false;
        }
        let now = self.clock.now();
        let since = *self.true_since.get_or_insert(now);
        self.value = self.clock.elapsed_since(since) > self.threshold;
        self.value
    }

    /// Last debounced value.
    pub const fn value(&self) -> bool {
        self.value
    }

    /// Forget any accumulated true time.
    pub fn reset(&mut self) {
        self.true_since = None;
        self.value = false;
    }

    pub const fn threshold(&self) -> Duration {
        self.threshold
    }
}

/// True once at least `min_true` of the last `window` observations were true.
#[derive(Debug, Clone)]
pub struct SampleDebouncer {
    window: usize,
    min_true: usize,
    samples: VecDeque<bool>,
    true_count: usize,
}

impl SampleDebouncer {
    /// Every one of the last `window` samples must be true.
    pub fn new(window: usize) -> Self {
        let window = window.max(1);
        Self {
            window,
            min_true: window,
            samples: VecDeque::with_capacity(window),
            true_count: 0,
        }
    }

    /// Relax the requirement to `min_true` of the window (clamped to 1..=window).
    #[must_use]
    pub fn with_min_true(mut self, min_true: usize) -> Self {
        self.min_true = min_true.clamp(1, self.window);
        self
    }

    pub fn update(&mut self, input: bool) -> bool {
        if self.samples.len() == self.window && self.samples.pop_front() == Some(true) {
            self.true_count -= 1;
        }
        self.samples.push_back(input);
        if input {
            self.true_count += 1;
        }
        self.value()
    }

    pub const fn value(&self) -> bool {
        self.true_count >= self.min_true
    }

    pub fn reset(&mut self) {
        self.samples.clear();
        self.true_count = 0;
    }
}
