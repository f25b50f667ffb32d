use std::time::{Duration, Instant};

/// Time source for fail-open timers, piston travel and software loops.
///
/// Everything that measures "how long has this been true" asks a `Clock`
/// instead of `Instant::now()`, so tests can step time explicitly.
pub trait Clock {
    fn now(&self) -> Instant;

    /// Time since `start`; zero when `start` lies in the future.
    fn elapsed_since(&self, start: Instant) -> Duration {
        self.now().saturating_duration_since(start)
    }
}

/// Wall-clock monotonic time.
#[derive(Debug, Default, Clone, Copy)]
pub struct MonotonicClock;

impl MonotonicClock {
    pub const fn new() -> Self {
        Self
    }
}

impl Clock for MonotonicClock {
    #[inline]
    fn now(&self) -> Instant {
        Instant::now()
    }
}

#[cfg(any(test, feature = "test-clock"))]
pub mod test_clock {
    use super::{Clock, Duration, Instant};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU64, Ordering};

    /// Clock that stands still until a test steps it. Clones share one
    /// timeline, so the copy given to a shifter or motor moves with the
    /// copy kept by the test.
    #[derive(Debug, Clone)]
    pub struct TestClock {
        origin: Instant,
        nanos: Arc<AtomicU64>,
    }

    impl Default for TestClock {
        fn default() -> Self {
            Self::new()
        }
    }

    impl TestClock {
        pub fn new() -> Self {
            Self {
                origin: Instant::now(),
                nanos: Arc::new(AtomicU64::new(0)),
            }
        }

        pub fn advance(&self, d: Duration) {
            let step = u64::try_from(d.as_nanos()).unwrap_or(u64::MAX);
            let _ = self
                .nanos
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                    Some(n.saturating_add(step))
                });
        }

        /// `advance` in whole milliseconds.
        pub fn advance_ms(&self, ms: u64) {
            self.advance(Duration::from_millis(ms));
        }

        /// Total simulated time since construction.
        pub fn elapsed(&self) -> Duration {
            Duration::from_nanos(self.nanos.load(Ordering::SeqCst))
        }
    }

    impl Clock for TestClock {
        fn now(&self) -> Instant {
            self.origin + self.elapsed()
        }
    }
}
