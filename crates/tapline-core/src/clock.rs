//! Time source used for backoff sleeps and operation deadlines

use std::time::{Duration, Instant};

/// Monotonic time plus blocking sleep.
///
/// All waits in the extraction engine go through this trait so tests can
/// substitute a virtual clock.
pub trait Clock {
    fn now(&self) -> Instant;
    fn sleep(&self, duration: Duration);
}

/// Wall clock backed by `std::thread::sleep`
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}
