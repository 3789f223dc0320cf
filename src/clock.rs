//! Monotonic time source for the control loop.

use std::time::{Duration, Instant};

/// Elapsed time since some fixed origin.
pub trait Clock: Send + Sync {
    fn elapsed(&self) -> Duration;
}

/// Wall-independent clock started at construction.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    #[must_use]
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn elapsed(&self) -> Duration {
        self.origin.elapsed()
    }
}
