use std::time::{Duration, Instant};

use spin_sleep::SpinSleeper;

use crate::Clock;

/// Wall-clock time, slept with a spin-assisted sleeper so 10 ms control ticks
/// stay close to 10 ms.
#[derive(Clone)]
pub struct SystemClock {
    epoch: Instant,
    sleeper: SpinSleeper,
}

impl SystemClock {
    pub fn new() -> Self {
        SystemClock {
            epoch: Instant::now(),
            sleeper: SpinSleeper::new(10_000),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.epoch.elapsed()
    }

    fn sleep(&self, duration: Duration) {
        self.sleeper.sleep(duration);
    }
}
