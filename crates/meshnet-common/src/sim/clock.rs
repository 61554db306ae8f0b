use crate::Clock;
use std::cell::Cell;
use std::rc::Rc;

/// A clock that only moves when told to.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    micros: Rc<Cell<u64>>,
}

impl ManualClock {
    /// Create a clock at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a clock at `ms` milliseconds.
    pub fn starting_at(ms: u64) -> Self {
        let clock = Self::new();
        clock.set_ms(ms);
        clock
    }

    /// Jump to an absolute time in milliseconds.
    pub fn set_ms(&self, ms: u64) {
        self.micros.set(ms * 1_000);
    }

    /// Move forward by `ms` milliseconds.
    pub fn advance_ms(&self, ms: u64) {
        self.micros.set(self.micros.get() + ms * 1_000);
    }

    /// Move forward by `us` microseconds.
    pub fn advance_us(&self, us: u64) {
        self.micros.set(self.micros.get() + us);
    }

    /// Unwrapped time in milliseconds.
    pub fn now_ms(&self) -> u64 {
        self.micros.get() / 1_000
    }
}

impl Clock for ManualClock {
    fn millis(&self) -> u32 {
        self.now_ms() as u32
    }

    fn micros(&self) -> u32 {
        self.micros.get() as u32
    }
}
