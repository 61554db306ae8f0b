//! Uptime clocks and wraparound-safe timers.
//!
//! Both counters are 32-bit and wrap, the millisecond one after roughly 49.7
//! days. Timers only ever compare differences computed with `wrapping_sub`,
//! so a deadline that straddles the wrap still fires on time.

use std::time::Instant;

/// Monotonic uptime source.
pub trait Clock {
    /// Milliseconds since start, wrapping.
    fn millis(&self) -> u32;

    /// Microseconds since start, wrapping.
    fn micros(&self) -> u32;
}

/// Milliseconds from `since` to `now`, correct across one counter wrap.
pub fn elapsed_ms(now: u32, since: u32) -> u32 {
    now.wrapping_sub(since)
}

/// A restartable interval measured against a [`Clock`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interval {
    start: u32,
    period: u32,
}

impl Interval {
    /// Start an interval of `period` milliseconds at `now`.
    pub fn new(now: u32, period: u32) -> Self {
        Interval { start: now, period }
    }

    /// Whether at least `period` milliseconds have passed since the last restart.
    pub fn expired(&self, now: u32) -> bool {
        elapsed_ms(now, self.start) >= self.period
    }

    /// Restart the interval at `now`.
    pub fn restart(&mut self, now: u32) {
        self.start = now;
    }

    /// Milliseconds since the last restart.
    pub fn elapsed(&self, now: u32) -> u32 {
        elapsed_ms(now, self.start)
    }

    /// The configured period.
    pub fn period(&self) -> u32 {
        self.period
    }
}

/// Wall clock backed by [`Instant`].
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    start: Instant,
}

impl SystemClock {
    /// Create a clock whose uptime starts now.
    pub fn new() -> Self {
        SystemClock {
            start: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn millis(&self) -> u32 {
        self.start.elapsed().as_millis() as u32
    }

    fn micros(&self) -> u32 {
        self.start.elapsed().as_micros() as u32
    }
}
