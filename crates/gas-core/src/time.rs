//! Time source abstraction and rate limiting
//!
//! The core never reads a hardware timer directly. Everything that needs the
//! current time takes a [`TimeSource`], which keeps the scheduler
//! deterministic and lets tests single-step it with a [`ManualClock`].

use core::cell::Cell;

use embassy_time::{Duration, Instant};

/// Source of monotonic time for the scheduler and drivers.
///
/// Firmware implements this on top of its timer driver; the simulator and
/// the tests use [`ManualClock`].
pub trait TimeSource {
    /// Current monotonic time.
    fn now(&self) -> Instant;
}

impl<T: TimeSource + ?Sized> TimeSource for &T {
    fn now(&self) -> Instant {
        (**self).now()
    }
}

/// Returns true if at least `interval` has elapsed between `since` and `now`.
///
/// A `now` earlier than `since` counts as not elapsed.
#[inline]
pub fn is_elapsed(since: Instant, now: Instant, interval: Duration) -> bool {
    now.checked_duration_since(since)
        .is_some_and(|elapsed| elapsed >= interval)
}

/// Minimum spacing between two bus transactions of one device.
///
/// A fresh cadence is due immediately; after [`Cadence::mark`] it is due
/// again once its interval has elapsed.
#[derive(Debug, Clone, Copy)]
pub struct Cadence {
    interval: Duration,
    last: Option<Instant>,
}

impl Cadence {
    pub const fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: None,
        }
    }

    pub fn is_due(&self, now: Instant) -> bool {
        match self.last {
            None => true,
            Some(last) => is_elapsed(last, now, self.interval),
        }
    }

    /// Record a transaction attempt at `now`, successful or not.
    pub fn mark(&mut self, now: Instant) {
        self.last = Some(now);
    }

    pub const fn interval(&self) -> Duration {
        self.interval
    }
}

/// Settable clock used by the simulator and the tests.
#[derive(Debug)]
pub struct ManualClock {
    now: Cell<Instant>,
}

impl ManualClock {
    pub const fn new() -> Self {
        Self {
            now: Cell::new(Instant::from_ticks(0)),
        }
    }

    pub fn set(&self, now: Instant) {
        self.now.set(now);
    }

    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
    }

    pub fn advance_ms(&self, ms: u64) {
        self.advance(Duration::from_millis(ms));
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for ManualClock {
    fn now(&self) -> Instant {
        self.now.get()
    }
}
