use std::cell::Cell;
use std::time::Instant;

/// Source of local time for sent notifications.
pub trait Clock {
    /// Microseconds since some fixed point.
    fn now_us(&self) -> i64;

    /// Milliseconds since the same fixed point.
    fn now_ms(&self) -> i64 {
        self.now_us() / 1000
    }
}

/// Monotonic time counted from when the clock was created.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    start: Instant,
}

impl MonotonicClock {
    /// Clock starting at zero now.
    pub fn new() -> Self {
        MonotonicClock {
            start: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now_us(&self) -> i64 {
        self.start.elapsed().as_micros() as i64
    }
}

/// Clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    now_us: Cell<i64>,
}

impl ManualClock {
    /// Clock at `now_us`.
    pub fn new(now_us: i64) -> Self {
        ManualClock {
            now_us: Cell::new(now_us),
        }
    }

    /// Set the time.
    pub fn set_us(&self, now_us: i64) {
        self.now_us.set(now_us);
    }

    /// Move the time forward.
    pub fn advance_us(&self, us: i64) {
        self.now_us.set(self.now_us.get() + us);
    }
}

impl Clock for ManualClock {
    fn now_us(&self) -> i64 {
        self.now_us.get()
    }
}
