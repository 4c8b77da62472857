use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::{Duration, Instant},
};

/// Monotonic time source behind every lifetime comparison.
///
/// Readings are offsets from the clock's own epoch. Wall-clock time is
/// never consulted, so adjusting the system clock can neither expire nor
/// resurrect a token.
pub trait Clock: Send + Sync {
    fn now(&self) -> Duration;
}

/// Production clock: elapsed time since the instant it was created.
pub struct MonotonicClock(Instant);

impl Default for MonotonicClock {
    fn default() -> Self {
        Self(Instant::now())
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> Duration {
        self.0.elapsed()
    }
}

/// A hand-advanced clock.
///
/// Time only moves when a test says so, which makes expiry behaviour fully
/// deterministic.
///
/// ```
/// use std::time::Duration;
///
/// use focus_auth_authority::clock::{Clock, ManualClock};
///
/// let clock = ManualClock::default();
/// assert_eq!(clock.now(), Duration::ZERO);
///
/// clock.advance(Duration::from_millis(1500));
/// assert_eq!(clock.now(), Duration::from_millis(1500));
/// ```
#[derive(Default)]
pub struct ManualClock(AtomicU64);

impl ManualClock {
    /// Moves the clock forward by `delta`.
    pub fn advance(&self, delta: Duration) {
        self.0.fetch_add(delta.as_millis() as u64, Ordering::Relaxed);
    }

    /// Jumps the clock to an absolute offset from its epoch.
    pub fn set(&self, at: Duration) {
        self.0.store(at.as_millis() as u64, Ordering::Relaxed);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        Duration::from_millis(self.0.load(Ordering::Relaxed))
    }
}
