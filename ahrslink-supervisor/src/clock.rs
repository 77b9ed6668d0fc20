//! Monotonic clock and absolute sleep.
//!
//! The supervisor never uses relative delays: it computes an absolute
//! deadline and asks the clock to sleep until it, so jitter in a cycle's own
//! work does not accumulate into drift.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// Source of monotonic time with a "sleep until" primitive.
pub trait Clock: Send + Sync {
    /// Current monotonic time.
    fn now(&self) -> Instant;

    /// Block the calling thread until `deadline`.
    ///
    /// Returns immediately if the deadline has already passed.
    fn sleep_until(&self, deadline: Instant);
}

/// The operating system's monotonic clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep_until(&self, deadline: Instant) {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if !remaining.is_zero() {
            std::thread::sleep(remaining);
        }
    }
}

#[derive(Debug)]
struct ManualState {
    elapsed: Duration,
    sleeps: Vec<Duration>,
}

/// A clock that only moves when told to.
///
/// `sleep_until` jumps straight to the deadline and records how long the
/// caller asked to sleep. Clones share the same time, so a scripted transport
/// can "block" by advancing the clock the supervisor reads.
///
/// # Example
///
/// ```rust
/// use ahrslink_supervisor::{Clock, ManualClock};
/// use std::time::Duration;
///
/// let clock = ManualClock::new();
/// let start = clock.now();
///
/// clock.sleep_until(start + Duration::from_millis(20));
/// assert_eq!(clock.now() - start, Duration::from_millis(20));
/// assert_eq!(clock.sleeps(), vec![Duration::from_millis(20)]);
/// ```
#[derive(Debug, Clone)]
pub struct ManualClock {
    origin: Instant,
    state: Arc<Mutex<ManualState>>,
}

impl ManualClock {
    /// Create a clock starting at the current instant.
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            state: Arc::new(Mutex::new(ManualState {
                elapsed: Duration::ZERO,
                sleeps: Vec::new(),
            })),
        }
    }

    /// Move time forward without recording a sleep.
    pub fn advance(&self, by: Duration) {
        self.state.lock().elapsed += by;
    }

    /// Time elapsed since the clock was created.
    pub fn elapsed(&self) -> Duration {
        self.state.lock().elapsed
    }

    /// Every sleep requested so far, in order. Zero for deadlines already past.
    pub fn sleeps(&self) -> Vec<Duration> {
        self.state.lock().sleeps.clone()
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + self.state.lock().elapsed
    }

    fn sleep_until(&self, deadline: Instant) {
        let mut state = self.state.lock();
        let target = deadline.saturating_duration_since(self.origin);
        let slept = target.saturating_sub(state.elapsed);
        state.elapsed += slept;
        state.sleeps.push(slept);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_past_deadline_does_not_move_time() {
        let clock = ManualClock::new();
        let start = clock.now();
        clock.advance(Duration::from_millis(50));

        clock.sleep_until(start + Duration::from_millis(20));

        assert_eq!(clock.elapsed(), Duration::from_millis(50));
        assert_eq!(clock.sleeps(), vec![Duration::ZERO]);
    }

    #[test]
    fn manual_clock_clones_share_time() {
        let clock = ManualClock::new();
        let other = clock.clone();

        other.advance(Duration::from_millis(7));

        assert_eq!(clock.elapsed(), Duration::from_millis(7));
        assert_eq!(clock.now(), other.now());
    }

    #[test]
    fn system_clock_sleeps_until_deadline() {
        let clock = SystemClock;
        let deadline = clock.now() + Duration::from_millis(5);
        clock.sleep_until(deadline);
        assert!(clock.now() >= deadline);
    }

    #[test]
    fn system_clock_returns_immediately_for_past_deadline() {
        let clock = SystemClock;
        let past = clock.now();
        std::thread::sleep(Duration::from_millis(2));

        let before = Instant::now();
        clock.sleep_until(past);
        assert!(before.elapsed() < Duration::from_millis(50));
    }
}
