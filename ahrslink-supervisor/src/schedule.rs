//! Absolute-deadline scheduling for a fixed-period loop.

use std::time::{Duration, Instant};

/// When the next cycle should start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline {
    /// Absolute wake time. Equal to "now" after an overrun.
    pub wake_at: Instant,

    /// How far past its deadline the cycle finished, if it overran.
    pub overrun: Option<Duration>,
}

/// Tracks the last wake time and derives the next absolute deadline.
///
/// On time, the anchor advances by exactly one period, so the schedule stays
/// phase-locked regardless of how long each cycle's work took. After an
/// overrun the anchor resets to the current time: the next cycle starts
/// immediately and later cycles are spaced a full period apart again,
/// without a burst of catch-up cycles.
#[derive(Debug, Clone, Default)]
pub struct DeadlineSchedule {
    last_wake: Option<Instant>,
}

impl DeadlineSchedule {
    pub fn new() -> Self {
        Self::default()
    }

    /// Anchor the schedule at `now` if it is not anchored yet.
    pub fn start(&mut self, now: Instant) {
        self.last_wake.get_or_insert(now);
    }

    /// Deadline the previous cycle was scheduled for.
    pub fn last_wake(&self) -> Option<Instant> {
        self.last_wake
    }

    /// Compute the deadline for the cycle after the one that just finished.
    pub fn next_deadline(&mut self, period: Duration, now: Instant) -> Deadline {
        let anchor = *self.last_wake.get_or_insert(now);
        let target = anchor + period;

        if target >= now {
            self.last_wake = Some(target);
            Deadline {
                wake_at: target,
                overrun: None,
            }
        } else {
            self.last_wake = Some(now);
            Deadline {
                wake_at: now,
                overrun: Some(now - target),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const P: Duration = Duration::from_millis(20);

    #[test]
    fn on_time_cycles_do_not_drift() {
        let t0 = Instant::now();
        let mut schedule = DeadlineSchedule::new();
        schedule.start(t0);

        // Work takes a varying 3-11ms each cycle; wakes stay on the 20ms grid.
        let mut now = t0;
        for (i, work_ms) in [3u64, 11, 7, 5, 9].into_iter().enumerate() {
            now += Duration::from_millis(work_ms);
            let deadline = schedule.next_deadline(P, now);
            assert_eq!(deadline.wake_at, t0 + P * (i as u32 + 1));
            assert_eq!(deadline.overrun, None);
            now = deadline.wake_at;
        }
    }

    #[test]
    fn overrun_wakes_immediately_and_reanchors() {
        let t0 = Instant::now();
        let mut schedule = DeadlineSchedule::new();
        schedule.start(t0);

        let late = t0 + Duration::from_millis(35);
        let deadline = schedule.next_deadline(P, late);
        assert_eq!(deadline.wake_at, late);
        assert_eq!(deadline.overrun, Some(Duration::from_millis(15)));

        // A quick following cycle is scheduled a full period after the overrun.
        let next = schedule.next_deadline(P, late + Duration::from_millis(2));
        assert_eq!(next.wake_at, late + P);
        assert_eq!(next.overrun, None);
    }

    #[test]
    fn long_stall_does_not_cause_catch_up_burst() {
        let t0 = Instant::now();
        let mut schedule = DeadlineSchedule::new();
        schedule.start(t0);

        // Blocked for ten periods.
        let late = t0 + P * 10;
        let first = schedule.next_deadline(P, late);
        assert_eq!(first.wake_at, late);

        // Only one immediate wake; the next is a whole period later.
        let second = schedule.next_deadline(P, late);
        assert_eq!(second.wake_at, late + P);
    }

    #[test]
    fn finishing_exactly_on_the_deadline_is_not_an_overrun() {
        let t0 = Instant::now();
        let mut schedule = DeadlineSchedule::new();
        schedule.start(t0);

        let deadline = schedule.next_deadline(P, t0 + P);
        assert_eq!(deadline.wake_at, t0 + P);
        assert_eq!(deadline.overrun, None);
    }

    #[test]
    fn unanchored_schedule_anchors_on_first_use() {
        let t0 = Instant::now();
        let mut schedule = DeadlineSchedule::new();
        assert_eq!(schedule.last_wake(), None);

        let deadline = schedule.next_deadline(P, t0);
        assert_eq!(deadline.wake_at, t0 + P);
    }

    #[test]
    fn start_does_not_move_an_existing_anchor() {
        let t0 = Instant::now();
        let mut schedule = DeadlineSchedule::new();
        schedule.start(t0);
        schedule.start(t0 + Duration::from_millis(5));
        assert_eq!(schedule.last_wake(), Some(t0));
    }

    #[test]
    fn period_change_applies_to_the_next_deadline() {
        let t0 = Instant::now();
        let mut schedule = DeadlineSchedule::new();
        schedule.start(t0);

        let first = schedule.next_deadline(P, t0 + Duration::from_millis(1));
        let second = schedule.next_deadline(
            Duration::from_millis(50),
            first.wake_at + Duration::from_millis(1),
        );
        assert_eq!(second.wake_at, first.wake_at + Duration::from_millis(50));
    }
}
