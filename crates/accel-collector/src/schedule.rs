//! Absolute-deadline tick schedule.
//!
//! Deadlines advance by exactly one interval per tick, so sleep jitter does
//! not accumulate into drift. When the loop falls further behind than the
//! allowed slack (a slow transfer, a cooldown) the schedule restarts from
//! the current time instead of bursting to catch up.

use std::thread;
use std::time::{Duration, Instant};

/// Deadline tracker for a fixed-rate loop.
#[derive(Debug, Clone)]
pub struct TickSchedule {
    interval: Duration,
    slack: Duration,
    next: Instant,
}

impl TickSchedule {
    /// First tick is due at `now`.
    pub fn new(interval: Duration, slack: Duration, now: Instant) -> Self {
        Self {
            interval,
            slack,
            next: now,
        }
    }

    /// Deadline of the next tick.
    pub fn next_deadline(&self) -> Instant {
        self.next
    }

    /// Sleep until the next tick is due.
    pub fn sleep_until_due(&self) {
        let remaining = self.next.saturating_duration_since(Instant::now());
        if !remaining.is_zero() {
            thread::sleep(remaining);
        }
    }

    /// Move to the next deadline after a tick finished at `now`.
    ///
    /// Returns the lag when the schedule had to resynchronise.
    pub fn advance(&mut self, now: Instant) -> Option<Duration> {
        self.next += self.interval;
        let lag = now.saturating_duration_since(self.next);
        if lag > self.slack {
            self.next = now;
            Some(lag)
        } else {
            None
        }
    }

    /// Restart the schedule at `now` (after a deliberate pause).
    pub fn reset(&mut self, now: Instant) {
        self.next = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MS: Duration = Duration::from_millis(1);

    #[test]
    fn test_deadlines_do_not_drift() {
        let start = Instant::now();
        let mut schedule = TickSchedule::new(MS, 50 * MS, start);
        // Each tick finishes a little late, but within slack
        for i in 1..=10u32 {
            assert_eq!(schedule.advance(start + MS * i + MS / 2), None);
        }
        assert_eq!(schedule.next_deadline(), start + MS * 10);
    }

    #[test]
    fn test_resync_when_far_behind() {
        let start = Instant::now();
        let mut schedule = TickSchedule::new(MS, 50 * MS, start);
        let late = start + 200 * MS;
        let lag = schedule.advance(late).unwrap();
        assert_eq!(lag, 199 * MS);
        assert_eq!(schedule.next_deadline(), late);
    }

    #[test]
    fn test_within_slack_keeps_catching_up() {
        let start = Instant::now();
        let mut schedule = TickSchedule::new(MS, 50 * MS, start);
        assert_eq!(schedule.advance(start + 30 * MS), None);
        assert_eq!(schedule.next_deadline(), start + MS);
    }

    #[test]
    fn test_reset() {
        let start = Instant::now();
        let mut schedule = TickSchedule::new(MS, 50 * MS, start);
        let later = start + 500 * MS;
        schedule.reset(later);
        assert_eq!(schedule.next_deadline(), later);
        assert_eq!(schedule.advance(later), None);
    }
}
