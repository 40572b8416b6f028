//! Paces execution ticks on a caller-supplied clock.
//!
//! Time is a [`Duration`] since whatever epoch the caller picks; nothing here
//! reads the real clock. At most one tick is pending at a time.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Delays between execution ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pacing {
    /// Delay before the first tick of a run.
    pub first_delay: Duration,
    /// Delay between subsequent ticks.
    pub interval: Duration,
}

impl Default for Pacing {
    fn default() -> Self {
        Pacing {
            first_delay: Duration::from_millis(100),
            interval: Duration::from_millis(600),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TickScheduler {
    pacing: Pacing,
    due: Option<Duration>,
}

impl TickScheduler {
    pub fn new(pacing: Pacing) -> Self {
        TickScheduler { pacing, due: None }
    }

    /// Schedules the first tick of a run, replacing anything pending.
    pub fn arm_first(&mut self, now: Duration) {
        self.due = Some(now + self.pacing.first_delay);
    }

    /// Schedules the tick after the one that just ran.
    pub fn arm_next(&mut self, now: Duration) {
        self.due = Some(now + self.pacing.interval);
    }

    pub fn cancel(&mut self) {
        self.due = None;
    }

    pub fn is_pending(&self) -> bool {
        self.due.is_some()
    }

    /// Returns true once the pending deadline has passed, and clears it.
    pub fn poll(&mut self, now: Duration) -> bool {
        match self.due {
            Some(due) if now >= due => {
                self.due = None;
                true
            }
            _ => false,
        }
    }

    /// How long until the pending tick is due; `None` when nothing is pending.
    pub fn time_until(&self, now: Duration) -> Option<Duration> {
        self.due.map(|due| due.saturating_sub(now))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn default_pacing() {
        let pacing = Pacing::default();
        assert_eq!(pacing.first_delay, ms(100));
        assert_eq!(pacing.interval, ms(600));
    }

    #[test]
    fn first_tick_fires_after_short_delay() {
        let mut scheduler = TickScheduler::new(Pacing::default());
        scheduler.arm_first(ms(1_000));
        assert!(!scheduler.poll(ms(1_099)));
        assert_eq!(scheduler.time_until(ms(1_050)), Some(ms(50)));
        assert!(scheduler.poll(ms(1_100)));
        // Fires once.
        assert!(!scheduler.poll(ms(1_200)));
        assert!(!scheduler.is_pending());
    }

    #[test]
    fn later_ticks_use_the_interval() {
        let mut scheduler = TickScheduler::new(Pacing::default());
        scheduler.arm_next(ms(0));
        assert!(!scheduler.poll(ms(599)));
        assert!(scheduler.poll(ms(600)));
    }

    #[test]
    fn cancel_drops_the_pending_tick() {
        let mut scheduler = TickScheduler::new(Pacing::default());
        scheduler.arm_first(ms(0));
        scheduler.cancel();
        assert!(!scheduler.poll(ms(10_000)));
        assert_eq!(scheduler.time_until(ms(0)), None);
    }

    #[test]
    fn rearming_replaces_the_deadline() {
        let mut scheduler = TickScheduler::new(Pacing::default());
        scheduler.arm_next(ms(0));
        scheduler.arm_first(ms(0));
        assert!(scheduler.poll(ms(100)));
    }
}
