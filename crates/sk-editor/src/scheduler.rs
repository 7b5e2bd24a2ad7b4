//! Frame and recompile timing.
//!
//! Nothing here sleeps or spawns: the host polls with the current instant
//! and gets told whether a frame is due or a recompile should fire.

use std::cell::Cell;
use std::rc::Rc;
use std::time::{Duration, Instant};

/// Cancels a running [`FrameScheduler`]. Once cancelled it stays cancelled.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Rc<Cell<bool>>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.set(true);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.get()
    }
}

/// Fixed-cadence tick source.
#[derive(Debug)]
pub struct FrameScheduler {
    interval: Duration,
    next_due: Option<Instant>,
    token: CancelToken,
    ticks: u64,
}

impl FrameScheduler {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_due: None,
            token: CancelToken::new(),
            ticks: 0,
        }
    }

    /// Start producing ticks; the first one is due immediately. Returns the
    /// token that stops this run. Restarting hands out a fresh token and
    /// cancels the previous one.
    pub fn start(&mut self, now: Instant) -> CancelToken {
        self.token.cancel();
        self.token = CancelToken::new();
        self.next_due = Some(now);
        self.token.clone()
    }

    pub fn stop(&mut self) {
        self.token.cancel();
        self.next_due = None;
    }

    pub fn is_running(&self) -> bool {
        self.next_due.is_some() && !self.token.is_cancelled()
    }

    /// Whether a tick is due at `now`. Consumes the tick; missed frames are
    /// dropped rather than replayed.
    pub fn poll(&mut self, now: Instant) -> bool {
        if self.token.is_cancelled() {
            self.next_due = None;
            return false;
        }
        let Some(due) = self.next_due else {
            return false;
        };
        if now < due {
            return false;
        }
        let mut next = due + self.interval;
        if next <= now {
            next = now + self.interval;
        }
        self.next_due = Some(next);
        self.ticks += 1;
        true
    }

    /// Time until the next tick, if running.
    pub fn until_next(&self, now: Instant) -> Option<Duration> {
        if self.token.is_cancelled() {
            return None;
        }
        self.next_due.map(|due| due.saturating_duration_since(now))
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }
}

/// Trailing-edge debounce: fires once `delay` has passed since the last
/// [`Debouncer::trigger`].
#[derive(Debug, Clone)]
pub struct Debouncer {
    delay: Duration,
    last_trigger: Option<Instant>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            last_trigger: None,
        }
    }

    pub fn trigger(&mut self, now: Instant) {
        self.last_trigger = Some(now);
    }

    /// True exactly once per burst of triggers, after it has settled.
    pub fn poll(&mut self, now: Instant) -> bool {
        match self.last_trigger {
            Some(prev) if now.duration_since(prev) >= self.delay => {
                self.last_trigger = None;
                true
            }
            _ => false,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.last_trigger.is_some()
    }

    pub fn cancel(&mut self) {
        self.last_trigger = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const MS: Duration = Duration::from_millis(1);

    #[test]
    fn ticks_at_fixed_cadence() {
        let t0 = Instant::now();
        let mut scheduler = FrameScheduler::new(16 * MS);
        assert!(!scheduler.poll(t0));
        scheduler.start(t0);
        assert!(scheduler.poll(t0));
        assert!(!scheduler.poll(t0 + 10 * MS));
        assert!(scheduler.poll(t0 + 16 * MS));
        assert_eq!(scheduler.until_next(t0 + 20 * MS), Some(12 * MS));
        assert_eq!(scheduler.ticks(), 2);
    }

    #[test]
    fn missed_frames_are_dropped() {
        let t0 = Instant::now();
        let mut scheduler = FrameScheduler::new(16 * MS);
        scheduler.start(t0);
        assert!(scheduler.poll(t0));
        assert!(scheduler.poll(t0 + 100 * MS));
        assert!(!scheduler.poll(t0 + 110 * MS));
        assert!(scheduler.poll(t0 + 116 * MS));
    }

    #[test]
    fn cancelled_scheduler_never_ticks_again() {
        let t0 = Instant::now();
        let mut scheduler = FrameScheduler::new(16 * MS);
        let token = scheduler.start(t0);
        assert!(scheduler.is_running());
        token.cancel();
        assert!(!scheduler.is_running());
        assert!(!scheduler.poll(t0 + 1000 * MS));
        assert_eq!(scheduler.until_next(t0), None);

        let fresh = scheduler.start(t0);
        assert!(scheduler.poll(t0));
        scheduler.stop();
        assert!(fresh.is_cancelled());
        assert!(!scheduler.poll(t0 + 1000 * MS));
    }

    #[test]
    fn debouncer_fires_after_quiet_period() {
        let t0 = Instant::now();
        let mut debouncer = Debouncer::new(16 * MS);
        assert!(!debouncer.poll(t0));
        debouncer.trigger(t0);
        debouncer.trigger(t0 + 10 * MS);
        assert!(!debouncer.poll(t0 + 20 * MS));
        assert!(debouncer.poll(t0 + 26 * MS));
        assert!(!debouncer.poll(t0 + 40 * MS));
        debouncer.trigger(t0 + 50 * MS);
        debouncer.cancel();
        assert!(!debouncer.is_pending());
        assert!(!debouncer.poll(t0 + 100 * MS));
    }
}
