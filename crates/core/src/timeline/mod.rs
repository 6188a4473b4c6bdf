use std::time::Duration;

/// Identifier handed out for a scheduled one-shot timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerId(u64);

#[derive(Debug, Clone)]
struct PendingTimer {
    id: TimerId,
    deadline: Duration,
}

/// One-shot timer registry for a cooperative event loop.
///
/// Time is expressed as a [`Duration`] offset from the session epoch; the
/// application derives it from a monotonic clock while tests pass synthetic
/// values. Nothing here blocks: callers ask for [`TimerWheel::next_deadline`]
/// and decide how long to wait themselves.
#[derive(Debug, Default)]
pub struct TimerWheel {
    next_id: u64,
    pending: Vec<PendingTimer>,
}

impl TimerWheel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arms a one-shot timer that becomes due `delay` after `now`.
    pub fn schedule(&mut self, now: Duration, delay: Duration) -> TimerId {
        self.next_id += 1;
        let id = TimerId(self.next_id);
        self.pending.push(PendingTimer {
            id,
            deadline: now + delay,
        });
        id
    }

    /// Cancels a pending timer. A cancelled timer is never returned by
    /// [`TimerWheel::pop_due`]. Cancelling an already-fired or unknown id is
    /// a no-op.
    pub fn cancel(&mut self, id: TimerId) {
        self.pending.retain(|timer| timer.id != id);
    }

    /// Removes and returns the earliest timer whose deadline has passed,
    /// breaking deadline ties by scheduling order.
    pub fn pop_due(&mut self, now: Duration) -> Option<TimerId> {
        let index = self
            .pending
            .iter()
            .enumerate()
            .filter(|(_, timer)| timer.deadline <= now)
            .min_by_key(|(_, timer)| (timer.deadline, timer.id.0))
            .map(|(index, _)| index)?;
        Some(self.pending.remove(index).id)
    }

    /// The earliest pending deadline, if any timers are armed.
    pub fn next_deadline(&self) -> Option<Duration> {
        self.pending.iter().map(|timer| timer.deadline).min()
    }

    pub fn is_pending(&self, id: TimerId) -> bool {
        self.pending.iter().any(|timer| timer.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(value: u64) -> Duration {
        Duration::from_secs(value)
    }

    #[test]
    fn fires_in_deadline_order() {
        let mut wheel = TimerWheel::new();
        let late = wheel.schedule(secs(0), secs(5));
        let early = wheel.schedule(secs(0), secs(2));

        assert_eq!(wheel.next_deadline(), Some(secs(2)));
        assert_eq!(wheel.pop_due(secs(1)), None);
        assert_eq!(wheel.pop_due(secs(10)), Some(early));
        assert_eq!(wheel.pop_due(secs(10)), Some(late));
        assert_eq!(wheel.pop_due(secs(10)), None);
    }

    #[test]
    fn cancelled_timers_never_fire() {
        let mut wheel = TimerWheel::new();
        let id = wheel.schedule(secs(0), secs(1));
        assert!(wheel.is_pending(id));

        wheel.cancel(id);
        assert!(!wheel.is_pending(id));
        assert_eq!(wheel.pop_due(secs(10)), None);
        assert_eq!(wheel.next_deadline(), None);
    }

    #[test]
    fn ties_break_by_scheduling_order() {
        let mut wheel = TimerWheel::new();
        let first = wheel.schedule(secs(0), secs(3));
        let second = wheel.schedule(secs(0), secs(3));

        assert_eq!(wheel.pop_due(secs(3)), Some(first));
        assert_eq!(wheel.pop_due(secs(3)), Some(second));
    }
}
