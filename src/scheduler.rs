//! Cooperative timer queue running on virtual time.
//!
//! Every timer is stamped with the epoch that was current when it was
//! scheduled. Starting or ending a session moves to a new epoch, and any
//! timer from an older epoch is dropped instead of fired, so a callback
//! can never reach into a session that no longer exists.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    /// Fixed 1 second session clock
    Clock,
    /// Self-rescheduling stimulus replacement
    Spawn,
    /// Clears the feedback flash identified by `token`
    ClearFeedback { token: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timer {
    pub due: Duration,
    pub epoch: u64,
    pub kind: TimerKind,
}

#[derive(Debug, PartialEq, Eq)]
struct Entry {
    seq: u64,
    timer: Timer,
}

impl Ord for Entry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.timer
            .due
            .cmp(&other.timer.due)
            .then(self.seq.cmp(&other.seq))
    }
}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Debug, Default)]
pub struct Scheduler {
    now: Duration,
    epoch: u64,
    next_seq: u64,
    queue: BinaryHeap<Reverse<Entry>>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now(&self) -> Duration {
        self.now
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Invalidates every outstanding timer and returns the new epoch
    pub fn cancel_all(&mut self) -> u64 {
        self.epoch += 1;
        self.queue.clear();
        self.epoch
    }

    pub fn schedule(&mut self, delay: Duration, kind: TimerKind) -> Timer {
        let timer = Timer {
            due: self.now + delay,
            epoch: self.epoch,
            kind,
        };
        self.queue.push(Reverse(Entry {
            seq: self.next_seq,
            timer,
        }));
        self.next_seq += 1;
        timer
    }

    /// Pops the earliest timer due at or before `until`, moving virtual time
    /// forward to its due instant. Timers from a stale epoch are discarded.
    pub fn pop_due(&mut self, until: Duration) -> Option<Timer> {
        loop {
            let due = self.queue.peek()?.0.timer.due;
            if due > until {
                return None;
            }
            let Reverse(entry) = self.queue.pop()?;
            self.now = self.now.max(entry.timer.due);
            if entry.timer.epoch == self.epoch {
                return Some(entry.timer);
            }
        }
    }

    pub fn advance_to(&mut self, until: Duration) {
        self.now = self.now.max(until);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    #[test]
    fn pops_in_due_order_then_fifo() {
        let mut sched = Scheduler::new();
        sched.schedule(ms(300), TimerKind::Spawn);
        sched.schedule(ms(100), TimerKind::Clock);
        sched.schedule(ms(100), TimerKind::ClearFeedback { token: 1 });

        assert_eq!(sched.pop_due(ms(1000)).unwrap().kind, TimerKind::Clock);
        assert_eq!(
            sched.pop_due(ms(1000)).unwrap().kind,
            TimerKind::ClearFeedback { token: 1 }
        );
        assert_eq!(sched.now(), ms(100));
        assert_eq!(sched.pop_due(ms(1000)).unwrap().kind, TimerKind::Spawn);
        assert!(sched.pop_due(ms(1000)).is_none());
    }

    #[test]
    fn does_not_pop_future_timers() {
        let mut sched = Scheduler::new();
        sched.schedule(ms(500), TimerKind::Spawn);
        assert!(sched.pop_due(ms(499)).is_none());
        assert_eq!(sched.now(), ms(0));

        sched.advance_to(ms(200));
        assert!(sched.pop_due(ms(499)).is_none());
        assert!(sched.pop_due(ms(500)).is_some());
        assert_eq!(sched.now(), ms(500));
    }

    #[test]
    fn delays_are_relative_to_virtual_now() {
        let mut sched = Scheduler::new();
        sched.advance_to(ms(1000));
        let timer = sched.schedule(ms(250), TimerKind::Spawn);
        assert_eq!(timer.due, ms(1250));
    }

    #[test]
    fn cancel_all_drops_outstanding_timers() {
        let mut sched = Scheduler::new();
        sched.schedule(ms(10), TimerKind::Clock);
        sched.schedule(ms(20), TimerKind::Spawn);
        let old_epoch = sched.epoch();

        let epoch = sched.cancel_all();

        assert_eq!(epoch, old_epoch + 1);
        assert!(sched.pop_due(ms(100)).is_none());

        let timer = sched.schedule(ms(5), TimerKind::Spawn);
        assert_eq!(timer.epoch, epoch);
        assert_eq!(sched.pop_due(ms(100)), Some(timer));
    }
}
