use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::time::Duration;
use tracing::trace;

/// Identity of the round a timer was scheduled under. Bumping it cancels
/// every outstanding timer at once.
pub type Generation = u64;

/// Delayed transitions of a round
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerEvent {
    /// Round clock sample
    RoundTick,
    /// Display window of a question elapsed; blink-out begins
    DisplayElapsed { question: u64 },
    /// Blink-out oscillation sample
    BlinkTick { question: u64 },
    /// Pause after an expired question is over
    NextQuestion,
    /// Settle delay after a correct answer
    SettleCorrect { question: u64 },
    /// Settle delay after a wrong answer
    SettleIncorrect { question: u64 },
}

impl TimerEvent {
    pub fn question(&self) -> Option<u64> {
        match *self {
            TimerEvent::DisplayElapsed { question }
            | TimerEvent::BlinkTick { question }
            | TimerEvent::SettleCorrect { question }
            | TimerEvent::SettleIncorrect { question } => Some(question),
            TimerEvent::RoundTick | TimerEvent::NextQuestion => None,
        }
    }
}

/// A timer that came due
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Due {
    pub at: Duration,
    pub generation: Generation,
    pub event: TimerEvent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Entry {
    at: Duration,
    seq: u64,
    generation: Generation,
    event: TimerEvent,
}

impl Ord for Entry {
    fn cmp(&self, other: &Self) -> Ordering {
        // insertion order breaks ties so equal timestamps fire deterministically
        self.at.cmp(&other.at).then(self.seq.cmp(&other.seq))
    }
}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Single-threaded virtual-time event queue.
///
/// Nothing here sleeps: the owner advances the clock and pops due timers one
/// at a time, so the whole round is reproducible from a list of timestamps.
#[derive(Debug, Default)]
pub struct Scheduler {
    now: Duration,
    generation: Generation,
    seq: u64,
    queue: BinaryHeap<Reverse<Entry>>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now(&self) -> Duration {
        self.now
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Start a new generation, dropping every outstanding timer
    pub fn bump_generation(&mut self) -> Generation {
        self.generation += 1;
        self.queue.clear();
        self.generation
    }

    pub fn schedule_in(&mut self, delay: Duration, event: TimerEvent) {
        self.seq += 1;
        self.queue.push(Reverse(Entry {
            at: self.now + delay,
            seq: self.seq,
            generation: self.generation,
            event,
        }));
    }

    /// Drop pending timers matching `pred`
    pub fn cancel_where<F: Fn(&TimerEvent) -> bool>(&mut self, pred: F) {
        self.queue.retain(|Reverse(entry)| !pred(&entry.event));
    }

    pub fn is_scheduled<F: Fn(&TimerEvent) -> bool>(&self, pred: F) -> bool {
        self.queue.iter().any(|Reverse(entry)| pred(&entry.event))
    }

    /// Pop the earliest live timer due at or before `until`, moving the clock
    /// to its timestamp. Timers from older generations are discarded.
    pub fn pop_due(&mut self, until: Duration) -> Option<Due> {
        while let Some(Reverse(next)) = self.queue.peek().copied() {
            if next.at > until {
                return None;
            }
            self.queue.pop();
            self.now = self.now.max(next.at);
            if next.generation != self.generation {
                trace!(event = ?next.event, generation = next.generation, "dropping stale timer");
                continue;
            }
            return Some(Due {
                at: next.at,
                generation: next.generation,
                event: next.event,
            });
        }
        None
    }

    /// Move the clock forward; it never runs backwards
    pub fn advance_clock(&mut self, to: Duration) {
        self.now = self.now.max(to);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    #[test]
    fn pops_in_time_then_insertion_order() {
        let mut s = Scheduler::new();
        s.schedule_in(ms(200), TimerEvent::NextQuestion);
        s.schedule_in(ms(100), TimerEvent::RoundTick);
        s.schedule_in(ms(100), TimerEvent::BlinkTick { question: 1 });

        assert_eq!(s.pop_due(ms(1000)).unwrap().event, TimerEvent::RoundTick);
        assert_eq!(s.now(), ms(100));
        assert_eq!(
            s.pop_due(ms(1000)).unwrap().event,
            TimerEvent::BlinkTick { question: 1 }
        );
        assert_eq!(s.pop_due(ms(1000)).unwrap().event, TimerEvent::NextQuestion);
        assert!(s.pop_due(ms(1000)).is_none());
    }

    #[test]
    fn nothing_fires_before_its_time() {
        let mut s = Scheduler::new();
        s.schedule_in(ms(500), TimerEvent::NextQuestion);
        assert!(s.pop_due(ms(499)).is_none());
        assert_eq!(s.now(), ms(0));
        assert!(s.pop_due(ms(500)).is_some());
    }

    #[test]
    fn bumping_generation_cancels_everything() {
        let mut s = Scheduler::new();
        s.schedule_in(ms(100), TimerEvent::RoundTick);
        s.schedule_in(ms(100), TimerEvent::SettleCorrect { question: 3 });
        let generation = s.bump_generation();
        assert_eq!(generation, 1);
        assert_eq!(s.pending(), 0);
        assert!(s.pop_due(ms(10_000)).is_none());
    }

    #[test]
    fn cancel_where_is_selective() {
        let mut s = Scheduler::new();
        s.schedule_in(ms(50), TimerEvent::BlinkTick { question: 2 });
        s.schedule_in(ms(100), TimerEvent::RoundTick);
        s.cancel_where(|e| e.question() == Some(2));
        assert!(!s.is_scheduled(|e| matches!(e, TimerEvent::BlinkTick { .. })));
        assert_eq!(s.pop_due(ms(100)).unwrap().event, TimerEvent::RoundTick);
    }

    #[test]
    fn clock_is_monotonic() {
        let mut s = Scheduler::new();
        s.advance_clock(ms(300));
        s.advance_clock(ms(100));
        assert_eq!(s.now(), ms(300));
        s.schedule_in(ms(10), TimerEvent::RoundTick);
        assert_eq!(s.pop_due(ms(310)).unwrap().at, ms(310));
    }
}
