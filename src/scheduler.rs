//! The global event queue

use std::{cmp::Ordering, collections::BinaryHeap};

use ordered_float::OrderedFloat;

use crate::event::Event;

/// Min-ordered queue of `(time, event)` pairs.
///
/// Events sharing a timestamp pop in the order they were scheduled, which
/// keeps runs reproducible for a given RNG seed. There is no way to cancel
/// an event once it has been scheduled.
#[derive(Debug, Default)]
pub struct Scheduler {
    heap: BinaryHeap<Entry>,
    /// Number of events scheduled so far. Used as the tie-break key.
    scheduled: u64,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SchedulerError {
    #[error("tried to pop an event from an empty queue")]
    EmptyQueue,
}

#[derive(Debug)]
struct Entry {
    time: OrderedFloat<f64>,
    seq: u64,
    event: Event,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `event` to fire at `time`.
    pub fn schedule(&mut self, time: f64, event: Event) {
        debug_assert!(!time.is_nan(), "event scheduled at NaN time");

        let seq = self.scheduled;
        self.scheduled += 1;
        self.heap.push(Entry { time: OrderedFloat(time), seq, event });
    }

    /// Removes and returns the earliest event.
    pub fn pop_next(&mut self) -> Result<(f64, Event), SchedulerError> {
        self.heap
            .pop()
            .map(|entry| (entry.time.into_inner(), entry.event))
            .ok_or(SchedulerError::EmptyQueue)
    }

    /// Returns the time of the earliest event without removing it.
    pub fn peek_time(&self) -> Option<f64> {
        self.heap.peek().map(|entry| entry.time.into_inner())
    }

    /// Iterates over queued events in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (f64, &Event)> {
        self.heap.iter().map(|entry| (entry.time.into_inner(), &entry.event))
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}

// BinaryHeap is a max-heap, so the ordering is reversed: the smallest
// (time, seq) pair compares greatest.
impl Ord for Entry {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .time
            .cmp(&self.time)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Entry {}

#[cfg(test)]
mod tests {
    use super::{Scheduler, SchedulerError};
    use crate::{
        block::BlockId,
        event::{Event, EventKind},
        miner::MinerId,
    };

    fn head(n: u64) -> Event {
        Event::new(
            MinerId::from(0),
            MinerId::from(1),
            EventKind::NewHead(BlockId(n)),
        )
    }

    fn payload(event: &Event) -> u64 {
        match event.kind {
            EventKind::NewHead(id) => id.get(),
            _ => unreachable!(),
        }
    }

    #[test]
    fn pops_in_time_order() {
        let mut queue = Scheduler::new();
        queue.schedule(3.0, head(3));
        queue.schedule(1.0, head(1));
        queue.schedule(2.0, head(2));

        let times: Vec<_> = std::iter::from_fn(|| queue.pop_next().ok())
            .map(|(t, _)| t)
            .collect();

        assert_eq!(times, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn ties_pop_in_insertion_order() {
        let mut queue = Scheduler::new();
        for n in 0..5 {
            queue.schedule(7.5, head(n));
        }

        for n in 0..5 {
            let (_, event) = queue.pop_next().unwrap();
            assert_eq!(payload(&event), n);
        }
    }

    #[test]
    fn empty_queue_errors() {
        let mut queue = Scheduler::new();
        assert_eq!(queue.pop_next().unwrap_err(), SchedulerError::EmptyQueue);

        queue.schedule(0.0, head(0));
        assert_eq!(queue.peek_time(), Some(0.0));
        assert!(queue.pop_next().is_ok());
        assert!(queue.is_empty());
        assert!(queue.pop_next().is_err());
    }
}
