use std::collections::BinaryHeap;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::scheduler::clock::{Clock, Tick};
use crate::scheduler::job::{Job, ScheduledJob};

struct TimerHeap<S> {
    entries: BinaryHeap<ScheduledJob<S>>,
    next_seq: u64,
}

/// Thread-safe timer holding jobs until their due tick.
///
/// The lock only guards the heap. Jobs run outside it, so a job may push
/// new timer entries without deadlocking; those entries are picked up by
/// the next `flush`.
pub struct JobTimer<S> {
    clock: Arc<dyn Clock>,
    heap: Mutex<TimerHeap<S>>,
}

impl<S> std::fmt::Debug for JobTimer<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobTimer")
            .field("now", &self.clock.now())
            .field("pending", &self.len())
            .finish()
    }
}

impl<S> JobTimer<S> {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            heap: Mutex::new(TimerHeap {
                entries: BinaryHeap::new(),
                next_seq: 0,
            }),
        }
    }

    pub fn now(&self) -> Tick {
        self.clock.now()
    }

    /// Schedule `job` to run once `delay_ticks` have elapsed.
    pub fn push(&self, job: Job<S>, delay_ticks: Tick) {
        let due_tick = self.clock.now().saturating_add(delay_ticks);
        let mut heap = self.lock();
        let seq = heap.next_seq;
        heap.next_seq += 1;
        heap.entries.push(ScheduledJob { due_tick, seq, job });
    }

    /// Remove every entry due at or before `now`, earliest first.
    pub(crate) fn take_due(&self, now: Tick) -> Vec<Job<S>> {
        let mut heap = self.lock();
        let mut due = Vec::new();
        while heap.entries.peek().is_some_and(|e| e.due_tick <= now) {
            if let Some(entry) = heap.entries.pop() {
                due.push(entry.job);
            }
        }
        due
    }

    /// Run all due jobs on the caller's stack. Returns how many ran.
    pub fn flush(&self, state: &mut S) -> usize {
        let due = self.take_due(self.clock.now());
        let count = due.len();
        for job in due {
            job.run(state);
        }
        count
    }

    /// Drop every pending entry. Returns how many were dropped.
    pub fn clear(&self) -> usize {
        let mut heap = self.lock();
        let count = heap.entries.len();
        heap.entries.clear();
        count
    }

    /// Due tick of the earliest pending entry.
    pub fn next_due(&self) -> Option<Tick> {
        self.lock().entries.peek().map(|e| e.due_tick)
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }

    // Jobs never run under this lock, so poisoning can only come from a
    // panic inside BinaryHeap itself; the heap is still structurally valid.
    fn lock(&self) -> MutexGuard<'_, TimerHeap<S>> {
        self.heap.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
