use std::cmp::Ordering;
use std::fmt;

use crate::scheduler::clock::Tick;

/// A unit of deferred work run against the owner's state `S`.
///
/// Jobs are executed exactly once, on whichever context calls `flush`.
pub struct Job<S> {
    label: &'static str,
    action: Box<dyn FnOnce(&mut S) + Send + 'static>,
}

impl<S> Job<S> {
    pub fn new<F>(label: &'static str, action: F) -> Self
    where
        F: FnOnce(&mut S) + Send + 'static,
    {
        Self {
            label,
            action: Box::new(action),
        }
    }

    /// Short description used in logs when the job fails.
    pub fn label(&self) -> &'static str {
        self.label
    }

    pub(crate) fn run(self, state: &mut S) {
        (self.action)(state)
    }
}

impl<S> fmt::Debug for Job<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job").field("label", &self.label).finish()
    }
}

/// A job waiting in the timer until `due_tick`.
///
/// `seq` is the insertion number; it keeps equal-tick entries in FIFO order.
pub struct ScheduledJob<S> {
    pub due_tick: Tick,
    pub seq: u64,
    pub job: Job<S>,
}

impl<S> fmt::Debug for ScheduledJob<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScheduledJob")
            .field("due_tick", &self.due_tick)
            .field("seq", &self.seq)
            .field("label", &self.job.label)
            .finish()
    }
}

impl<S> PartialEq for ScheduledJob<S> {
    fn eq(&self, other: &Self) -> bool {
        self.due_tick == other.due_tick && self.seq == other.seq
    }
}

impl<S> Eq for ScheduledJob<S> {}

impl<S> PartialOrd for ScheduledJob<S> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

// Reversed so that `BinaryHeap` pops the earliest (due_tick, seq) first.
impl<S> Ord for ScheduledJob<S> {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .due_tick
            .cmp(&self.due_tick)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}
