use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::scheduler::clock::{Clock, Tick};
use crate::scheduler::job::Job;
use crate::scheduler::timer::JobTimer;

/// Outcome of a single `flush` pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushStats {
    /// Jobs that ran, including ones that panicked.
    pub executed: usize,
    /// Jobs that panicked.
    pub failed: usize,
}

struct Inbox<S> {
    jobs: VecDeque<Job<S>>,
    closed: bool,
}

/// Multi-producer, single-consumer job queue.
///
/// Any thread may `push`; exactly one owner calls `flush`, passing the state
/// the jobs operate on. Because every mutation of that state happens inside
/// `flush`, the state itself needs no locking.
///
/// Within one `flush`, due timer jobs run before immediate jobs, and
/// immediate jobs run in push order. Jobs pushed while a flush is running
/// (including by the running jobs) are deferred to the next flush.
pub struct JobSerializer<S> {
    inbox: Mutex<Inbox<S>>,
    timer: JobTimer<S>,
    flushing: AtomicBool,
}

impl<S> std::fmt::Debug for JobSerializer<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobSerializer")
            .field("immediate", &self.lock_inbox().jobs.len())
            .field("timer", &self.timer)
            .finish()
    }
}

impl<S> JobSerializer<S> {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            inbox: Mutex::new(Inbox {
                jobs: VecDeque::new(),
                closed: false,
            }),
            timer: JobTimer::new(clock),
            flushing: AtomicBool::new(false),
        }
    }

    /// Current tick as seen by the embedded timer.
    pub fn now(&self) -> Tick {
        self.timer.now()
    }

    /// Enqueue a job for the next flush. Returns false, dropping the job,
    /// once the serializer is closed.
    pub fn push(&self, job: Job<S>) -> bool {
        let mut inbox = self.lock_inbox();
        if inbox.closed {
            tracing::debug!(job = job.label(), "Serializer closed, job dropped");
            return false;
        }
        inbox.jobs.push_back(job);
        true
    }

    /// Convenience wrapper around [`push`](Self::push) for closures.
    pub fn push_fn<F>(&self, label: &'static str, action: F) -> bool
    where
        F: FnOnce(&mut S) + Send + 'static,
    {
        self.push(Job::new(label, action))
    }

    /// Schedule a job to run once `delay_ticks` have passed.
    pub fn push_after(&self, job: Job<S>, delay_ticks: Tick) -> bool {
        // Held across the timer push so `close` cannot slip in between.
        let inbox = self.lock_inbox();
        if inbox.closed {
            tracing::debug!(job = job.label(), "Serializer closed, scheduled job dropped");
            return false;
        }
        self.timer.push(job, delay_ticks);
        true
    }

    /// Stop accepting jobs and drop everything still waiting.
    ///
    /// Dropping a job drops whatever it captured, so callers awaiting a
    /// completion channel observe the sender going away instead of hanging.
    /// Returns the number of jobs discarded.
    pub fn close(&self) -> usize {
        let discarded = {
            let mut inbox = self.lock_inbox();
            inbox.closed = true;
            let jobs = std::mem::take(&mut inbox.jobs);
            jobs.len() + self.timer.clear()
        };
        if discarded > 0 {
            tracing::info!(discarded, "Serializer closed with jobs still pending");
        }
        discarded
    }

    pub fn is_closed(&self) -> bool {
        self.lock_inbox().closed
    }

    /// Run due timer jobs, then every immediate job queued before this call.
    ///
    /// Must only be called from the single owner context. A panicking job is
    /// logged and counted; the remaining jobs still run.
    pub fn flush(&self, state: &mut S) -> FlushStats {
        let already_flushing = self.flushing.swap(true, Ordering::AcqRel);
        debug_assert!(
            !already_flushing,
            "JobSerializer::flush called concurrently or re-entrantly"
        );

        let immediate = std::mem::take(&mut self.lock_inbox().jobs);
        let due = self.timer.take_due(self.timer.now());

        let mut stats = FlushStats::default();
        for job in due.into_iter().chain(immediate) {
            Self::run_isolated(job, state, &mut stats);
        }

        self.flushing.store(false, Ordering::Release);
        stats
    }

    /// Jobs waiting for a future flush, immediate and scheduled.
    pub fn pending(&self) -> usize {
        self.lock_inbox().jobs.len() + self.timer.len()
    }

    fn run_isolated(job: Job<S>, state: &mut S, stats: &mut FlushStats) {
        let label = job.label();
        stats.executed += 1;
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| job.run(state))) {
            stats.failed += 1;
            let reason = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic payload".to_string());
            tracing::error!(job = label, reason = %reason, "Job panicked; continuing with next job");
        }
    }

    // Jobs never run while this lock is held.
    fn lock_inbox(&self) -> MutexGuard<'_, Inbox<S>> {
        self.inbox.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
