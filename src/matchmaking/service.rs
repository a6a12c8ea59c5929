use std::sync::Arc;

use tokio::sync::oneshot;

use crate::config::MatchmakingConfig;
use crate::error::{MatchmakingError, Result};
use crate::matchmaking::engine::MatchmakingEngine;
use crate::matchmaking::events::MatchEventSink;
use crate::matchmaking::request::{CancelResult, MatchRequest, QueueDepth, SubmitOutcome};
use crate::scheduler::{Clock, FlushStats, JobSerializer};

/// Thread-safe front door to the engine.
///
/// Every operation is pushed as a job; state changes happen when the owner
/// flushes. Methods that return a value await a oneshot fulfilled by the job
/// that computed it.
#[derive(Debug, Clone)]
pub struct Matchmaker {
    jobs: Arc<JobSerializer<MatchmakingEngine>>,
}

impl Matchmaker {
    /// Build the handle and the engine it drives. The engine must be handed
    /// to exactly one owner that calls [`JobSerializer::flush`] on it.
    pub fn new(
        config: MatchmakingConfig,
        clock: Arc<dyn Clock>,
        sink: Arc<dyn MatchEventSink>,
    ) -> Result<(Self, MatchmakingEngine)> {
        config.validate()?;
        let jobs = Arc::new(JobSerializer::new(clock));
        let engine = MatchmakingEngine::new(config, jobs.clone(), sink);
        Ok((Self { jobs }, engine))
    }

    pub fn jobs(&self) -> &Arc<JobSerializer<MatchmakingEngine>> {
        &self.jobs
    }

    /// Run pending jobs against `engine`. Only the owner may call this.
    pub fn flush(&self, engine: &mut MatchmakingEngine) -> FlushStats {
        self.jobs.flush(engine)
    }

    /// Arm the periodic sweep. Safe to call more than once.
    pub fn start(&self) -> Result<()> {
        self.push("arm-sweep", |engine| engine.arm_sweep())
    }

    /// Fire-and-forget submission.
    pub fn submit(&self, request: MatchRequest) -> Result<()> {
        validate_request(&request)?;
        self.push("add-request", move |engine| {
            engine.add_request(request);
        })
    }

    /// Submit and wait until the engine has processed the request.
    pub async fn submit_and_wait(&self, request: MatchRequest) -> Result<SubmitOutcome> {
        validate_request(&request)?;
        self.call("add-request", move |engine| engine.add_request(request))
            .await
    }

    pub async fn cancel(&self, user_id: u64) -> Result<CancelResult> {
        self.call("cancel-request", move |engine| engine.cancel(user_id))
            .await
    }

    /// Queue sizes as of the moment the snapshot job runs.
    pub async fn queue_depth(&self) -> Result<QueueDepth> {
        self.call("queue-depth", |engine| engine.queue_depth()).await
    }

    /// Refuse further work and release anyone still waiting on a reply.
    pub fn shutdown(&self) -> usize {
        self.jobs.close()
    }

    fn push<F>(&self, label: &'static str, action: F) -> Result<()>
    where
        F: FnOnce(&mut MatchmakingEngine) + Send + 'static,
    {
        if self.jobs.push_fn(label, action) {
            Ok(())
        } else {
            Err(MatchmakingError::EngineStopped)
        }
    }

    async fn call<T, F>(&self, label: &'static str, action: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut MatchmakingEngine) -> T + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        self.push(label, move |engine| {
            // The caller may have given up waiting; that is fine.
            let _ = tx.send(action(engine));
        })?;
        rx.await.map_err(|_| MatchmakingError::EngineStopped)
    }
}

fn validate_request(request: &MatchRequest) -> Result<()> {
    if request.session_id.trim().is_empty() {
        return Err(MatchmakingError::InvalidRequest(
            "session_id must not be empty".to_string(),
        ));
    }
    if request.rank_point < 0 {
        return Err(MatchmakingError::InvalidRequest(format!(
            "rank_point must not be negative, got {}",
            request.rank_point
        )));
    }
    Ok(())
}
