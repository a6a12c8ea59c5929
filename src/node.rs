use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::api::{run_api, ApiState};
use crate::config::ServerConfig;
use crate::error::Result;
use crate::matchmaking::{ChannelSink, MatchEvent, Matchmaker, MatchmakingEngine};
use crate::registry::SessionRegistry;
use crate::scheduler::{Clock, SystemClock};

/// Host process that wires the matchmaking core to its driver and API.
pub struct Node {
    pub config: ServerConfig,
    pub matchmaker: Matchmaker,
    pub registry: Arc<SessionRegistry>,
    engine: MatchmakingEngine,
    events: mpsc::UnboundedReceiver<MatchEvent>,
}

impl Node {
    pub fn new(config: ServerConfig) -> Result<Self> {
        Self::with_clock(config, Arc::new(SystemClock::new()))
    }

    pub fn with_clock(config: ServerConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        config.validate()?;
        let (sink, events) = ChannelSink::channel();
        let (matchmaker, engine) =
            Matchmaker::new(config.matchmaking.clone(), clock, Arc::new(sink))?;

        Ok(Self {
            config,
            matchmaker,
            registry: Arc::new(SessionRegistry::new()),
            engine,
            events,
        })
    }

    /// Run every component until `shutdown` is cancelled.
    ///
    /// 1. Arms the periodic sweep
    /// 2. Spawns the driver loop, the only place the engine is flushed
    /// 3. Spawns the event forwarder feeding the session registry
    /// 4. Spawns registry housekeeping
    /// 5. Serves the HTTP API (blocking)
    ///
    /// After the API stops, waits for the driver's final flush.
    pub async fn run(self, shutdown: CancellationToken) -> Result<()> {
        let Node {
            config,
            matchmaker,
            registry,
            engine,
            events,
        } = self;

        matchmaker.start()?;

        let driver = tokio::spawn(Self::driver_loop(
            matchmaker.clone(),
            engine,
            config.driver_interval_ms,
            shutdown.clone(),
        ));

        let forwarder_registry = registry.clone();
        tokio::spawn(async move {
            forwarder_registry.consume(events).await;
        });

        tokio::spawn(Self::housekeeping_loop(
            registry.clone(),
            config.outcome_retention_secs,
            shutdown.clone(),
        ));

        let state = ApiState {
            matchmaker,
            registry,
        };
        let served = run_api(config.listen_addr, state, shutdown.clone()).await;

        // Make sure the driver stops even if the API failed on its own.
        shutdown.cancel();
        if let Err(e) = driver.await {
            tracing::error!(error = %e, "Driver loop terminated abnormally");
        }
        served?;
        Ok(())
    }

    /// Owner loop: flushes the serializer on a fixed interval.
    ///
    /// Holding the engine by value is what makes this the single writer.
    /// On shutdown it runs one final flush, then closes the serializer so
    /// late callers get `EngineStopped` instead of waiting forever.
    pub async fn driver_loop(
        matchmaker: Matchmaker,
        mut engine: MatchmakingEngine,
        interval_ms: u64,
        shutdown: CancellationToken,
    ) {
        let mut interval = tokio::time::interval(Duration::from_millis(interval_ms));
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(interval_ms, "Matchmaking driver started");

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = interval.tick() => {
                    let stats = matchmaker.flush(&mut engine);
                    if stats.failed > 0 {
                        tracing::warn!(
                            executed = stats.executed,
                            failed = stats.failed,
                            "Jobs failed during flush"
                        );
                    }
                }
            }
        }

        let stats = matchmaker.flush(&mut engine);
        let discarded = matchmaker.shutdown();
        let depth = engine.queue_depth();
        tracing::info!(
            final_jobs = stats.executed,
            discarded,
            sheep = depth.sheep,
            wolf = depth.wolf,
            "Matchmaking driver stopped"
        );
    }

    /// Periodically drop finished outcomes older than the retention window.
    async fn housekeeping_loop(
        registry: Arc<SessionRegistry>,
        retention_secs: u64,
        shutdown: CancellationToken,
    ) {
        const MAX_RETENTION_SECS: u64 = 365 * 24 * 60 * 60;
        let retention = chrono::Duration::seconds(retention_secs.min(MAX_RETENTION_SECS) as i64);
        let mut interval = tokio::time::interval(Duration::from_secs(retention_secs.clamp(1, 60)));

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = interval.tick() => {
                    let removed = registry.prune_before(chrono::Utc::now() - retention).await;
                    if removed > 0 {
                        tracing::debug!(removed, "Pruned finished match outcomes");
                    }
                }
            }
        }
    }
}
