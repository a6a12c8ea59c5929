use std::net::SocketAddr;

use crate::error::{MatchmakingError, Result};
use crate::scheduler::Tick;

/// Tunables for the matching algorithm. Ticks are milliseconds when the
/// engine runs on [`SystemClock`](crate::scheduler::SystemClock).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchmakingConfig {
    /// Allowed rank-point difference for a request that has just arrived.
    pub window_start: i64,
    /// Rank points added to the window every `widen_interval_ticks`.
    pub widen_step: i64,
    pub widen_interval_ticks: Tick,
    /// Upper bound on the window, however long a request has waited.
    pub max_window: i64,
    /// Requests older than this are expired instead of matched.
    pub max_wait_ticks: Tick,
    /// Delay between matching/expiry sweeps.
    pub sweep_interval_ticks: Tick,
    /// Base rank-point change for a win or loss.
    pub rank_delta_base: i64,
    /// Rank gap worth one extra point of delta.
    pub rank_delta_divisor: i64,
}

impl Default for MatchmakingConfig {
    fn default() -> Self {
        Self {
            window_start: 50,
            widen_step: 25,
            widen_interval_ticks: 5_000,
            max_window: 400,
            max_wait_ticks: 60_000,
            sweep_interval_ticks: 500,
            rank_delta_base: 20,
            rank_delta_divisor: 25,
        }
    }
}

impl MatchmakingConfig {
    pub fn with_window(mut self, start: i64, step: i64, interval_ticks: Tick, max: i64) -> Self {
        self.window_start = start;
        self.widen_step = step;
        self.widen_interval_ticks = interval_ticks;
        self.max_window = max;
        self
    }

    pub fn with_max_wait(mut self, max_wait_ticks: Tick) -> Self {
        self.max_wait_ticks = max_wait_ticks;
        self
    }

    pub fn with_sweep_interval(mut self, sweep_interval_ticks: Tick) -> Self {
        self.sweep_interval_ticks = sweep_interval_ticks;
        self
    }

    pub fn validate(&self) -> Result<()> {
        let fail = |msg: &str| Err(MatchmakingError::InvalidConfig(msg.to_string()));
        if self.window_start < 0 {
            return fail("window_start must not be negative");
        }
        if self.widen_step < 0 {
            return fail("widen_step must not be negative");
        }
        if self.widen_interval_ticks == 0 {
            return fail("widen_interval_ticks must be greater than zero");
        }
        if self.max_window < self.window_start {
            return fail("max_window must be at least window_start");
        }
        if self.max_wait_ticks == 0 {
            return fail("max_wait_ticks must be greater than zero");
        }
        if self.sweep_interval_ticks == 0 {
            return fail("sweep_interval_ticks must be greater than zero");
        }
        if self.rank_delta_base < 0 || self.rank_delta_divisor <= 0 {
            return fail("rank_delta_base must be >= 0 and rank_delta_divisor > 0");
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub listen_addr: SocketAddr,
    /// How often the driver loop flushes the job serializer.
    pub driver_interval_ms: u64,
    /// How long finished outcomes stay queryable in the session registry.
    pub outcome_retention_secs: u64,
    pub matchmaking: MatchmakingConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            driver_interval_ms: 50,
            outcome_retention_secs: 600,
            matchmaking: MatchmakingConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn new(listen_addr: SocketAddr) -> Self {
        Self {
            listen_addr,
            ..Default::default()
        }
    }

    pub fn with_matchmaking(mut self, matchmaking: MatchmakingConfig) -> Self {
        self.matchmaking = matchmaking;
        self
    }

    pub fn with_driver_interval(mut self, driver_interval_ms: u64) -> Self {
        self.driver_interval_ms = driver_interval_ms;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.driver_interval_ms == 0 {
            return Err(MatchmakingError::InvalidConfig(
                "driver_interval_ms must be greater than zero".to_string(),
            ));
        }
        self.matchmaking.validate()
    }
}
