use std::sync::Arc;

use uuid::Uuid;

use crate::config::MatchmakingConfig;
use crate::matchmaking::bot::BotFactory;
use crate::matchmaking::events::{MatchEvent, MatchEventSink};
use crate::matchmaking::queue::FactionQueue;
use crate::matchmaking::request::{
    CancelResult, Faction, MatchRequest, MatchResult, QueueDepth, RankDeltas, SubmitOutcome,
};
use crate::matchmaking::window::AcceptanceWindow;
use crate::scheduler::{Job, JobSerializer, Tick};

/// Matchmaking state. Lives on the owner context and is only touched from
/// jobs run by its [`JobSerializer`], so it carries no locks.
pub struct MatchmakingEngine {
    config: MatchmakingConfig,
    window: AcceptanceWindow,
    sheep: FactionQueue,
    wolf: FactionQueue,
    bots: BotFactory,
    sink: Arc<dyn MatchEventSink>,
    jobs: Arc<JobSerializer<MatchmakingEngine>>,
    next_seq: u64,
    sweep_armed: bool,
}

impl std::fmt::Debug for MatchmakingEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MatchmakingEngine")
            .field("sheep", &self.sheep.len())
            .field("wolf", &self.wolf.len())
            .field("sweep_armed", &self.sweep_armed)
            .finish()
    }
}

impl MatchmakingEngine {
    pub fn new(
        config: MatchmakingConfig,
        jobs: Arc<JobSerializer<MatchmakingEngine>>,
        sink: Arc<dyn MatchEventSink>,
    ) -> Self {
        Self {
            window: AcceptanceWindow::from_config(&config),
            bots: BotFactory::new(config.window_start),
            config,
            sheep: FactionQueue::new(Faction::Sheep),
            wolf: FactionQueue::new(Faction::Wolf),
            sink,
            jobs,
            next_seq: 0,
            sweep_armed: false,
        }
    }

    pub fn now(&self) -> Tick {
        self.jobs.now()
    }

    pub fn config(&self) -> &MatchmakingConfig {
        &self.config
    }

    /// Accept a request. Test requests are resolved against a bot on the
    /// spot; real requests replace any earlier entry for the same user.
    pub fn add_request(&mut self, mut request: MatchRequest) -> SubmitOutcome {
        let now = self.now();
        request.requested_at_tick = now;
        request.seq = self.next_seq;
        self.next_seq += 1;

        let replaced = self.remove_queued(request.user_id).is_some();

        if request.is_test {
            let bot = self.bots.opponent_for(&request);
            tracing::info!(
                user_id = request.user_id,
                faction = %request.faction,
                bot_id = bot.user_id,
                "Test request resolved against bot"
            );
            let result = self.form_match(request, bot, now, true);
            return SubmitOutcome::ResolvedAgainstBot(result);
        }

        tracing::debug!(
            user_id = request.user_id,
            faction = %request.faction,
            rank_point = request.rank_point,
            replaced,
            "Match request queued"
        );
        self.sink.publish(MatchEvent::Queued(request.clone()));
        self.queue_mut(request.faction).push(request);

        if replaced {
            SubmitOutcome::Replaced
        } else {
            SubmitOutcome::Queued
        }
    }

    pub fn cancel(&mut self, user_id: u64) -> CancelResult {
        let found = self.remove_queued(user_id).is_some();
        if found {
            tracing::info!(user_id, "Match request cancelled");
            self.sink.publish(MatchEvent::Cancelled { user_id });
        } else {
            tracing::debug!(user_id, "Cancel for user not in queue");
        }
        CancelResult { user_id, found }
    }

    pub fn queue_depth(&self) -> QueueDepth {
        QueueDepth {
            sheep: self.sheep.len(),
            wolf: self.wolf.len(),
        }
    }

    /// Queued request for `user_id`, whichever faction holds it.
    pub fn queued(&self, user_id: u64) -> Option<&MatchRequest> {
        self.sheep.get(user_id).or_else(|| self.wolf.get(user_id))
    }

    /// Schedule the periodic sweep if it is not already scheduled.
    pub fn arm_sweep(&mut self) {
        if self.sweep_armed {
            return;
        }
        let armed = self.jobs.push_after(
            Job::new("sweep", |engine: &mut MatchmakingEngine| engine.sweep()),
            self.config.sweep_interval_ticks,
        );
        self.sweep_armed = armed;
    }

    /// Expire stale requests, pair what can be paired, and re-arm.
    pub fn sweep(&mut self) {
        self.sweep_armed = false;
        let expired = self.expire_stale();
        let formed = self.match_pending();
        if !expired.is_empty() || !formed.is_empty() {
            let depth = self.queue_depth();
            tracing::info!(
                expired = expired.len(),
                formed = formed.len(),
                sheep = depth.sheep,
                wolf = depth.wolf,
                "Sweep finished"
            );
        }
        self.arm_sweep();
    }

    /// Remove every request that has waited longer than `max_wait_ticks`.
    pub fn expire_stale(&mut self) -> Vec<MatchRequest> {
        let now = self.now();
        let max_age = self.config.max_wait_ticks;
        let mut expired = self.sheep.drain_expired(now, max_age);
        expired.extend(self.wolf.drain_expired(now, max_age));
        expired.sort_by_key(MatchRequest::arrival_key);

        for request in &expired {
            tracing::info!(
                user_id = request.user_id,
                faction = %request.faction,
                waited = request.age(now),
                "Match request expired"
            );
            self.sink.publish(MatchEvent::Expired(request.clone()));
        }
        expired
    }

    /// Pair queued requests, oldest first.
    ///
    /// Each anchor takes the opposing request with the smallest rank gap
    /// inside the window for the longer of the two waits; equal gaps go to
    /// whoever has waited longest.
    pub fn match_pending(&mut self) -> Vec<MatchResult> {
        let now = self.now();
        let mut anchors: Vec<((Tick, u64), u64, Faction)> = self
            .sheep
            .iter()
            .chain(self.wolf.iter())
            .map(|r| (r.arrival_key(), r.user_id, r.faction))
            .collect();
        anchors.sort_unstable_by_key(|(key, _, _)| *key);

        let mut formed = Vec::new();
        for (_, user_id, faction) in anchors {
            let partner_id = match self.queue(faction).get(user_id) {
                Some(anchor) => self.best_partner(anchor, now),
                // Already paired earlier in this pass.
                None => continue,
            };
            let Some(partner_id) = partner_id else {
                continue;
            };

            let (Some(anchor), Some(partner)) = (
                self.queue_mut(faction).remove(user_id),
                self.queue_mut(faction.opponent()).remove(partner_id),
            ) else {
                continue;
            };
            formed.push(self.form_match(anchor, partner, now, false));
        }
        formed
    }

    fn best_partner(&self, anchor: &MatchRequest, now: Tick) -> Option<u64> {
        let anchor_age = anchor.age(now);
        self.queue(anchor.faction.opponent())
            .iter()
            .filter(|candidate| {
                let longest = anchor_age.max(candidate.age(now));
                self.window
                    .accepts(anchor.rank_point, candidate.rank_point, longest)
            })
            .min_by_key(|candidate| {
                (
                    anchor.rank_point.abs_diff(candidate.rank_point),
                    candidate.arrival_key(),
                )
            })
            .map(|candidate| candidate.user_id)
    }

    fn form_match(
        &mut self,
        a: MatchRequest,
        b: MatchRequest,
        now: Tick,
        is_test: bool,
    ) -> MatchResult {
        let (sheep, wolf) = match a.faction {
            Faction::Sheep => (a, b),
            Faction::Wolf => (b, a),
        };
        let deltas = RankDeltas::derive(
            sheep.rank_point,
            wolf.rank_point,
            self.config.rank_delta_base,
            self.config.rank_delta_divisor,
        );
        let result = MatchResult {
            match_id: Uuid::new_v4(),
            sheep,
            wolf,
            formed_at_tick: now,
            deltas,
            is_test,
        };
        tracing::info!(
            match_id = %result.match_id,
            sheep = result.sheep.user_id,
            wolf = result.wolf.user_id,
            rank_gap = result.rank_gap(),
            is_test,
            "Match formed"
        );
        self.sink.publish(MatchEvent::Formed(result.clone()));
        result
    }

    fn remove_queued(&mut self, user_id: u64) -> Option<MatchRequest> {
        self.sheep
            .remove(user_id)
            .or_else(|| self.wolf.remove(user_id))
    }

    fn queue(&self, faction: Faction) -> &FactionQueue {
        match faction {
            Faction::Sheep => &self.sheep,
            Faction::Wolf => &self.wolf,
        }
    }

    fn queue_mut(&mut self, faction: Faction) -> &mut FactionQueue {
        match faction {
            Faction::Sheep => &mut self.sheep,
            Faction::Wolf => &mut self.wolf,
        }
    }
}
