use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::scheduler::Tick;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Faction {
    Sheep,
    Wolf,
}

impl Faction {
    pub fn opponent(self) -> Self {
        match self {
            Faction::Sheep => Faction::Wolf,
            Faction::Wolf => Faction::Sheep,
        }
    }
}

impl std::fmt::Display for Faction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Faction::Sheep => write!(f, "sheep"),
            Faction::Wolf => write!(f, "wolf"),
        }
    }
}

impl std::str::FromStr for Faction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sheep" => Ok(Faction::Sheep),
            "wolf" => Ok(Faction::Wolf),
            other => Err(format!("unknown faction '{}', expected sheep or wolf", other)),
        }
    }
}

/// A player's request to be matched.
///
/// `requested_at_tick` and `seq` are stamped by the engine when the request
/// is accepted; whatever the caller sends there is overwritten.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchRequest {
    pub user_id: u64,
    pub session_id: String,
    pub user_name: String,
    pub faction: Faction,
    pub rank_point: i64,
    #[serde(default)]
    pub requested_at_tick: Tick,
    #[serde(default)]
    pub seq: u64,
    #[serde(default)]
    pub is_test: bool,
    /// Set only on synthetic opponents; never accepted from callers.
    #[serde(skip_deserializing)]
    pub is_bot: bool,
    #[serde(default)]
    pub map_id: u32,
    #[serde(default)]
    pub character_id: u32,
    #[serde(default)]
    pub asset_id: u32,
    #[serde(default)]
    pub unit_ids: Vec<u32>,
    #[serde(default)]
    pub achievements: Vec<u32>,
}

impl MatchRequest {
    pub fn new(user_id: u64, faction: Faction, rank_point: i64) -> Self {
        Self {
            user_id,
            session_id: format!("session-{}", user_id),
            user_name: format!("player-{}", user_id),
            faction,
            rank_point,
            requested_at_tick: 0,
            seq: 0,
            is_test: false,
            is_bot: false,
            map_id: 0,
            character_id: 0,
            asset_id: 0,
            unit_ids: Vec::new(),
            achievements: Vec::new(),
        }
    }

    pub fn with_session(
        mut self,
        session_id: impl Into<String>,
        user_name: impl Into<String>,
    ) -> Self {
        self.session_id = session_id.into();
        self.user_name = user_name.into();
        self
    }

    pub fn as_test(mut self) -> Self {
        self.is_test = true;
        self
    }

    pub fn age(&self, now: Tick) -> Tick {
        now.saturating_sub(self.requested_at_tick)
    }

    /// Arrival order: earliest tick first, engine sequence breaks ties.
    pub fn arrival_key(&self) -> (Tick, u64) {
        (self.requested_at_tick, self.seq)
    }
}

/// Rank-point changes each side receives depending on the result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankDeltas {
    pub sheep_win: i64,
    pub sheep_loss: i64,
    pub wolf_win: i64,
    pub wolf_loss: i64,
}

impl RankDeltas {
    /// Linear underdog rule: the lower-ranked side wins more and loses less.
    ///
    /// `adj = clamp((opponent - own) / divisor, -base/2, base/2)`,
    /// `win = base + adj`, `loss = -(base - adj)`.
    pub fn derive(sheep_rank: i64, wolf_rank: i64, base: i64, divisor: i64) -> Self {
        let divisor = divisor.max(1);
        let cap = base / 2;
        let adj = |own: i64, opponent: i64| ((opponent - own) / divisor).clamp(-cap, cap);

        let sheep_adj = adj(sheep_rank, wolf_rank);
        let wolf_adj = adj(wolf_rank, sheep_rank);
        Self {
            sheep_win: base + sheep_adj,
            sheep_loss: -(base - sheep_adj),
            wolf_win: base + wolf_adj,
            wolf_loss: -(base - wolf_adj),
        }
    }
}

/// A formed pairing, handed off once and not retained by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchResult {
    pub match_id: Uuid,
    pub sheep: MatchRequest,
    pub wolf: MatchRequest,
    pub formed_at_tick: Tick,
    pub deltas: RankDeltas,
    pub is_test: bool,
}

impl MatchResult {
    pub fn rank_gap(&self) -> i64 {
        (self.sheep.rank_point - self.wolf.rank_point).abs()
    }

    /// The entry for `user_id`, if a real player with that ID took part.
    pub fn side_of(&self, user_id: u64) -> Option<&MatchRequest> {
        if self.sheep.user_id == user_id && !self.sheep.is_bot {
            Some(&self.sheep)
        } else if self.wolf.user_id == user_id && !self.wolf.is_bot {
            Some(&self.wolf)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelResult {
    pub user_id: u64,
    /// False when the user was not queued (never submitted, already matched
    /// or expired).
    pub found: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueDepth {
    pub sheep: usize,
    pub wolf: usize,
}

impl QueueDepth {
    pub fn total(&self) -> usize {
        self.sheep + self.wolf
    }
}

/// What happened to a submission once the engine processed it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    Queued,
    /// An earlier request from the same user was replaced.
    Replaced,
    ResolvedAgainstBot(MatchResult),
}
