//! Per-user outcome registry.
//!
//! Holds the latest known status of each user's match request so HTTP
//! callers can poll for results. One instance is created by the host and
//! passed to whoever needs it; there is no process-wide global.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;

use crate::matchmaking::{Faction, MatchEvent, MatchResult};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MatchStatus {
    Pending,
    Matched {
        match_id: Uuid,
        faction: Faction,
        opponent_id: u64,
        opponent_name: String,
        rank_on_win: i64,
        rank_on_loss: i64,
        is_test: bool,
    },
    Expired,
    Cancelled,
}

impl MatchStatus {
    /// Status for `user_id` if it took part in `result`.
    fn from_result(result: &MatchResult, user_id: u64) -> Option<Self> {
        let me = result.side_of(user_id)?;
        let (opponent, win, loss) = match me.faction {
            Faction::Sheep => (&result.wolf, result.deltas.sheep_win, result.deltas.sheep_loss),
            Faction::Wolf => (&result.sheep, result.deltas.wolf_win, result.deltas.wolf_loss),
        };
        Some(MatchStatus::Matched {
            match_id: result.match_id,
            faction: me.faction,
            opponent_id: opponent.user_id,
            opponent_name: opponent.user_name.clone(),
            rank_on_win: win,
            rank_on_loss: loss,
            is_test: result.is_test,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionEntry {
    pub user_id: u64,
    #[serde(flatten)]
    pub status: MatchStatus,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub struct SessionRegistry {
    entries: RwLock<HashMap<u64, SessionEntry>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, user_id: u64) -> Option<SessionEntry> {
        self.entries.read().await.get(&user_id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Record the effect of one engine event.
    ///
    /// Events arrive in the order the engine produced them, so the last one
    /// applied for a user is that user's current state.
    pub async fn apply(&self, event: &MatchEvent) {
        match event {
            MatchEvent::Queued(request) => self.set(request.user_id, MatchStatus::Pending).await,
            MatchEvent::Formed(result) => {
                for user_id in [result.sheep.user_id, result.wolf.user_id] {
                    if let Some(status) = MatchStatus::from_result(result, user_id) {
                        self.set(user_id, status).await;
                    }
                }
            }
            MatchEvent::Expired(request) => self.set(request.user_id, MatchStatus::Expired).await,
            MatchEvent::Cancelled { user_id } => self.set(*user_id, MatchStatus::Cancelled).await,
        }
    }

    /// Drop entries in a terminal state last updated before `cutoff`.
    /// Returns the number removed.
    pub async fn prune_before(&self, cutoff: DateTime<Utc>) -> usize {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, e| e.status == MatchStatus::Pending || e.updated_at >= cutoff);
        before - entries.len()
    }

    /// Apply events until the sending side is dropped.
    pub async fn consume(&self, mut rx: mpsc::UnboundedReceiver<MatchEvent>) {
        while let Some(event) = rx.recv().await {
            self.apply(&event).await;
        }
        tracing::debug!("Match event stream closed");
    }

    async fn set(&self, user_id: u64, status: MatchStatus) {
        self.entries.write().await.insert(
            user_id,
            SessionEntry {
                user_id,
                status,
                updated_at: Utc::now(),
            },
        );
    }
}
