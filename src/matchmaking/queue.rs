use std::collections::VecDeque;

use crate::matchmaking::request::{Faction, MatchRequest};
use crate::scheduler::Tick;

/// Waiting requests for one faction, in arrival order.
#[derive(Debug, Clone)]
pub struct FactionQueue {
    faction: Faction,
    entries: VecDeque<MatchRequest>,
}

impl FactionQueue {
    pub fn new(faction: Faction) -> Self {
        Self {
            faction,
            entries: VecDeque::new(),
        }
    }

    pub fn faction(&self) -> Faction {
        self.faction
    }

    /// Append a request. The caller guarantees the user is not already queued.
    pub fn push(&mut self, request: MatchRequest) {
        debug_assert_eq!(request.faction, self.faction);
        debug_assert!(!self.contains(request.user_id));
        self.entries.push_back(request);
    }

    /// Get a queued request by user ID
    pub fn get(&self, user_id: u64) -> Option<&MatchRequest> {
        self.entries.iter().find(|r| r.user_id == user_id)
    }

    pub fn contains(&self, user_id: u64) -> bool {
        self.get(user_id).is_some()
    }

    /// Remove and return the request for `user_id`, if queued.
    pub fn remove(&mut self, user_id: u64) -> Option<MatchRequest> {
        let index = self.entries.iter().position(|r| r.user_id == user_id)?;
        self.entries.remove(index)
    }

    /// Remove every request older than `max_age` at `now`. Returns them in
    /// arrival order.
    pub fn drain_expired(&mut self, now: Tick, max_age: Tick) -> Vec<MatchRequest> {
        let mut expired = Vec::new();
        let mut kept = VecDeque::with_capacity(self.entries.len());
        for request in self.entries.drain(..) {
            if request.age(now) > max_age {
                expired.push(request);
            } else {
                kept.push_back(request);
            }
        }
        self.entries = kept;
        expired
    }

    /// Iterate in arrival order
    pub fn iter(&self) -> impl Iterator<Item = &MatchRequest> {
        self.entries.iter()
    }

    /// Returns the current number of waiting requests
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nobody is waiting
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
