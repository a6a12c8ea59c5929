use rand::Rng;

use crate::matchmaking::request::MatchRequest;

/// Builds synthetic opponents for test-flagged requests.
///
/// Bot user IDs count down from `u64::MAX` so they never collide with real
/// players, and bots never enter the faction queues.
#[derive(Debug)]
pub struct BotFactory {
    next_id: u64,
    spread: i64,
}

impl BotFactory {
    /// `spread` is the largest rank difference a bot may have from its
    /// opponent; the engine passes the starting window width.
    pub fn new(spread: i64) -> Self {
        Self {
            next_id: u64::MAX,
            spread: spread.max(0),
        }
    }

    pub fn opponent_for(&mut self, request: &MatchRequest) -> MatchRequest {
        let id = self.next_id;
        self.next_id -= 1;

        let offset = if self.spread == 0 {
            0
        } else {
            rand::thread_rng().gen_range(-self.spread..=self.spread)
        };

        let mut bot = MatchRequest::new(
            id,
            request.faction.opponent(),
            request.rank_point.saturating_add(offset).max(0),
        )
        .with_session(
            format!("bot-session-{}", u64::MAX - id),
            format!("bot-{}", u64::MAX - id),
        )
        .as_test();
        bot.is_bot = true;
        bot.map_id = request.map_id;
        bot.requested_at_tick = request.requested_at_tick;
        bot.seq = request.seq;
        bot
    }
}
