use std::sync::Mutex;

use tokio::sync::mpsc;

use crate::matchmaking::request::{MatchRequest, MatchResult};

/// Outbound notifications produced by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchEvent {
    /// A real request entered (or replaced an entry in) a faction queue.
    Queued(MatchRequest),
    /// Two players (or a player and a bot) were paired.
    Formed(MatchResult),
    /// A request waited longer than the configured maximum.
    Expired(MatchRequest),
    Cancelled { user_id: u64 },
}

/// Receiver of engine events.
///
/// Called from inside serializer jobs, so implementations must not block.
pub trait MatchEventSink: Send + Sync {
    fn publish(&self, event: MatchEvent);
}

/// Forwards events to an unbounded channel consumed by an async task.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<MatchEvent>,
}

impl ChannelSink {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<MatchEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl MatchEventSink for ChannelSink {
    fn publish(&self, event: MatchEvent) {
        if self.tx.send(event).is_err() {
            tracing::warn!("Match event receiver dropped, event discarded");
        }
    }
}

/// Keeps every event in memory. Handy for tests and simulations.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<MatchEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take all events recorded so far.
    pub fn drain(&self) -> Vec<MatchEvent> {
        std::mem::take(&mut *self.events.lock().unwrap_or_else(|e| e.into_inner()))
    }

    pub fn formed(&self) -> Vec<MatchResult> {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter_map(|e| match e {
                MatchEvent::Formed(result) => Some(result.clone()),
                _ => None,
            })
            .collect()
    }
}

impl MatchEventSink for MemorySink {
    fn publish(&self, event: MatchEvent) {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(event);
    }
}
