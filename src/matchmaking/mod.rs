//! Sheep-versus-Wolf matchmaking on top of the job serializer.
//!
//! [`Matchmaker`] is the thread-safe handle callers use; it pushes jobs that
//! run against the [`MatchmakingEngine`] owned by the driver loop. A request
//! moves `Submitted -> Queued -> {Matched | Cancelled | Expired}`, and every
//! transition happens inside a job.

pub mod bot;
pub mod engine;
pub mod events;
pub mod queue;
pub mod request;
pub mod service;
pub mod window;

pub use engine::MatchmakingEngine;
pub use events::{ChannelSink, MatchEvent, MatchEventSink, MemorySink};
pub use queue::FactionQueue;
pub use request::{
    CancelResult, Faction, MatchRequest, MatchResult, QueueDepth, RankDeltas, SubmitOutcome,
};
pub use service::Matchmaker;
pub use window::AcceptanceWindow;
