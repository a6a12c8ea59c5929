pub mod api;
pub mod config;
pub mod error;
pub mod matchmaking;
pub mod node;
pub mod registry;
pub mod scheduler;
pub mod shutdown;
