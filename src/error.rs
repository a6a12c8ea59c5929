use thiserror::Error;

#[derive(Error, Debug)]
pub enum MatchmakingError {
    #[error("Invalid match request: {0}")]
    InvalidRequest(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Matchmaking engine stopped before the request was processed")]
    EngineStopped,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, MatchmakingError>;
