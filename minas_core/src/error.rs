use thiserror::Error;

pub type Result<T> = std::result::Result<T, EngineError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("mine count {count} out of range for grid of {grid_size}")]
    InvalidMineCount { count: usize, grid_size: usize },

    #[error("grid size {0} unsupported")]
    InvalidGridSize(usize),

    #[error("malformed server seed: expected {expected} hex characters")]
    MalformedServerSeed { expected: usize },

    #[error("client seed must not be empty")]
    EmptyClientSeed,

    #[error("position {0} outside the grid")]
    PositionOutOfRange(u8),

    #[error("iterations {0} outside the allowed range")]
    InvalidIterations(usize),

    #[error("bet amount must be positive")]
    InvalidBetAmount,

    #[error("entropy source unavailable: {0}")]
    EntropyUnavailable(String),
}
