use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RecError {
    /// purchase / play 以外の behavior が入力に含まれていた
    #[error("Unexpected behavior types: {unexpected:?}")]
    Schema { unexpected: Vec<String> },

    #[error("User not found: {0}")]
    UnknownUser(u64),

    #[error("Game not found: {0}")]
    UnknownGame(String),

    #[error("Dataset not found at: {}", .0.display())]
    DatasetNotFound(PathBuf),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Invalid weighting config: {0}")]
    Config(#[from] serde_json::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Tensor(#[from] candle_core::Error),
}

pub type Result<T> = std::result::Result<T, RecError>;
