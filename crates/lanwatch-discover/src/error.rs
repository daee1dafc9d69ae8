//! Error types for the lanwatch-discover crate.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DiscoverError {
    #[error("Neighbor table source unavailable ({command}): {reason}")]
    NeighborSource { command: String, reason: String },

    #[error("Neighbor table command exited with code {code}: {stderr}")]
    NeighborCommandFailed { code: i32, stderr: String },

    #[error("A discovery cycle is already in progress")]
    CycleInProgress,

    #[error("Store error: {0}")]
    Store(#[from] lanwatch_store::StoreError),

    #[error("Event sink error: {0}")]
    Sink(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<config::ConfigError> for DiscoverError {
    fn from(e: config::ConfigError) -> Self {
        Self::Config(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, DiscoverError>;
