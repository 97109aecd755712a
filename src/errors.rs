// src/errors.rs

//! Crate-wide error aliases and helpers.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum WorkchainError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Chain builder for '{chain}' was already enqueued")]
    BuilderAlreadyFinalized { chain: String },

    #[error("Chain '{chain}' has an empty stage at index {stage}")]
    EmptyStage { chain: String, stage: usize },

    #[error("Work manager is not running")]
    EngineStopped,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, WorkchainError>;
