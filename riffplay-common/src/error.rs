//! Common error types for riffplay

use thiserror::Error;

/// Common result type for riffplay operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types shared by the riffplay crates
#[derive(Error, Debug)]
pub enum Error {
    /// TOML parse error
    #[error("Invalid TOML: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),
}
