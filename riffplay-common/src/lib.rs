//! # riffplay Common Library
//!
//! Shared code for the riffplay crates:
//! - Bootstrap configuration (TOML file, environment, command-line overrides)
//! - Common error type

pub mod config;
pub mod error;

pub use config::{ConfigOverrides, Settings, TomlConfig};
pub use error::{Error, Result};
