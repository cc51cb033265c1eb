//! Configuration loading and settings resolution
//!
//! Every setting is resolved in the same priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)
//!
//! A missing config file is not an error; the player starts with defaults.
//! A config file that exists but cannot be read or parsed is.

use crate::{Error, Result};
use serde::Deserialize;
use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info, warn};

/// Sink name that selects the system default output
pub const DEFAULT_DEVICE: &str = "default";

/// Frames handed to the device per write call
pub const DEFAULT_CHUNK_FRAMES: usize = 1024;

/// Largest accepted WAVE payload, in bytes
pub const DEFAULT_MAX_DATA_BYTES: u32 = 0x00FF_FFFF;

pub const ENV_CONFIG: &str = "RIFFPLAY_CONFIG";
pub const ENV_DEVICE: &str = "RIFFPLAY_DEVICE";
pub const ENV_CHUNK_FRAMES: &str = "RIFFPLAY_CHUNK_FRAMES";
pub const ENV_MAX_DATA_BYTES: &str = "RIFFPLAY_MAX_DATA_BYTES";

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Configuration loaded from a TOML file
///
/// Every field is optional in the file and falls back to the compiled default.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TomlConfig {
    /// Audio sink name ("default" = system default output)
    #[serde(default = "default_device")]
    pub device: String,

    /// Frames per device write call
    #[serde(default = "default_chunk_frames")]
    pub chunk_frames: usize,

    /// Sanity ceiling for the declared data length of a WAVE file
    #[serde(default = "default_max_data_bytes")]
    pub max_data_bytes: u32,

    /// Logging configuration (optional)
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_device() -> String {
    DEFAULT_DEVICE.to_string()
}

fn default_chunk_frames() -> usize {
    DEFAULT_CHUNK_FRAMES
}

fn default_max_data_bytes() -> u32 {
    DEFAULT_MAX_DATA_BYTES
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            device: default_device(),
            chunk_frames: default_chunk_frames(),
            max_data_bytes: default_max_data_bytes(),
            logging: LoggingConfig::default(),
        }
    }
}

impl TomlConfig {
    /// Parse and validate configuration from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: TomlConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a configuration file.
    ///
    /// # Errors
    /// - File cannot be read
    /// - File is not valid TOML or fails validation
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;

        let config = Self::from_toml_str(&content)?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Reject values the player cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.device.trim().is_empty() {
            return Err(Error::Config("device name must not be empty".to_string()));
        }
        if self.chunk_frames == 0 {
            return Err(Error::Config("chunk_frames must be greater than zero".to_string()));
        }
        if self.max_data_bytes == 0 {
            return Err(Error::Config("max_data_bytes must be greater than zero".to_string()));
        }
        if !LOG_LEVELS.contains(&self.logging.level.as_str()) {
            return Err(Error::Config(format!(
                "Unknown log level '{}' (expected one of {})",
                self.logging.level,
                LOG_LEVELS.join(", ")
            )));
        }
        Ok(())
    }
}

/// Command-line configuration overrides
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub device: Option<String>,
    pub chunk_frames: Option<usize>,
    pub max_data_bytes: Option<u32>,
}

/// Fully resolved player settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub device: String,
    pub chunk_frames: usize,
    pub max_data_bytes: u32,
    pub log_level: String,

    /// Config file the settings were read from, if any
    pub config_file: Option<PathBuf>,
}

impl Settings {
    /// Resolve settings from all sources.
    ///
    /// # Arguments
    /// - `config_path`: Config file given on the command line (None = search)
    /// - `overrides`: Values given on the command line
    ///
    /// # Errors
    /// - Explicit config file missing, unreadable or invalid
    /// - Environment variable holds an unparsable value
    /// - Resolved values fail validation
    pub fn resolve(config_path: Option<&Path>, overrides: &ConfigOverrides) -> Result<Self> {
        let (file_config, config_file) = match locate_config_file(config_path)? {
            Some(path) => (TomlConfig::load(&path)?, Some(path)),
            None => {
                debug!("No config file found, using compiled defaults");
                (TomlConfig::default(), None)
            }
        };

        let device = match overrides.device.clone() {
            Some(device) => device,
            None => env_value::<String>(ENV_DEVICE)?.unwrap_or(file_config.device),
        };

        let chunk_frames = match overrides.chunk_frames {
            Some(frames) => frames,
            None => env_value::<usize>(ENV_CHUNK_FRAMES)?.unwrap_or(file_config.chunk_frames),
        };

        let max_data_bytes = match overrides.max_data_bytes {
            Some(bytes) => bytes,
            None => env_value::<u32>(ENV_MAX_DATA_BYTES)?.unwrap_or(file_config.max_data_bytes),
        };

        let resolved = TomlConfig {
            device,
            chunk_frames,
            max_data_bytes,
            logging: file_config.logging,
        };
        resolved.validate()?;

        Ok(Self {
            device: resolved.device,
            chunk_frames: resolved.chunk_frames,
            max_data_bytes: resolved.max_data_bytes,
            log_level: resolved.logging.level,
            config_file,
        })
    }
}

/// Find the config file to load.
///
/// Search order: explicit path, `RIFFPLAY_CONFIG`, the user config directory
/// (`~/.config/riffplay/config.toml` on Linux), then `/etc/riffplay/config.toml`
/// on Linux. An explicit path (argument or environment) must exist.
pub fn locate_config_file(explicit: Option<&Path>) -> Result<Option<PathBuf>> {
    let explicit = match explicit {
        Some(path) => Some(path.to_path_buf()),
        None => env_value::<PathBuf>(ENV_CONFIG)?,
    };

    if let Some(path) = explicit {
        if path.is_file() {
            return Ok(Some(path));
        }
        return Err(Error::Config(format!("Config file not found: {}", path.display())));
    }

    let user_config = dirs::config_dir().map(|d| d.join("riffplay").join("config.toml"));
    if let Some(path) = user_config {
        if path.is_file() {
            return Ok(Some(path));
        }
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/riffplay/config.toml");
        if system_config.is_file() {
            return Ok(Some(system_config));
        }
    }

    Ok(None)
}

/// Read and parse an environment variable; unset or empty means `None`.
fn env_value<T>(name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: Display,
{
    match std::env::var(name) {
        Ok(raw) if raw.trim().is_empty() => Ok(None),
        Ok(raw) => raw.trim().parse::<T>().map(Some).map_err(|e| {
            Error::Config(format!("Invalid value '{}' for {}: {}", raw, name, e))
        }),
        Err(std::env::VarError::NotPresent) => Ok(None),
        Err(e) => {
            warn!("Ignoring {}: {}", name, e);
            Ok(None)
        }
    }
}
