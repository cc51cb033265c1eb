//! Player configuration
//!
//! Maps resolved `riffplay_common::Settings` onto the decoder limits and
//! playback settings the library types take.

use crate::audio::container::DecoderLimits;
use crate::playback::engine::PlaybackSettings;
use riffplay_common::{ConfigOverrides, Settings};
use std::num::NonZeroUsize;
use std::path::Path;

/// Everything needed to decode and play one file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerConfig {
    pub decoder: DecoderLimits,
    pub playback: PlaybackSettings,
    pub log_level: String,
}

impl PlayerConfig {
    /// Resolve from CLI overrides, environment and config file.
    pub fn load(config_path: Option<&Path>, overrides: &ConfigOverrides) -> riffplay_common::Result<Self> {
        let settings = Settings::resolve(config_path, overrides)?;
        Self::from_settings(&settings)
    }

    pub fn from_settings(settings: &Settings) -> riffplay_common::Result<Self> {
        let chunk_frames = NonZeroUsize::new(settings.chunk_frames).ok_or_else(|| {
            riffplay_common::Error::Config("chunk_frames must be greater than zero".to_string())
        })?;

        Ok(Self {
            decoder: DecoderLimits {
                max_data_length: settings.max_data_bytes,
            },
            playback: PlaybackSettings {
                sink_name: settings.device.clone(),
                chunk_frames,
            },
            log_level: settings.log_level.clone(),
        })
    }
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            decoder: DecoderLimits::default(),
            playback: PlaybackSettings::default(),
            log_level: "info".to_string(),
        }
    }
}
