//! Playback engine
//!
//! Drives one decoded file through a device session: open, configure, write
//! in bounded chunks, drain, close.

use crate::audio::format::DecodedAudio;
use crate::error::PlaybackError;
use crate::playback::device::PcmDevice;
use crate::playback::session::{DeviceSession, PlaybackStats};
use riffplay_common::config::{DEFAULT_CHUNK_FRAMES as DEFAULT_CHUNK, DEFAULT_DEVICE};
use std::num::NonZeroUsize;
use tracing::info;

/// Default frames per device write
pub const DEFAULT_CHUNK_FRAMES: NonZeroUsize = match NonZeroUsize::new(DEFAULT_CHUNK) {
    Some(n) => n,
    None => panic!("default chunk size must be non-zero"),
};

/// Sink selection and write sizing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaybackSettings {
    /// Device name handed to `PcmDevice::open`
    pub sink_name: String,
    /// Upper bound on frames per write
    pub chunk_frames: NonZeroUsize,
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            sink_name: DEFAULT_DEVICE.to_string(),
            chunk_frames: DEFAULT_CHUNK_FRAMES,
        }
    }
}

/// Plays decoded audio on a `PcmDevice`.
pub struct PlaybackEngine<D: PcmDevice> {
    device: D,
    settings: PlaybackSettings,
}

impl<D: PcmDevice> PlaybackEngine<D> {
    pub fn new(device: D, settings: PlaybackSettings) -> Self {
        Self { device, settings }
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    /// Play `audio` to completion.
    ///
    /// The device is released exactly once whenever it was opened, whether
    /// playback finishes or fails part way.
    ///
    /// # Returns
    /// Write loop counters
    ///
    /// # Errors
    /// The first `PlaybackError` raised by open, configure, write or drain.
    pub fn play(&self, audio: &DecodedAudio) -> Result<PlaybackStats, PlaybackError> {
        let format = audio.format();
        info!(
            "Playing {} frames ({}) on '{}'",
            audio.total_frames(),
            format,
            self.settings.sink_name
        );

        let mut session = DeviceSession::open(&self.device, &self.settings.sink_name)?;
        session.configure(format)?;
        let stats = session.write_frames(audio.samples(), self.settings.chunk_frames)?;
        session.drain()?;
        session.close();

        info!(
            "Playback complete: {} frames, {:.2}s",
            stats.frames_written,
            format.duration_of(stats.frames_written).as_secs_f64()
        );
        Ok(stats)
    }
}
