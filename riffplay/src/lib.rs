//! # riffplay Library
//!
//! Plays linear-PCM RIFF/WAVE files through an audio sink.
//!
//! **Purpose:** Validate and decode an untrusted WAVE file into raw frames,
//! then stream those frames to an audio device in bounded chunks with a
//! guaranteed device release on every exit path.
//!
//! **Architecture:** `audio::container` decodes bytes into `DecodedAudio`;
//! `playback::PlaybackEngine` drives a `DeviceSession` over any `PcmDevice`,
//! with `audio::output::CpalDevice` as the cpal-backed implementation.

pub mod audio;
pub mod config;
pub mod error;
pub mod playback;

pub use audio::{AudioFormat, ContainerDecoder, DecodedAudio};
pub use error::{DecodeError, DeviceError, Error, PlaybackError, Result};
pub use playback::{PlaybackEngine, PlaybackSettings, PlaybackStats};
