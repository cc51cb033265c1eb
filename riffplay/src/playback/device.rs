//! Capability traits for PCM output devices
//!
//! The playback engine only talks to these traits. A device opens named sinks;
//! a stream accepts hardware parameters one at a time, commits them, and then
//! takes blocking interleaved writes.

use crate::audio::format::PcmEncoding;
use crate::error::DeviceError;
use std::fmt;
use thiserror::Error;

/// Sample access layout. Only interleaved read/write is used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    RwInterleaved,
}

/// One hardware parameter proposed during negotiation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HwParam {
    Access(AccessMode),
    Encoding(PcmEncoding),
    Channels(u16),
    SampleRate(u32),
}

impl HwParam {
    pub fn parameter(&self) -> ConfigParameter {
        match self {
            HwParam::Access(_) => ConfigParameter::Access,
            HwParam::Encoding(_) => ConfigParameter::SampleEncoding,
            HwParam::Channels(_) => ConfigParameter::Channels,
            HwParam::SampleRate(_) => ConfigParameter::SampleRate,
        }
    }
}

impl fmt::Display for HwParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HwParam::Access(AccessMode::RwInterleaved) => write!(f, "interleaved access"),
            HwParam::Encoding(encoding) => write!(f, "{}", encoding),
            HwParam::Channels(count) => write!(f, "{} channels", count),
            HwParam::SampleRate(rate) => write!(f, "{} Hz", rate),
        }
    }
}

/// Negotiation step named in configuration errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigParameter {
    Access,
    SampleEncoding,
    Channels,
    SampleRate,
    /// Applying the full parameter set and preparing the stream
    Commit,
}

impl fmt::Display for ConfigParameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConfigParameter::Access => "access type",
            ConfigParameter::SampleEncoding => "sample format",
            ConfigParameter::Channels => "channel count",
            ConfigParameter::SampleRate => "sample rate",
            ConfigParameter::Commit => "hardware parameters",
        };
        f.write_str(name)
    }
}

/// Transient stream conditions a device can recover from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Xrun {
    /// Device ran out of frames to play
    Underrun,
    /// Device buffer overflowed
    Overrun,
    /// Stream was in a state that does not accept writes
    BadState,
}

impl fmt::Display for Xrun {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Xrun::Underrun => write!(f, "underrun"),
            Xrun::Overrun => write!(f, "overrun"),
            Xrun::BadState => write!(f, "bad stream state"),
        }
    }
}

/// Failure of a single interleaved write
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WriteError {
    #[error("stream {0}")]
    Xrun(Xrun),

    #[error(transparent)]
    Fatal(DeviceError),
}

impl WriteError {
    pub fn is_recoverable(&self) -> bool {
        matches!(self, WriteError::Xrun(_))
    }
}

/// Something that can open a PCM output stream by sink name.
pub trait PcmDevice {
    type Stream: PcmStream;

    /// Open the named sink for playback.
    ///
    /// # Errors
    /// `DeviceError::NotFound` if no such sink exists, or a backend error.
    fn open(&self, sink: &str) -> Result<Self::Stream, DeviceError>;
}

/// An open PCM output stream.
///
/// Callers propose every `HwParam` once, `commit` once, then write. `close`
/// must tolerate being called on a stream in any state.
pub trait PcmStream {
    /// Restrict the stream configuration to `param`.
    fn negotiate(&mut self, param: HwParam) -> Result<(), DeviceError>;

    /// Apply the negotiated parameters and prepare the stream for writes.
    fn commit(&mut self) -> Result<(), DeviceError>;

    /// Write up to `frames` interleaved frames from `bytes`.
    ///
    /// Blocks until at least part of the chunk is accepted. Returns the number
    /// of frames accepted, which callers treat as untrusted.
    fn write_interleaved(&mut self, bytes: &[u8], frames: usize) -> Result<usize, WriteError>;

    /// Bring the stream back to a writable state after an xrun.
    fn recover(&mut self, cause: Xrun) -> Result<(), DeviceError>;

    /// Block until every accepted frame has been played.
    fn drain(&mut self) -> Result<(), DeviceError>;

    /// Release the device.
    fn close(&mut self);
}
