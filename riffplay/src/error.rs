//! Error types for riffplay
//!
//! Decode errors describe untrusted input, device errors carry backend
//! diagnostics, and playback errors describe where in the device lifecycle
//! playback stopped. All are terminal for the current file.

use crate::playback::device::{ConfigParameter, Xrun};
use crate::playback::session::SessionState;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for riffplay
#[derive(Error, Debug)]
pub enum Error {
    /// Input file could not be opened
    #[error("Failed to open {}", .path.display())]
    FileOpen {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Playback(#[from] PlaybackError),

    #[error(transparent)]
    Config(#[from] riffplay_common::Error),
}

/// Convenience Result type using riffplay Error
pub type Result<T> = std::result::Result<T, Error>;

/// Part of the container a truncation was detected in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    Header,
    Payload,
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Section::Header => write!(f, "header"),
            Section::Payload => write!(f, "sample data"),
        }
    }
}

/// Container validation and decode failures
#[derive(Error, Debug)]
pub enum DecodeError {
    /// Stream ended before the header or the declared payload was complete
    #[error("Truncated WAV {section}: expected {expected} bytes, found {available}")]
    Truncated {
        section: Section,
        expected: usize,
        available: usize,
    },

    /// Container or format tag is not RIFF/WAVE
    #[error(
        "Invalid WAV file format: expected RIFF/WAVE, found {}/{}",
        tag_text(.container),
        tag_text(.format)
    )]
    BadMagic { container: [u8; 4], format: [u8; 4] },

    /// Declared data length is zero or above the configured ceiling
    #[error("Invalid data length in WAV file: {declared} bytes (allowed 1..={max})")]
    InvalidLength { declared: u32, max: u32 },

    /// Frame layout is unusable (zero channels, zero bit depth, partial frame)
    #[error("Invalid frame size or corrupted data: {0}")]
    MalformedFrames(String),

    /// Underlying reader failed for a reason other than end of stream
    #[error("Failed to read WAV data")]
    Io(#[from] std::io::Error),
}

fn tag_text(tag: &[u8; 4]) -> String {
    tag.iter()
        .map(|&b| {
            if b.is_ascii_graphic() || b == b' ' {
                char::from(b)
            } else {
                '.'
            }
        })
        .collect::<String>()
}

/// Diagnostics reported by an audio backend
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeviceError {
    /// Named sink does not exist
    #[error("Device not found: {0}")]
    NotFound(String),

    /// Device refused a parameter value
    #[error("Not supported by device: {0}")]
    Unsupported(String),

    /// Any other backend failure
    #[error("Backend error: {0}")]
    Backend(String),
}

/// Why the write loop gave up
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteFailure {
    /// Device signalled an xrun and the single recovery attempt failed
    RecoveryFailed { cause: Xrun, error: DeviceError },

    /// Device reported a non-recoverable write error
    Fatal(DeviceError),

    /// Device claimed to accept more frames than were offered
    OverAccepted { requested: usize, accepted: usize },
}

impl fmt::Display for WriteFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriteFailure::RecoveryFailed { cause, error } => {
                write!(f, "recovery from {} failed: {}", cause, error)
            }
            WriteFailure::Fatal(error) => write!(f, "{}", error),
            WriteFailure::OverAccepted {
                requested,
                accepted,
            } => write!(
                f,
                "unexpected number of frames written ({} accepted, {} requested)",
                accepted, requested
            ),
        }
    }
}

/// Device lifecycle failures
#[derive(Error, Debug)]
pub enum PlaybackError {
    /// Sink could not be opened
    #[error("Failed to open audio device '{sink}'")]
    DeviceUnavailable {
        sink: String,
        #[source]
        source: DeviceError,
    },

    /// Bit depth has no device sample encoding
    #[error("Unsupported bit depth: {bits_per_sample} (supported: 16, 24)")]
    UnsupportedFormat { bits_per_sample: u16 },

    /// Device rejected one negotiation step
    #[error("Failed to set audio {parameter}")]
    ConfigurationRejected {
        parameter: ConfigParameter,
        #[source]
        source: DeviceError,
    },

    /// Write loop hit a terminal condition
    #[error("Error writing to audio device at frame {frame}: {failure}")]
    DeviceWriteFailed { frame: usize, failure: WriteFailure },

    /// Samples do not divide into whole frames
    #[error("Sample buffer of {len} bytes is not a whole number of {frame_size}-byte frames")]
    PartialFrame { len: usize, frame_size: usize },

    /// Device failed while emitting buffered frames
    #[error("Failed to drain audio device")]
    DrainFailed(#[source] DeviceError),

    /// Session operation called out of order
    #[error("Invalid device session state: expected {expected}, found {actual}")]
    InvalidState {
        expected: SessionState,
        actual: SessionState,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bad_magic_message_escapes_binary() {
        let err = DecodeError::BadMagic {
            container: *b"RIFX",
            format: [0x00, b'A', b'V', 0xFF],
        };
        assert_eq!(
            err.to_string(),
            "Invalid WAV file format: expected RIFF/WAVE, found RIFX/.AV."
        );
    }

    #[test]
    fn test_over_accepted_message() {
        let err = PlaybackError::DeviceWriteFailed {
            frame: 2048,
            failure: WriteFailure::OverAccepted {
                requested: 1024,
                accepted: 1025,
            },
        };
        let text = err.to_string();
        assert!(text.contains("frame 2048"));
        assert!(text.contains("1025 accepted, 1024 requested"));
    }

    #[test]
    fn test_configuration_rejected_names_parameter() {
        let err = PlaybackError::ConfigurationRejected {
            parameter: ConfigParameter::SampleRate,
            source: DeviceError::Unsupported("8000 Hz".to_string()),
        };
        assert_eq!(err.to_string(), "Failed to set audio sample rate");
        let source = std::error::Error::source(&err).map(|s| s.to_string());
        assert_eq!(source.as_deref(), Some("Not supported by device: 8000 Hz"));
    }
}
