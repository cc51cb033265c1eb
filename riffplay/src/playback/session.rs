//! Device session lifecycle
//!
//! `DeviceSession` owns an open stream and tracks where it is in
//! Opened -> Configured -> Draining -> Closed. The stream is closed exactly
//! once: explicitly via `close`, or on drop if an earlier step failed.

use crate::audio::format::{AudioFormat, PcmEncoding};
use crate::error::{PlaybackError, WriteFailure};
use crate::playback::device::{AccessMode, ConfigParameter, HwParam, PcmDevice, PcmStream, WriteError};
use std::fmt;
use std::num::NonZeroUsize;
use std::thread;
use tracing::{debug, info, trace, warn};

/// Lifecycle state of a device session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Closed,
    Opened,
    Configured,
    Draining,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Closed => write!(f, "closed"),
            SessionState::Opened => write!(f, "opened"),
            SessionState::Configured => write!(f, "configured"),
            SessionState::Draining => write!(f, "draining"),
        }
    }
}

/// Counters from one write loop
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlaybackStats {
    /// Frames the device accepted
    pub frames_written: usize,
    /// Calls to `write_interleaved`, including ones that hit an xrun
    pub write_calls: usize,
    /// Successful xrun recoveries
    pub recoveries: usize,
    /// Writes the device returned from without accepting a frame
    pub empty_writes: usize,
}

/// An open device stream with lifecycle tracking.
pub struct DeviceSession<S: PcmStream> {
    stream: S,
    state: SessionState,
    sink: String,
    format: Option<AudioFormat>,
}

impl<S: PcmStream> DeviceSession<S> {
    /// Open `sink` on `device`.
    ///
    /// # Errors
    /// `PlaybackError::DeviceUnavailable` if the device refuses. No session
    /// exists in that case, so nothing is closed.
    pub fn open<D>(device: &D, sink: &str) -> Result<Self, PlaybackError>
    where
        D: PcmDevice<Stream = S>,
    {
        let stream = device
            .open(sink)
            .map_err(|source| PlaybackError::DeviceUnavailable {
                sink: sink.to_string(),
                source,
            })?;

        debug!("Opened audio sink '{}'", sink);

        Ok(Self {
            stream,
            state: SessionState::Opened,
            sink: sink.to_string(),
            format: None,
        })
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Negotiate access, encoding, channels and rate, then commit.
    ///
    /// # Returns
    /// The sample encoding the stream was configured with
    ///
    /// # Errors
    /// - `UnsupportedFormat` if the bit depth has no encoding (checked before
    ///   anything is sent to the device)
    /// - `ConfigurationRejected` naming the first step the device refused
    pub fn configure(&mut self, format: AudioFormat) -> Result<PcmEncoding, PlaybackError> {
        self.expect_state(SessionState::Opened)?;

        let encoding = format
            .encoding()
            .ok_or(PlaybackError::UnsupportedFormat {
                bits_per_sample: format.bits_per_sample,
            })?;

        let params = [
            HwParam::Access(AccessMode::RwInterleaved),
            HwParam::Encoding(encoding),
            HwParam::Channels(format.channel_count),
            HwParam::SampleRate(format.sample_rate_hz),
        ];

        for param in params {
            self.stream
                .negotiate(param)
                .map_err(|source| PlaybackError::ConfigurationRejected {
                    parameter: param.parameter(),
                    source,
                })?;
        }

        self.stream
            .commit()
            .map_err(|source| PlaybackError::ConfigurationRejected {
                parameter: ConfigParameter::Commit,
                source,
            })?;

        info!(
            "Configured '{}': {} ({}, {} ch, {} Hz)",
            self.sink, format, encoding, format.channel_count, format.sample_rate_hz
        );

        self.format = Some(format);
        self.state = SessionState::Configured;
        Ok(encoding)
    }

    /// Write every frame in `samples`, at most `chunk_frames` per call.
    ///
    /// An xrun gets exactly one recovery attempt; after a successful recovery
    /// the same chunk is offered again. A device reporting more frames than
    /// were offered is treated as fatal.
    ///
    /// # Errors
    /// - `InvalidState` unless the session is configured
    /// - `PartialFrame` if `samples` ends mid-frame
    /// - `DeviceWriteFailed` with the frame offset the loop stopped at
    pub fn write_frames(
        &mut self,
        samples: &[u8],
        chunk_frames: NonZeroUsize,
    ) -> Result<PlaybackStats, PlaybackError> {
        self.expect_state(SessionState::Configured)?;
        let frame_size = match self.format {
            Some(format) => format.frame_size_bytes(),
            None => {
                return Err(PlaybackError::InvalidState {
                    expected: SessionState::Configured,
                    actual: self.state,
                })
            }
        };

        if frame_size == 0 || samples.len() % frame_size != 0 {
            return Err(PlaybackError::PartialFrame {
                len: samples.len(),
                frame_size,
            });
        }

        let total_frames = samples.len() / frame_size;
        let mut stats = PlaybackStats::default();
        let mut cursor = 0usize;
        let mut stalled = false;

        while cursor < total_frames {
            let requested = chunk_frames.get().min(total_frames - cursor);
            let start = cursor * frame_size;
            let chunk = &samples[start..start + requested * frame_size];

            stats.write_calls += 1;
            trace!("Writing {} frames at frame {}", requested, cursor);
            match self.stream.write_interleaved(chunk, requested) {
                Ok(accepted) if accepted > requested => {
                    return Err(PlaybackError::DeviceWriteFailed {
                        frame: cursor,
                        failure: WriteFailure::OverAccepted {
                            requested,
                            accepted,
                        },
                    });
                }
                Ok(0) => {
                    // A blocking write accepts at least one frame; yield if the device did not
                    if !stalled {
                        warn!("Audio device accepted no frames at frame {}", cursor);
                        stalled = true;
                    }
                    stats.empty_writes += 1;
                    thread::yield_now();
                }
                Ok(accepted) => {
                    stalled = false;
                    cursor += accepted;
                    stats.frames_written += accepted;
                }
                Err(WriteError::Xrun(cause)) => {
                    warn!("Audio {} at frame {}, recovering", cause, cursor);
                    self.stream.recover(cause).map_err(|error| {
                        PlaybackError::DeviceWriteFailed {
                            frame: cursor,
                            failure: WriteFailure::RecoveryFailed { cause, error },
                        }
                    })?;
                    stats.recoveries += 1;
                }
                Err(WriteError::Fatal(error)) => {
                    return Err(PlaybackError::DeviceWriteFailed {
                        frame: cursor,
                        failure: WriteFailure::Fatal(error),
                    });
                }
            }
        }

        debug!(
            "Wrote {} frames in {} calls ({} recoveries)",
            stats.frames_written, stats.write_calls, stats.recoveries
        );
        Ok(stats)
    }

    /// Wait for the device to play everything written.
    pub fn drain(&mut self) -> Result<(), PlaybackError> {
        self.expect_state(SessionState::Configured)?;
        self.state = SessionState::Draining;
        self.stream.drain().map_err(PlaybackError::DrainFailed)
    }

    /// Release the device. Further calls do nothing.
    pub fn close(&mut self) {
        if self.state == SessionState::Closed {
            return;
        }
        self.stream.close();
        self.state = SessionState::Closed;
        debug!("Closed audio sink '{}'", self.sink);
    }

    fn expect_state(&self, expected: SessionState) -> Result<(), PlaybackError> {
        if self.state == expected {
            Ok(())
        } else {
            Err(PlaybackError::InvalidState {
                expected,
                actual: self.state,
            })
        }
    }
}

impl<S: PcmStream> Drop for DeviceSession<S> {
    fn drop(&mut self) {
        self.close();
    }
}
