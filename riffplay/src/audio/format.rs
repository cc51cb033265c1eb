//! Core audio data types
//!
//! `AudioFormat` describes interleaved integer PCM as declared by a WAVE
//! header. `DecodedAudio` pairs a format with the raw little-endian sample
//! bytes and only ever holds whole frames.

use crate::audio::container::WavHeader;
use crate::error::DecodeError;
use std::fmt;
use std::time::Duration;

/// PCM layout of a decoded file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioFormat {
    pub channel_count: u16,
    pub sample_rate_hz: u32,
    pub bits_per_sample: u16,
}

impl AudioFormat {
    pub fn new(channel_count: u16, sample_rate_hz: u32, bits_per_sample: u16) -> Self {
        Self {
            channel_count,
            sample_rate_hz,
            bits_per_sample,
        }
    }

    /// Bytes per sample of one channel (bit depth rounded down to whole bytes)
    pub fn bytes_per_sample(&self) -> usize {
        usize::from(self.bits_per_sample / 8)
    }

    /// Bytes per interleaved frame (one sample for every channel)
    pub fn frame_size_bytes(&self) -> usize {
        usize::from(self.channel_count) * self.bytes_per_sample()
    }

    /// Device sample encoding for this bit depth, if one exists
    pub fn encoding(&self) -> Option<PcmEncoding> {
        PcmEncoding::from_bits(self.bits_per_sample)
    }

    /// Playback time of `frames` frames at this sample rate
    pub fn duration_of(&self, frames: usize) -> Duration {
        if self.sample_rate_hz == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(frames as f64 / f64::from(self.sample_rate_hz))
    }

    /// Check the fields a frame layout depends on.
    ///
    /// # Errors
    /// `DecodeError::MalformedFrames` when channels, sample rate or bit depth is
    /// zero, or the bit depth is below one byte per sample.
    pub fn validate(&self) -> Result<(), DecodeError> {
        if self.channel_count == 0 {
            return Err(DecodeError::MalformedFrames(
                "channel count is zero".to_string(),
            ));
        }
        if self.bits_per_sample == 0 {
            return Err(DecodeError::MalformedFrames(
                "bits per sample is zero".to_string(),
            ));
        }
        if self.sample_rate_hz == 0 {
            return Err(DecodeError::MalformedFrames(
                "sample rate is zero".to_string(),
            ));
        }
        if self.frame_size_bytes() == 0 {
            return Err(DecodeError::MalformedFrames(format!(
                "{} bits per sample gives an empty frame",
                self.bits_per_sample
            )));
        }
        Ok(())
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ch, {} Hz, {}-bit",
            self.channel_count, self.sample_rate_hz, self.bits_per_sample
        )
    }
}

/// Sample encodings the player can hand to a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PcmEncoding {
    /// Signed 16-bit little endian
    S16Le,
    /// Signed 24-bit little endian packed in 3 bytes
    S24Le3,
}

impl PcmEncoding {
    pub fn from_bits(bits_per_sample: u16) -> Option<Self> {
        match bits_per_sample {
            16 => Some(Self::S16Le),
            24 => Some(Self::S24Le3),
            _ => None,
        }
    }

    pub fn bytes_per_sample(self) -> usize {
        match self {
            Self::S16Le => 2,
            Self::S24Le3 => 3,
        }
    }

    /// Decode one packed sample and scale it to the full `i32` range.
    ///
    /// `bytes` must hold at least `bytes_per_sample()` bytes.
    pub fn sample_to_i32(self, bytes: &[u8]) -> i32 {
        match self {
            Self::S16Le => {
                let raw = u16::from(bytes[0]) | (u16::from(bytes[1]) << 8);
                i32::from(raw as i16) << 16
            }
            Self::S24Le3 => {
                let raw = u32::from(bytes[0]) | (u32::from(bytes[1]) << 8) | (u32::from(bytes[2]) << 16);
                // Left-align the 24-bit value; the sign bit lands in bit 31
                (raw << 8) as i32
            }
        }
    }
}

impl fmt::Display for PcmEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::S16Le => write!(f, "S16_LE"),
            Self::S24Le3 => write!(f, "S24_3LE"),
        }
    }
}

/// Validated, immutable result of decoding a WAVE file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedAudio {
    header: WavHeader,
    format: AudioFormat,
    samples: Vec<u8>,
}

impl DecodedAudio {
    /// Pair a parsed header with its payload.
    ///
    /// # Errors
    /// `DecodeError::MalformedFrames` if the header's format is unusable, the
    /// payload is empty, or the payload ends in a partial frame.
    pub fn new(header: WavHeader, samples: Vec<u8>) -> Result<Self, DecodeError> {
        let format = header.format();
        format.validate()?;

        let frame_size = format.frame_size_bytes();
        if samples.is_empty() {
            return Err(DecodeError::MalformedFrames(
                "sample data holds no frames".to_string(),
            ));
        }
        if samples.len() % frame_size != 0 {
            return Err(DecodeError::MalformedFrames(format!(
                "{} bytes of sample data is not a multiple of the {}-byte frame size",
                samples.len(),
                frame_size
            )));
        }

        Ok(Self {
            header,
            format,
            samples,
        })
    }

    /// Build from a format and payload, synthesizing a canonical PCM header.
    pub fn from_pcm(format: AudioFormat, samples: Vec<u8>) -> Result<Self, DecodeError> {
        let data_length = u32::try_from(samples.len()).map_err(|_| DecodeError::InvalidLength {
            declared: u32::MAX,
            max: u32::MAX,
        })?;
        Self::new(WavHeader::canonical(format, data_length), samples)
    }

    pub fn format(&self) -> AudioFormat {
        self.format
    }

    pub fn header(&self) -> &WavHeader {
        &self.header
    }

    /// Raw interleaved little-endian sample bytes
    pub fn samples(&self) -> &[u8] {
        &self.samples
    }

    pub fn total_frames(&self) -> usize {
        self.samples.len() / self.format.frame_size_bytes()
    }

    pub fn duration(&self) -> Duration {
        self.format.duration_of(self.total_frames())
    }
}
