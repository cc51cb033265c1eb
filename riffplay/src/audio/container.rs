//! RIFF/WAVE container decoder
//!
//! Reads the fixed 44-byte canonical header, validates it, then reads exactly
//! the declared number of payload bytes. Input is untrusted: every length is
//! checked before it is used, and integer fields are assembled from bytes with
//! explicit little-endian shifts so the result does not depend on the host.
//!
//! Validation order (first failure wins):
//! 1. Header shorter than 44 bytes: `Truncated`
//! 2. Tags other than RIFF/WAVE: `BadMagic`
//! 3. Data length zero or above the ceiling: `InvalidLength`
//! 4. Zero channels, sample rate or bit depth: `MalformedFrames`
//! 5. Payload shorter than declared: `Truncated`
//! 6. Payload not a whole number of frames: `MalformedFrames`

use crate::audio::format::{AudioFormat, DecodedAudio};
use crate::error::{DecodeError, Error, Result, Section};
use std::fs::File;
use std::io::{BufReader, ErrorKind, Read};
use std::path::Path;
use tracing::{debug, warn};

/// Size of the canonical WAVE header
pub const HEADER_LEN: usize = 44;

pub const RIFF_TAG: [u8; 4] = *b"RIFF";
pub const WAVE_TAG: [u8; 4] = *b"WAVE";
pub const FMT_TAG: [u8; 4] = *b"fmt ";
pub const DATA_TAG: [u8; 4] = *b"data";

/// `WAVE_FORMAT_PCM`
pub const PCM_FORMAT_CODE: u16 = 1;

/// Size of a plain PCM `fmt ` sub-chunk
pub const PCM_FMT_LENGTH: u32 = 16;

/// Default sanity ceiling for the declared payload length
pub const DEFAULT_MAX_DATA_LENGTH: u32 = 0x00FF_FFFF;

/// Upper bound on payload bytes reserved before any are read
const MAX_PREALLOC: usize = 1 << 20;

/// The fixed header fields, in file order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavHeader {
    pub riff_tag: [u8; 4],
    pub riff_length: u32,
    pub wave_tag: [u8; 4],
    pub fmt_tag: [u8; 4],
    pub fmt_length: u32,
    pub format_code: u16,
    pub channel_count: u16,
    pub sample_rate: u32,
    pub byte_rate: u32,
    pub block_align: u16,
    pub bits_per_sample: u16,
    pub data_tag: [u8; 4],
    pub data_length: u32,
}

impl WavHeader {
    /// Parse header fields without validating them.
    pub fn parse(bytes: &[u8; HEADER_LEN]) -> Self {
        Self {
            riff_tag: tag_at(bytes, 0),
            riff_length: le_u32(bytes, 4),
            wave_tag: tag_at(bytes, 8),
            fmt_tag: tag_at(bytes, 12),
            fmt_length: le_u32(bytes, 16),
            format_code: le_u16(bytes, 20),
            channel_count: le_u16(bytes, 22),
            sample_rate: le_u32(bytes, 24),
            byte_rate: le_u32(bytes, 28),
            block_align: le_u16(bytes, 32),
            bits_per_sample: le_u16(bytes, 34),
            data_tag: tag_at(bytes, 36),
            data_length: le_u32(bytes, 40),
        }
    }

    /// Header a conforming writer would produce for `format` and `data_length`.
    pub fn canonical(format: AudioFormat, data_length: u32) -> Self {
        let block_align = format.channel_count.saturating_mul(format.bits_per_sample / 8);
        Self {
            riff_tag: RIFF_TAG,
            riff_length: data_length.saturating_add(HEADER_LEN as u32 - 8),
            wave_tag: WAVE_TAG,
            fmt_tag: FMT_TAG,
            fmt_length: PCM_FMT_LENGTH,
            format_code: PCM_FORMAT_CODE,
            channel_count: format.channel_count,
            sample_rate: format.sample_rate_hz,
            byte_rate: format.sample_rate_hz.saturating_mul(u32::from(block_align)),
            block_align,
            bits_per_sample: format.bits_per_sample,
            data_tag: DATA_TAG,
            data_length,
        }
    }

    /// Serialize back to the 44 header bytes.
    pub fn to_bytes(&self) -> [u8; HEADER_LEN] {
        let mut bytes = [0u8; HEADER_LEN];
        bytes[0..4].copy_from_slice(&self.riff_tag);
        put_u32(&mut bytes, 4, self.riff_length);
        bytes[8..12].copy_from_slice(&self.wave_tag);
        bytes[12..16].copy_from_slice(&self.fmt_tag);
        put_u32(&mut bytes, 16, self.fmt_length);
        put_u16(&mut bytes, 20, self.format_code);
        put_u16(&mut bytes, 22, self.channel_count);
        put_u32(&mut bytes, 24, self.sample_rate);
        put_u32(&mut bytes, 28, self.byte_rate);
        put_u16(&mut bytes, 32, self.block_align);
        put_u16(&mut bytes, 34, self.bits_per_sample);
        bytes[36..40].copy_from_slice(&self.data_tag);
        put_u32(&mut bytes, 40, self.data_length);
        bytes
    }

    pub fn format(&self) -> AudioFormat {
        AudioFormat::new(self.channel_count, self.sample_rate, self.bits_per_sample)
    }

    pub fn has_riff_wave_tags(&self) -> bool {
        self.riff_tag == RIFF_TAG && self.wave_tag == WAVE_TAG
    }
}

fn le_u16(bytes: &[u8], offset: usize) -> u16 {
    u16::from(bytes[offset]) | (u16::from(bytes[offset + 1]) << 8)
}

fn le_u32(bytes: &[u8], offset: usize) -> u32 {
    u32::from(bytes[offset])
        | (u32::from(bytes[offset + 1]) << 8)
        | (u32::from(bytes[offset + 2]) << 16)
        | (u32::from(bytes[offset + 3]) << 24)
}

fn tag_at(bytes: &[u8], offset: usize) -> [u8; 4] {
    [
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
    ]
}

fn put_u16(bytes: &mut [u8], offset: usize, value: u16) {
    bytes[offset] = (value & 0xFF) as u8;
    bytes[offset + 1] = (value >> 8) as u8;
}

fn put_u32(bytes: &mut [u8], offset: usize, value: u32) {
    bytes[offset] = (value & 0xFF) as u8;
    bytes[offset + 1] = ((value >> 8) & 0xFF) as u8;
    bytes[offset + 2] = ((value >> 16) & 0xFF) as u8;
    bytes[offset + 3] = (value >> 24) as u8;
}

/// Bounds applied while decoding untrusted input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecoderLimits {
    /// Largest accepted declared payload length, in bytes
    pub max_data_length: u32,
}

impl Default for DecoderLimits {
    fn default() -> Self {
        Self {
            max_data_length: DEFAULT_MAX_DATA_LENGTH,
        }
    }
}

/// WAVE container decoder.
#[derive(Debug, Clone, Default)]
pub struct ContainerDecoder {
    limits: DecoderLimits,
}

impl ContainerDecoder {
    pub fn new(limits: DecoderLimits) -> Self {
        Self { limits }
    }

    /// Decode a complete WAVE stream.
    ///
    /// Reads the header and exactly `data_length` payload bytes; anything after
    /// the payload is left unread.
    ///
    /// # Errors
    /// See the module documentation for the validation order. Reader failures
    /// other than end of stream surface as `DecodeError::Io`.
    pub fn decode<R: Read>(&self, mut reader: R) -> std::result::Result<DecodedAudio, DecodeError> {
        let mut raw = [0u8; HEADER_LEN];
        let available = read_up_to(&mut reader, &mut raw)?;
        if available < HEADER_LEN {
            return Err(DecodeError::Truncated {
                section: Section::Header,
                expected: HEADER_LEN,
                available,
            });
        }

        let header = WavHeader::parse(&raw);

        if !header.has_riff_wave_tags() {
            return Err(DecodeError::BadMagic {
                container: header.riff_tag,
                format: header.wave_tag,
            });
        }

        if header.data_length == 0 || header.data_length > self.limits.max_data_length {
            return Err(DecodeError::InvalidLength {
                declared: header.data_length,
                max: self.limits.max_data_length,
            });
        }

        header.format().validate()?;
        warn_on_unchecked_fields(&header);

        let expected = header.data_length as usize;
        // Declared lengths are untrusted; grow with the data actually read
        let mut samples = Vec::with_capacity(expected.min(MAX_PREALLOC));
        reader
            .take(u64::from(header.data_length))
            .read_to_end(&mut samples)?;

        if samples.len() < expected {
            return Err(DecodeError::Truncated {
                section: Section::Payload,
                expected,
                available: samples.len(),
            });
        }

        let audio = DecodedAudio::new(header, samples)?;
        debug!(
            "Decoded WAV: {}, {} frames",
            audio.format(),
            audio.total_frames()
        );
        Ok(audio)
    }

    /// Open and decode a WAVE file.
    ///
    /// # Errors
    /// - `Error::FileOpen` if the file cannot be opened
    /// - `Error::Decode` for any container problem
    pub fn decode_file(&self, path: &Path) -> Result<DecodedAudio> {
        debug!("Decoding file: {}", path.display());

        let file = File::open(path).map_err(|source| Error::FileOpen {
            path: path.to_path_buf(),
            source,
        })?;

        Ok(self.decode(BufReader::new(file))?)
    }
}

/// Decode a WAVE stream with default limits.
pub fn decode<R: Read>(reader: R) -> std::result::Result<DecodedAudio, DecodeError> {
    ContainerDecoder::default().decode(reader)
}

/// Decode a WAVE file with default limits.
pub fn decode_file(path: &Path) -> Result<DecodedAudio> {
    ContainerDecoder::default().decode_file(path)
}

/// Fill `buf` as far as the reader allows; returns the number of bytes read.
fn read_up_to<R: Read>(reader: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Fields the player does not rely on; odd values are worth a log line only.
fn warn_on_unchecked_fields(header: &WavHeader) {
    let format = header.format();

    if header.fmt_tag != FMT_TAG {
        warn!("Unexpected format sub-chunk tag {:?}", header.fmt_tag);
    }
    if header.format_code != PCM_FORMAT_CODE {
        warn!(
            "Format code {} is not plain PCM; playing as integer PCM",
            header.format_code
        );
    }
    if header.data_tag != DATA_TAG {
        warn!("Unexpected data sub-chunk tag {:?}", header.data_tag);
    }
    if usize::from(header.block_align) != format.frame_size_bytes() {
        warn!(
            "Header block alignment {} does not match frame size {}",
            header.block_align,
            format.frame_size_bytes()
        );
    }
    let expected_byte_rate = u64::from(format.sample_rate_hz) * format.frame_size_bytes() as u64;
    if u64::from(header.byte_rate) != expected_byte_rate {
        warn!(
            "Header byte rate {} does not match {} bytes/s",
            header.byte_rate, expected_byte_rate
        );
    }
}
