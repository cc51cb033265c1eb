//! Audio format types, WAVE container decoding and device output

pub mod container;
pub mod format;
pub mod output;

pub use container::{decode, ContainerDecoder, DecoderLimits, WavHeader};
pub use format::{AudioFormat, DecodedAudio, PcmEncoding};
pub use output::CpalDevice;
