//! Container decoding tests against hand-built and hound-written files

mod helpers;

use helpers::{payload, wav_bytes, WavSpec};
use riffplay::audio::{decode, ContainerDecoder, DecoderLimits};
use riffplay::error::Section;
use riffplay::{AudioFormat, DecodeError, Error};
use std::io::Cursor;
use std::path::Path;
use tempfile::TempDir;

#[test]
fn test_round_trip_preserves_format_and_payload() {
    for (channels, rate, bits) in [(1u16, 8000u32, 16u16), (2, 44100, 16), (2, 48000, 24), (6, 96000, 24)] {
        let format = AudioFormat::new(channels, rate, bits);
        for frames in [1usize, 3, 1025] {
            let data = payload(frames * format.frame_size_bytes());
            let bytes = wav_bytes(&WavSpec::pcm(channels, rate, bits), &data);

            let audio = decode(Cursor::new(bytes)).unwrap();
            assert_eq!(audio.format(), format);
            assert_eq!(audio.total_frames(), frames);
            assert_eq!(audio.samples(), data.as_slice());
        }
    }
}

#[test]
fn test_decode_hound_written_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("tone.wav");

    let spec = hound::WavSpec {
        channels: 2,
        sample_rate: 44100,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(&path, spec).unwrap();
    for i in 0..441i32 {
        let left = ((i * 97) % 65536 - 32768) as i16;
        writer.write_sample(left).unwrap();
        writer.write_sample(left / -2).unwrap();
    }
    writer.finalize().unwrap();

    let audio = ContainerDecoder::default().decode_file(&path).unwrap();
    assert_eq!(audio.format(), AudioFormat::new(2, 44100, 16));
    assert_eq!(audio.total_frames(), 441);

    let first_left = i16::from_le_bytes([audio.samples()[0], audio.samples()[1]]);
    assert_eq!(first_left, -32768);
}

#[test]
fn test_nonexistent_file_is_file_open_error() {
    let result = ContainerDecoder::default().decode_file(Path::new("/nonexistent/riffplay/none.wav"));
    match result {
        Err(Error::FileOpen { path, .. }) => {
            assert_eq!(path, Path::new("/nonexistent/riffplay/none.wav"));
        }
        other => panic!("expected FileOpen, got {:?}", other),
    }
}

#[test]
fn test_bad_tags_rejected() {
    let mut spec = WavSpec::pcm(2, 44100, 16);
    spec.riff = *b"RIFX";
    let result = decode(Cursor::new(wav_bytes(&spec, &payload(8))));
    assert!(matches!(result, Err(DecodeError::BadMagic { .. })));

    let mut spec = WavSpec::pcm(2, 44100, 16);
    spec.wave = *b"AVI ";
    let result = decode(Cursor::new(wav_bytes(&spec, &payload(8))));
    assert!(matches!(result, Err(DecodeError::BadMagic { .. })));
}

#[test]
fn test_zero_data_length_rejected() {
    let bytes = wav_bytes(&WavSpec::pcm(2, 44100, 16), &[]);
    let result = decode(Cursor::new(bytes));
    assert!(matches!(
        result,
        Err(DecodeError::InvalidLength { declared: 0, .. })
    ));
}

#[test]
fn test_data_length_above_ceiling_rejected() {
    let spec = WavSpec::pcm(2, 44100, 16).declared_length(0x0100_0000);
    let result = decode(Cursor::new(wav_bytes(&spec, &payload(16))));
    assert!(matches!(
        result,
        Err(DecodeError::InvalidLength {
            declared: 0x0100_0000,
            max: 0x00FF_FFFF
        })
    ));
}

#[test]
fn test_configured_ceiling_applies() {
    let decoder = ContainerDecoder::new(DecoderLimits { max_data_length: 64 });
    let bytes = wav_bytes(&WavSpec::pcm(1, 8000, 16), &payload(128));
    assert!(matches!(
        decoder.decode(Cursor::new(bytes)),
        Err(DecodeError::InvalidLength { declared: 128, max: 64 })
    ));
}

#[test]
fn test_zero_channels_rejected() {
    let spec = WavSpec::pcm(0, 44100, 16).declared_length(8);
    let result = decode(Cursor::new(wav_bytes(&spec, &payload(8))));
    assert!(matches!(result, Err(DecodeError::MalformedFrames(_))));
}

#[test]
fn test_truncated_payload_rejected() {
    let spec = WavSpec::pcm(2, 44100, 16).declared_length(400);
    let result = decode(Cursor::new(wav_bytes(&spec, &payload(100))));
    assert!(matches!(
        result,
        Err(DecodeError::Truncated {
            section: Section::Payload,
            expected: 400,
            available: 100
        })
    ));
}

#[test]
fn test_truncated_header_rejected() {
    let bytes = wav_bytes(&WavSpec::pcm(2, 44100, 16), &payload(8));
    let result = decode(Cursor::new(&bytes[..20]));
    assert!(matches!(
        result,
        Err(DecodeError::Truncated {
            section: Section::Header,
            expected: 44,
            available: 20
        })
    ));
}

#[test]
fn test_eight_bit_file_decodes() {
    // Decodable; playback rejects the bit depth later
    let bytes = wav_bytes(&WavSpec::pcm(1, 8000, 8), &payload(10));
    let audio = decode(Cursor::new(bytes)).unwrap();
    assert_eq!(audio.total_frames(), 10);
    assert_eq!(audio.format().encoding(), None);
}
