//! Shared helpers for integration tests
//!
//! - `wav_bytes`: builds WAVE files byte by byte, independent of the decoder
//! - `MockDevice`: scripted `PcmDevice` that records every call

#![allow(dead_code)]

use riffplay::error::DeviceError;
use riffplay::playback::{ConfigParameter, HwParam, PcmDevice, PcmStream, WriteError, Xrun};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

/// Header fields for a hand-built WAVE file
#[derive(Debug, Clone)]
pub struct WavSpec {
    pub riff: [u8; 4],
    pub wave: [u8; 4],
    pub channels: u16,
    pub sample_rate: u32,
    pub bits_per_sample: u16,
    /// Declared data length; `None` uses the payload length
    pub data_length: Option<u32>,
}

impl WavSpec {
    pub fn pcm(channels: u16, sample_rate: u32, bits_per_sample: u16) -> Self {
        Self {
            riff: *b"RIFF",
            wave: *b"WAVE",
            channels,
            sample_rate,
            bits_per_sample,
            data_length: None,
        }
    }

    pub fn declared_length(mut self, length: u32) -> Self {
        self.data_length = Some(length);
        self
    }
}

/// Serialize a 44-byte header followed by `payload`.
pub fn wav_bytes(spec: &WavSpec, payload: &[u8]) -> Vec<u8> {
    let data_length = spec.data_length.unwrap_or(payload.len() as u32);
    let block_align = spec.channels * (spec.bits_per_sample / 8);
    let byte_rate = spec.sample_rate * u32::from(block_align);

    let mut out = Vec::with_capacity(44 + payload.len());
    out.extend_from_slice(&spec.riff);
    out.extend_from_slice(&(36 + data_length).to_le_bytes());
    out.extend_from_slice(&spec.wave);
    out.extend_from_slice(b"fmt ");
    out.extend_from_slice(&16u32.to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes());
    out.extend_from_slice(&spec.channels.to_le_bytes());
    out.extend_from_slice(&spec.sample_rate.to_le_bytes());
    out.extend_from_slice(&byte_rate.to_le_bytes());
    out.extend_from_slice(&block_align.to_le_bytes());
    out.extend_from_slice(&spec.bits_per_sample.to_le_bytes());
    out.extend_from_slice(b"data");
    out.extend_from_slice(&data_length.to_le_bytes());
    out.extend_from_slice(payload);
    out
}

/// Deterministic, non-repeating payload of `len` bytes
pub fn payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 7 + i / 251) as u8).collect()
}

/// One scripted response to `write_interleaved`
#[derive(Debug, Clone)]
pub enum WriteStep {
    AcceptAll,
    Accept(usize),
    Xrun(Xrun),
    Fatal(DeviceError),
    /// Claim `extra` more frames than were offered
    OverAccept(usize),
}

/// Everything the mock observed, in call order where it matters
#[derive(Debug, Default)]
pub struct CallLog {
    pub opens: Vec<String>,
    pub params: Vec<HwParam>,
    pub commits: usize,
    /// Frames requested by each write call
    pub writes: Vec<usize>,
    /// Bytes of every accepted frame, concatenated
    pub received: Vec<u8>,
    pub recoveries: Vec<Xrun>,
    pub drains: usize,
    pub closes: usize,
}

/// Scripted device behavior
#[derive(Debug, Clone, Default)]
pub struct MockBehavior {
    pub fail_open: bool,
    pub reject: Option<ConfigParameter>,
    pub writes: Vec<WriteStep>,
    pub fail_recover: bool,
    pub fail_drain: bool,
}

pub struct MockDevice {
    pub log: Rc<RefCell<CallLog>>,
    behavior: MockBehavior,
}

impl MockDevice {
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            log: Rc::new(RefCell::new(CallLog::default())),
            behavior,
        }
    }

    pub fn accepting() -> Self {
        Self::new(MockBehavior::default())
    }

    pub fn log(&self) -> std::cell::Ref<'_, CallLog> {
        self.log.borrow()
    }
}

impl PcmDevice for MockDevice {
    type Stream = MockStream;

    fn open(&self, sink: &str) -> Result<MockStream, DeviceError> {
        if self.behavior.fail_open {
            return Err(DeviceError::NotFound(sink.to_string()));
        }
        self.log.borrow_mut().opens.push(sink.to_string());
        Ok(MockStream {
            log: Rc::clone(&self.log),
            behavior: self.behavior.clone(),
            script: self.behavior.writes.iter().cloned().collect(),
            frame_bytes: 0,
        })
    }
}

pub struct MockStream {
    log: Rc<RefCell<CallLog>>,
    behavior: MockBehavior,
    script: VecDeque<WriteStep>,
    frame_bytes: usize,
}

impl MockStream {
    fn rejects(&self, parameter: ConfigParameter) -> bool {
        self.behavior.reject == Some(parameter)
    }
}

impl PcmStream for MockStream {
    fn negotiate(&mut self, param: HwParam) -> Result<(), DeviceError> {
        if self.rejects(param.parameter()) {
            return Err(DeviceError::Unsupported(param.to_string()));
        }
        self.log.borrow_mut().params.push(param);
        Ok(())
    }

    fn commit(&mut self) -> Result<(), DeviceError> {
        if self.rejects(ConfigParameter::Commit) {
            return Err(DeviceError::Backend("prepare failed".to_string()));
        }
        let log = self.log.borrow();
        let mut channels = 0usize;
        let mut sample_bytes = 0usize;
        for param in &log.params {
            match param {
                HwParam::Channels(c) => channels = usize::from(*c),
                HwParam::Encoding(e) => sample_bytes = e.bytes_per_sample(),
                _ => {}
            }
        }
        drop(log);
        self.frame_bytes = channels * sample_bytes;
        self.log.borrow_mut().commits += 1;
        Ok(())
    }

    fn write_interleaved(&mut self, bytes: &[u8], frames: usize) -> Result<usize, WriteError> {
        let mut log = self.log.borrow_mut();
        log.writes.push(frames);

        let step = self.script.pop_front().unwrap_or(WriteStep::AcceptAll);
        let accepted = match step {
            WriteStep::AcceptAll => frames,
            WriteStep::Accept(n) => n.min(frames),
            WriteStep::Xrun(xrun) => return Err(WriteError::Xrun(xrun)),
            WriteStep::Fatal(error) => return Err(WriteError::Fatal(error)),
            WriteStep::OverAccept(extra) => return Ok(frames + extra),
        };

        log.received
            .extend_from_slice(&bytes[..accepted * self.frame_bytes]);
        Ok(accepted)
    }

    fn recover(&mut self, cause: Xrun) -> Result<(), DeviceError> {
        self.log.borrow_mut().recoveries.push(cause);
        if self.behavior.fail_recover {
            return Err(DeviceError::Backend("recovery failed".to_string()));
        }
        Ok(())
    }

    fn drain(&mut self) -> Result<(), DeviceError> {
        self.log.borrow_mut().drains += 1;
        if self.behavior.fail_drain {
            return Err(DeviceError::Backend("drain failed".to_string()));
        }
        Ok(())
    }

    fn close(&mut self) {
        self.log.borrow_mut().closes += 1;
    }
}
