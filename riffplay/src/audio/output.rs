//! Audio output using cpal
//!
//! Exposes a cpal output device through the blocking `PcmDevice`/`PcmStream`
//! traits. Writes push whole frames of raw little-endian PCM into a byte ring;
//! the cpal callback pops frames, converts each sample to the device's native
//! sample type and pads with silence when the ring runs dry.

use crate::audio::format::PcmEncoding;
use crate::error::DeviceError;
use crate::playback::device::{HwParam, PcmDevice, PcmStream, WriteError, Xrun};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, FromSample, Sample, SampleFormat, SizedSample, Stream, StreamConfig};
use ringbuf::traits::{Consumer, Observer, Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Sink name that selects the host's default output device
pub const DEFAULT_SINK: &str = "default";

/// Ring buffer length in milliseconds of audio
const RING_BUFFER_MS: usize = 250;

/// Minimum ring buffer length in frames
const MIN_RING_FRAMES: usize = 1024;

/// Sleep between checks while the ring is full or draining
const POLL_INTERVAL: Duration = Duration::from_millis(1);

/// List available audio output devices.
///
/// # Returns
/// Vector of device names
pub fn list_devices() -> Result<Vec<String>, DeviceError> {
    let host = cpal::default_host();

    let devices: Vec<String> = host
        .output_devices()
        .map_err(|e| DeviceError::Backend(format!("Failed to enumerate devices: {}", e)))?
        .filter_map(|device| device.name().ok())
        .collect();

    debug!("Found {} output devices", devices.len());
    Ok(devices)
}

/// One supported output configuration range, detached from cpal's device handle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeSpec {
    pub channels: u16,
    pub min_rate: u32,
    pub max_rate: u32,
    pub sample_format: SampleFormat,
}

impl RangeSpec {
    fn matches(
        &self,
        sample_format: SampleFormat,
        channels: Option<u16>,
        rate: Option<u32>,
    ) -> bool {
        self.sample_format == sample_format
            && channels.map_or(true, |c| self.channels == c)
            && rate.map_or(true, |r| self.min_rate <= r && r <= self.max_rate)
    }
}

/// Device sample types able to carry `encoding` without losing precision,
/// most preferred first.
pub fn preferred_sample_formats(encoding: PcmEncoding) -> &'static [SampleFormat] {
    match encoding {
        PcmEncoding::S16Le => &[SampleFormat::I16, SampleFormat::I32, SampleFormat::F32],
        PcmEncoding::S24Le3 => &[SampleFormat::I32, SampleFormat::F32],
    }
}

/// Pick the device sample type for `encoding` under the constraints known so far.
pub fn select_sample_format(
    ranges: &[RangeSpec],
    encoding: PcmEncoding,
    channels: Option<u16>,
    rate: Option<u32>,
) -> Option<SampleFormat> {
    preferred_sample_formats(encoding)
        .iter()
        .copied()
        .find(|&format| ranges.iter().any(|r| r.matches(format, channels, rate)))
}

/// Opens cpal output devices by name.
#[derive(Debug, Clone)]
pub struct CpalDevice {
    ring_buffer_ms: usize,
}

impl CpalDevice {
    pub fn new() -> Self {
        Self {
            ring_buffer_ms: RING_BUFFER_MS,
        }
    }
}

impl Default for CpalDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl PcmDevice for CpalDevice {
    type Stream = CpalStream;

    fn open(&self, sink: &str) -> Result<CpalStream, DeviceError> {
        let host = cpal::default_host();

        let device = if sink == DEFAULT_SINK {
            host.default_output_device()
                .ok_or_else(|| DeviceError::NotFound("no default output device".to_string()))?
        } else {
            let mut devices = host
                .output_devices()
                .map_err(|e| DeviceError::Backend(format!("Failed to enumerate devices: {}", e)))?;
            devices
                .find(|d| d.name().ok().as_deref() == Some(sink))
                .ok_or_else(|| DeviceError::NotFound(sink.to_string()))?
        };

        let name = device.name().unwrap_or_else(|_| "Unknown".to_string());
        info!("Using audio device: {}", name);

        let ranges: Vec<RangeSpec> = device
            .supported_output_configs()
            .map_err(|e| DeviceError::Backend(format!("Failed to get device configs: {}", e)))?
            .map(|range| RangeSpec {
                channels: range.channels(),
                min_rate: range.min_sample_rate().0,
                max_rate: range.max_sample_rate().0,
                sample_format: range.sample_format(),
            })
            .collect();

        debug!("Device '{}' offers {} config ranges", name, ranges.len());

        Ok(CpalStream {
            device,
            name,
            ranges,
            pending: PendingConfig::default(),
            active: None,
            ring_buffer_ms: self.ring_buffer_ms,
        })
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct PendingConfig {
    encoding: Option<PcmEncoding>,
    channels: Option<u16>,
    rate: Option<u32>,
}

/// State shared with the cpal callback threads
#[derive(Default)]
struct StreamFlags {
    /// Writer has pushed data since the last recovery
    started: AtomicBool,
    /// Writer is waiting for the ring to empty
    draining: AtomicBool,
    /// Callback ran out of frames while `started` and not `draining`
    starved: AtomicBool,
    /// Samples requested by the most recent callback
    period_samples: AtomicUsize,
    /// Stream error reported by cpal
    failure: Mutex<Option<String>>,
}

impl StreamFlags {
    fn take_failure(&self) -> Option<String> {
        self.failure.lock().ok().and_then(|mut slot| slot.take())
    }

    fn record_failure(&self, message: String) {
        if let Ok(mut slot) = self.failure.lock() {
            *slot = Some(message);
        }
    }

    /// Whether the next write may proceed. A stream error is reported once.
    fn write_status(&self) -> Result<(), WriteError> {
        if let Some(message) = self.take_failure() {
            return Err(WriteError::Fatal(DeviceError::Backend(message)));
        }
        if self.starved.load(Ordering::SeqCst) {
            return Err(WriteError::Xrun(Xrun::Underrun));
        }
        Ok(())
    }

    /// Forget a reported underrun; silence is expected until data flows again.
    fn clear_xrun(&self) {
        self.starved.store(false, Ordering::SeqCst);
        self.started.store(false, Ordering::SeqCst);
    }
}

/// Push as many whole frames of `bytes` as the ring has room for.
///
/// # Returns
/// Frames pushed, at most `frames`; 0 when not even one frame fits
fn push_frames(
    producer: &mut HeapProd<u8>,
    flags: &StreamFlags,
    bytes: &[u8],
    frames: usize,
    frame_bytes: usize,
) -> usize {
    let count = (producer.vacant_len() / frame_bytes).min(frames);
    if count == 0 {
        return 0;
    }
    let pushed = producer.push_slice(&bytes[..count * frame_bytes]);
    flags.started.store(true, Ordering::SeqCst);
    pushed / frame_bytes
}

/// Fill one callback buffer from the ring, a whole frame at a time.
///
/// Frames the ring cannot supply are silence. Running short after data has
/// started flowing, outside of a drain, marks the stream as starved.
fn fill_output<T>(
    consumer: &mut HeapCons<u8>,
    flags: &StreamFlags,
    encoding: PcmEncoding,
    scratch: &mut [u8],
    data: &mut [T],
) where
    T: Sample + FromSample<i32>,
{
    let sample_bytes = encoding.bytes_per_sample();
    let channels = scratch.len() / sample_bytes;
    flags.period_samples.store(data.len(), Ordering::Relaxed);

    let mut short = false;
    for frame in data.chunks_mut(channels.max(1)) {
        if consumer.occupied_len() >= scratch.len() {
            consumer.pop_slice(scratch);
            for (out, raw) in frame.iter_mut().zip(scratch.chunks_exact(sample_bytes)) {
                *out = T::from_sample(encoding.sample_to_i32(raw));
            }
        } else {
            frame.fill(T::EQUILIBRIUM);
            short = true;
        }
    }

    if short && flags.started.load(Ordering::SeqCst) && !flags.draining.load(Ordering::SeqCst) {
        flags.starved.store(true, Ordering::SeqCst);
    }
}

struct ActiveStream {
    stream: Stream,
    producer: HeapProd<u8>,
    flags: Arc<StreamFlags>,
    frame_bytes: usize,
    channels: usize,
    sample_rate: u32,
}

/// An open cpal output device.
pub struct CpalStream {
    device: Device,
    name: String,
    ranges: Vec<RangeSpec>,
    pending: PendingConfig,
    active: Option<ActiveStream>,
    ring_buffer_ms: usize,
}

impl CpalStream {
    fn active(&mut self) -> Result<&mut ActiveStream, DeviceError> {
        self.active
            .as_mut()
            .ok_or_else(|| DeviceError::Backend("stream is not prepared".to_string()))
    }
}

impl PcmStream for CpalStream {
    fn negotiate(&mut self, param: HwParam) -> Result<(), DeviceError> {
        let mut next = self.pending;
        match param {
            // cpal streams are always interleaved
            HwParam::Access(_) => return Ok(()),
            HwParam::Encoding(encoding) => next.encoding = Some(encoding),
            HwParam::Channels(channels) => next.channels = Some(channels),
            HwParam::SampleRate(rate) => next.rate = Some(rate),
        }

        let supported = match next.encoding {
            Some(encoding) => {
                select_sample_format(&self.ranges, encoding, next.channels, next.rate).is_some()
            }
            None => self.ranges.iter().any(|r| {
                next.channels.map_or(true, |c| r.channels == c)
                    && next.rate.map_or(true, |x| r.min_rate <= x && x <= r.max_rate)
            }),
        };

        if !supported {
            return Err(DeviceError::Unsupported(param.to_string()));
        }

        self.pending = next;
        Ok(())
    }

    fn commit(&mut self) -> Result<(), DeviceError> {
        let (encoding, channels, rate) = match self.pending {
            PendingConfig {
                encoding: Some(encoding),
                channels: Some(channels),
                rate: Some(rate),
            } => (encoding, channels, rate),
            _ => {
                return Err(DeviceError::Backend(
                    "encoding, channels and sample rate must be set before commit".to_string(),
                ))
            }
        };

        let sample_format =
            select_sample_format(&self.ranges, encoding, Some(channels), Some(rate))
                .ok_or_else(|| DeviceError::Unsupported(format!("{} output", encoding)))?;

        let config = StreamConfig {
            channels,
            sample_rate: cpal::SampleRate(rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let frame_bytes = usize::from(channels) * encoding.bytes_per_sample();
        let ring_frames =
            (rate as usize * self.ring_buffer_ms / 1000).max(MIN_RING_FRAMES);
        let (producer, consumer) = HeapRb::<u8>::new(ring_frames * frame_bytes).split();
        let flags = Arc::new(StreamFlags::default());

        debug!(
            "Audio config: sample_rate={}, channels={}, format={:?}, ring={} frames",
            rate, channels, sample_format, ring_frames
        );

        let stream = match sample_format {
            SampleFormat::I16 => {
                build_stream::<i16>(&self.device, &config, encoding, consumer, Arc::clone(&flags))?
            }
            SampleFormat::I32 => {
                build_stream::<i32>(&self.device, &config, encoding, consumer, Arc::clone(&flags))?
            }
            SampleFormat::F32 => {
                build_stream::<f32>(&self.device, &config, encoding, consumer, Arc::clone(&flags))?
            }
            other => {
                return Err(DeviceError::Unsupported(format!(
                    "sample format {:?}",
                    other
                )))
            }
        };

        stream
            .play()
            .map_err(|e| DeviceError::Backend(format!("Failed to start stream: {}", e)))?;

        self.active = Some(ActiveStream {
            stream,
            producer,
            flags,
            frame_bytes,
            channels: usize::from(channels),
            sample_rate: rate,
        });

        info!("Audio stream started on '{}'", self.name);
        Ok(())
    }

    fn write_interleaved(&mut self, bytes: &[u8], frames: usize) -> Result<usize, WriteError> {
        let active = self.active().map_err(WriteError::Fatal)?;
        active.flags.write_status()?;

        let frame_bytes = active.frame_bytes;
        let frames = frames.min(bytes.len() / frame_bytes);
        if frames == 0 {
            return Ok(0);
        }

        loop {
            let pushed = push_frames(&mut active.producer, &active.flags, bytes, frames, frame_bytes);
            if pushed > 0 {
                return Ok(pushed);
            }

            if let Some(message) = active.flags.take_failure() {
                return Err(WriteError::Fatal(DeviceError::Backend(message)));
            }
            thread::sleep(POLL_INTERVAL);
        }
    }

    fn recover(&mut self, cause: Xrun) -> Result<(), DeviceError> {
        let active = self.active()?;
        debug!("Recovering from {}", cause);

        active.flags.clear_xrun();

        active
            .stream
            .play()
            .map_err(|e| DeviceError::Backend(format!("Failed to restart stream: {}", e)))
    }

    fn drain(&mut self) -> Result<(), DeviceError> {
        let Some(active) = self.active.as_mut() else {
            return Ok(());
        };

        active.flags.draining.store(true, Ordering::SeqCst);

        while active.producer.occupied_len() > 0 {
            if let Some(message) = active.flags.take_failure() {
                return Err(DeviceError::Backend(message));
            }
            thread::sleep(POLL_INTERVAL);
        }

        // The last frames popped from the ring are still in the device period
        let period_frames = active.flags.period_samples.load(Ordering::SeqCst) / active.channels.max(1);
        if active.sample_rate > 0 && period_frames > 0 {
            thread::sleep(Duration::from_secs_f64(
                period_frames as f64 / f64::from(active.sample_rate),
            ));
        }

        match active.flags.take_failure() {
            Some(message) => Err(DeviceError::Backend(message)),
            None => Ok(()),
        }
    }

    fn close(&mut self) {
        if let Some(active) = self.active.take() {
            if let Err(e) = active.stream.pause() {
                warn!("Failed to pause stream on close: {}", e);
            }
        }
        self.pending = PendingConfig::default();
        debug!("Released audio device '{}'", self.name);
    }
}

/// Build an output stream whose callback converts ring frames to `T`.
fn build_stream<T>(
    device: &Device,
    config: &StreamConfig,
    encoding: PcmEncoding,
    mut consumer: HeapCons<u8>,
    flags: Arc<StreamFlags>,
) -> Result<Stream, DeviceError>
where
    T: Sample + SizedSample + FromSample<i32>,
{
    let frame_bytes = usize::from(config.channels) * encoding.bytes_per_sample();
    let mut scratch = vec![0u8; frame_bytes];
    let error_flags = Arc::clone(&flags);

    device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                fill_output(&mut consumer, &flags, encoding, &mut scratch, data);
            },
            move |err| {
                error!("Audio stream error: {}", err);
                error_flags.record_failure(err.to_string());
            },
            None,
        )
        .map_err(|e| DeviceError::Backend(format!("Failed to build stream: {}", e)))
}
