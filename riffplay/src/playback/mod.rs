//! Device lifecycle and the chunked write loop

pub mod device;
pub mod engine;
pub mod session;

pub use device::{AccessMode, ConfigParameter, HwParam, PcmDevice, PcmStream, WriteError, Xrun};
pub use engine::{PlaybackEngine, PlaybackSettings, DEFAULT_CHUNK_FRAMES};
pub use session::{DeviceSession, PlaybackStats, SessionState};
