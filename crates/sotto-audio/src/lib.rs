//! Audio capture for sotto.
//!
//! There can only be one active capture at a time; storage and processing
//! are not managed by this crate. The session controller talks to capture
//! through the [`AudioSource`] and [`CaptureHandle`] traits so tests can
//! substitute a fake microphone.

use std::time::Duration;

mod recorder;

pub use recorder::{Recorder, RecorderError};

/// Something that can open the microphone.
pub trait AudioSource: Send + Sync {
    /// Opens the input device and begins capturing. Fails fast when no
    /// usable device is available.
    fn start(&self) -> Result<Box<dyn CaptureHandle>, RecorderError>;
}

/// An in-progress capture. Dropping an unfinished handle stops the capture
/// and discards the audio.
pub trait CaptureHandle: Send {
    /// Stops capturing and returns the finished recording. `None` when no
    /// samples were captured or the handle was already finished; calling
    /// again after that is a no-op.
    fn finish(&mut self) -> Result<Option<Recording>, RecorderError>;
}

/// A finished capture: a complete WAV in memory plus its shape.
#[derive(Debug, Clone)]
pub struct Recording {
    data: Vec<u8>,
    sample_rate: u32,
    channels: u16,
    frames: u64,
}

impl Recording {
    pub fn new(data: Vec<u8>, sample_rate: u32, channels: u16, frames: u64) -> Self {
        Self {
            data,
            sample_rate,
            channels,
            frames,
        }
    }

    /// Length of the captured audio.
    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.frames as f64 / f64::from(self.sample_rate.max(1)))
    }

    /// Total samples across all channels.
    pub fn samples(&self) -> u64 {
        self.frames * u64::from(self.channels)
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// The WAV bytes.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }
}
