//! cpal-backed capture.
//!
//! `cpal::Stream` is not `Send`, so the stream lives on a dedicated capture
//! thread for its whole life. The handle returned to the caller only holds
//! the stop channel, the join handle, and the shared in-memory buffer, all
//! of which can cross threads freely.
//!
//! Audio is buffered as uncompressed WAV, roughly 5.5 MiB per minute at
//! 48 kHz/16-bit mono. Dictation runs a sentence or two, so keeping it in
//! memory and skipping a codec dependency is the right trade.

use std::io::{self, Cursor, Seek, SeekFrom, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{Receiver, Sender, channel};
use std::thread::JoinHandle;

use anyhow::anyhow;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, Sample};
use hound::WavWriter;
use parking_lot::Mutex;
use thiserror::Error;
use tracing::{error, info};

use crate::{AudioSource, CaptureHandle, Recording};

#[derive(Debug, Error)]
pub enum RecorderError {
    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
    /// No usable input device, or the default one refused its own config.
    #[error("no input device available")]
    NoInputDevice,
    /// The device offers a sample format we do not write.
    #[error("unsupported sample format: {0}")]
    UnsupportedSampleFormat(String),
    #[error(transparent)]
    BuildStream(#[from] cpal::BuildStreamError),
}

type Result<T> = std::result::Result<T, RecorderError>;
type WavWriterHandle = Arc<Mutex<Option<WavWriter<SharedBuffer>>>>;

/// Clonable byte sink the WAV writer renders into. `WavWriter::finalize`
/// consumes the writer without returning its output, so the bytes have to
/// live somewhere the capture handle can still reach afterwards.
#[derive(Debug, Clone)]
struct SharedBuffer {
    inner: Arc<Mutex<Cursor<Vec<u8>>>>,
}

impl SharedBuffer {
    fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Cursor::new(Vec::with_capacity(8 * 1024)))),
        }
    }

    /// Takes the bytes out. Fails if a clone is still alive, which would
    /// mean the capture thread has not let go yet.
    fn try_into_inner(self) -> Result<Vec<u8>> {
        let owned = Arc::try_unwrap(self.inner)
            .map_err(|_| RecorderError::Anyhow(anyhow!("capture buffer still shared")))?;
        Ok(owned.into_inner().into_inner())
    }
}

impl Seek for SharedBuffer {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.inner.lock().seek(pos)
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.lock().write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.lock().flush()
    }
}

/// Captures from the default input device.
pub struct Recorder;

impl Recorder {
    pub fn new() -> Self {
        Self
    }
}

impl Default for Recorder {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioSource for Recorder {
    fn start(&self) -> Result<Box<dyn CaptureHandle>> {
        let writer: WavWriterHandle = Arc::new(Mutex::new(None));
        let buffer = SharedBuffer::new();
        let written = Arc::new(AtomicU64::new(0));
        let (ready_tx, ready_rx) = channel();
        let (stop_tx, stop_rx) = channel();

        let thread = std::thread::Builder::new()
            .name("sotto-capture".into())
            .spawn({
                let writer = writer.clone();
                let buffer = buffer.clone();
                let written = written.clone();
                move || capture(writer, buffer, written, ready_tx, stop_rx)
            })
            .map_err(|e| anyhow!("failed to spawn capture thread: {e}"))?;

        // The thread reports back once the stream is open so device failures
        // surface synchronously to the caller.
        let spec = match ready_rx.recv() {
            Ok(Ok(spec)) => spec,
            Ok(Err(e)) => {
                thread.join().ok();
                return Err(e);
            }
            Err(_) => {
                thread.join().ok();
                return Err(anyhow!("capture thread exited before the stream opened").into());
            }
        };

        Ok(Box::new(RecordingHandle {
            stop: Some(stop_tx),
            thread: Some(thread),
            buffer: Some(buffer),
            written,
            spec,
        }))
    }
}

/// Handle to the active capture. When dropped or finished, the capture ends.
/// You must call `finish` to receive the data.
pub struct RecordingHandle {
    stop: Option<Sender<()>>,
    thread: Option<JoinHandle<Result<()>>>,
    // Present until the recording is finalized.
    buffer: Option<SharedBuffer>,
    written: Arc<AtomicU64>,
    spec: hound::WavSpec,
}

impl CaptureHandle for RecordingHandle {
    fn finish(&mut self) -> Result<Option<Recording>> {
        let Some(buffer) = self.buffer.take() else {
            return Ok(None);
        };
        // Closing the channel tells the capture thread to tear down the
        // stream and finalize the writer.
        drop(self.stop.take());
        if let Some(thread) = self.thread.take() {
            match thread.join() {
                Ok(Ok(())) => {}
                Ok(Err(e)) => return Err(e),
                Err(_) => return Err(anyhow!("capture thread panicked").into()),
            }
        }

        let data = buffer.try_into_inner()?;
        let frames = self.written.load(Ordering::Relaxed) / u64::from(self.spec.channels.max(1));
        if frames == 0 {
            return Ok(None);
        }
        Ok(Some(Recording::new(
            data,
            self.spec.sample_rate,
            self.spec.channels,
            frames,
        )))
    }
}

impl Drop for RecordingHandle {
    fn drop(&mut self) {
        if self.buffer.is_some() {
            if let Err(e) = self.finish() {
                error!("failed to finalize recording: {}", e);
            }
        }
    }
}

/// Body of the capture thread. Opens the stream, reports readiness, then
/// parks until the handle asks for a stop (or goes away).
fn capture(
    writer: WavWriterHandle,
    buffer: SharedBuffer,
    written: Arc<AtomicU64>,
    ready: Sender<Result<hound::WavSpec>>,
    stop: Receiver<()>,
) -> Result<()> {
    let stream = match open_stream(&writer, &buffer, &written) {
        Ok((stream, spec)) => {
            if ready.send(Ok(spec)).is_err() {
                return Ok(());
            }
            stream
        }
        Err(e) => {
            ready.send(Err(e)).ok();
            return Ok(());
        }
    };

    // Samples flow in on the cpal callback until we are told to stop. A
    // closed channel means the handle went away; stop for that too.
    let _ = stop.recv();

    stream.pause().ok();
    drop(stream);

    // Finalize only after the stream is gone so no callback is mid-write.
    if let Some(writer) = writer.lock().take() {
        writer
            .finalize()
            .map_err(|e| anyhow!("failed to finalize wav writer: {e}"))?;
    }
    Ok(())
}

fn open_stream(
    writer: &WavWriterHandle,
    buffer: &SharedBuffer,
    written: &Arc<AtomicU64>,
) -> Result<(cpal::Stream, hound::WavSpec)> {
    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .ok_or(RecorderError::NoInputDevice)?;
    let config = device
        .default_input_config()
        .map_err(|_| RecorderError::NoInputDevice)?;

    info!(
        device = %device.name().unwrap_or_else(|_| "unknown".into()),
        "recording from input device"
    );

    let spec = wav_spec_for(&config);
    *writer.lock() =
        Some(WavWriter::new(buffer.clone(), spec).map_err(|e| RecorderError::Anyhow(e.into()))?);

    let cb_writer = writer.clone();
    let cb_written = written.clone();
    let on_error = move |err| {
        error!("input stream error: {err}");
    };

    // The sink type follows the device's native format so no conversion
    // happens on the audio callback.
    let stream = match config.sample_format() {
        cpal::SampleFormat::F32 => device.build_input_stream(
            &config.into(),
            move |data, _: &_| append_samples::<f32, f32>(data, &cb_writer, &cb_written),
            on_error,
            None,
        )?,
        cpal::SampleFormat::I16 => device.build_input_stream(
            &config.into(),
            move |data, _: &_| append_samples::<i16, i16>(data, &cb_writer, &cb_written),
            on_error,
            None,
        )?,
        cpal::SampleFormat::I32 => device.build_input_stream(
            &config.into(),
            move |data, _: &_| append_samples::<i32, i32>(data, &cb_writer, &cb_written),
            on_error,
            None,
        )?,
        cpal::SampleFormat::I8 => device.build_input_stream(
            &config.into(),
            move |data, _: &_| append_samples::<i8, i8>(data, &cb_writer, &cb_written),
            on_error,
            None,
        )?,
        other => {
            return Err(RecorderError::UnsupportedSampleFormat(format!("{other:?}")));
        }
    };

    stream
        .play()
        .map_err(|e| anyhow!("failed to start stream: {e}"))?;

    Ok((stream, spec))
}

fn wav_spec_for(config: &cpal::SupportedStreamConfig) -> hound::WavSpec {
    let format = config.sample_format();
    hound::WavSpec {
        channels: config.channels(),
        sample_rate: config.sample_rate().0,
        bits_per_sample: (format.sample_size() * 8) as _,
        sample_format: if format.is_float() {
            hound::SampleFormat::Float
        } else {
            hound::SampleFormat::Int
        },
    }
}

/// Runs on the audio callback: appends a block of samples and bumps the
/// tally the duration gate reads. Skips the block rather than blocking the
/// callback if the writer is mid-finalize.
fn append_samples<T, U>(input: &[T], writer: &WavWriterHandle, written: &AtomicU64)
where
    T: Sample,
    U: Sample + hound::Sample + FromSample<T>,
{
    if let Some(mut guard) = writer.try_lock() {
        if let Some(writer) = guard.as_mut() {
            for &sample in input.iter() {
                let sample: U = U::from_sample(sample);
                writer.write_sample(sample).ok();
            }
            written.fetch_add(input.len() as u64, Ordering::Relaxed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_spec() -> hound::WavSpec {
        hound::WavSpec {
            channels: 1,
            sample_rate: 16_000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        }
    }

    #[test]
    fn test_shared_buffer_produces_complete_wav() {
        let buffer = SharedBuffer::new();
        let mut writer = WavWriter::new(buffer.clone(), test_spec()).unwrap();
        for i in 0..100i16 {
            writer.write_sample(i).unwrap();
        }
        writer.finalize().unwrap();

        let data = buffer.try_into_inner().unwrap();
        assert_eq!(&data[..4], b"RIFF");
        // 44-byte header plus 100 16-bit samples
        assert_eq!(data.len(), 244);
    }

    #[test]
    fn test_shared_buffer_refuses_extraction_while_cloned() {
        let buffer = SharedBuffer::new();
        let clone = buffer.clone();
        assert!(buffer.try_into_inner().is_err());
        assert!(clone.try_into_inner().is_ok());
    }

    #[test]
    fn test_append_samples_counts_samples() {
        let buffer = SharedBuffer::new();
        let writer: WavWriterHandle = Arc::new(Mutex::new(Some(
            WavWriter::new(buffer.clone(), test_spec()).unwrap(),
        )));
        let written = AtomicU64::new(0);

        append_samples::<i16, i16>(&[1, 2, 3], &writer, &written);
        append_samples::<i16, i16>(&[4, 5], &writer, &written);

        assert_eq!(written.load(Ordering::Relaxed), 5);
    }
}
