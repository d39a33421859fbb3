//! Offline transcription through whisper.cpp.
//!
//! Inference is CPU-bound and takes hundreds of milliseconds even on the
//! small models, so it runs under `spawn_blocking`. The ggml context is
//! loaded lazily on the first transcription and kept for the life of the
//! client; startup stays fast and sessions after the first reuse the
//! loaded weights.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use tracing::{debug, info};
use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters};

use crate::{Result, TranscribeError, Transcriber};

/// Sample rate whisper models consume.
const WHISPER_SAMPLE_RATE: u32 = 16_000;

/// Transcriber backed by a local whisper.cpp model file.
pub struct LocalWhisper {
    model_path: PathBuf,
    /// Populated on first use; shared with the blocking inference tasks.
    context: Arc<Mutex<Option<WhisperContext>>>,
}

impl LocalWhisper {
    /// Creates a client over a ggml model file. The file is not opened
    /// until the first transcription asks for it.
    pub fn new(model_path: impl Into<PathBuf>) -> Self {
        Self {
            model_path: model_path.into(),
            context: Arc::new(Mutex::new(None)),
        }
    }
}

#[async_trait]
impl Transcriber for LocalWhisper {
    async fn transcribe(&self, audio: Bytes, language: Option<&str>) -> Result<String> {
        let language = language.map(str::to_owned);
        let context = self.context.clone();
        let model_path = self.model_path.clone();

        tokio::task::spawn_blocking(move || {
            let samples = prepare_samples(&audio)?;
            let mut guard = context.lock();
            let ctx = match &mut *guard {
                Some(ctx) => ctx,
                slot => slot.insert(load_context(&model_path)?),
            };
            run_inference(ctx, &samples, language.as_deref())
        })
        .await
        .map_err(|e| TranscribeError::TranscriptionFailed(format!("inference task died: {e}")))?
    }

    fn name(&self) -> &str {
        "local-whisper"
    }
}

fn load_context(path: &Path) -> Result<WhisperContext> {
    info!(path = ?path, "loading whisper model");
    let path = path
        .to_str()
        .ok_or_else(|| TranscribeError::ModelUnavailable("model path is not UTF-8".into()))?;
    let ctx = WhisperContext::new_with_params(path, WhisperContextParameters::default())
        .map_err(|e| TranscribeError::ModelUnavailable(format!("failed to load model: {e}")))?;
    info!("whisper model loaded");
    Ok(ctx)
}

fn run_inference(ctx: &WhisperContext, samples: &[f32], language: Option<&str>) -> Result<String> {
    // Fresh state per call; the loaded weights themselves are reusable.
    let mut state = ctx
        .create_state()
        .map_err(|e| TranscribeError::TranscriptionFailed(format!("create state: {e}")))?;

    let mut params = FullParams::new(SamplingStrategy::Greedy { best_of: 1 });
    // None lets whisper auto-detect.
    params.set_language(language);
    // Keep whisper.cpp off our stdout.
    params.set_print_special(false);
    params.set_print_progress(false);
    params.set_print_realtime(false);
    params.set_print_timestamps(false);

    state
        .full(params, samples)
        .map_err(|e| TranscribeError::TranscriptionFailed(format!("inference: {e}")))?;

    let segments = state
        .full_n_segments()
        .map_err(|e| TranscribeError::TranscriptionFailed(format!("segment count: {e}")))?;
    let mut text = String::new();
    for i in 0..segments {
        let segment = state
            .full_get_segment_text(i)
            .map_err(|e| TranscribeError::TranscriptionFailed(format!("segment {i}: {e}")))?;
        text.push_str(&segment);
    }
    Ok(text.trim().to_string())
}

/// Decodes the WAV into the mono 16 kHz f32 stream whisper expects.
fn prepare_samples(audio: &[u8]) -> Result<Vec<f32>> {
    let (samples, sample_rate, channels) = decode_wav(audio)?;
    let mono = downmix(samples, channels);
    let prepared = resample(&mono, sample_rate, WHISPER_SAMPLE_RATE);
    debug!(
        sample_rate,
        channels,
        out_samples = prepared.len(),
        "audio prepared for whisper"
    );
    Ok(prepared)
}

fn decode_wav(audio: &[u8]) -> Result<(Vec<f32>, u32, usize)> {
    let reader = hound::WavReader::new(std::io::Cursor::new(audio))
        .map_err(|e| TranscribeError::InvalidAudioFormat(format!("not a readable WAV: {e}")))?;
    let spec = reader.spec();
    let channels = spec.channels as usize;

    let samples = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .into_samples::<f32>()
            .collect::<std::result::Result<Vec<_>, _>>(),
        hound::SampleFormat::Int => {
            let scale = 1.0 / (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|s| s as f32 * scale))
                .collect()
        }
    }
    .map_err(|e| TranscribeError::InvalidAudioFormat(format!("bad sample data: {e}")))?;

    Ok((samples, spec.sample_rate, channels))
}

/// Averages interleaved channels down to one.
fn downmix(samples: Vec<f32>, channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return samples;
    }
    samples
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

/// Linear-interpolation resampler. Plenty for speech; whisper was trained
/// on rougher audio than this produces.
fn resample(samples: &[f32], from: u32, to: u32) -> Vec<f32> {
    if from == to || samples.is_empty() {
        return samples.to_vec();
    }
    let step = from as f64 / to as f64;
    let out_len = (samples.len() as f64 / step) as usize;
    let mut out = Vec::with_capacity(out_len);
    for i in 0..out_len {
        let pos = i as f64 * step;
        let left = pos as usize;
        let frac = (pos - left as f64) as f32;
        let a = samples[left.min(samples.len() - 1)];
        let b = samples.get(left + 1).copied().unwrap_or(a);
        out.push(a + (b - a) * frac);
    }
    out
}
