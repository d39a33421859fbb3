//! Transcription backends.
//!
//! The session layer only ever sees the [`Transcriber`] trait; whether
//! audio goes to the OpenAI API or through a local whisper.cpp model is
//! wiring chosen once at startup.

mod openai;

#[cfg(feature = "local-whisper")]
mod local;
#[cfg(feature = "local-whisper")]
mod model;

use async_trait::async_trait;
pub use bytes::Bytes;
#[cfg(feature = "local-whisper")]
pub use local::LocalWhisper;
#[cfg(feature = "local-whisper")]
pub use model::{MODELS, WhisperModel, ensure_model};
pub use openai::{OpenAiClient, OpenAiConfig};
use thiserror::Error;

/// Ways a transcription can fail. All of these settle the session that
/// asked; none are fatal to the process.
#[derive(Debug, Error)]
pub enum TranscribeError {
    #[error("no API key configured")]
    NoApiKey,

    #[error("API request rejected: {0}")]
    Api(String),

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("audio not usable: {0}")]
    InvalidAudioFormat(String),

    #[error("model unavailable: {0}")]
    ModelUnavailable(String),

    #[error("transcription failed: {0}")]
    TranscriptionFailed(String),
}

pub type Result<T> = std::result::Result<T, TranscribeError>;

/// A speech-to-text backend.
///
/// Audio arrives as a finished in-memory WAV; [`Bytes`] clones are O(1),
/// which is what keeps retrying a failed request cheap. The language hint
/// is an ISO 639-1 code, `None` asks the backend to detect it.
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, audio: Bytes, language: Option<&str>) -> Result<String>;

    /// Short name for logs.
    fn name(&self) -> &str;
}
