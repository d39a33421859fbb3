//! The boundary the session controller reports through.
//!
//! Everything user-visible (clipboard, notifications, tray indicator) sits
//! behind this trait so the session logic stays free of UI dependencies and
//! tests can capture the exact effect sequence.

use thiserror::Error;

use crate::state::MicState;

/// Failure to hand a transcript to the user.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("clipboard unavailable: {0}")]
    Clipboard(String),
    #[error("{0}")]
    Other(String),
}

/// User-facing session events, rendered by the sink however it sees fit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// Capture has begun
    RecordingStarted,
    /// Capture ended and the audio was handed to transcription
    RecordingStopped,
    /// Transcript delivered; preview is pre-truncated for display
    TranscriptReady { preview: String },
    /// Transcription produced no text
    NoSpeech,
    /// Capture could not start
    AudioUnavailable { reason: String },
    /// Transcription failed outright
    TranscriptionFailed { reason: String },
    /// Transcript produced but could not be delivered
    DeliveryFailed { reason: String },
}

/// Where session outcomes go.
///
/// Implementations are invoked with the session lock held so effect order
/// matches transition order; they must return promptly and never panic.
pub trait OutputSink: Send + Sync {
    /// Hand the finished transcript to the user (clipboard or similar).
    fn deliver(&self, text: &str) -> Result<(), DeliveryError>;

    /// Show a status or outcome notice.
    fn notify(&self, notice: &Notice);

    /// Reflect the session state in ambient UI (tray icon and the like).
    fn indicate(&self, state: MicState);
}
