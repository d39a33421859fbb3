//! Desktop output: clipboard delivery, notifications, tray state.

use std::time::Duration;

use anyhow::{Context, Result};
use arboard::Clipboard;
use parking_lot::Mutex;
use sotto_core::{DeliveryError, MicState, Notice, OutputSink};
use tao::event_loop::EventLoopProxy;
use tracing::warn;

use crate::event::AppEvent;
use crate::notify::notify;

/// The production sink: transcripts go to the clipboard, notices become
/// desktop notifications, state changes drive the tray icon through the
/// event loop.
pub struct DesktopSink {
    clipboard: Mutex<Clipboard>,
    /// The proxy is Send but not Sync; the mutex makes the sink shareable.
    proxy: Mutex<EventLoopProxy<AppEvent>>,
    notifications: bool,
    timeout: Duration,
}

impl DesktopSink {
    pub fn new(
        proxy: EventLoopProxy<AppEvent>,
        notifications: bool,
        timeout: Duration,
    ) -> Result<Self> {
        let clipboard = Clipboard::new().context("Failed to open clipboard")?;
        Ok(Self {
            clipboard: Mutex::new(clipboard),
            proxy: Mutex::new(proxy),
            notifications,
            timeout,
        })
    }
}

impl OutputSink for DesktopSink {
    fn deliver(&self, text: &str) -> Result<(), DeliveryError> {
        self.clipboard
            .lock()
            .set_text(text)
            .map_err(|e| DeliveryError::Clipboard(e.to_string()))
    }

    fn notify(&self, notice: &Notice) {
        if !self.notifications {
            return;
        }
        let timeout = self.timeout;
        match notice {
            Notice::RecordingStarted => notify("Recording", "Listening...", timeout),
            Notice::RecordingStopped => notify("Transcribing", "Recording stopped", timeout),
            Notice::TranscriptReady { preview } => {
                // Twice as long: the preview is the notification users read.
                notify("Copied to clipboard", preview, timeout * 2);
            }
            Notice::NoSpeech => notify("No speech detected", "Nothing was transcribed", timeout),
            Notice::AudioUnavailable { reason } => notify("Microphone unavailable", reason, timeout),
            Notice::TranscriptionFailed { reason } => notify("Transcription failed", reason, timeout),
            Notice::DeliveryFailed { reason } => notify("Clipboard unavailable", reason, timeout),
        }
    }

    fn indicate(&self, state: MicState) {
        if let Err(e) = self.proxy.lock().send_event(AppEvent::StateChanged(state)) {
            warn!(error = %e, "event loop is gone, cannot update tray icon");
        }
    }
}
