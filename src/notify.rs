//! System notifications.

use std::time::Duration;

use notify_rust::{Notification, Timeout};
use tracing::error;

use sotto_core::{APP_NAME, APP_NAME_PRETTY};

/// Freedesktop themed icon shown next to notifications where supported.
const NOTIFY_ICON: &str = "audio-input-microphone";

/// Sends a desktop notification. Best-effort: a missing notification
/// daemon must never affect the session.
pub fn notify(summary: &str, body: &str, timeout: Duration) {
    Notification::new()
        .icon(NOTIFY_ICON)
        .appname(APP_NAME)
        .summary(&format!("{APP_NAME_PRETTY} - {summary}"))
        .body(body)
        .timeout(Timeout::Milliseconds(timeout.as_millis() as u32))
        .show()
        .map_err(|e| error!("failed to send notification: {e}"))
        .ok();
}
