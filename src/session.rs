//! The recording/transcription session state machine.
//!
//! One controller owns the Idle -> Recording -> Processing -> Idle cycle.
//! `toggle()` is the single entry point and may be called from any trigger
//! context (signal task, hotkey loop, tray menu) at any moment; the session
//! mutex serializes them. A toggle that loses the race is dropped, never
//! queued, so a stale press cannot replay against a state the user was not
//! looking at.
//!
//! Transcription is the only slow phase and runs on the controller's tokio
//! runtime outside the lock; completions re-enter through the lock tagged
//! with the epoch they were spawned under, so results of an abandoned cycle
//! are dropped instead of applied.

use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use bytes::Bytes;
use parking_lot::Mutex;
use sotto_audio::{AudioSource, CaptureHandle, Recording};
use sotto_core::{
    Config, DebugCapture, MicState, Notice, OutputSink, StateStore, TranscriptHistory,
};
use sotto_transcribe::{TranscribeError, Transcriber};
use tokio::runtime::{Handle, Runtime};
use tracing::{debug, error, info, warn};

/// Static policy snapshot the controller runs under.
#[derive(Debug, Clone)]
pub struct SessionPolicy {
    /// Discard recordings shorter than this without transcribing.
    pub discard_duration: Duration,
    /// Stop recordings automatically after this long.
    pub max_duration: Option<Duration>,
    /// Language hint forwarded to the transcriber.
    pub language: Option<String>,
    /// Transcription retry attempts after the first failure.
    pub retries: u8,
}

impl Default for SessionPolicy {
    fn default() -> Self {
        Self {
            discard_duration: Duration::from_millis(500),
            max_duration: None,
            language: None,
            retries: 5,
        }
    }
}

impl From<&Config> for SessionPolicy {
    fn from(config: &Config) -> Self {
        Self {
            discard_duration: config.discard_duration(),
            max_duration: config.max_duration(),
            language: config.language.clone(),
            retries: config.retries,
        }
    }
}

/// Outcome of the most recent completed cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionResult {
    Transcript(String),
    Failed(String),
}

struct Session {
    state: MicState,
    capture: Option<Box<dyn CaptureHandle>>,
    started_at: Option<Instant>,
    /// Bumped on every transition. Deadline guards and transcription tasks
    /// carry the epoch they were spawned under and go quiet if it moved on.
    epoch: u64,
    last_result: Option<SessionResult>,
}

/// Owns the session state machine and the runtime its workers live on.
pub struct SessionController {
    inner: Arc<Inner>,
    runtime: Runtime,
}

/// Cheap clone handed to trigger tasks.
#[derive(Clone)]
pub struct SessionHandle {
    inner: Arc<Inner>,
}

struct Inner {
    session: Mutex<Session>,
    policy: SessionPolicy,
    audio: Box<dyn AudioSource>,
    transcriber: Arc<dyn Transcriber>,
    sink: Arc<dyn OutputSink>,
    store: StateStore,
    debug: DebugCapture,
    history: TranscriptHistory,
    rt: Handle,
    weak: Weak<Inner>,
}

impl SessionController {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        policy: SessionPolicy,
        audio: Box<dyn AudioSource>,
        transcriber: Arc<dyn Transcriber>,
        sink: Arc<dyn OutputSink>,
        store: StateStore,
        debug: DebugCapture,
        history: TranscriptHistory,
    ) -> anyhow::Result<Self> {
        // Two workers so trigger listeners stay responsive while a
        // transcription runs.
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()?;
        let rt = runtime.handle().clone();

        let inner = Arc::new_cyclic(|weak| Inner {
            session: Mutex::new(Session {
                state: MicState::Idle,
                capture: None,
                started_at: None,
                epoch: 0,
                last_result: None,
            }),
            policy,
            audio,
            transcriber,
            sink,
            store,
            debug,
            history,
            rt,
            weak: weak.clone(),
        });

        // External readers start from a known value.
        inner.store.record(MicState::Idle);

        Ok(Self { inner, runtime })
    }

    /// A clonable handle for trigger tasks.
    pub fn handle(&self) -> SessionHandle {
        SessionHandle {
            inner: self.inner.clone(),
        }
    }

    /// The runtime trigger listeners should be spawned on.
    pub fn runtime(&self) -> &Handle {
        self.runtime.handle()
    }

    /// Flip between idle and recording; see [`SessionHandle::toggle`].
    pub fn toggle(&self) {
        self.inner.toggle();
    }

    /// Tear down, discarding any in-progress audio without transcribing.
    pub fn shutdown(&self) {
        self.inner.shutdown();
    }

    /// Current state, for observation only.
    pub fn state(&self) -> MicState {
        self.inner.session.lock().state
    }

    /// Outcome of the most recent completed cycle, if any.
    pub fn last_result(&self) -> Option<SessionResult> {
        self.inner.session.lock().last_result.clone()
    }
}

impl SessionHandle {
    /// Single entry point for all triggers. Returns nothing: every outcome
    /// surfaces through the output sink, and a dropped race is a no-op.
    pub fn toggle(&self) {
        self.inner.toggle();
    }

    pub fn shutdown(&self) {
        self.inner.shutdown();
    }
}

impl Inner {
    fn toggle(&self) {
        // try_lock, not lock: a second toggle racing the first is dropped.
        let Some(mut session) = self.session.try_lock() else {
            debug!("toggle dropped: another toggle is in flight");
            return;
        };
        match session.state {
            MicState::Idle => self.start_recording(&mut session),
            MicState::Recording => self.stop_recording(&mut session),
            MicState::Processing => {
                debug!("toggle ignored while a transcription is in flight");
            }
        }
    }

    fn start_recording(&self, session: &mut Session) {
        match self.audio.start() {
            Ok(capture) => {
                session.state = MicState::Recording;
                session.capture = Some(capture);
                session.started_at = Some(Instant::now());
                session.epoch += 1;
                self.store.record(MicState::Recording);
                self.sink.indicate(MicState::Recording);
                self.sink.notify(&Notice::RecordingStarted);
                if let Some(limit) = self.policy.max_duration {
                    self.arm_deadline(session.epoch, limit);
                }
                info!("recording started");
            }
            Err(e) => {
                // Stay Idle; a failed start persists nothing.
                warn!(error = %e, "failed to start recording");
                self.sink.notify(&Notice::AudioUnavailable {
                    reason: e.to_string(),
                });
            }
        }
    }

    /// Shared stop path for manual toggles and the deadline guard.
    fn stop_recording(&self, session: &mut Session) {
        // Enter Processing before touching the handle so nothing can observe
        // Recording against a dying stream.
        session.state = MicState::Processing;
        session.epoch += 1;
        let epoch = session.epoch;
        let capture = session.capture.take();
        let elapsed = session.started_at.take().map(|t| t.elapsed());
        self.store.record(MicState::Processing);
        self.sink.indicate(MicState::Processing);

        let Some(mut capture) = capture else {
            error!("recording state had no capture handle");
            self.settle(session, None);
            return;
        };

        let recording = match capture.finish() {
            Ok(Some(recording)) => recording,
            Ok(None) => {
                warn!("recording finished but no data was recorded");
                self.settle(session, None);
                return;
            }
            Err(e) => {
                error!(error = ?e, "failed to finish recording");
                self.settle(session, Some(SessionResult::Failed(e.to_string())));
                return;
            }
        };

        info!(
            samples = recording.samples(),
            sample_rate = recording.sample_rate(),
            channels = recording.channels(),
            bytes = recording.data().len(),
            length_seconds = recording.duration().as_secs_f64(),
            elapsed = ?elapsed,
            "audio captured"
        );

        if recording.duration() < self.policy.discard_duration {
            // Too short to mean anything: no transcription, no notice.
            info!(discard_duration = ?self.policy.discard_duration, "discarding recording");
            self.settle(session, None);
            return;
        }

        self.sink.notify(&Notice::RecordingStopped);
        self.spawn_transcription(epoch, recording);
    }

    /// Returns the session to Idle, recording the cycle outcome if there
    /// was one.
    fn settle(&self, session: &mut Session, result: Option<SessionResult>) {
        session.state = MicState::Idle;
        session.epoch += 1;
        if let Some(result) = result {
            session.last_result = Some(result);
        }
        self.store.record(MicState::Idle);
        self.sink.indicate(MicState::Idle);
    }

    fn spawn_transcription(&self, epoch: u64, recording: Recording) {
        let transcriber = self.transcriber.clone();
        let language = self.policy.language.clone();
        let retries = self.policy.retries;
        let weak = self.weak.clone();
        let audio = Bytes::from(recording.into_data());

        self.rt.spawn(async move {
            let result =
                transcribe_with_retries(transcriber, audio.clone(), language, retries).await;
            let Some(inner) = weak.upgrade() else { return };
            inner.complete(epoch, audio, result);
        });
    }

    /// Completion path for the transcription task. Runs under the lock so
    /// its effects serialize with any concurrent toggle.
    fn complete(&self, epoch: u64, audio: Bytes, result: Result<String, TranscribeError>) {
        let mut session = self.session.lock();
        if session.state != MicState::Processing || session.epoch != epoch {
            debug!("stale transcription result dropped");
            return;
        }

        match result {
            Ok(text) if text.trim().is_empty() => {
                info!("transcription heard no speech");
                self.preserve_failed_audio(&audio);
                self.sink.notify(&Notice::NoSpeech);
                self.settle(
                    &mut session,
                    Some(SessionResult::Failed("no speech detected".to_string())),
                );
            }
            Ok(text) => {
                match self.sink.deliver(&text) {
                    Ok(()) => {
                        self.sink.notify(&Notice::TranscriptReady {
                            preview: preview(&text),
                        });
                    }
                    Err(e) => {
                        // The transcript survives in last_result for manual copy.
                        warn!(error = %e, "failed to deliver transcript");
                        self.sink.notify(&Notice::DeliveryFailed {
                            reason: e.to_string(),
                        });
                    }
                }
                self.history.append(&text);
                self.settle(&mut session, Some(SessionResult::Transcript(text)));
            }
            Err(e) => {
                error!(error = %e, "transcription failed");
                self.preserve_failed_audio(&audio);
                self.sink.notify(&Notice::TranscriptionFailed {
                    reason: e.to_string(),
                });
                self.settle(&mut session, Some(SessionResult::Failed(e.to_string())));
            }
        }
    }

    fn preserve_failed_audio(&self, audio: &[u8]) {
        match self.debug.preserve(audio) {
            Ok(path) => info!(path = ?path, "kept raw audio for diagnosis"),
            Err(e) => warn!(error = %e, "failed to keep raw audio"),
        }
    }

    fn arm_deadline(&self, epoch: u64, limit: Duration) {
        let weak = self.weak.clone();
        self.rt.spawn(async move {
            tokio::time::sleep(limit).await;
            let Some(inner) = weak.upgrade() else { return };
            inner.deadline_stop(epoch);
        });
    }

    /// Fires the shared stop path when the maximum duration elapses, unless
    /// the session it was armed for is already over.
    fn deadline_stop(&self, epoch: u64) {
        let mut session = self.session.lock();
        if session.state != MicState::Recording || session.epoch != epoch {
            return;
        }
        info!(limit = ?self.policy.max_duration, "maximum recording duration reached");
        self.stop_recording(&mut session);
    }

    /// Best-effort teardown: discards in-progress audio without transcribing
    /// and leaves the persisted state Idle. Never fails.
    fn shutdown(&self) {
        let mut session = self.session.lock();
        let was = session.state;
        session.epoch += 1;
        if let Some(mut capture) = session.capture.take() {
            info!("discarding in-progress recording for shutdown");
            if let Err(e) = capture.finish() {
                warn!(error = ?e, "failed to release capture during shutdown");
            }
        }
        session.state = MicState::Idle;
        session.started_at = None;
        if was != MicState::Idle {
            self.store.record(MicState::Idle);
            self.sink.indicate(MicState::Idle);
        }
        drop(session);
        info!("session controller shut down");
    }
}

/// Calls the transcriber, retrying on failure, and logs basic throughput
/// for the attempt that succeeded.
async fn transcribe_with_retries(
    transcriber: Arc<dyn Transcriber>,
    audio: Bytes,
    language: Option<String>,
    retries: u8,
) -> Result<String, TranscribeError> {
    let bytes = audio.len();
    let mut attempts_left = retries;

    let mut before = Instant::now();
    let mut result = transcriber
        .transcribe(audio.clone(), language.as_deref())
        .await;
    while result.is_err() && attempts_left > 0 {
        warn!(error = ?result, attempts_left, "retrying transcription");
        before = Instant::now();
        result = transcriber
            .transcribe(audio.clone(), language.as_deref())
            .await;
        attempts_left -= 1;
    }

    if let Ok(text) = &result {
        let duration = before.elapsed();
        let mb_per_second = bytes as f64 / (1024.0 * 1024.0) / duration.as_secs_f64();
        info!(
            duration = ?duration,
            mb_per_second,
            chars = text.len(),
            "transcription completed"
        );
    }
    result
}

/// Shortens a transcript for notification display, cutting on a char
/// boundary.
fn preview(text: &str) -> String {
    const MAX_CHARS: usize = 80;
    let trimmed = text.trim();
    if trimmed.chars().count() <= MAX_CHARS {
        return trimmed.to_string();
    }
    let cut: String = trimmed.chars().take(MAX_CHARS).collect();
    format!("{}...", cut.trim_end())
}
