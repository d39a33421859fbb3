pub use sotto_audio::{AudioSource, CaptureHandle, Recorder, RecorderError, Recording};
pub use sotto_core::{
    APP_NAME, APP_NAME_PRETTY, Config, ConfigManager, DEFAULT_LOG_LEVEL, DebugCapture, MicState,
    Notice, OutputSink, StateStore, TranscriptHistory,
};
pub use sotto_transcribe::{OpenAiClient, OpenAiConfig, TranscribeError, Transcriber};

pub mod config_ext;
pub mod event;
pub mod icon;
pub mod notify;
pub mod output;
pub mod session;
#[cfg(unix)]
pub mod signals;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
