//! Shared types for sotto: configuration, session state, the persisted
//! stores, and the output seam. Nothing in here touches a UI toolkit, so
//! every sub-crate and the tests can depend on it.

mod config;
mod debug;
mod history;
mod sink;
mod state;
mod store;

pub use config::{Config, ConfigManager, TranscriptionBackend, default_data_dir, models_dir};
pub use debug::DebugCapture;
pub use history::{HistoryEntry, TranscriptHistory};
pub use sink::{DeliveryError, Notice, OutputSink};
pub use state::{MicState, StoredState};
pub use store::StateStore;

/// Name used for directories, the state file, and notification app ids.
pub const APP_NAME: &str = "sotto";

/// Capitalized name for user-facing surfaces.
pub const APP_NAME_PRETTY: &str = "Sotto";

/// Log filter when SOTTO_LOG is unset.
pub const DEFAULT_LOG_LEVEL: &str = "info";
