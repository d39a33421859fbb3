//! Messages background work sends into the tao event loop.

use sotto_core::MicState;

/// Posted through the event loop proxy; the loop owns all tray state.
#[derive(Debug, Clone)]
pub enum AppEvent {
    /// The session moved to a new state; the tray icon should follow.
    StateChanged(MicState),
    /// A trigger asked the whole application to exit.
    ShutdownRequested,
}
