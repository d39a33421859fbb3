//! Unix signal triggers.
//!
//! `SIGUSR1` toggles recording so shell scripts and window-manager key
//! bindings can drive sessions without the global hotkey. `SIGTERM` and
//! `SIGINT` request an orderly exit.

use tao::event_loop::EventLoopProxy;
use tokio::runtime::Handle;
use tokio::signal::unix::{SignalKind, signal};
use tracing::{error, info, warn};

use crate::event::AppEvent;
use crate::session::SessionHandle;

/// Spawns the signal listeners on the controller's runtime.
pub fn listen(rt: &Handle, session: SessionHandle, proxy: EventLoopProxy<AppEvent>) {
    let toggle_session = session.clone();
    rt.spawn(async move {
        let mut usr1 = match signal(SignalKind::user_defined1()) {
            Ok(usr1) => usr1,
            Err(e) => {
                error!(error = %e, "failed to install SIGUSR1 handler");
                return;
            }
        };
        while usr1.recv().await.is_some() {
            info!("SIGUSR1 received, toggling recording");
            toggle_session.toggle();
        }
    });

    rt.spawn(async move {
        let (mut term, mut int) = match (
            signal(SignalKind::terminate()),
            signal(SignalKind::interrupt()),
        ) {
            (Ok(term), Ok(int)) => (term, int),
            (Err(e), _) | (_, Err(e)) => {
                error!(error = %e, "failed to install shutdown signal handlers");
                return;
            }
        };
        tokio::select! {
            _ = term.recv() => info!("SIGTERM received, shutting down"),
            _ = int.recv() => info!("SIGINT received, shutting down"),
        }
        session.shutdown();
        if let Err(e) = proxy.send_event(AppEvent::ShutdownRequested) {
            warn!(error = %e, "event loop already gone during shutdown");
        }
    });
}
