use std::sync::Arc;

use anyhow::{Context, Result};
use global_hotkey::{GlobalHotKeyEvent, GlobalHotKeyManager, HotKeyState};
use sotto::config_ext::ConfigExt;
use sotto::event::AppEvent;
use sotto::icon::MicStateExt;
use sotto::notify::notify;
use sotto::output::DesktopSink;
use sotto::session::{SessionController, SessionPolicy, SessionResult};
use sotto::{APP_NAME_PRETTY, DEFAULT_LOG_LEVEL, VERSION};
use sotto_audio::Recorder;
use sotto_core::{
    Config, ConfigManager, DebugCapture, MicState, OutputSink, StateStore, TranscriptHistory,
    TranscriptionBackend,
};
use sotto_transcribe::{OpenAiClient, OpenAiConfig, Transcriber};
use tao::event::{Event, StartCause};
use tao::event_loop::{ControlFlow, EventLoop, EventLoopBuilder};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use tray_icon::menu::{AboutMetadataBuilder, Menu, MenuEvent, MenuItem, PredefinedMenuItem};
use tray_icon::{TrayIconBuilder, TrayIconEvent};

fn main() -> Result<()> {
    init_logging();

    let config_manager = ConfigManager::new()?;
    let config = config_manager.load()?;
    // Write the file back so a fresh install gets every knob on disk.
    config_manager.save(&config)?;

    let hotkey = config.hotkey();
    let hotkey_manager = GlobalHotKeyManager::new().context("failed to create hotkey manager")?;
    hotkey_manager
        .register(hotkey)
        .context("failed to register hotkey")?;

    // May download a model for the local backend, so it runs before
    // anything else is up.
    let transcriber = build_transcriber(&config)?;

    let (menu, menu_items) = build_menu()?;

    let menu_channel = MenuEvent::receiver();
    let tray_channel = TrayIconEvent::receiver();
    let hotkey_channel = GlobalHotKeyEvent::receiver();

    let event_loop: EventLoop<AppEvent> = EventLoopBuilder::with_user_event().build();
    let proxy = event_loop.create_proxy();

    let sink = Arc::new(DesktopSink::new(
        proxy.clone(),
        config.notifications,
        config.notification_timeout(),
    )?);
    let controller = SessionController::new(
        SessionPolicy::from(&config),
        Box::new(Recorder::new()),
        transcriber,
        sink.clone(),
        StateStore::new()?,
        DebugCapture::new(config.debug_keep_files, config.debug_keep_bytes())?,
        TranscriptHistory::new()?,
    )?;

    #[cfg(unix)]
    sotto::signals::listen(controller.runtime(), controller.handle(), proxy);

    let mut tray = None;
    event_loop.run(move |event, _, control_flow| {
        *control_flow = ControlFlow::Wait;

        match event {
            Event::NewEvents(StartCause::Init) => {
                // Building the tray before the loop is running misbehaves
                // on some platforms, see
                // https://github.com/tauri-apps/tray-icon/issues/90
                match TrayIconBuilder::new()
                    .with_menu(Box::new(menu.clone()))
                    .with_tooltip("sotto - speech to text")
                    .with_icon(MicState::Idle.icon())
                    .build()
                {
                    Ok(t) => tray = Some(t),
                    Err(e) => {
                        error!("failed to create tray icon: {e}");
                        *control_flow = ControlFlow::Exit;
                        return;
                    }
                }

                // Tao only exposes redraw on windows, so poke the run loop
                // directly to get the icon painted.
                #[cfg(target_os = "macos")]
                unsafe {
                    use core_foundation::runloop::{CFRunLoopGetMain, CFRunLoopWakeUp};
                    CFRunLoopWakeUp(CFRunLoopGetMain());
                }

                if config.notifications {
                    notify(
                        "Ready",
                        "Press the hotkey or send SIGUSR1 to start recording",
                        config.notification_timeout(),
                    );
                }
                info!("sotto ready");
            }
            Event::UserEvent(AppEvent::StateChanged(state)) => {
                info!(state = ?state, "state changed");
                if let Some(tray) = &tray {
                    if let Err(e) = tray.set_icon(Some(state.icon())) {
                        warn!("failed to update tray icon: {e}");
                    }
                }
            }
            Event::UserEvent(AppEvent::ShutdownRequested) => {
                tray.take();
                *control_flow = ControlFlow::Exit;
            }
            _ => {}
        }

        if let Ok(event) = hotkey_channel.try_recv() {
            if event.id() == hotkey.id() && event.state() == HotKeyState::Pressed {
                controller.toggle();
            }
        }

        if let Ok(event) = menu_channel.try_recv() {
            if event.id == menu_items.quit.id() {
                info!("quit selected, shutting down");
                controller.shutdown();
                tray.take();
                *control_flow = ControlFlow::Exit;
            } else if event.id == menu_items.toggle.id() {
                controller.toggle();
            } else if event.id == menu_items.copy_last.id() {
                copy_last_transcript(&controller, sink.as_ref());
            } else if event.id == menu_items.copy_config.id() {
                if let Err(e) = sink.deliver(&config_manager.config_path().to_string_lossy()) {
                    error!("failed to copy config path: {e}");
                }
            }
        }

        // Tray clicks are not bound to anything; drain the channel so it
        // never backs up.
        while tray_channel.try_recv().is_ok() {}
    });
}

fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("SOTTO_LOG")
                .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_LEVEL)),
        )
        .init();
}

/// The always-present menu entries, kept so the event loop can match
/// clicks by id.
struct MenuItems {
    toggle: MenuItem,
    copy_last: MenuItem,
    copy_config: MenuItem,
    quit: MenuItem,
}

fn build_menu() -> Result<(Menu, MenuItems)> {
    let items = MenuItems {
        toggle: MenuItem::new("Toggle recording", true, None),
        copy_last: MenuItem::new("Copy last transcript", true, None),
        copy_config: MenuItem::new("Copy config path", true, None),
        quit: MenuItem::new("Quit", true, None),
    };
    let menu = Menu::new();
    menu.append_items(&[
        &MenuItem::new(APP_NAME_PRETTY, false, None),
        &PredefinedMenuItem::separator(),
        &PredefinedMenuItem::about(
            None,
            Some(
                AboutMetadataBuilder::new()
                    .version(Some(VERSION.to_owned()))
                    .build(),
            ),
        ),
        &items.toggle,
        &items.copy_last,
        &items.copy_config,
        &PredefinedMenuItem::separator(),
        &items.quit,
    ])?;
    Ok((menu, items))
}

/// Re-delivers the newest settled transcript, for when a paste target was
/// not ready the first time.
fn copy_last_transcript(controller: &SessionController, sink: &DesktopSink) {
    match controller.last_result() {
        Some(SessionResult::Transcript(text)) => {
            if let Err(e) = sink.deliver(&text) {
                warn!("failed to copy last transcript: {e}");
            }
        }
        Some(SessionResult::Failed(reason)) => {
            info!(reason = %reason, "last session produced no transcript");
        }
        None => info!("no transcript to copy yet"),
    }
}

/// Builds the configured transcription backend.
fn build_transcriber(config: &Config) -> Result<Arc<dyn Transcriber>> {
    match config.backend {
        TranscriptionBackend::OpenAI => {
            let mut openai = OpenAiConfig::new(config.openai_key.as_deref().unwrap_or_default());
            if let Some(model) = config.model.as_deref() {
                openai = openai.with_model(model);
            }
            Ok(Arc::new(OpenAiClient::new(openai)))
        }
        TranscriptionBackend::Local => local_transcriber(config),
    }
}

#[cfg(feature = "local-whisper")]
fn local_transcriber(config: &Config) -> Result<Arc<dyn Transcriber>> {
    use sotto_transcribe::{LocalWhisper, MODELS, WhisperModel, ensure_model};

    let model = match config.local_model.as_deref() {
        Some(name) => WhisperModel::named(name).with_context(|| {
            let known: Vec<_> = MODELS.iter().map(|m| m.name()).collect();
            format!("unknown whisper model {name:?} (known: {})", known.join(", "))
        })?,
        None => WhisperModel::default(),
    };

    // Nothing else is running yet; a throwaway runtime covers the
    // (possible) download without dragging the controller's runtime in.
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let path = rt.block_on(ensure_model(model))?;

    Ok(Arc::new(LocalWhisper::new(path)))
}

#[cfg(not(feature = "local-whisper"))]
fn local_transcriber(_config: &Config) -> Result<Arc<dyn Transcriber>> {
    anyhow::bail!(
        "config selects the local backend, but this build lacks the local-whisper feature"
    )
}
