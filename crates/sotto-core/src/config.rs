//! Configuration: one TOML file, created on first run.
//!
//! Everything here is platform-agnostic. Hotkey parsing and the rest of
//! the desktop wiring live in the app crate on top of this.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use dirs::{config_dir, data_local_dir};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::APP_NAME;

/// Which backend turns audio into text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TranscriptionBackend {
    /// Hosted OpenAI transcription API; needs `openai_key`.
    OpenAI,
    /// Bundled whisper.cpp; only in builds with the `local-whisper` feature.
    Local,
}

impl Default for TranscriptionBackend {
    fn default() -> Self {
        if cfg!(feature = "local-whisper") {
            TranscriptionBackend::Local
        } else {
            TranscriptionBackend::OpenAI
        }
    }
}

/// Data directory: state file, debug captures, transcript history, models.
pub fn default_data_dir() -> Result<PathBuf> {
    let dir = data_local_dir().context("no local data directory on this platform")?;
    Ok(dir.join(APP_NAME))
}

/// Where downloaded whisper models land.
pub fn models_dir() -> Result<PathBuf> {
    Ok(default_data_dir()?.join("models"))
}

/// The TOML config file. Missing fields fall back to defaults, so old
/// files keep working as fields are added.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Transcription backend, "openai" or "local".
    pub backend: TranscriptionBackend,

    /// API key for the openai backend.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub openai_key: Option<String>,

    /// Model override for the openai backend.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Local whisper model name, e.g. "base-q8" or "large-v3-turbo-q5".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local_model: Option<String>,

    /// Language hint as an ISO 639-1 code; unset lets the model detect.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,

    /// Recordings shorter than this many seconds are discarded unsent.
    pub discard_duration: f32,

    /// Stop recording automatically after this many seconds; 0 = never.
    pub max_duration: u64,

    /// Extra transcription attempts after a failure.
    pub retries: u8,

    /// Global hotkey, "modifier+modifier+key", e.g. "meta+shift+semicolon".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hotkey: Option<String>,

    /// Desktop notifications for session events.
    pub notifications: bool,

    /// Seconds a notification stays up; transcript previews get twice this.
    pub notification_timeout: u64,

    /// Retention cap on failed-audio captures, by file count.
    pub debug_keep_files: u32,

    /// Retention cap on failed-audio captures, in MiB.
    pub debug_keep_mb: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: TranscriptionBackend::default(),
            openai_key: None,
            model: None,
            local_model: None,
            language: None,
            discard_duration: 0.5,
            max_duration: 0,
            retries: 5,
            hotkey: None,
            notifications: true,
            notification_timeout: 2,
            debug_keep_files: 16,
            debug_keep_mb: 64,
        }
    }
}

impl Config {
    /// Discard threshold as a [`Duration`].
    pub fn discard_duration(&self) -> Duration {
        Duration::from_secs_f32(self.discard_duration)
    }

    /// Auto-stop limit; `None` when unbounded.
    pub fn max_duration(&self) -> Option<Duration> {
        (self.max_duration > 0).then(|| Duration::from_secs(self.max_duration))
    }

    pub fn notification_timeout(&self) -> Duration {
        Duration::from_secs(self.notification_timeout)
    }

    /// Failed-audio retention size cap in bytes.
    pub fn debug_keep_bytes(&self) -> u64 {
        self.debug_keep_mb * 1024 * 1024
    }
}

/// Loads and saves the configuration file.
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Manager over the default config location.
    pub fn new() -> Result<Self> {
        Ok(Self {
            config_path: Self::default_config_path()?,
        })
    }

    /// Manager over a caller-chosen directory.
    #[cfg(test)]
    pub fn with_config_dir<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            config_path: dir.as_ref().join(format!("{APP_NAME}.toml")),
        }
    }

    /// `<config_dir>/sotto/sotto.toml`.
    pub fn default_config_path() -> Result<PathBuf> {
        let base = config_dir().context("no configuration directory on this platform")?;
        Ok(base.join(APP_NAME).join(format!("{APP_NAME}.toml")))
    }

    /// Loads the file, or defaults when it does not exist yet.
    pub fn load(&self) -> Result<Config> {
        if !self.config_path.exists() {
            return Ok(Config::default());
        }

        let raw = fs::read_to_string(&self.config_path)
            .with_context(|| format!("failed to read config at {:?}", self.config_path))?;
        let config: Config = toml::from_str(&raw)
            .with_context(|| format!("failed to parse config at {:?}", self.config_path))?;

        if config.backend == TranscriptionBackend::OpenAI && config.openai_key.is_none() {
            warn!(
                "openai_key is not set; transcriptions will fail until it is. \
                 Use \"Copy config path\" in the tray menu to find the file."
            );
        }

        Ok(config)
    }

    /// Writes the config out, creating the directory as needed. Called once
    /// at startup so a fresh install gets a file with every knob in it.
    pub fn save(&self, config: &Config) -> Result<()> {
        let dir = self
            .config_path
            .parent()
            .with_context(|| format!("config path {:?} has no parent", self.config_path))?;
        fs::create_dir_all(dir)
            .with_context(|| format!("failed to create config directory {:?}", dir))?;

        let rendered = toml::to_string_pretty(config).context("failed to render configuration")?;
        fs::write(&self.config_path, rendered)
            .with_context(|| format!("failed to write config at {:?}", self.config_path))?;
        Ok(())
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.openai_key.is_none());
        assert!(config.notifications);
        assert_eq!(config.retries, 5);
        assert_eq!(config.max_duration, 0);
        assert!(config.max_duration().is_none());
        assert_eq!(config.discard_duration(), Duration::from_millis(500));
    }

    #[test]
    fn test_save_materializes_defaults() {
        // The saved file should show every scalar knob, not just the ones
        // the user changed.
        let rendered = toml::to_string_pretty(&Config::default()).unwrap();
        assert!(rendered.contains("retries = 5"), "{rendered}");
        assert!(rendered.contains("notifications = true"), "{rendered}");
        assert!(rendered.contains("debug_keep_mb = 64"), "{rendered}");
        // Unset options stay out of the file.
        assert!(!rendered.contains("openai_key"), "{rendered}");
    }

    #[test]
    fn test_round_trip_preserves_settings() {
        let config = Config {
            openai_key: Some("test-key".to_string()),
            model: Some("whisper-1".to_string()),
            max_duration: 120,
            ..Default::default()
        };

        let rendered = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&rendered).unwrap();

        assert_eq!(parsed.openai_key, config.openai_key);
        assert_eq!(parsed.model, config.model);
        assert_eq!(parsed.max_duration(), Some(Duration::from_secs(120)));
    }

    #[test]
    fn test_save_load_through_manager() {
        let temp_dir = tempfile::tempdir().unwrap();
        let manager = ConfigManager::with_config_dir(temp_dir.path());

        let config = Config {
            openai_key: Some("test-key".to_string()),
            ..Default::default()
        };
        manager.save(&config).unwrap();

        let loaded = manager.load().unwrap();
        assert_eq!(loaded.openai_key, config.openai_key);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let parsed: Config = toml::from_str("max_duration = 90\n").unwrap();
        assert_eq!(parsed.max_duration, 90);
        assert_eq!(parsed.retries, 5);
        assert!(parsed.notifications);
    }

    #[test]
    fn test_unknown_keys_tolerated() {
        let parsed: Config =
            toml::from_str("discard_duration = 1.0\nsome_future_setting = true\n").unwrap();
        assert!((parsed.discard_duration - 1.0).abs() < f32::EPSILON);
    }
}
