//! Hotkey parsing layered over the core config, kept out of sotto-core so
//! it stays free of UI toolkit types.

use global_hotkey::hotkey::{Code, HotKey, Modifiers};
use tracing::warn;

use sotto_core::Config;

/// Meta+Shift+Semicolon, chosen to be free on stock desktops.
pub fn default_hotkey() -> HotKey {
    HotKey::new(Some(Modifiers::META | Modifiers::SHIFT), Code::Semicolon)
}

pub trait ConfigExt {
    /// The configured hotkey; falls back to the default on a missing or
    /// unparseable setting rather than failing startup.
    fn hotkey(&self) -> HotKey;
}

impl ConfigExt for Config {
    fn hotkey(&self) -> HotKey {
        let Some(raw) = self.hotkey.as_deref() else {
            return default_hotkey();
        };
        match raw.parse::<HotKey>() {
            Ok(hotkey) => hotkey,
            Err(e) => {
                warn!(error = %e, raw, "could not parse hotkey, using default");
                default_hotkey()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_hotkey_uses_default() {
        let config = Config::default();
        assert_eq!(config.hotkey(), default_hotkey());
    }

    #[test]
    fn test_hotkey_parsed_from_config() {
        let config = Config {
            hotkey: Some("ctrl+shift+p".to_string()),
            ..Default::default()
        };
        assert_eq!(
            config.hotkey(),
            HotKey::new(Some(Modifiers::CONTROL | Modifiers::SHIFT), Code::KeyP)
        );
    }

    #[test]
    fn test_garbage_hotkey_falls_back_to_default() {
        let config = Config {
            hotkey: Some("not a hotkey".to_string()),
            ..Default::default()
        };
        assert_eq!(config.hotkey(), default_hotkey());
    }
}
