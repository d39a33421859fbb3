//! Rolling history of successful transcriptions.
//!
//! Delivery is clipboard-based and therefore lossy; the history file is the
//! durable record. Capped so it never grows without bound.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Local;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::default_data_dir;

const HISTORY_LIMIT: usize = 100;

/// One transcription, as stored in the history file.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HistoryEntry {
    pub timestamp: String,
    pub text: String,
}

/// Append-mostly JSON history of transcripts.
pub struct TranscriptHistory {
    path: PathBuf,
    limit: usize,
}

impl TranscriptHistory {
    /// Creates a history at the default location.
    pub fn new() -> Result<Self> {
        Ok(Self::at_path(default_data_dir()?.join("history.json")))
    }

    /// Creates a history at an explicit path.
    pub fn at_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            limit: HISTORY_LIMIT,
        }
    }

    #[cfg(test)]
    fn with_limit(path: impl Into<PathBuf>, limit: usize) -> Self {
        Self {
            path: path.into(),
            limit,
        }
    }

    /// Appends a transcript, dropping the oldest entries past the cap.
    /// Best-effort: a broken history file never affects the session.
    pub fn append(&self, text: &str) {
        if let Err(e) = self.try_append(text) {
            warn!(error = %e, "failed to update transcript history");
        }
    }

    fn try_append(&self, text: &str) -> Result<()> {
        let mut entries = self.load();
        entries.push(HistoryEntry {
            timestamp: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            text: text.to_string(),
        });
        if entries.len() > self.limit {
            let excess = entries.len() - self.limit;
            entries.drain(..excess);
        }

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create history directory at {:?}", parent))?;
        }
        let serialized =
            serde_json::to_string_pretty(&entries).context("Failed to serialize history")?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write history file at {:?}", self.path))?;
        Ok(())
    }

    /// Loads the history, empty for an absent or corrupt file.
    pub fn load(&self) -> Vec<HistoryEntry> {
        let Ok(content) = fs::read_to_string(&self.path) else {
            return Vec::new();
        };
        serde_json::from_str(&content).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let history = TranscriptHistory::at_path(dir.path().join("history.json"));

        history.append("hello");
        history.append("world");

        let entries = history.load();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].text, "hello");
        assert_eq!(entries[1].text, "world");
    }

    #[test]
    fn test_cap_drops_oldest() {
        let dir = tempfile::tempdir().unwrap();
        let history = TranscriptHistory::with_limit(dir.path().join("history.json"), 3);

        for text in ["a", "b", "c", "d"] {
            history.append(text);
        }

        let entries = history.load();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].text, "b");
        assert_eq!(entries[2].text, "d");
    }

    #[test]
    fn test_corrupt_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.json");
        fs::write(&path, "this is not json").unwrap();

        let history = TranscriptHistory::at_path(&path);
        assert!(history.load().is_empty());

        history.append("fresh start");
        assert_eq!(history.load().len(), 1);
    }
}
