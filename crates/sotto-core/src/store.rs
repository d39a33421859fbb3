//! Session state persisted for external consumers.
//!
//! A tiny text file that scripts (status bars, toggle wrappers) poll to
//! learn whether the microphone is hot. The session controller is the only
//! writer; any number of processes may read.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::warn;

use crate::config::default_data_dir;
use crate::state::{MicState, StoredState};

/// Writes the coarse session state to a well-known file.
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    /// Creates a store at the default location, creating parent directories.
    pub fn new() -> Result<Self> {
        Self::at_path(default_data_dir()?.join("state"))
    }

    /// Creates a store at an explicit path, creating parent directories.
    pub fn at_path(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create state directory at {:?}", parent))?;
        }
        Ok(Self { path })
    }

    /// Records a state transition. Best-effort: the file exists for outside
    /// observers and is never authoritative for control flow, so failures
    /// are logged and swallowed.
    pub fn record(&self, state: MicState) {
        let stored = StoredState::from(state);
        if let Err(e) = fs::write(&self.path, stored.as_str()) {
            warn!(error = %e, path = ?self.path, "failed to write state file");
        }
    }

    /// Reads the persisted state. An absent file or unrecognized content is
    /// `None` (unknown), never silently idle.
    pub fn read(&self) -> Option<StoredState> {
        let content = fs::read_to_string(&self.path).ok()?;
        StoredState::parse(&content)
    }

    /// Returns the path to the state file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absent_file_reads_unknown() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::at_path(dir.path().join("state")).unwrap();
        assert_eq!(store.read(), None);
    }

    #[test]
    fn test_record_and_read() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::at_path(dir.path().join("state")).unwrap();

        store.record(MicState::Recording);
        assert_eq!(store.read(), Some(StoredState::Recording));

        store.record(MicState::Processing);
        assert_eq!(store.read(), Some(StoredState::Idle));

        store.record(MicState::Idle);
        assert_eq!(store.read(), Some(StoredState::Idle));
    }

    #[test]
    fn test_unrecognized_content_reads_unknown() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::at_path(dir.path().join("state")).unwrap();
        fs::write(store.path(), "transcribing").unwrap();
        assert_eq!(store.read(), None);
    }
}
