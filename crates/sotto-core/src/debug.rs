//! Preservation of audio that failed to transcribe.
//!
//! When transcription fails (or hears nothing), the raw WAV is kept on disk
//! so the problem can be replayed against the backend later. The directory
//! is pruned oldest-first so it never grows without bound.

use std::fs;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use tracing::{debug, warn};

use crate::config::default_data_dir;

/// Keeps failed-audio WAVs under a retention policy.
pub struct DebugCapture {
    dir: PathBuf,
    keep_files: usize,
    keep_bytes: u64,
}

impl DebugCapture {
    /// Creates a capture directory at the default location.
    pub fn new(keep_files: u32, keep_bytes: u64) -> Result<Self> {
        Ok(Self::at_dir(
            default_data_dir()?.join("debug"),
            keep_files,
            keep_bytes,
        ))
    }

    /// Creates a capture directory at an explicit path.
    pub fn at_dir(dir: impl Into<PathBuf>, keep_files: u32, keep_bytes: u64) -> Self {
        Self {
            dir: dir.into(),
            keep_files: keep_files as usize,
            keep_bytes,
        }
    }

    /// Writes the WAV bytes under a timestamped name, then prunes old
    /// captures past the retention caps.
    pub fn preserve(&self, wav: &[u8]) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create debug directory at {:?}", self.dir))?;

        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or(0);
        let path = self.dir.join(format!("failed-{millis}.wav"));
        fs::write(&path, wav)
            .with_context(|| format!("Failed to write failed audio to {:?}", path))?;

        if let Err(e) = self.prune() {
            warn!(error = %e, "failed to prune old captures");
        }
        Ok(path)
    }

    /// Removes oldest captures while the directory exceeds either cap.
    fn prune(&self) -> Result<()> {
        let mut captures = Vec::new();
        for entry in fs::read_dir(&self.dir)
            .with_context(|| format!("Failed to read debug directory at {:?}", self.dir))?
        {
            let entry = entry?;
            let path = entry.path();
            if path.extension().is_none_or(|ext| ext != "wav") {
                continue;
            }
            let meta = entry.metadata()?;
            let modified = meta.modified().unwrap_or(UNIX_EPOCH);
            captures.push((path, modified, meta.len()));
        }

        captures.sort_by_key(|(_, modified, _)| *modified);

        let mut count = captures.len();
        let mut total: u64 = captures.iter().map(|(_, _, len)| len).sum();
        for (path, _, len) in captures {
            if count <= self.keep_files && total <= self.keep_bytes {
                break;
            }
            match fs::remove_file(&path) {
                Ok(()) => {
                    debug!(path = ?path, "pruned old failed-audio capture");
                    count -= 1;
                    total = total.saturating_sub(len);
                }
                Err(e) => warn!(error = %e, path = ?path, "failed to prune capture"),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::thread::sleep;
    use std::time::Duration;

    use super::*;

    fn wav_names(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_preserve_writes_exact_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let capture = DebugCapture::at_dir(dir.path(), 8, u64::MAX);

        let path = capture.preserve(b"RIFF-not-really-wav").unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"RIFF-not-really-wav");
    }

    #[test]
    fn test_prunes_past_count_cap() {
        let dir = tempfile::tempdir().unwrap();
        let capture = DebugCapture::at_dir(dir.path(), 2, u64::MAX);

        let first = capture.preserve(b"one").unwrap();
        sleep(Duration::from_millis(10));
        capture.preserve(b"two").unwrap();
        sleep(Duration::from_millis(10));
        capture.preserve(b"three").unwrap();

        let names = wav_names(dir.path());
        assert_eq!(names.len(), 2);
        assert!(!first.exists(), "oldest capture should have been pruned");
    }

    #[test]
    fn test_prunes_past_size_cap() {
        let dir = tempfile::tempdir().unwrap();
        let capture = DebugCapture::at_dir(dir.path(), 100, 10);

        let first = capture.preserve(&[0u8; 8]).unwrap();
        sleep(Duration::from_millis(10));
        let second = capture.preserve(&[0u8; 8]).unwrap();

        assert!(!first.exists());
        assert!(second.exists());
    }
}
