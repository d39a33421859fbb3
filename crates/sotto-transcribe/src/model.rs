//! The catalog of known whisper.cpp models and the download path that
//! fetches one into the data directory on first use.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use futures_util::StreamExt;
use sotto_core::models_dir;
use tracing::{info, warn};

/// Quantized ggml builds published alongside whisper.cpp.
const MODEL_BASE_URL: &str = "https://huggingface.co/ggerganov/whisper.cpp/resolve/main";

/// One entry in the model catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WhisperModel {
    name: &'static str,
    filename: &'static str,
    /// Published size; progress fallback when the server sends no length.
    bytes: u64,
}

const BASE_Q8: WhisperModel = WhisperModel::new("base-q8", "ggml-base-q8_0.bin", 81_800_000);

/// Every model sotto knows how to fetch. Quantized builds only; the
/// full-precision ones buy nothing for dictation-length audio.
pub const MODELS: &[WhisperModel] = &[
    WhisperModel::new("tiny-q8", "ggml-tiny-q8_0.bin", 43_500_000),
    WhisperModel::new("tiny-en-q8", "ggml-tiny.en-q8_0.bin", 43_600_000),
    BASE_Q8,
    WhisperModel::new("base-en-q8", "ggml-base.en-q8_0.bin", 81_800_000),
    WhisperModel::new("small-q8", "ggml-small-q8_0.bin", 264_000_000),
    WhisperModel::new("small-en-q8", "ggml-small.en-q8_0.bin", 264_000_000),
    WhisperModel::new("medium-q8", "ggml-medium-q8_0.bin", 823_000_000),
    WhisperModel::new("medium-en-q8", "ggml-medium.en-q8_0.bin", 823_000_000),
    WhisperModel::new("large-v3-turbo-q5", "ggml-large-v3-turbo-q5_0.bin", 574_000_000),
];

impl WhisperModel {
    const fn new(name: &'static str, filename: &'static str, bytes: u64) -> Self {
        Self {
            name,
            filename,
            bytes,
        }
    }

    /// Looks a model up by name. The quantization suffix is optional and
    /// dotted spellings are accepted, so "base", "base-q8" and "tiny.en"
    /// all resolve.
    pub fn named(name: &str) -> Option<Self> {
        let wanted = name.trim().to_lowercase().replace('.', "-");
        MODELS.iter().copied().find(|m| {
            m.name == wanted
                || m.name.strip_suffix("-q8") == Some(wanted.as_str())
                || m.name.strip_suffix("-q5") == Some(wanted.as_str())
        })
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn filename(&self) -> &'static str {
        self.filename
    }

    pub fn url(&self) -> String {
        format!("{MODEL_BASE_URL}/{}", self.filename)
    }

    pub fn size_bytes(&self) -> u64 {
        self.bytes
    }
}

impl Default for WhisperModel {
    /// base-q8: solid accuracy at dictation lengths, loads fast.
    fn default() -> Self {
        BASE_Q8
    }
}

/// Where this model lives on disk.
pub fn model_path(model: WhisperModel) -> Result<PathBuf> {
    Ok(models_dir()?.join(model.filename()))
}

/// Returns the model's local path, downloading it first when missing.
pub async fn ensure_model(model: WhisperModel) -> Result<PathBuf> {
    let path = model_path(model)?;
    if path.exists() {
        info!(model = model.name(), "model already present");
        return Ok(path);
    }
    warn!(
        model = model.name(),
        mb = model.size_bytes() / 1_000_000,
        "model not found locally, downloading"
    );
    download(model, &path).await?;
    Ok(path)
}

/// Streams the model into `<file>.part` and renames it into place, so an
/// interrupted download never leaves a half-written model where the loader
/// would find it.
async fn download(model: WhisperModel, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create models directory {:?}", parent))?;
    }

    let url = model.url();
    info!(model = model.name(), url = %url, "downloading whisper model");

    let response = reqwest::Client::new()
        .get(&url)
        .send()
        .await
        .with_context(|| format!("failed to start download from {url}"))?;
    if !response.status().is_success() {
        bail!("model download rejected: HTTP {}", response.status());
    }
    let total = response.content_length().unwrap_or(model.size_bytes());

    let part_path = path.with_extension("part");
    let mut file = File::create(&part_path)
        .with_context(|| format!("failed to create {:?}", part_path))?;

    let mut downloaded: u64 = 0;
    let mut logged_decile = 0u64;
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.context("download interrupted")?;
        file.write_all(&chunk).context("failed to write model data")?;
        downloaded += chunk.len() as u64;

        let decile = downloaded.min(total) * 10 / total.max(1);
        if decile > logged_decile {
            logged_decile = decile;
            info!(percent = decile * 10, "download progress");
        }
    }
    file.flush().context("failed to flush model file")?;
    drop(file);

    fs::rename(&part_path, path)
        .with_context(|| format!("failed to move {:?} into place", part_path))?;
    info!(path = ?path, "model download complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_named_accepts_loose_spellings() {
        assert_eq!(WhisperModel::named("base-q8"), Some(BASE_Q8));
        assert_eq!(WhisperModel::named("base"), Some(BASE_Q8));
        assert_eq!(WhisperModel::named("Base "), Some(BASE_Q8));
        assert_eq!(
            WhisperModel::named("tiny.en").map(|m| m.name()),
            Some("tiny-en-q8")
        );
        assert_eq!(
            WhisperModel::named("large-v3-turbo").map(|m| m.name()),
            Some("large-v3-turbo-q5")
        );
        assert_eq!(WhisperModel::named("enormous"), None);
    }

    #[test]
    fn test_default_is_in_catalog() {
        assert!(MODELS.contains(&WhisperModel::default()));
    }

    #[test]
    fn test_url_points_at_models() {
        let url = BASE_Q8.url();
        assert!(url.starts_with("https://"));
        assert!(url.ends_with("ggml-base-q8_0.bin"));
    }
}
