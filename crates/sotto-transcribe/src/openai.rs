//! Transcription through the hosted OpenAI audio API.

use async_trait::async_trait;
use bytes::Bytes;
use serde::Deserialize;
use tracing::debug;

use crate::{Result, TranscribeError, Transcriber};

const TRANSCRIPTION_ENDPOINT: &str = "https://api.openai.com/v1/audio/transcriptions";

/// Default transcription model; cheaper and quicker than whisper-1 at
/// comparable quality on short dictation.
const DEFAULT_MODEL: &str = "gpt-4o-mini-transcribe";

/// Settings for [`OpenAiClient`].
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    /// Bearer token. An empty key fails fast at request time instead of
    /// burning a round trip.
    pub api_key: String,
    /// Overrides the default model when set.
    pub model: Option<String>,
}

impl OpenAiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: None,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn model(&self) -> &str {
        self.model.as_deref().unwrap_or(DEFAULT_MODEL)
    }
}

/// Client for the hosted transcription endpoint.
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    http: reqwest::Client,
    config: OpenAiConfig,
}

impl OpenAiClient {
    pub fn new(config: OpenAiConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }
}

/// The slice of the response body we care about.
#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    text: String,
}

#[async_trait]
impl Transcriber for OpenAiClient {
    async fn transcribe(&self, audio: Bytes, language: Option<&str>) -> Result<String> {
        if self.config.api_key.is_empty() {
            return Err(TranscribeError::NoApiKey);
        }

        debug!(
            model = self.config.model(),
            audio_bytes = audio.len(),
            language = ?language,
            "sending audio for transcription"
        );

        // Bytes become the part body without copying the audio.
        let file = reqwest::multipart::Part::stream(audio)
            .file_name("recording.wav")
            .mime_str("audio/wav")
            .map_err(|e| TranscribeError::Api(e.to_string()))?;
        let mut form = reqwest::multipart::Form::new()
            .part("file", file)
            .text("model", self.config.model().to_string());
        if let Some(language) = language {
            form = form.text("language", language.to_string());
        }

        let response = self
            .http
            .post(TRANSCRIPTION_ENDPOINT)
            .bearer_auth(&self.config.api_key)
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TranscribeError::Api(format!("{status}: {body}")));
        }

        let parsed: TranscriptionResponse = response
            .json()
            .await
            .map_err(|e| TranscribeError::Api(format!("malformed response: {e}")))?;
        Ok(parsed.text)
    }

    fn name(&self) -> &str {
        "openai"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_defaults_until_overridden() {
        let config = OpenAiConfig::new("sk-test");
        assert_eq!(config.model(), DEFAULT_MODEL);

        let config = config.with_model("whisper-1");
        assert_eq!(config.model(), "whisper-1");
    }

    #[tokio::test]
    async fn test_empty_key_fails_before_any_request() {
        let client = OpenAiClient::new(OpenAiConfig::new(""));
        let err = client.transcribe(Bytes::from_static(b"RIFF"), None).await;
        assert!(matches!(err, Err(TranscribeError::NoApiKey)));
    }
}
