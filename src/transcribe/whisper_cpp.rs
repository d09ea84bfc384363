//! Transcription against a local whisper.cpp server
//!
//! Talks to the whisper.cpp `server` example at a user-supplied URL. No API
//! key is involved; the server transcribes with whatever model it has
//! loaded. temperature=0.0 keeps output deterministic, temperature_inc=0.2
//! is the server's recommended fallback step.

use super::{truncate_body, TranscriptionAdapter};
use crate::config::{RecordingConfig, TranscriptionConfig};
use crate::error::{ConfigError, TranscribeError};
use crate::transcribe::wav::encode_wav;
use serde::Deserialize;
use std::time::{Duration, Instant};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Adapter for a local whisper.cpp HTTP server
pub struct WhisperCppAdapter {
    server_url: String,
    language: String,
    recording: RecordingConfig,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct WhisperCppResponse {
    text: String,
}

impl WhisperCppAdapter {
    pub fn new(
        recording: &RecordingConfig,
        transcription: &TranscriptionConfig,
    ) -> Result<Self, ConfigError> {
        if transcription.server_url.is_empty() {
            return Err(ConfigError::MissingServerUrl);
        }
        if !transcription.server_url.starts_with("http://")
            && !transcription.server_url.starts_with("https://")
        {
            return Err(ConfigError::Invalid {
                key: "transcription.server_url",
                reason: format!(
                    "{:?} must start with http:// or https://",
                    transcription.server_url
                ),
            });
        }

        Ok(Self {
            server_url: transcription.server_url.clone(),
            language: transcription.language.clone(),
            recording: recording.clone(),
            client: reqwest::Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .map_err(|e| ConfigError::Invalid {
                    key: "transcription.server_url",
                    reason: format!("failed to build HTTP client: {}", e),
                })?,
        })
    }
}

#[async_trait::async_trait]
impl TranscriptionAdapter for WhisperCppAdapter {
    fn name(&self) -> &'static str {
        "whisper-cpp"
    }

    async fn transcribe(&self, pcm: &[u8]) -> Result<String, TranscribeError> {
        if pcm.is_empty() {
            return Ok(String::new());
        }

        let wav = encode_wav(pcm, &self.recording)?;

        let file = reqwest::multipart::Part::bytes(wav)
            .file_name("audio.wav")
            .mime_str("audio/wav")
            .map_err(|e| TranscribeError::Parse(e.to_string()))?;

        let mut form = reqwest::multipart::Form::new()
            .part("file", file)
            .text("temperature", "0.0")
            .text("temperature_inc", "0.2")
            .text("response_format", "json");
        if !self.language.is_empty() {
            form = form.text("language", self.language.clone());
        }

        let start = Instant::now();
        let response = self
            .client
            .post(&self.server_url)
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TranscribeError::Server {
                provider: "whisper-cpp",
                status: status.as_u16(),
                body: truncate_body(&body),
            });
        }

        let parsed: WhisperCppResponse = response
            .json()
            .await
            .map_err(|e| TranscribeError::Parse(e.to_string()))?;
        let text = parsed.text.trim().to_string();

        tracing::info!(
            "whisper-cpp: transcribed {} bytes in {:.2}s",
            pcm.len(),
            start.elapsed().as_secs_f32()
        );
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(url: &str) -> TranscriptionConfig {
        TranscriptionConfig {
            provider: "whisper-cpp".to_string(),
            api_key: String::new(),
            language: String::new(),
            model: String::new(),
            server_url: url.to_string(),
        }
    }

    #[test]
    fn test_new_requires_server_url() {
        assert!(matches!(
            WhisperCppAdapter::new(&RecordingConfig::default(), &config("")),
            Err(ConfigError::MissingServerUrl)
        ));
    }

    #[test]
    fn test_new_rejects_bad_scheme() {
        assert!(WhisperCppAdapter::new(
            &RecordingConfig::default(),
            &config("192.168.1.10:8080/inference")
        )
        .is_err());
        assert!(WhisperCppAdapter::new(
            &RecordingConfig::default(),
            &config("http://192.168.1.10:8080/inference")
        )
        .is_ok());
    }

    #[tokio::test]
    async fn test_empty_pcm_short_circuits() {
        let adapter = WhisperCppAdapter::new(
            &RecordingConfig::default(),
            &config("http://127.0.0.1:9/inference"),
        )
        .unwrap();

        // Port 9 is unreachable; an empty buffer must not try to reach it
        let text = adapter.transcribe(&[]).await.unwrap();
        assert_eq!(text, "");
    }
}
