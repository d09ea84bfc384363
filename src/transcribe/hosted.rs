//! Hosted transcription via OpenAI-compatible APIs
//!
//! OpenAI, Groq, and Mistral all accept the same multipart form: a WAV file,
//! a model tag, and an optional language hint. Groq translation uses the
//! `/audio/translations` path and always returns English text.

use super::{truncate_body, TranscriptionAdapter};
use crate::config::{RecordingConfig, TranscriptionConfig};
use crate::error::{ConfigError, TranscribeError};
use crate::transcribe::wav::encode_wav;
use serde::Deserialize;
use std::time::{Duration, Instant};

/// Client-side ceiling for one transcription round trip
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Adapter for hosted OpenAI-compatible transcription endpoints
pub struct HostedAdapter {
    name: &'static str,
    endpoint: &'static str,
    api_key: String,
    model: String,
    language: String,
    recording: RecordingConfig,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    text: String,
}

impl HostedAdapter {
    pub fn new(
        name: &'static str,
        endpoint: &'static str,
        recording: &RecordingConfig,
        transcription: &TranscriptionConfig,
    ) -> Result<Self, ConfigError> {
        let api_key = transcription.resolved_api_key();
        if api_key.is_empty() {
            let (provider, env_var) = match name {
                "openai" => ("OpenAI", "OPENAI_API_KEY"),
                "mistral-transcription" => ("Mistral", "MISTRAL_API_KEY"),
                _ => ("Groq", "GROQ_API_KEY"),
            };
            return Err(ConfigError::MissingApiKey { provider, env_var });
        }

        Ok(Self {
            name,
            endpoint,
            api_key,
            model: transcription.model_or_default(),
            language: transcription.language.clone(),
            recording: recording.clone(),
            client: reqwest::Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .map_err(|e| ConfigError::Invalid {
                    key: "transcription.provider",
                    reason: format!("failed to build HTTP client: {}", e),
                })?,
        })
    }

    fn build_form(&self, wav: Vec<u8>) -> Result<reqwest::multipart::Form, TranscribeError> {
        let file = reqwest::multipart::Part::bytes(wav)
            .file_name("audio.wav")
            .mime_str("audio/wav")
            .map_err(|e| TranscribeError::Parse(e.to_string()))?;

        let mut form = reqwest::multipart::Form::new()
            .part("file", file)
            .text("model", self.model.clone())
            .text("response_format", "json");
        if !self.language.is_empty() {
            form = form.text("language", self.language.clone());
        }
        Ok(form)
    }
}

#[async_trait::async_trait]
impl TranscriptionAdapter for HostedAdapter {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn transcribe(&self, pcm: &[u8]) -> Result<String, TranscribeError> {
        if pcm.is_empty() {
            return Ok(String::new());
        }

        let wav = encode_wav(pcm, &self.recording)?;
        tracing::debug!(
            "{}: uploading {} bytes of WAV ({} bytes PCM)",
            self.name,
            wav.len(),
            pcm.len()
        );

        let start = Instant::now();
        let response = self
            .client
            .post(self.endpoint)
            .bearer_auth(&self.api_key)
            .multipart(self.build_form(wav)?)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TranscribeError::Server {
                provider: self.name,
                status: status.as_u16(),
                body: truncate_body(&body),
            });
        }

        let parsed: TranscriptionResponse = response
            .json()
            .await
            .map_err(|e| TranscribeError::Parse(e.to_string()))?;
        let text = parsed.text.trim().to_string();

        tracing::info!(
            "{}: transcribed {} bytes in {:.2}s",
            self.name,
            pcm.len(),
            start.elapsed().as_secs_f32()
        );
        Ok(text)
    }
}
