//! Speech-to-text adapters
//!
//! A transcription adapter consumes one completed PCM buffer and returns the
//! decoded text. Hosted providers (OpenAI, Groq, Mistral) share the
//! OpenAI-compatible multipart API; a local whisper.cpp server gets its own
//! adapter with extra tunables. The provider tag in the config selects the
//! variant; credential problems surface here, before any pipeline runs.

pub mod hosted;
pub mod wav;
pub mod whisper_cpp;

pub use hosted::HostedAdapter;
pub use whisper_cpp::WhisperCppAdapter;

use crate::config::{RecordingConfig, TranscriptionConfig};
use crate::error::{ConfigError, TranscribeError};
use std::sync::Arc;

/// How much of an error response body to keep in error messages
pub(crate) const ERROR_BODY_LIMIT: usize = 200;

/// Trait for transcription backends.
///
/// Implementations must be abortable by dropping the returned future: the
/// pipeline races `transcribe` against its cancellation token and the drop
/// must cut the underlying transfer short.
#[async_trait::async_trait]
pub trait TranscriptionAdapter: Send + Sync {
    /// Provider tag for logs and errors
    fn name(&self) -> &'static str;

    /// Transcribe a raw PCM buffer. Zero-length input yields an empty
    /// transcript without touching the network.
    async fn transcribe(&self, pcm: &[u8]) -> Result<String, TranscribeError>;
}

/// Create the adapter for the configured provider.
///
/// Fails with a configuration error when the chosen provider is missing its
/// credential or server URL, so construction happens strictly before audio
/// capture starts.
pub fn create_adapter(
    recording: &RecordingConfig,
    transcription: &TranscriptionConfig,
) -> Result<Arc<dyn TranscriptionAdapter>, ConfigError> {
    match transcription.provider.as_str() {
        "openai" => Ok(Arc::new(HostedAdapter::new(
            "openai",
            "https://api.openai.com/v1/audio/transcriptions",
            recording,
            transcription,
        )?)),
        "groq-transcription" => Ok(Arc::new(HostedAdapter::new(
            "groq-transcription",
            "https://api.groq.com/openai/v1/audio/transcriptions",
            recording,
            transcription,
        )?)),
        "groq-translation" => Ok(Arc::new(HostedAdapter::new(
            "groq-translation",
            "https://api.groq.com/openai/v1/audio/translations",
            recording,
            transcription,
        )?)),
        "mistral-transcription" => Ok(Arc::new(HostedAdapter::new(
            "mistral-transcription",
            "https://api.mistral.ai/v1/audio/transcriptions",
            recording,
            transcription,
        )?)),
        "whisper-cpp" => Ok(Arc::new(WhisperCppAdapter::new(recording, transcription)?)),
        other => Err(ConfigError::Invalid {
            key: "transcription.provider",
            reason: format!("unsupported provider {:?}", other),
        }),
    }
}

pub(crate) fn truncate_body(body: &str) -> String {
    if body.chars().count() > ERROR_BODY_LIMIT {
        let truncated: String = body.chars().take(ERROR_BODY_LIMIT).collect();
        format!("{}…", truncated)
    } else {
        body.to_string()
    }
}
