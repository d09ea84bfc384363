//! Error types for hyprvoice
//!
//! Uses thiserror for ergonomic error definitions with clear messages
//! that guide users toward fixing common issues.

use std::time::Duration;
use thiserror::Error;

/// Top-level error type for the hyprvoice application
#[derive(Error, Debug)]
pub enum HyprvoiceError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Control bus error: {0}")]
    Bus(#[from] BusError),

    #[error("Audio capture error: {0}")]
    Audio(#[from] AudioError),

    #[error("Transcription error: {0}")]
    Transcribe(#[from] TranscribeError),

    #[error("Injection error: {0}")]
    Inject(#[from] InjectError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors related to configuration loading and validation
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("could not determine the user config directory")]
    NoConfigDir,

    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("failed to write config file {path}: {source}")]
    Write {
        path: String,
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },

    #[error("invalid {key}: {reason}")]
    Invalid { key: &'static str, reason: String },

    #[error("{provider} API key required: set transcription.api_key or the {env_var} environment variable")]
    MissingApiKey {
        provider: &'static str,
        env_var: &'static str,
    },

    #[error("whisper.cpp server URL required: set transcription.server_url (e.g. \"http://127.0.0.1:8080/inference\")")]
    MissingServerUrl,

    #[error("failed to watch config file: {0}")]
    Watch(String),
}

/// Errors related to the control bus socket and protocol
#[derive(Error, Debug)]
pub enum BusError {
    #[error("daemon already running (pid {0})")]
    AlreadyRunning(u32),

    #[error("failed to bind control socket at {path}: {source}")]
    Bind {
        path: String,
        source: std::io::Error,
    },

    #[error("failed to connect to daemon at {path}: {source} (is the daemon running?)")]
    Connect {
        path: String,
        source: std::io::Error,
    },

    #[error("control socket I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("daemon replied with an error: {0}")]
    Rejected(String),
}

/// Errors related to audio capture
#[derive(Error, Debug)]
pub enum AudioError {
    #[error("failed to spawn {command}: {source} (is PipeWire installed?)")]
    Spawn {
        command: &'static str,
        source: std::io::Error,
    },

    #[error("audio capture stream error: {0}")]
    Stream(String),
}

/// Errors related to speech-to-text transcription
#[derive(Error, Debug)]
pub enum TranscribeError {
    #[error("{provider} returned status {status}: {body}")]
    Server {
        provider: &'static str,
        status: u16,
        body: String,
    },

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("failed to parse transcription response: {0}")]
    Parse(String),

    #[error("audio format error: {0}")]
    AudioFormat(String),
}

/// Errors related to text injection
#[derive(Error, Debug)]
pub enum InjectError {
    #[error("cannot inject empty text")]
    EmptyText,

    #[error("{binary} not found in PATH (install the {package} package)")]
    BinaryNotFound {
        binary: &'static str,
        package: &'static str,
    },

    #[error("ydotoold not responding: {0} (start it with: systemctl --user start ydotool)")]
    YdotooldNotRunning(String),

    #[error("{0} not set (a Wayland session is required)")]
    MissingEnv(&'static str),

    #[error("{backend} failed: {reason}")]
    Backend {
        backend: &'static str,
        reason: String,
    },

    #[error("{backend} timed out after {timeout:?}")]
    Timeout {
        backend: &'static str,
        timeout: Duration,
    },

    #[error("injection cancelled")]
    Cancelled,

    #[error("all injection backends failed: {attempts}")]
    AllBackendsFailed { attempts: String },
}

/// Result type alias using HyprvoiceError
pub type Result<T> = std::result::Result<T, HyprvoiceError>;
