//! User-visible status notifications
//!
//! Events carry a fixed tag; the notifier maps each tag through a resolved
//! message table (built-in defaults merged with config overrides) and
//! delivers it via notify-send, the log, or nowhere. Error notifications
//! always use critical urgency.

use crate::config::{MessagesConfig, NotificationsConfig};
use std::collections::HashMap;
use std::process::Stdio;
use std::sync::Arc;
use tokio::process::Command;

/// Notification event tags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Event {
    RecordingStarted,
    Transcribing,
    Injected,
    NoSpeech,
    OperationCancelled,
    ConfigReloaded,
    InjectionAborted,
}

/// A resolved message ready for display
#[derive(Debug, Clone)]
pub struct Message {
    pub title: String,
    pub body: String,
    pub is_error: bool,
}

struct EventDef {
    event: Event,
    config_key: &'static str,
    default_title: &'static str,
    default_body: &'static str,
    is_error: bool,
}

/// Single source of truth for all notification messages
const EVENT_DEFS: &[EventDef] = &[
    EventDef {
        event: Event::RecordingStarted,
        config_key: "recording_started",
        default_title: "Hyprvoice",
        default_body: "Recording Started",
        is_error: false,
    },
    EventDef {
        event: Event::Transcribing,
        config_key: "transcribing",
        default_title: "Hyprvoice",
        default_body: "Recording Ended... Transcribing",
        is_error: false,
    },
    EventDef {
        event: Event::Injected,
        config_key: "injected",
        default_title: "Hyprvoice",
        default_body: "Text Injected",
        is_error: false,
    },
    EventDef {
        event: Event::NoSpeech,
        config_key: "no_speech",
        default_title: "Hyprvoice",
        default_body: "No Speech Detected",
        is_error: false,
    },
    EventDef {
        event: Event::OperationCancelled,
        config_key: "operation_cancelled",
        default_title: "Hyprvoice",
        default_body: "Operation Cancelled",
        is_error: false,
    },
    EventDef {
        event: Event::ConfigReloaded,
        config_key: "config_reloaded",
        default_title: "Hyprvoice",
        default_body: "Config Reloaded",
        is_error: false,
    },
    EventDef {
        event: Event::InjectionAborted,
        config_key: "injection_aborted",
        default_title: "",
        default_body: "Injection Aborted",
        is_error: true,
    },
];

/// Merge config overrides into the built-in message table
pub fn resolve_messages(overrides: &MessagesConfig) -> HashMap<Event, Message> {
    let mut resolved = HashMap::new();
    for def in EVENT_DEFS {
        let mut message = Message {
            title: def.default_title.to_string(),
            body: def.default_body.to_string(),
            is_error: def.is_error,
        };
        if let Some(user) = overrides.override_for(def.config_key) {
            if let Some(title) = &user.title {
                message.title = title.clone();
            }
            if let Some(body) = &user.body {
                message.body = body.clone();
            }
        }
        resolved.insert(def.event, message);
    }
    resolved
}

/// Trait for notification sinks
#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    /// Emit the message for an event tag; unknown tags are dropped silently
    async fn send(&self, event: Event);

    /// Emit a dynamic error message (pipeline failures)
    async fn error(&self, message: &str);
}

/// Create a notifier from config. Disabled notifications always yield the
/// null sink regardless of type.
pub fn create_notifier(config: &NotificationsConfig) -> Arc<dyn Notifier> {
    if !config.enabled {
        return Arc::new(NullNotifier);
    }
    match config.kind.as_str() {
        "desktop" => Arc::new(DesktopNotifier {
            messages: resolve_messages(&config.messages),
        }),
        "log" => Arc::new(LogNotifier {
            messages: resolve_messages(&config.messages),
        }),
        _ => Arc::new(NullNotifier),
    }
}

/// Desktop notifications via notify-send
pub struct DesktopNotifier {
    messages: HashMap<Event, Message>,
}

impl DesktopNotifier {
    async fn notify(&self, title: &str, body: &str) {
        let result = Command::new("notify-send")
            .args(["--app-name=Hyprvoice", "--expire-time=2000", title, body])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await;
        if let Err(e) = result {
            tracing::debug!("failed to send notification: {}", e);
        }
    }
}

#[async_trait::async_trait]
impl Notifier for DesktopNotifier {
    async fn send(&self, event: Event) {
        let Some(message) = self.messages.get(&event) else {
            return;
        };
        if message.is_error {
            self.error(&message.body).await;
            return;
        }
        self.notify(&message.title, &message.body).await;
    }

    async fn error(&self, message: &str) {
        let result = Command::new("notify-send")
            .args([
                "--app-name=Hyprvoice",
                "--urgency=critical",
                "Hyprvoice Error",
                message,
            ])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await;
        if let Err(e) = result {
            tracing::warn!("failed to send error notification: {}", e);
        }
    }
}

/// Structured-log notifications
pub struct LogNotifier {
    messages: HashMap<Event, Message>,
}

#[async_trait::async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, event: Event) {
        let Some(message) = self.messages.get(&event) else {
            return;
        };
        if message.is_error {
            self.error(&message.body).await;
            return;
        }
        tracing::info!("{}: {}", message.title, message.body);
    }

    async fn error(&self, message: &str) {
        tracing::error!("Hyprvoice Error: {}", message);
    }
}

/// Drops everything
pub struct NullNotifier;

#[async_trait::async_trait]
impl Notifier for NullNotifier {
    async fn send(&self, _event: Event) {}
    async fn error(&self, _message: &str) {}
}
