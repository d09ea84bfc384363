//! Text injection module
//!
//! Delivers a transcript to the focused application through an ordered
//! fallback chain:
//! 1. ydotool - works in most apps including Chromium/Electron, needs ydotoold
//! 2. wtype - Wayland-native typing, no daemon needed
//! 3. clipboard - copies via wl-copy, paste manually
//!
//! Each backend passes a cheap `available()` check before its `inject()` is
//! attempted; the first success wins.

pub mod clipboard;
pub mod wtype;
pub mod ydotool;

use crate::config::InjectionConfig;
use crate::error::InjectError;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

/// Trait for injection backends
#[async_trait::async_trait]
pub trait Backend: Send + Sync {
    /// Tag for logs and errors
    fn name(&self) -> &'static str;

    /// Cheap precondition check: binary in PATH, required environment
    /// present, helper daemon reachable
    async fn available(&self) -> Result<(), InjectError>;

    /// Deliver the text, bounded by `timeout`
    async fn inject(&self, text: &str, timeout: Duration) -> Result<(), InjectError>;
}

struct ChainEntry {
    backend: Box<dyn Backend>,
    timeout: Duration,
}

/// Ordered fallback chain over injection backends
pub struct Injector {
    chain: Vec<ChainEntry>,
}

impl Injector {
    /// Build the chain from the configured backend order.
    /// Unknown names are skipped; an empty result falls back to clipboard.
    pub fn new(config: &InjectionConfig) -> Self {
        let mut chain: Vec<ChainEntry> = Vec::new();
        for name in &config.backends {
            let backend: Box<dyn Backend> = match name.as_str() {
                "ydotool" => Box::new(ydotool::YdotoolBackend::new()),
                "wtype" => Box::new(wtype::WtypeBackend::new()),
                "clipboard" => Box::new(clipboard::ClipboardBackend::new()),
                other => {
                    tracing::warn!("ignoring unknown injection backend {:?}", other);
                    continue;
                }
            };
            chain.push(ChainEntry {
                timeout: config.timeout_for(name),
                backend,
            });
        }

        if chain.is_empty() {
            chain.push(ChainEntry {
                backend: Box::new(clipboard::ClipboardBackend::new()),
                timeout: config.timeout_for("clipboard"),
            });
        }

        Self { chain }
    }

    /// Build a chain from explicit backends (used by tests)
    pub fn with_chain(backends: Vec<(Box<dyn Backend>, Duration)>) -> Self {
        Self {
            chain: backends
                .into_iter()
                .map(|(backend, timeout)| ChainEntry { backend, timeout })
                .collect(),
        }
    }

    /// Backend names in chain order
    pub fn backend_names(&self) -> Vec<&'static str> {
        self.chain.iter().map(|e| e.backend.name()).collect()
    }

    /// Try each backend in order until one succeeds.
    ///
    /// Cancellation aborts the attempt in progress and surfaces as
    /// [`InjectError::Cancelled`] without advancing the chain.
    pub async fn inject(&self, cancel: &CancellationToken, text: &str) -> Result<(), InjectError> {
        if text.is_empty() {
            return Err(InjectError::EmptyText);
        }

        let mut attempts: Vec<String> = Vec::new();
        for entry in &self.chain {
            let name = entry.backend.name();

            if let Err(e) = entry.backend.available().await {
                tracing::debug!("{} unavailable, trying next: {}", name, e);
                attempts.push(format!("{} (unavailable): {}", name, e));
                continue;
            }

            tokio::select! {
                _ = cancel.cancelled() => return Err(InjectError::Cancelled),
                result = entry.backend.inject(text, entry.timeout) => match result {
                    Ok(()) => {
                        tracing::info!("text injected via {}", name);
                        return Ok(());
                    }
                    Err(e) => {
                        tracing::warn!("{} failed, trying next: {}", name, e);
                        attempts.push(format!("{}: {}", name, e));
                    }
                }
            }
        }

        Err(InjectError::AllBackendsFailed {
            attempts: if attempts.is_empty() {
                "no backends configured".to_string()
            } else {
                attempts.join("; ")
            },
        })
    }
}

/// Check whether a binary resolves in PATH
pub(crate) async fn binary_in_path(name: &str) -> bool {
    Command::new("which")
        .arg(name)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await
        .map(|s| s.success())
        .unwrap_or(false)
}

/// Environment checks shared by the Wayland-facing backends
pub(crate) fn wayland_session_ready() -> Result<(), InjectError> {
    if std::env::var_os("WAYLAND_DISPLAY").is_none() {
        return Err(InjectError::MissingEnv("WAYLAND_DISPLAY"));
    }
    if std::env::var_os("XDG_RUNTIME_DIR").is_none() {
        return Err(InjectError::MissingEnv("XDG_RUNTIME_DIR"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    /// Scripted backend that records the call order
    struct MockBackend {
        name: &'static str,
        available: bool,
        succeed: bool,
        calls: Arc<Mutex<Vec<String>>>,
        injected: Arc<Mutex<Vec<String>>>,
    }

    impl MockBackend {
        fn boxed(
            name: &'static str,
            available: bool,
            succeed: bool,
            calls: Arc<Mutex<Vec<String>>>,
            injected: Arc<Mutex<Vec<String>>>,
        ) -> Box<dyn Backend> {
            Box::new(Self {
                name,
                available,
                succeed,
                calls,
                injected,
            })
        }
    }

    #[async_trait::async_trait]
    impl Backend for MockBackend {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn available(&self) -> Result<(), InjectError> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("available:{}", self.name));
            if self.available {
                Ok(())
            } else {
                Err(InjectError::Backend {
                    backend: self.name,
                    reason: "not installed".into(),
                })
            }
        }

        async fn inject(&self, text: &str, _timeout: Duration) -> Result<(), InjectError> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("inject:{}", self.name));
            if self.succeed {
                self.injected.lock().unwrap().push(text.to_string());
                Ok(())
            } else {
                Err(InjectError::Backend {
                    backend: self.name,
                    reason: "simulated failure".into(),
                })
            }
        }
    }

    fn timeout() -> Duration {
        Duration::from_secs(1)
    }

    #[tokio::test]
    async fn test_empty_text_rejected_before_backends() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let injected = Arc::new(Mutex::new(Vec::new()));
        let injector = Injector::with_chain(vec![(
            MockBackend::boxed("typing-a", true, true, calls.clone(), injected.clone()),
            timeout(),
        )]);

        let cancel = CancellationToken::new();
        assert!(matches!(
            injector.inject(&cancel, "").await,
            Err(InjectError::EmptyText)
        ));
        assert!(calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_first_success_stops_chain() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let injected = Arc::new(Mutex::new(Vec::new()));
        let injector = Injector::with_chain(vec![
            (
                MockBackend::boxed("typing-a", true, true, calls.clone(), injected.clone()),
                timeout(),
            ),
            (
                MockBackend::boxed("typing-b", true, true, calls.clone(), injected.clone()),
                timeout(),
            ),
        ]);

        let cancel = CancellationToken::new();
        injector.inject(&cancel, "hello").await.unwrap();

        assert_eq!(
            *calls.lock().unwrap(),
            vec!["available:typing-a", "inject:typing-a"]
        );
        assert_eq!(*injected.lock().unwrap(), vec!["hello"]);
    }

    #[tokio::test]
    async fn test_fallback_reaches_last_backend() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let injected = Arc::new(Mutex::new(Vec::new()));
        let injector = Injector::with_chain(vec![
            (
                MockBackend::boxed("typing-a", true, false, calls.clone(), injected.clone()),
                timeout(),
            ),
            (
                MockBackend::boxed("typing-b", true, false, calls.clone(), injected.clone()),
                timeout(),
            ),
            (
                MockBackend::boxed("clipboard", true, true, calls.clone(), injected.clone()),
                timeout(),
            ),
        ]);

        let cancel = CancellationToken::new();
        injector.inject(&cancel, "fallback text").await.unwrap();
        assert_eq!(*injected.lock().unwrap(), vec!["fallback text"]);
    }

    #[tokio::test]
    async fn test_unavailable_backend_never_injected() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let injected = Arc::new(Mutex::new(Vec::new()));
        let injector = Injector::with_chain(vec![
            (
                MockBackend::boxed("typing-a", false, true, calls.clone(), injected.clone()),
                timeout(),
            ),
            (
                MockBackend::boxed("clipboard", true, true, calls.clone(), injected.clone()),
                timeout(),
            ),
        ]);

        let cancel = CancellationToken::new();
        injector.inject(&cancel, "text").await.unwrap();

        // available() is always consulted first; inject() never runs on an
        // unavailable backend
        assert_eq!(
            *calls.lock().unwrap(),
            vec![
                "available:typing-a",
                "available:clipboard",
                "inject:clipboard"
            ]
        );
    }

    #[tokio::test]
    async fn test_all_backends_failing_aggregates_attempts() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let injected = Arc::new(Mutex::new(Vec::new()));
        let injector = Injector::with_chain(vec![
            (
                MockBackend::boxed("typing-a", true, false, calls.clone(), injected.clone()),
                timeout(),
            ),
            (
                MockBackend::boxed("typing-b", false, false, calls.clone(), injected.clone()),
                timeout(),
            ),
        ]);

        let cancel = CancellationToken::new();
        match injector.inject(&cancel, "text").await {
            Err(InjectError::AllBackendsFailed { attempts }) => {
                assert!(attempts.contains("typing-a"));
                assert!(attempts.contains("typing-b"));
            }
            other => panic!("expected AllBackendsFailed, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_cancellation_aborts_without_advancing() {
        struct SlowBackend {
            started: Arc<AtomicUsize>,
        }

        #[async_trait::async_trait]
        impl Backend for SlowBackend {
            fn name(&self) -> &'static str {
                "slow"
            }
            async fn available(&self) -> Result<(), InjectError> {
                Ok(())
            }
            async fn inject(&self, _text: &str, _timeout: Duration) -> Result<(), InjectError> {
                self.started.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok(())
            }
        }

        let started = Arc::new(AtomicUsize::new(0));
        let calls = Arc::new(Mutex::new(Vec::new()));
        let injected = Arc::new(Mutex::new(Vec::new()));
        let injector = Injector::with_chain(vec![
            (
                Box::new(SlowBackend {
                    started: started.clone(),
                }) as Box<dyn Backend>,
                Duration::from_secs(60),
            ),
            (
                MockBackend::boxed("clipboard", true, true, calls.clone(), injected.clone()),
                timeout(),
            ),
        ]);

        let cancel = CancellationToken::new();
        let cancel_clone = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            cancel_clone.cancel();
        });

        match injector.inject(&cancel, "text").await {
            Err(InjectError::Cancelled) => {}
            other => panic!("expected Cancelled, got {:?}", other),
        }
        assert_eq!(started.load(Ordering::SeqCst), 1);
        // The chain never advanced to the clipboard backend
        assert!(injected.lock().unwrap().is_empty());
    }

    #[test]
    fn test_new_skips_unknown_and_defaults_to_clipboard() {
        let mut config = InjectionConfig::default();
        config.backends = vec!["bogus".to_string()];
        let injector = Injector::new(&config);
        assert_eq!(injector.backend_names(), vec!["clipboard"]);

        config.backends = vec![];
        let injector = Injector::new(&config);
        assert_eq!(injector.backend_names(), vec!["clipboard"]);
    }

    #[test]
    fn test_new_preserves_configured_order() {
        let mut config = InjectionConfig::default();
        config.backends = vec!["clipboard".to_string(), "wtype".to_string()];
        let injector = Injector::new(&config);
        assert_eq!(injector.backend_names(), vec!["clipboard", "wtype"]);
    }
}
