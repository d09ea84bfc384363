//! Recording pipeline state machine
//!
//! One pipeline is one session: Idle → Recording → Transcribing → Injecting
//! → Idle. A single driver task owns every transition; stage workers talk to
//! it only through channels (frames, action, errors) and the shared status
//! cell. One cancellation token scopes the whole session and descends into
//! the capture subprocess and the transcription HTTP request.
//!
//! A toggle during Recording ends capture and buffers the commit; the
//! recording deadline ends capture the same way but leaves the commit
//! unbuffered, so the pipeline waits in Transcribing until the user commits
//! or cancels.

use crate::audio::{AudioSource, PwRecorder};
use crate::config::Config;
use crate::error::{HyprvoiceError, InjectError};
use crate::inject::Injector;
use crate::notify::{self, Event, Notifier};
use crate::transcribe::{self, TranscriptionAdapter};
use std::sync::{Arc, Mutex, RwLock};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

const ERROR_CHANNEL_DEPTH: usize = 8;

/// Externally visible pipeline state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Idle,
    Recording,
    Transcribing,
    Injecting,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Idle => "idle",
            Status::Recording => "recording",
            Status::Transcribing => "transcribing",
            Status::Injecting => "injecting",
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// User-initiated pipeline action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Commit the transcription result for injection
    Inject,
}

/// Error surfaced on the pipeline's best-effort error channel
#[derive(Debug)]
pub struct PipelineError {
    pub title: String,
    pub message: String,
    pub source: Option<HyprvoiceError>,
}

impl std::fmt::Display for PipelineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.source {
            Some(source) => write!(f, "{}: {}", self.message, source),
            None => f.write_str(&self.message),
        }
    }
}

/// One recording/transcription/injection session.
///
/// `run()` spawns the driver; `stop()` cancels it and waits until it has
/// observed the cancellation and finished teardown. Safe to use once per
/// instance; the daemon builds a fresh pipeline per session from a fresh
/// config snapshot.
pub struct Pipeline {
    status: Arc<RwLock<Status>>,
    cancel: CancellationToken,
    action_tx: mpsc::Sender<Action>,
    error_rx: Mutex<Option<mpsc::Receiver<PipelineError>>>,
    driver_parts: Mutex<Option<Driver>>,
    driver_task: Mutex<Option<JoinHandle<()>>>,
}

impl Pipeline {
    /// Build a pipeline from a config snapshot, constructing all components.
    /// Fails on configuration problems (missing credentials or server URL)
    /// before any audio capture can start.
    pub fn new(config: &Config) -> crate::error::Result<Self> {
        let adapter = transcribe::create_adapter(&config.recording, &config.transcription)?;
        let source: Arc<dyn AudioSource> = Arc::new(PwRecorder::new(&config.recording));
        let injector = Arc::new(Injector::new(&config.injection));
        let notifier = notify::create_notifier(&config.notifications);
        Ok(Self::with_components(
            config.clone(),
            source,
            adapter,
            injector,
            notifier,
        ))
    }

    /// Build a pipeline with explicit components (dependency injection)
    pub fn with_components(
        config: Config,
        source: Arc<dyn AudioSource>,
        adapter: Arc<dyn TranscriptionAdapter>,
        injector: Arc<Injector>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let status = Arc::new(RwLock::new(Status::Idle));
        let cancel = CancellationToken::new();
        let (action_tx, action_rx) = mpsc::channel(1);
        let (error_tx, error_rx) = mpsc::channel(ERROR_CHANNEL_DEPTH);

        let driver = Driver {
            config,
            source,
            adapter,
            injector,
            notifier,
            status: Arc::clone(&status),
            cancel: cancel.clone(),
            action_rx,
            error_tx,
        };

        Self {
            status,
            cancel,
            action_tx,
            error_rx: Mutex::new(Some(error_rx)),
            driver_parts: Mutex::new(Some(driver)),
            driver_task: Mutex::new(None),
        }
    }

    /// Start the driver task. Non-blocking; a second call is a no-op.
    pub fn run(&self) {
        let Some(driver) = lock(&self.driver_parts).take() else {
            tracing::warn!("pipeline already started");
            return;
        };
        *lock(&self.driver_task) = Some(tokio::spawn(driver.run()));
    }

    /// Request teardown and wait until the driver has observed it.
    /// Idempotent; also safe before `run()`.
    pub async fn stop(&self) {
        self.cancel.cancel();
        let task = lock(&self.driver_task).take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                tracing::warn!("pipeline driver task failed: {}", e);
            }
        }
    }

    /// Non-blocking status read
    pub fn status(&self) -> Status {
        *self
            .status
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Sender half of the single-slot action channel.
    /// Use `try_send`; a pending duplicate is coalesced.
    pub fn action_sender(&self) -> mpsc::Sender<Action> {
        self.action_tx.clone()
    }

    /// Take the receiving half of the error channel (first caller wins)
    pub fn take_error_receiver(&self) -> Option<mpsc::Receiver<PipelineError>> {
        lock(&self.error_rx).take()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

enum RecordingEnd {
    /// Frame stream closed: user toggle, deadline, or capture EOF
    Completed {
        buffer: Vec<u8>,
        inject_pending: bool,
    },
    Cancelled,
    Failed,
}

/// The single task that enforces the state machine
struct Driver {
    config: Config,
    source: Arc<dyn AudioSource>,
    adapter: Arc<dyn TranscriptionAdapter>,
    injector: Arc<Injector>,
    notifier: Arc<dyn Notifier>,
    status: Arc<RwLock<Status>>,
    cancel: CancellationToken,
    action_rx: mpsc::Receiver<Action>,
    error_tx: mpsc::Sender<PipelineError>,
}

impl Driver {
    async fn run(mut self) {
        self.session().await;
        // Idle only after teardown: no worker holds resources past this point
        self.set_status(Status::Idle);
        tracing::debug!("pipeline returned to idle");
    }

    async fn session(&mut self) {
        self.set_status(Status::Recording);
        let (buffer, mut inject_pending) = match self.record().await {
            RecordingEnd::Completed {
                buffer,
                inject_pending,
            } => (buffer, inject_pending),
            RecordingEnd::Cancelled | RecordingEnd::Failed => return,
        };

        self.set_status(Status::Transcribing);
        tracing::debug!("transcribing {} bytes of audio", buffer.len());

        let adapter = Arc::clone(&self.adapter);
        let transcribe_fut = async move { adapter.transcribe(&buffer).await };
        tokio::pin!(transcribe_fut);

        let mut transcript: Option<String> = None;
        let text = loop {
            tokio::select! {
                // Dropping the in-flight future aborts the HTTP transfer
                _ = self.cancel.cancelled() => {
                    tracing::debug!("cancelled during transcription");
                    return;
                }
                result = &mut transcribe_fut, if transcript.is_none() => match result {
                    Ok(text) => {
                        if inject_pending {
                            break text;
                        }
                        // Commit not yet requested: hold the transcript and
                        // stay in Transcribing until Inject or cancel
                        transcript = Some(text);
                    }
                    Err(e) => {
                        self.emit_error(
                            "Transcription Failed",
                            "failed to transcribe recording",
                            Some(e.into()),
                        );
                        return;
                    }
                },
                action = self.action_rx.recv(), if !inject_pending => {
                    if let Some(Action::Inject) = action {
                        inject_pending = true;
                        if let Some(text) = transcript.take() {
                            break text;
                        }
                    }
                }
            }
        };

        if text.is_empty() {
            tracing::info!("empty transcript, skipping injection");
            self.notifier.send(Event::NoSpeech).await;
            return;
        }

        self.set_status(Status::Injecting);
        match self.injector.inject(&self.cancel, &text).await {
            Ok(()) => {
                self.notifier.send(Event::Injected).await;
            }
            Err(InjectError::Cancelled) => {
                tracing::debug!("injection cancelled");
            }
            Err(e) => {
                self.notifier.send(Event::InjectionAborted).await;
                self.emit_error(
                    "Injection Failed",
                    "failed to inject transcript",
                    Some(e.into()),
                );
            }
        }
    }

    /// Recording stage: collect frames until the stream ends, the session is
    /// cancelled, or the source reports a fatal error. Owns capture teardown
    /// on every path, so the subprocess is reaped before this returns.
    async fn record(&mut self) -> RecordingEnd {
        let deadline = self.config.recording.timeout();
        let mut capture = self
            .source
            .start(self.cancel.child_token(), deadline)
            .await;

        let mut buffer: Vec<u8> = Vec::new();
        let mut inject_pending = false;

        let end = loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    tracing::debug!("cancelled during recording");
                    break RecordingEnd::Cancelled;
                }
                frame = capture.frames.recv() => match frame {
                    Some(frame) => buffer.extend_from_slice(&frame.data),
                    // Producer closed the channel: capture worker is done
                    None => break RecordingEnd::Completed { buffer: std::mem::take(&mut buffer), inject_pending },
                },
                Some(error) = capture.errors.recv() => {
                    self.emit_error(
                        "Audio Capture Failed",
                        "audio capture failed",
                        Some(error.into()),
                    );
                    break RecordingEnd::Failed;
                }
                action = self.action_rx.recv(), if !inject_pending => {
                    if let Some(Action::Inject) = action {
                        tracing::debug!("toggle during recording: ending capture, commit buffered");
                        inject_pending = true;
                        // Graceful stop; buffered frames keep draining above
                        capture.stop().await;
                    }
                }
            }
        };

        capture.stop().await;
        match end {
            RecordingEnd::Completed {
                buffer,
                inject_pending,
            } => {
                // The worker reports spawn failures and then closes both
                // channels; a buffered error must win over a bare EOF.
                if let Ok(error) = capture.errors.try_recv() {
                    self.emit_error(
                        "Audio Capture Failed",
                        "audio capture failed",
                        Some(error.into()),
                    );
                    return RecordingEnd::Failed;
                }
                RecordingEnd::Completed {
                    buffer,
                    inject_pending,
                }
            }
            other => {
                capture.drain();
                other
            }
        }
    }

    fn set_status(&self, status: Status) {
        *self
            .status
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = status;
        tracing::debug!("pipeline status: {}", status);
    }

    /// Best-effort error propagation: never blocks the driver, and a
    /// dropped error is always logged
    fn emit_error(&self, title: &str, message: &str, source: Option<HyprvoiceError>) {
        let error = PipelineError {
            title: title.to_string(),
            message: message.to_string(),
            source,
        };
        if let Err(send_error) = self.error_tx.try_send(error) {
            let error = match send_error {
                mpsc::error::TrySendError::Full(e) => e,
                mpsc::error::TrySendError::Closed(e) => e,
            };
            tracing::error!("pipeline error had no receiver: {} ({})", error, error.title);
        }
    }
}
