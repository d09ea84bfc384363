//! Daemon: owns the pipeline slot and serves the control bus
//!
//! At most one pipeline exists at a time. The toggle command branches on the
//! current status: Idle starts a session, Recording ends capture with a
//! buffered commit, Transcribing commits the transcript, Injecting aborts.
//! Pipeline errors flow through a monitor task into the notifier; the daemon
//! itself never exits on a pipeline error.

use crate::bus;
use crate::config::Manager;
use crate::error::Result;
use crate::notify::{self, Event, Notifier};
use crate::pipeline::{Action, Pipeline, Status};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

pub struct Daemon {
    shared: Arc<Shared>,
    socket_path: PathBuf,
    pid_path: PathBuf,
}

struct Shared {
    config: Manager,
    notifier: RwLock<Arc<dyn Notifier>>,
    pipeline: RwLock<Option<Arc<Pipeline>>>,
    cancel: CancellationToken,
}

impl Daemon {
    /// Create a daemon with config from the default location and the
    /// default socket/PID paths
    pub fn new() -> Result<Self> {
        let manager = Manager::new()?;
        Ok(Self::with_manager(
            manager,
            bus::socket_path(),
            bus::pid_path(),
        ))
    }

    /// Create a daemon with an explicit config manager and bus paths
    pub fn with_manager(config: Manager, socket_path: PathBuf, pid_path: PathBuf) -> Self {
        let notifier = notify::create_notifier(&config.snapshot().notifications);
        Self {
            shared: Arc::new(Shared {
                config,
                notifier: RwLock::new(notifier),
                pipeline: RwLock::new(None),
                cancel: CancellationToken::new(),
            }),
            socket_path,
            pid_path,
        }
    }

    /// Run until SIGINT, SIGTERM, or a `q` command.
    /// The socket and PID file are removed on every exit path.
    pub async fn run(&self) -> Result<()> {
        bus::check_existing_daemon(&self.pid_path)?;

        let listener = bus::listen(&self.socket_path)?;
        if let Err(e) = bus::write_pid_file(&self.pid_path) {
            bus::remove_socket_file(&self.socket_path);
            return Err(e.into());
        }

        let mut reload_rx = match self.shared.config.start_watching() {
            Ok(rx) => Some(rx),
            Err(e) => {
                tracing::warn!("config file watching disabled: {}", e);
                None
            }
        };

        let mut sigterm = signal(SignalKind::terminate())?;
        let connections = TaskTracker::new();

        tracing::info!(
            "daemon started, listening on {}",
            self.socket_path.display()
        );

        let result = loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("received SIGINT, shutting down");
                    break Ok(());
                }
                _ = sigterm.recv() => {
                    tracing::info!("received SIGTERM, shutting down");
                    break Ok(());
                }
                _ = self.shared.cancel.cancelled() => {
                    tracing::info!("quit requested, shutting down");
                    break Ok(());
                }
                event = recv_reload(&mut reload_rx) => {
                    if event.is_some() {
                        self.shared.on_config_reload().await;
                    } else {
                        tracing::warn!("config watcher stopped");
                        reload_rx = None;
                    }
                }
                accepted = listener.accept() => match accepted {
                    Ok((stream, _)) => {
                        let shared = Arc::clone(&self.shared);
                        connections.spawn(async move {
                            shared.handle_connection(stream).await;
                        });
                    }
                    Err(e) => {
                        tracing::error!("accept failed: {}", e);
                        break Err(crate::error::BusError::Io(e).into());
                    }
                }
            }
        };

        self.shared.cancel.cancel();
        drop(listener);
        connections.close();
        connections.wait().await;
        self.shared.stop_pipeline().await;

        bus::remove_socket_file(&self.socket_path);
        bus::remove_pid_file(&self.pid_path);
        tracing::info!("daemon stopped");

        result
    }
}

/// Pending forever when watching is disabled, so the select loop just
/// ignores the reload arm
async fn recv_reload(rx: &mut Option<tokio::sync::mpsc::Receiver<()>>) -> Option<()> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

impl Shared {
    async fn handle_connection(self: &Arc<Self>, stream: UnixStream) {
        let (reader, mut writer) = stream.into_split();
        let mut line = String::new();

        if let Err(e) = BufReader::new(reader).read_line(&mut line).await {
            tracing::warn!("client read error: {}", e);
            let _ = writer
                .write_all(format!("ERR read_error: {}\n", e).as_bytes())
                .await;
            return;
        }

        let reply = match line.as_bytes().first() {
            None => "ERR empty".to_string(),
            Some(&cmd) => self.dispatch(cmd).await,
        };

        if let Err(e) = writer.write_all(format!("{}\n", reply).as_bytes()).await {
            tracing::warn!("client write error: {}", e);
            return;
        }
        let _ = writer.flush().await;
    }

    async fn dispatch(self: &Arc<Self>, cmd: u8) -> String {
        match cmd {
            b't' => {
                self.toggle().await;
                "OK toggled".to_string()
            }
            b'c' => {
                self.cancel_current().await;
                "OK cancelled".to_string()
            }
            b's' => format!("STATUS status={}", self.status().await),
            b'v' => format!("STATUS proto={}", bus::PROTO_VERSION),
            b'q' => {
                self.cancel.cancel();
                "OK quitting".to_string()
            }
            other => {
                tracing::warn!("unknown command byte: {:?}", other as char);
                format!("ERR unknown={:?}", other as char)
            }
        }
    }

    async fn status(&self) -> Status {
        match self.pipeline.read().await.as_ref() {
            Some(pipeline) => pipeline.status(),
            None => Status::Idle,
        }
    }

    async fn toggle(self: &Arc<Self>) {
        match self.status().await {
            Status::Idle => self.start_pipeline().await,
            Status::Recording => {
                // End capture and commit in one gesture
                self.send_inject().await;
                self.notify(Event::Transcribing).await;
            }
            Status::Transcribing => self.send_inject().await,
            Status::Injecting => {
                self.stop_pipeline().await;
                self.notify(Event::InjectionAborted).await;
            }
        }
    }

    async fn start_pipeline(self: &Arc<Self>) {
        let config = self.config.snapshot();
        match Pipeline::new(&config) {
            Ok(pipeline) => {
                let pipeline = Arc::new(pipeline);
                if let Some(error_rx) = pipeline.take_error_receiver() {
                    self.spawn_error_monitor(error_rx);
                }
                pipeline.run();
                *self.pipeline.write().await = Some(pipeline);
                self.notify(Event::RecordingStarted).await;
            }
            Err(e) => {
                tracing::error!("failed to start pipeline: {}", e);
                let notifier = self.notifier.read().await.clone();
                notifier
                    .error(&format!("failed to start pipeline: {}", e))
                    .await;
            }
        }
    }

    /// Forward pipeline errors to the notifier for the life of one session
    fn spawn_error_monitor(
        self: &Arc<Self>,
        mut error_rx: tokio::sync::mpsc::Receiver<crate::pipeline::PipelineError>,
    ) {
        let shared = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shared.cancel.cancelled() => break,
                    error = error_rx.recv() => match error {
                        Some(error) => {
                            tracing::error!("pipeline error: {}", error);
                            let notifier = shared.notifier.read().await.clone();
                            notifier.error(&error.to_string()).await;
                        }
                        None => break,
                    }
                }
            }
        });
    }

    async fn send_inject(&self) {
        let pipeline = self.pipeline.read().await.clone();
        if let Some(pipeline) = pipeline {
            match pipeline.action_sender().try_send(Action::Inject) {
                Ok(()) => tracing::debug!("inject action sent"),
                Err(_) => tracing::debug!("inject already pending, coalesced"),
            }
        }
    }

    async fn cancel_current(self: &Arc<Self>) {
        if self.status().await == Status::Idle {
            tracing::debug!("cancel requested while idle, ignoring");
            return;
        }
        self.stop_pipeline().await;
        self.notify(Event::OperationCancelled).await;
    }

    async fn stop_pipeline(&self) {
        let pipeline = self.pipeline.write().await.take();
        if let Some(pipeline) = pipeline {
            pipeline.stop().await;
        }
    }

    async fn on_config_reload(self: &Arc<Self>) {
        match self.config.reload() {
            Ok(()) => {
                tracing::info!("config reloaded, tearing down active pipeline");
                self.stop_pipeline().await;
                let snapshot = self.config.snapshot();
                *self.notifier.write().await = notify::create_notifier(&snapshot.notifications);
                self.notify(Event::ConfigReloaded).await;
            }
            Err(e) => {
                tracing::error!("config reload failed, keeping previous config: {}", e);
            }
        }
    }

    async fn notify(&self, event: Event) {
        let notifier = self.notifier.read().await.clone();
        notifier.send(event).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_manager(dir: &TempDir) -> Manager {
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[transcription]\napi_key = \"test-key\"\n[notifications]\ntype = \"log\"\n",
        )
        .unwrap();
        Manager::with_path(path).unwrap()
    }

    #[tokio::test]
    async fn test_status_idle_without_pipeline() {
        let dir = TempDir::new().unwrap();
        let daemon = Daemon::with_manager(
            test_manager(&dir),
            dir.path().join("hyprvoice.sock"),
            dir.path().join("hyprvoice.pid"),
        );
        assert_eq!(daemon.shared.status().await, Status::Idle);
    }

    #[tokio::test]
    async fn test_dispatch_replies() {
        let dir = TempDir::new().unwrap();
        let daemon = Daemon::with_manager(
            test_manager(&dir),
            dir.path().join("hyprvoice.sock"),
            dir.path().join("hyprvoice.pid"),
        );

        assert_eq!(
            daemon.shared.dispatch(b's').await,
            "STATUS status=idle".to_string()
        );
        assert_eq!(
            daemon.shared.dispatch(b'v').await,
            format!("STATUS proto={}", bus::PROTO_VERSION)
        );
        // Unknown byte leaves state untouched
        assert_eq!(daemon.shared.dispatch(b'x').await, "ERR unknown='x'");
        assert_eq!(daemon.shared.status().await, Status::Idle);
        // Cancel while idle is a no-op
        assert_eq!(daemon.shared.dispatch(b'c').await, "OK cancelled");
        assert_eq!(daemon.shared.status().await, Status::Idle);
    }

    #[tokio::test]
    async fn test_config_reload_installs_snapshot_and_clears_pipeline() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[transcription]\napi_key = \"test-key\"\n[notifications]\ntype = \"log\"\n",
        )
        .unwrap();
        let daemon = Daemon::with_manager(
            Manager::with_path(path.clone()).unwrap(),
            dir.path().join("hyprvoice.sock"),
            dir.path().join("hyprvoice.pid"),
        );

        // Simulate an active session, then rewrite the config
        let config = daemon.shared.config.snapshot();
        let pipeline = Arc::new(Pipeline::new(&config).unwrap());
        *daemon.shared.pipeline.write().await = Some(pipeline);

        std::fs::write(
            &path,
            "[transcription]\nprovider = \"whisper-cpp\"\nserver_url = \"http://127.0.0.1:8080/inference\"\n[notifications]\ntype = \"log\"\n",
        )
        .unwrap();
        daemon.shared.on_config_reload().await;

        // The active pipeline is torn down; the next toggle sees the new
        // provider
        assert!(daemon.shared.pipeline.read().await.is_none());
        assert_eq!(
            daemon.shared.config.snapshot().transcription.provider,
            "whisper-cpp"
        );
    }

    #[tokio::test]
    async fn test_quit_cancels_daemon() {
        let dir = TempDir::new().unwrap();
        let daemon = Daemon::with_manager(
            test_manager(&dir),
            dir.path().join("hyprvoice.sock"),
            dir.path().join("hyprvoice.pid"),
        );

        assert_eq!(daemon.shared.dispatch(b'q').await, "OK quitting");
        assert!(daemon.shared.cancel.is_cancelled());
    }
}
