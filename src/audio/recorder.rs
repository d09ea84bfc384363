//! PipeWire capture via a pw-record subprocess
//!
//! Spawns `pw-record --raw` writing PCM to stdout and chunks the stream into
//! frames. The worker owns the child for its whole life: on deadline,
//! cancellation, or consumer loss the child is killed and reaped before the
//! frame channel closes, so a returned [`CaptureHandle::stop`] guarantees no
//! orphaned capture process.

use super::{AudioFrame, AudioSource, CaptureHandle};
use crate::config::RecordingConfig;
use crate::error::AudioError;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

const CAPTURE_COMMAND: &str = "pw-record";

/// Audio source backed by a `pw-record` subprocess
pub struct PwRecorder {
    config: RecordingConfig,
    command: &'static str,
}

impl PwRecorder {
    pub fn new(config: &RecordingConfig) -> Self {
        Self {
            config: config.clone(),
            command: CAPTURE_COMMAND,
        }
    }

    #[cfg(test)]
    fn with_command(config: &RecordingConfig, command: &'static str) -> Self {
        Self {
            config: config.clone(),
            command,
        }
    }
}

#[async_trait::async_trait]
impl AudioSource for PwRecorder {
    async fn start(&self, cancel: CancellationToken, deadline: Duration) -> CaptureHandle {
        let (frame_tx, frames) = mpsc::channel(self.config.channel_buffer_size);
        let (error_tx, errors) = mpsc::channel(1);
        let stop = cancel.child_token();

        let worker = tokio::spawn(capture_worker(
            self.config.clone(),
            self.command,
            stop.clone(),
            deadline,
            frame_tx,
            error_tx,
        ));

        CaptureHandle::new(frames, errors, stop, worker)
    }
}

async fn capture_worker(
    config: RecordingConfig,
    command: &'static str,
    stop: CancellationToken,
    deadline: Duration,
    frame_tx: mpsc::Sender<AudioFrame>,
    error_tx: mpsc::Sender<AudioError>,
) {
    let mut cmd = Command::new(command);
    cmd.arg("--raw")
        .args(["--format", &config.format])
        .args(["--rate", &config.sample_rate.to_string()])
        .args(["--channels", &config.channels.to_string()]);
    if !config.device.is_empty() {
        cmd.args(["--target", &config.device]);
    }
    cmd.arg("-")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true);

    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(e) => {
            let _ = error_tx
                .send(AudioError::Spawn { command, source: e })
                .await;
            return;
        }
    };

    let Some(mut stdout) = child.stdout.take() else {
        let _ = error_tx
            .send(AudioError::Stream(format!(
                "{} stdout not captured",
                command
            )))
            .await;
        let _ = child.start_kill();
        let _ = child.wait().await;
        return;
    };

    tracing::debug!(
        "capture started: {} Hz, {} ch, format {}, frame size {} bytes",
        config.sample_rate,
        config.channels,
        config.format,
        config.buffer_size
    );

    let deadline_at = tokio::time::Instant::now() + deadline;
    let mut buf = vec![0u8; config.buffer_size];

    loop {
        tokio::select! {
            _ = stop.cancelled() => {
                tracing::debug!("capture stop requested");
                break;
            }
            _ = tokio::time::sleep_until(deadline_at) => {
                tracing::info!("recording deadline reached after {:?}", deadline);
                break;
            }
            read = stdout.read(&mut buf) => match read {
                Ok(0) => {
                    tracing::debug!("capture stream ended ({} exited)", command);
                    break;
                }
                Ok(n) => {
                    let frame = AudioFrame::new(buf[..n].to_vec());
                    // Bounded channel: a slow consumer blocks us here, which
                    // is the backpressure contract. Stop must still win.
                    tokio::select! {
                        _ = stop.cancelled() => break,
                        sent = frame_tx.send(frame) => {
                            if sent.is_err() {
                                tracing::debug!("frame receiver dropped, ending capture");
                                break;
                            }
                        }
                    }
                }
                Err(e) => {
                    // Transient read errors are survivable while the child
                    // is still healthy; a dead child ends the stream.
                    match child.try_wait() {
                        Ok(Some(status)) => {
                            tracing::debug!("{} exited with {}", command, status);
                            break;
                        }
                        _ => {
                            tracing::warn!("audio read error, continuing: {}", e);
                        }
                    }
                }
            }
        }
    }

    let _ = child.start_kill();
    match child.wait().await {
        Ok(status) => tracing::debug!("{} reaped: {}", command, status),
        Err(e) => tracing::warn!("failed to reap {}: {}", command, e),
    }
    // Dropping frame_tx here closes the stream for the collector
}
