//! Clipboard backend via wl-copy
//!
//! The most reliable delivery: the transcript lands on the clipboard and the
//! user pastes it. Last entry in the default fallback chain.

use super::{binary_in_path, wayland_session_ready, Backend};
use crate::error::InjectError;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

pub struct ClipboardBackend;

impl ClipboardBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ClipboardBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Backend for ClipboardBackend {
    fn name(&self) -> &'static str {
        "clipboard"
    }

    async fn available(&self) -> Result<(), InjectError> {
        if !binary_in_path("wl-copy").await {
            return Err(InjectError::BinaryNotFound {
                binary: "wl-copy",
                package: "wl-clipboard",
            });
        }
        wayland_session_ready()
    }

    async fn inject(&self, text: &str, timeout: Duration) -> Result<(), InjectError> {
        let text = text.to_string();
        let run = async move {
            let mut child = Command::new("wl-copy")
                .stdin(Stdio::piped())
                .stdout(Stdio::null())
                .stderr(Stdio::piped())
                .kill_on_drop(true)
                .spawn()
                .map_err(|e| InjectError::Backend {
                    backend: "clipboard",
                    reason: e.to_string(),
                })?;

            if let Some(mut stdin) = child.stdin.take() {
                stdin
                    .write_all(text.as_bytes())
                    .await
                    .map_err(|e| InjectError::Backend {
                        backend: "clipboard",
                        reason: format!("writing to wl-copy: {}", e),
                    })?;
                drop(stdin);
            }

            let output = child
                .wait_with_output()
                .await
                .map_err(|e| InjectError::Backend {
                    backend: "clipboard",
                    reason: e.to_string(),
                })?;

            if !output.status.success() {
                let stderr = String::from_utf8_lossy(&output.stderr);
                return Err(InjectError::Backend {
                    backend: "clipboard",
                    reason: stderr.trim().to_string(),
                });
            }
            Ok(())
        };

        tokio::time::timeout(timeout, run)
            .await
            .map_err(|_| InjectError::Timeout {
                backend: "clipboard",
                timeout,
            })?
    }
}
